//! XMP packet inspection for gain map hints.
//!
//! Reads the `hdrgm` namespace (Adobe gain map / UltraHDR v1) so the XMP
//! description can be shown next to the binary ISO 21496-1 record.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{ProbeError, Result};

/// XMP namespace URI of gain map properties.
pub const HDRGM_NAMESPACE: &str = "http://ns.adobe.com/hdr-gain-map/1.0/";
pub const HDRGM_PREFIX: &str = "hdrgm";

/// Gain map properties found in an XMP packet.
///
/// Missing properties stay `None` or empty; no defaults are filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XmpGainMap {
    pub version: Option<String>,
    pub base_rendition_is_hdr: Option<bool>,
    pub gain_map_min: Vec<f64>,
    pub gain_map_max: Vec<f64>,
    pub gamma: Vec<f64>,
    pub offset_sdr: Vec<f64>,
    pub offset_hdr: Vec<f64>,
    pub hdr_capacity_min: Option<f64>,
    pub hdr_capacity_max: Option<f64>,
}

/// XMP parser for gain map properties.
pub struct XmpParser;

impl XmpParser {
    /// Parses gain map properties from raw XMP bytes.
    pub fn parse(xmp_data: &[u8]) -> Result<XmpGainMap> {
        let xmp_str = std::str::from_utf8(xmp_data)
            .map_err(|e| ProbeError::XmpError(format!("Invalid UTF-8 in XMP: {}", e)))?;

        Self::parse_str(xmp_str)
    }

    /// Parses gain map properties from an XMP string.
    ///
    /// Both the attribute form (`hdrgm:Gamma="1.0"`) and the element form,
    /// including `rdf:Seq` lists of per-channel values, are accepted.
    pub fn parse_str(xmp_str: &str) -> Result<XmpGainMap> {
        let mut hints = XmpGainMap::default();
        let mut reader = Reader::from_str(xmp_str);
        reader.trim_text(true);

        let mut current_element: Option<String> = None;
        let mut values: Vec<String> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

                    // Empty elements have no End event, so only Start opens one.
                    if Self::is_hdrgm(&name) && current_element.is_none() {
                        current_element = Some(name);
                        values.clear();
                    }
                    Self::read_attributes(&mut hints, &e)?;
                }
                Ok(Event::Empty(e)) => Self::read_attributes(&mut hints, &e)?,
                Ok(Event::Text(e)) if current_element.is_some() => {
                    let text = e.unescape().map_err(|err| ProbeError::XmpError(err.to_string()))?;
                    values.push(text.into_owned());
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if current_element.as_deref() == Some(name.as_str()) {
                        if !values.is_empty() {
                            Self::set_field(&mut hints, &name, &values)?;
                        }
                        current_element = None;
                        values.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ProbeError::XmpError(format!("XML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(hints)
    }

    /// Checks if XMP data mentions the gain map namespace.
    pub fn has_gain_map_metadata(xmp_data: &[u8]) -> bool {
        let xmp_str = match std::str::from_utf8(xmp_data) {
            Ok(s) => s,
            Err(_) => return false,
        };

        xmp_str.contains(HDRGM_NAMESPACE) || xmp_str.contains("hdrgm:")
    }

    fn read_attributes(hints: &mut XmpGainMap, element: &BytesStart<'_>) -> Result<()> {
        for attr in element.attributes().flatten() {
            let attr_name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if Self::is_hdrgm(&attr_name) {
                let value = attr
                    .unescape_value()
                    .map_err(|err| ProbeError::XmpError(err.to_string()))?;
                Self::set_field(hints, &attr_name, &[value.into_owned()])?;
            }
        }
        Ok(())
    }

    fn is_hdrgm(name: &str) -> bool {
        name.split_once(':')
            .is_some_and(|(prefix, _)| prefix == HDRGM_PREFIX)
    }

    fn set_field(hints: &mut XmpGainMap, name: &str, values: &[String]) -> Result<()> {
        let field_name = name.rsplit(':').next().unwrap_or(name);

        match field_name {
            "Version" => hints.version = values.first().map(|v| v.trim().to_string()),
            "BaseRenditionIsHDR" => {
                hints.base_rendition_is_hdr = values
                    .first()
                    .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1");
            }
            "GainMapMin" => hints.gain_map_min = Self::parse_float_list(name, values)?,
            "GainMapMax" => hints.gain_map_max = Self::parse_float_list(name, values)?,
            "Gamma" => hints.gamma = Self::parse_float_list(name, values)?,
            "OffsetSDR" => hints.offset_sdr = Self::parse_float_list(name, values)?,
            "OffsetHDR" => hints.offset_hdr = Self::parse_float_list(name, values)?,
            "HDRCapacityMin" => hints.hdr_capacity_min = Some(Self::parse_float(name, &values[0])?),
            "HDRCapacityMax" => hints.hdr_capacity_max = Some(Self::parse_float(name, &values[0])?),
            _ => {}
        }

        Ok(())
    }

    fn parse_float(name: &str, value: &str) -> Result<f64> {
        value
            .trim()
            .parse()
            .map_err(|_| ProbeError::XmpError(format!("Invalid {}: {}", name, value)))
    }

    /// Values may arrive as one string (`"1.0, 2.0"`) or as `rdf:li` items.
    fn parse_float_list(name: &str, values: &[String]) -> Result<Vec<f64>> {
        let parsed = values
            .iter()
            .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
            .filter(|s| !s.is_empty())
            .map(|s| Self::parse_float(name, s))
            .collect::<Result<Vec<_>>>()?;

        match parsed.len() {
            1 | 3 => Ok(parsed),
            n => Err(ProbeError::XmpError(format!(
                "{}: expected 1 or 3 values, got {}",
                name, n
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_form() {
        let xmp = r#"<?xml version="1.0" encoding="UTF-8"?>
        <x:xmpmeta xmlns:x="adobe:ns:meta/">
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/">
                <rdf:Description rdf:about=""
                    hdrgm:Version="1.0"
                    hdrgm:BaseRenditionIsHDR="False"
                    hdrgm:GainMapMin="0.0"
                    hdrgm:GainMapMax="3.0"
                    hdrgm:Gamma="1.0"
                    hdrgm:OffsetSDR="0.015625"
                    hdrgm:OffsetHDR="0.015625"
                    hdrgm:HDRCapacityMin="0.0"
                    hdrgm:HDRCapacityMax="3.0"/>
            </rdf:RDF>
        </x:xmpmeta>"#;

        let hints = XmpParser::parse_str(xmp).unwrap();
        assert_eq!(hints.version.as_deref(), Some("1.0"));
        assert_eq!(hints.base_rendition_is_hdr, Some(false));
        assert_eq!(hints.gain_map_max, vec![3.0]);
        assert_eq!(hints.hdr_capacity_max, Some(3.0));
    }

    #[test]
    fn test_parse_sequence_form() {
        let xmp = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
                <rdf:Description xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/">
                    <hdrgm:GainMapMax>
                        <rdf:Seq>
                            <rdf:li>2.5</rdf:li>
                            <rdf:li>2.25</rdf:li>
                            <rdf:li>2.0</rdf:li>
                        </rdf:Seq>
                    </hdrgm:GainMapMax>
                    <hdrgm:Version>1.0</hdrgm:Version>
                </rdf:Description>
            </rdf:RDF>
        </x:xmpmeta>"#;

        let hints = XmpParser::parse_str(xmp).unwrap();
        assert_eq!(hints.gain_map_max, vec![2.5, 2.25, 2.0]);
        assert_eq!(hints.version.as_deref(), Some("1.0"));
        assert!(hints.gamma.is_empty());
    }

    #[test]
    fn test_empty_element_does_not_swallow_later_properties() {
        let xmp = r#"<rdf:Description xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/">
            <hdrgm:GainMapMin/>
            <hdrgm:Gamma>2.0</hdrgm:Gamma>
            <hdrgm:OffsetSDR hdrgm:Version="1.0"/>
            <hdrgm:OffsetHDR>0.5</hdrgm:OffsetHDR>
        </rdf:Description>"#;

        let hints = XmpParser::parse_str(xmp).unwrap();
        assert!(hints.gain_map_min.is_empty());
        assert_eq!(hints.gamma, vec![2.0]);
        assert_eq!(hints.version.as_deref(), Some("1.0"));
        assert_eq!(hints.offset_hdr, vec![0.5]);
    }

    #[test]
    fn test_invalid_channel_count() {
        let xmp = r#"<rdf:Description xmlns:hdrgm="http://ns.adobe.com/hdr-gain-map/1.0/"
            hdrgm:Gamma="1.0, 2.0"/>"#;
        assert!(XmpParser::parse_str(xmp).is_err());
    }

    #[test]
    fn test_has_gain_map_metadata() {
        let xmp_with =
            b"<x:xmpmeta xmlns:hdrgm=\"http://ns.adobe.com/hdr-gain-map/1.0/\"></x:xmpmeta>";
        let xmp_without = b"<x:xmpmeta></x:xmpmeta>";

        assert!(XmpParser::has_gain_map_metadata(xmp_with));
        assert!(!XmpParser::has_gain_map_metadata(xmp_without));
    }
}
