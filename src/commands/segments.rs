//! Segment table of a JPEG file, with optional XMP extraction.

use anyhow::{Context, Result};
use gainmap_probe::jpeg::report::{ContainerReport, XmpPacket};
use gainmap_probe::jpeg::XmpGainMap;
use gainmap_probe::{inspect, ParseOptions};

use super::{format_size, print_json, read_input, sibling_path, write_output};
use crate::SegmentsArgs;

const RULE_WIDTH: usize = 70;

pub fn run(args: &SegmentsArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle segments subcommand").entered();

    let data = read_input(&args.input)?;
    let report = inspect(&data, ParseOptions::default())
        .with_context(|| format!("Failed to parse JPEG: {}", args.input.display()))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_text(&args.input.display().to_string(), &report);
    }

    if args.extract_xmp {
        extract_xmp(args, &data, &report)?;
    }
    Ok(())
}

fn print_text(name: &str, report: &ContainerReport) {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("JPEG File Analysis Report: {name}");
    println!("{}", "=".repeat(RULE_WIDTH));

    if let Some(dims) = report.dimensions {
        println!("\nImage dimension: {}x{}", dims.width, dims.height);
    }

    if !report.xmp_packets.is_empty() {
        println!(
            "\nFound {} XMP metadata segment(s):",
            report.xmp_packets.len()
        );
        for packet in &report.xmp_packets {
            print_xmp_packet(packet);
        }
    }

    println!("\nJPEG Segment Analysis:");
    println!(
        "{:<10} {:<6} {:<10} {:<10} Description",
        "Offset", "Marker", "Code", "Length"
    );
    println!("{}", "-".repeat(RULE_WIDTH));
    let mut current = None;
    for segment in &report.segments {
        if current != Some(segment.stream) && report.codestreams.len() > 1 {
            let stream = &report.codestreams[segment.stream];
            println!(
                "# {} at 0x{:06X} ({})",
                stream.role,
                stream.start,
                format_size(stream.len())
            );
            current = Some(segment.stream);
        }
        let length = segment
            .length
            .map_or_else(|| "-".to_string(), |l| l.to_string());
        println!(
            "{:<10} {:<6} {:<10} {:<10} {}",
            format!("0x{:06X}", segment.offset),
            segment.name,
            format!("0x{:04X}", segment.code),
            length,
            segment.description
        );
    }

    for block in &report.iso_blocks {
        match block.block.metadata() {
            Some(metadata) => println!(
                "\nISO 21496-1 record at 0x{:06X}: {} channel(s), headroom {} -> {}",
                block.offset,
                metadata.channel_count(),
                metadata.base_hdr_headroom(),
                metadata.alternate_hdr_headroom()
            ),
            None => println!(
                "\nISO 21496-1 version-only block at 0x{:06X}",
                block.offset
            ),
        }
    }
    for failed in &report.iso_errors {
        println!(
            "\nISO 21496-1 block at 0x{:06X} is invalid: {}",
            failed.offset, failed.error
        );
    }
    if let Some(offset) = report.entropy_data_offset {
        println!("\nEntropy-coded data starts at 0x{offset:06X}");
    }

    println!("{}", "=".repeat(RULE_WIDTH));
}

fn print_xmp_packet(packet: &XmpPacket) {
    println!(
        "  XMP #{}: Offset 0x{:06X}, Size {}",
        packet.index + 1,
        packet.offset,
        format_size(packet.size)
    );
    if let Some(hints) = &packet.gain_map {
        print_xmp_hints(hints);
    }
}

fn print_xmp_hints(hints: &XmpGainMap) {
    if let Some(version) = &hints.version {
        println!("    hdrgm:Version          {version}");
    }
    if let Some(is_hdr) = hints.base_rendition_is_hdr {
        println!("    hdrgm:BaseRenditionIsHDR {is_hdr}");
    }
    let lists = [
        ("GainMapMin", &hints.gain_map_min),
        ("GainMapMax", &hints.gain_map_max),
        ("Gamma", &hints.gamma),
        ("OffsetSDR", &hints.offset_sdr),
        ("OffsetHDR", &hints.offset_hdr),
    ];
    for (name, values) in lists {
        if !values.is_empty() {
            println!("    hdrgm:{name:<16} {values:?}");
        }
    }
    if let Some(value) = hints.hdr_capacity_min {
        println!("    hdrgm:HDRCapacityMin   {value}");
    }
    if let Some(value) = hints.hdr_capacity_max {
        println!("    hdrgm:HDRCapacityMax   {value}");
    }
}

/// `<stem>.xml` for a single packet, indexed names otherwise.
fn xmp_suffix(packet: &XmpPacket, count: usize) -> String {
    if count == 1 {
        ".xml".to_string()
    } else {
        format!("_xmp_{:02}_0x{:06X}.xml", packet.index, packet.offset)
    }
}

fn extract_xmp(args: &SegmentsArgs, data: &[u8], report: &ContainerReport) -> Result<()> {
    if report.xmp_packets.is_empty() {
        tracing::info!("No XMP metadata found in the file");
        return Ok(());
    }

    let count = report.xmp_packets.len();
    for packet in &report.xmp_packets {
        let path = sibling_path(&args.input, None, &xmp_suffix(packet, count));
        write_output(&path, packet.bytes(data))?;
        tracing::info!("Saved XMP metadata to {}", path.display());
    }
    tracing::info!("Total {count} XMP file(s) saved");
    Ok(())
}
