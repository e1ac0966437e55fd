//! Gain map metadata of a JPEG file.

use anyhow::{Context, Result};
use gainmap_probe::gainmap::{GainMapMetadata, IsoBlock, LocatedBlock};
use gainmap_probe::{find_gain_map_metadata, ParseOptions};

use super::print_json;
use crate::GainmapArgs;

pub fn run(args: &GainmapArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle gainmap subcommand").entered();

    let data = super::read_input(&args.input)?;
    let options = if args.strict {
        ParseOptions::strict()
    } else {
        ParseOptions::default()
    };

    let found = find_gain_map_metadata(&data, options)
        .with_context(|| format!("No usable gain map in {}", args.input.display()))?;

    if args.json {
        return print_json(&found);
    }

    println!("--- Parsed Gain Map Metadata ---");
    println!(
        "Found in: {} (0x{:06X}..0x{:06X})",
        found.stream.role, found.stream.start, found.stream.end
    );
    println!("APP2 Offset: 0x{:06X}", found.offset);
    print_metadata(&found.metadata);
    if let Some(headroom) = args.display_headroom {
        print_rendition_weight(&found.metadata, headroom);
    }
    println!("\n--------------------------------");
    Ok(())
}

fn print_rendition_weight(metadata: &GainMapMetadata, display_headroom: f64) {
    println!("\n  [Display]");
    println!(
        "    Headroom {display_headroom:.4} stops: gain map weight {:.4}",
        metadata.rendition_weight(display_headroom)
    );
}

/// Prints a decoded block with its segment framing.
pub fn print_block(located: &LocatedBlock) {
    println!("--- Parsed Gain Map Metadata ---");
    println!("APP2 Marker: 0x{:04X}", located.marker);
    println!("Segment Length: {} bytes", located.segment_length);
    println!("URN: {}", located.urn);

    match &located.block {
        IsoBlock::Metadata(metadata) => print_metadata(metadata),
        IsoBlock::VersionOnly {
            minimum_version,
            writer_version,
        } => {
            println!("\n[Version-only block]");
            println!("  Version: Min={minimum_version}, Writer={writer_version}");
        }
    }
    println!("\n--------------------------------");
}

fn fraction(value: Option<f64>, raw: impl std::fmt::Display) -> String {
    match value {
        Some(value) => format!("{value:.4} ({raw})"),
        None => format!("undefined ({raw})"),
    }
}

/// Prints the fields of a metadata record.
pub fn print_metadata(metadata: &GainMapMetadata) {
    let flags = metadata.flags();
    println!("\n[Metadata]");
    println!("  Flags: 0x{:02X}", flags.to_byte());
    println!(
        "  Version: Min={}, Writer={}",
        metadata.minimum_version(),
        metadata.writer_version()
    );
    println!("  Is Multichannel: {}", flags.is_multichannel);
    println!("  Use Base Colour Space: {}", flags.use_base_colour_space);
    println!("  Use Common Denominator: {}", flags.use_common_denominator);
    println!("  Backward Direction: {}", flags.backward_direction);
    if flags.reserved != 0 {
        println!("  Reserved Bits: 0x{:02X}", flags.reserved);
    }

    let base = metadata.base_hdr_headroom();
    let alternate = metadata.alternate_hdr_headroom();
    println!("\n  [HDR Headroom]");
    println!("    Baseline:  {}", fraction(base.value(), base));
    println!("    Alternate: {}", fraction(alternate.value(), alternate));
    println!(
        "    Capacity:  {:.4} stops{}",
        metadata.hdr_capacity_stops(),
        if metadata.is_meaningful_hdr() {
            ""
        } else {
            " (not meaningful HDR)"
        }
    );

    println!("\n  [Channels]");
    for channel in metadata.channels() {
        println!("    --- Channel: {:?} ---", channel.channel);
        println!(
            "      Gain Map Min:     {}",
            fraction(channel.gain_map_min.value(), channel.gain_map_min)
        );
        println!(
            "      Gain Map Max:     {}",
            fraction(channel.gain_map_max.value(), channel.gain_map_max)
        );
        println!(
            "      Gamma:            {}",
            fraction(channel.gamma.value(), channel.gamma)
        );
        println!(
            "      Base Offset:      {}",
            fraction(channel.base_offset.value(), channel.base_offset)
        );
        println!(
            "      Alternate Offset: {}",
            fraction(channel.alternate_offset.value(), channel.alternate_offset)
        );
        if let Some((min, max)) = channel.content_boost_range() {
            println!("      Content Boost:    {min:.4}x .. {max:.4}x");
        }
    }
}
