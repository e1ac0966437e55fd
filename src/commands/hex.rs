//! Decoding a hex-dumped APP2 segment.

use std::fs;

use anyhow::{Context, Result};
use gainmap_probe::{parse_hex_segment, ParseOptions};

use super::{print_json, to_json, write_output};
use crate::HexArgs;

pub fn run(args: &HexArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle hex subcommand").entered();

    let dump = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read: {}", args.input.display()))?;
    let located = parse_hex_segment(&dump, ParseOptions::default())
        .context("Could not parse the APP2 segment")?;

    if args.json {
        print_json(&located)?;
    } else {
        super::gainmap::print_block(&located);
    }

    if let Some(output) = &args.output {
        write_output(output, to_json(&located)?.as_bytes())?;
        tracing::info!("Saved parsed metadata to {}", output.display());
    }
    Ok(())
}
