//! Embedded codestream listing and extraction.

use std::fs;

use anyhow::{bail, Context, Result};
use gainmap_probe::jpeg::{EmbeddedStream, StreamRole};
use gainmap_probe::jpeg::{locate_streams, split_codestreams};

use super::{format_size, read_input, sibling_path, write_output};
use crate::StreamsArgs;

pub fn run(args: &StreamsArgs) -> Result<()> {
    let _guard = tracing::trace_span!("Handle streams subcommand").entered();

    let data = read_input(&args.input)?;
    let streams = if args.scan_pairs {
        locate_streams(&data)
    } else {
        split_codestreams(&data)
    };
    if streams.is_empty() {
        bail!("No valid JPEG streams found in {}", args.input.display());
    }

    println!("Found {} JPEG stream(s):", streams.len());
    for (i, stream) in streams.iter().enumerate() {
        println!(
            "  #{}: {:<15} 0x{:08X}..0x{:08X} ({})",
            i + 1,
            stream.role.to_string(),
            stream.start,
            stream.end,
            format_size(stream.len())
        );
    }

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        for (stream, suffix) in streams.iter().zip(file_suffixes(&streams)) {
            let path = sibling_path(&args.input, Some(dir), &suffix);
            write_output(&path, stream.bytes(&data))?;
            tracing::info!("{} saved to {}", stream.role, path.display());
        }
    }
    Ok(())
}

/// `_main.jpg`, `_aux_N.jpg` and `_thumb_N.jpg`, numbered per role from 1.
fn file_suffixes(streams: &[EmbeddedStream]) -> Vec<String> {
    let mut aux = 0;
    let mut thumb = 0;
    streams
        .iter()
        .map(|stream| match stream.role {
            StreamRole::Main => "_main.jpg".to_string(),
            StreamRole::Auxiliary => {
                aux += 1;
                format!("_aux_{aux}.jpg")
            }
            StreamRole::Thumbnail => {
                thumb += 1;
                format!("_thumb_{thumb}.jpg")
            }
        })
        .collect()
}
