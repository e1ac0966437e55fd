//! `gainmap-probe` command-line tool.

use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "gainmap-probe", version)]
#[command(about = "Inspect JPEG containers and ISO 21496-1 gain map metadata")]
struct Args {
    #[command(subcommand)]
    subcommand: Subcommands,
    #[command(flatten)]
    globals: GlobalArgs,
}

#[derive(Debug, clap::Args)]
struct GlobalArgs {
    /// Print debug information; can be repeated.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Do not print logs to console.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommands {
    /// List the marker segments of a JPEG file.
    Segments(SegmentsArgs),
    /// Find and print the ISO 21496-1 gain map metadata.
    Gainmap(GainmapArgs),
    /// Decode an APP2 segment given as a hex dump.
    Hex(HexArgs),
    /// List the JPEG codestreams embedded in a file.
    Streams(StreamsArgs),
}

/// Prints the segment table of a JPEG file.
#[derive(Debug, clap::Args)]
pub struct SegmentsArgs {
    /// Input file
    pub input: PathBuf,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
    /// Write each XMP packet to an `.xml` file next to the input
    #[arg(long)]
    pub extract_xmp: bool,
}

/// Prints the gain map metadata of a JPEG file.
#[derive(Debug, clap::Args)]
pub struct GainmapArgs {
    /// Input file
    pub input: PathBuf,
    /// Print the record as JSON
    #[arg(long)]
    pub json: bool,
    /// Reject bytes after the metadata record
    #[arg(long)]
    pub strict: bool,
    /// Also print the gain map weight for a display with this headroom
    #[arg(long, value_name = "STOPS")]
    pub display_headroom: Option<f64>,
}

/// Decodes a hex-dumped APP2 segment (marker, length and payload).
#[derive(Debug, clap::Args)]
pub struct HexArgs {
    /// Text file holding the hex dump
    pub input: PathBuf,
    /// Print the decoded block as JSON
    #[arg(long)]
    pub json: bool,
    /// Also write the decoded block as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Lists and optionally extracts embedded codestreams.
#[derive(Debug, clap::Args)]
pub struct StreamsArgs {
    /// Input file
    pub input: PathBuf,
    /// Directory to write each codestream to
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Pair raw SOI/EOI bytes instead of walking segments; also finds
    /// thumbnails nested in Exif
    #[arg(long)]
    pub scan_pairs: bool,
}

fn main() -> std::process::ExitCode {
    let Args {
        subcommand,
        globals,
    } = Args::parse();

    if !globals.quiet {
        let filter = match globals.verbose {
            0 => tracing::level_filters::LevelFilter::INFO,
            1 => tracing::level_filters::LevelFilter::DEBUG,
            2.. => tracing::level_filters::LevelFilter::TRACE,
        };
        let env_filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(filter.into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
    }

    let result = match subcommand {
        Subcommands::Segments(args) => commands::segments::run(&args),
        Subcommands::Gainmap(args) => commands::gainmap::run(&args),
        Subcommands::Hex(args) => commands::hex::run(&args),
        Subcommands::Streams(args) => commands::streams::run(&args),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}
