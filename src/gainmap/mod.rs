//! ISO 21496-1 gain map metadata.
//!
//! Decodes the binary metadata record and finds it among the codestreams
//! of a file.

pub mod iso21496;
pub mod metadata;
pub mod rational;
pub(crate) mod reader;
pub mod search;

pub use iso21496::{
    parse_gain_map_metadata, parse_iso_block, IsoBlock, LocatedBlock, ParseOptions,
};
pub use metadata::{Channel, ChannelMetadata, GainMapFlags, GainMapMetadata};
pub use rational::{SRational, URational};
pub use search::{find_gain_map_metadata, GainMapLocation};
