//! Data models for the nightcore pipeline.
//!
//! - Variant parameters and their command-line list parsing
//! - The metadata record encoded in the cover file name
//! - Enums for encode presets and pipeline stages
//! - Command-line value types (stage range, ratio, publish limit)

mod enums;
mod metadata;
mod params;
mod selection;

pub use enums::{Preset, Stage};
pub use metadata::{Metadata, MetadataError, DISCOVERY_SEASONS, DISCOVERY_YEARS, PLAYLISTS};
pub use params::{
    parse_param_list, ParamError, VariantParams, BASELINE_SPEED, MAX_RAW_VALUE, NO_REVERB,
    REVERB_RANGE, SPEED_RANGE,
};
pub use selection::{AspectRatio, PublishLimit, SelectionError, StageSelection};
