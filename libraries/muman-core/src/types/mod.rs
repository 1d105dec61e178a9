mod config;
mod duplicate;
mod ids;
mod metadata;
pub mod path_codec;
mod scan;
mod track;

pub use config::LibraryConfig;
pub use duplicate::{DuplicateGroup, GroupResolution, RemovalPlan, ResolutionPolicy};
pub use ids::ContentId;
pub use metadata::{AudioFormat, Field, TrackMetadata};
pub use scan::{ScanMarker, ScanReport, ScanStatus};
pub use track::{FileStat, PathEntry, TrackRecord};
