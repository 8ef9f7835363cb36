//! Materialization of archive entries and the extraction loop.

pub mod engine;
pub mod materialize;
pub mod permissions;
pub mod timestamps;

pub use engine::ExtractionState;
pub use engine::Extractor;
pub use materialize::EntryMaterializer;
pub use materialize::EntryMeta;
pub use materialize::EntryOutcome;
pub use materialize::LinkStrategy;
pub use permissions::ModeStrategy;
pub use permissions::PermissionApplier;
pub use permissions::PermissionOutcome;
pub use timestamps::TimestampApplier;
