//! I/O wrappers used by the archive reader.

pub mod probe;

pub use probe::ProbeReader;
pub use probe::StreamStats;
