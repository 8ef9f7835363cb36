//! Core value types shared by the extraction components.

pub mod dest_dir;
pub mod entry_type;

pub use dest_dir::DestinationRoot;
pub use entry_type::EntryKind;
