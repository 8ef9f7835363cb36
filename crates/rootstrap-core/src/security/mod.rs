//! Destination containment checks.
//!
//! Every name taken from an archive is untrusted. Before anything is created,
//! the [`SecurityGuard`] resolves the name against the destination root and
//! refuses it with a [`Violation`] if the result would lie outside.

pub mod guard;

pub use guard::SecurityGuard;
pub use guard::Violation;
