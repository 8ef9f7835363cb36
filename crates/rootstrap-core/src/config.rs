//! Extraction configuration.

use crate::extraction::LinkStrategy;
use crate::extraction::ModeStrategy;

/// Configuration for a tar.xz extraction.
///
/// The defaults reproduce the archive as faithfully as the host allows:
/// permissions and modification times are applied, hard links fall back to
/// byte copies, and permission bits fall back to owner-only flags.
///
/// # Examples
///
/// ```
/// use rootstrap_core::ExtractionConfig;
/// use rootstrap_core::extraction::LinkStrategy;
///
/// // Never share inodes, always copy hard-linked content
/// let config = ExtractionConfig::default().with_link_strategies(vec![LinkStrategy::Copy]);
/// assert!(config.preserve_permissions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Apply the mode bits stored in the archive.
    pub preserve_permissions: bool,

    /// Apply the modification times stored in the archive.
    pub preserve_mtime: bool,

    /// Permission strategies, tried in order until one succeeds.
    pub mode_strategies: Vec<ModeStrategy>,

    /// Hard-link strategies, tried in order until one succeeds.
    pub link_strategies: Vec<LinkStrategy>,

    /// Bits of the header mode that are applied (file-type bits are never
    /// applied).
    pub mode_mask: u32,
}

impl Default for ExtractionConfig {
    /// Default values:
    /// - `preserve_permissions`: true
    /// - `preserve_mtime`: true
    /// - `mode_strategies`: `[Native, OwnerOnly]`
    /// - `link_strategies`: `[HardLink, Copy]`
    /// - `mode_mask`: `0o7777`
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_mtime: true,
            mode_strategies: vec![ModeStrategy::Native, ModeStrategy::OwnerOnly],
            link_strategies: vec![LinkStrategy::HardLink, LinkStrategy::Copy],
            mode_mask: 0o7777,
        }
    }
}

impl ExtractionConfig {
    /// Sets whether archive permissions are applied.
    #[must_use]
    pub fn with_preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// Sets whether archive modification times are applied.
    #[must_use]
    pub fn with_preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Replaces the permission fallback chain.
    #[must_use]
    pub fn with_mode_strategies(mut self, strategies: Vec<ModeStrategy>) -> Self {
        self.mode_strategies = strategies;
        self
    }

    /// Replaces the hard-link fallback chain.
    #[must_use]
    pub fn with_link_strategies(mut self, strategies: Vec<LinkStrategy>) -> Self {
        self.link_strategies = strategies;
        self
    }

    /// Sets the mask applied to header modes.
    #[must_use]
    pub fn with_mode_mask(mut self, mask: u32) -> Self {
        self.mode_mask = mask & 0o7777;
        self
    }
}
