//! Reader probes for telling decoder failures apart from tar failures.
//!
//! The tar parser sees only an `io::Error` when its input fails, with no way
//! of knowing whether the xz decoder or the tar framing is to blame. A probe
//! on each side of the decoder records which layer failed and how many bytes
//! went through it.

use std::cell::Cell;
use std::io::Read;
use std::io::{self};
use std::rc::Rc;

/// Counters shared by the probes of one extraction.
#[derive(Debug, Default)]
pub struct StreamStats {
    compressed: Cell<u64>,
    decompressed: Cell<u64>,
    decoder_error: Cell<bool>,
}

impl StreamStats {
    /// Creates a fresh, shareable set of counters.
    #[must_use]
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Compressed bytes read from the source so far.
    #[must_use]
    pub fn compressed_bytes(&self) -> u64 {
        self.compressed.get()
    }

    /// Decompressed bytes handed to the tar parser so far.
    #[must_use]
    pub fn decompressed_bytes(&self) -> u64 {
        self.decompressed.get()
    }

    /// Returns `true` once the decoder has returned an error.
    #[must_use]
    pub fn decoder_failed(&self) -> bool {
        self.decoder_error.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Compressed,
    Decoded,
}

/// A reader wrapper that feeds a [`StreamStats`].
///
/// # Examples
///
/// ```
/// use rootstrap_core::io::ProbeReader;
/// use rootstrap_core::io::StreamStats;
/// use std::io::Read;
///
/// let stats = StreamStats::shared();
/// let mut reader = ProbeReader::compressed(&b"abc"[..], stats.clone());
/// let mut out = Vec::new();
/// reader.read_to_end(&mut out)?;
/// assert_eq!(stats.compressed_bytes(), 3);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct ProbeReader<R> {
    inner: R,
    stats: Rc<StreamStats>,
    stage: Stage,
}

impl<R> ProbeReader<R> {
    /// Wraps the raw compressed source.
    pub fn compressed(inner: R, stats: Rc<StreamStats>) -> Self {
        Self {
            inner,
            stats,
            stage: Stage::Compressed,
        }
    }

    /// Wraps the decoder output; errors from `inner` mark the decoder failed.
    pub fn decoded(inner: R, stats: Rc<StreamStats>) -> Self {
        Self {
            inner,
            stats,
            stage: Stage::Decoded,
        }
    }
}

impl<R: Read> Read for ProbeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                let counter = match self.stage {
                    Stage::Compressed => &self.stats.compressed,
                    Stage::Decoded => &self.stats.decompressed,
                };
                counter.set(counter.get().saturating_add(n as u64));
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                if self.stage == Stage::Decoded {
                    self.stats.decoder_error.set(true);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt"))
        }
    }

    #[test]
    fn test_counts_decoded_bytes() {
        let stats = StreamStats::shared();
        let mut reader = ProbeReader::decoded(&b"hello world"[..], stats.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(stats.decompressed_bytes(), 11);
        assert_eq!(stats.compressed_bytes(), 0);
        assert!(!stats.decoder_failed());
    }

    #[test]
    fn test_decoder_error_is_recorded() {
        let stats = StreamStats::shared();
        let mut reader = ProbeReader::decoded(Broken, stats.clone());
        let mut buf = [0u8; 8];

        assert!(reader.read(&mut buf).is_err());
        assert!(stats.decoder_failed());
    }

    #[test]
    fn test_source_error_is_not_a_decoder_error() {
        let stats = StreamStats::shared();
        let mut reader = ProbeReader::compressed(Broken, stats.clone());
        let mut buf = [0u8; 8];

        assert!(reader.read(&mut buf).is_err());
        assert!(!stats.decoder_failed());
    }
}
