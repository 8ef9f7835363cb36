//! Streaming reader for xz-compressed tar archives.
//!
//! The reader is a single forward pass: source → xz decoder → tar parser.
//! Each [`ArchiveEntry`] borrows the reader, so the borrow checker enforces
//! that an entry's content is only read while it is the current entry.

use std::io::Read;
use std::io::{self};
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use xz2::read::XzDecoder;

use crate::ExtractionError;
use crate::Result;
use crate::io::ProbeReader;
use crate::io::StreamStats;
use crate::source::ArchiveSource;
use crate::types::EntryKind;

type Decoded<R> = ProbeReader<XzDecoder<ProbeReader<R>>>;

/// Reader producing archive entries from an xz-compressed tar stream.
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::formats::TarXzReader;
/// use rootstrap_core::source::FileSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut reader = TarXzReader::open(FileSource::new("rootfs.tar.xz"))?;
/// for entry in reader.entries()? {
///     let entry = entry?;
///     println!("{} ({:o})", entry.name().display(), entry.mode());
/// }
/// # Ok(())
/// # }
/// ```
pub struct TarXzReader<R: Read> {
    name: String,
    archive: tar::Archive<Decoded<R>>,
    stats: Rc<StreamStats>,
}

impl<R: Read> TarXzReader<R> {
    /// Opens `source` and sets up the decoder chain.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::SourceOpen` if the source cannot be opened.
    pub fn open<S>(source: S) -> Result<Self>
    where
        S: ArchiveSource<Reader = R>,
    {
        let name = source.name().to_string();
        let raw = source
            .open()
            .map_err(|source| ExtractionError::SourceOpen {
                name: name.clone(),
                source,
            })?;
        Ok(Self::from_reader(name, raw))
    }

    /// Wraps an already opened compressed stream.
    pub fn from_reader(name: impl Into<String>, raw: R) -> Self {
        let stats = StreamStats::shared();
        let compressed = ProbeReader::compressed(raw, Rc::clone(&stats));
        let decoder = XzDecoder::new_multi_decoder(compressed);
        let archive = tar::Archive::new(ProbeReader::decoded(decoder, Rc::clone(&stats)));

        Self {
            name: name.into(),
            archive,
            stats,
        }
    }

    /// Name of the underlying source.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte counters and decoder health for this stream.
    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Returns a shared handle on the stream counters.
    #[must_use]
    pub fn stats_handle(&self) -> Rc<StreamStats> {
        Rc::clone(&self.stats)
    }

    /// Starts iterating over the entries. Can only be called once.
    ///
    /// # Errors
    ///
    /// Returns `MalformedArchive` if iteration was already started.
    pub fn entries(&mut self) -> Result<Entries<'_, R>> {
        let inner = self
            .archive
            .entries()
            .map_err(|e| classify_stream_error(&self.stats, e))?;
        Ok(Entries {
            inner,
            stats: &self.stats,
            failed: false,
        })
    }
}

impl<R: Read> TarXzReader<R> {
    /// Consumes the rest of the stream after the last entry.
    ///
    /// The tar end-of-archive marker comes before the end of the xz stream,
    /// so the xz index and check are only verified once the decoder has been
    /// read to its end.
    ///
    /// # Errors
    ///
    /// Returns `Decompression` if the trailing xz data is corrupt.
    pub fn finish(self) -> Result<Rc<StreamStats>> {
        let mut decoded = self.archive.into_inner();
        io::copy(&mut decoded, &mut io::sink())
            .map_err(|e| classify_stream_error(&self.stats, e))?;
        Ok(self.stats)
    }
}

/// Maps an I/O error seen by the tar parser to the layer that caused it.
pub(crate) fn classify_stream_error(stats: &StreamStats, err: io::Error) -> ExtractionError {
    if stats.decoder_failed() {
        ExtractionError::Decompression(err)
    } else {
        ExtractionError::malformed(err.to_string())
    }
}

/// Lazy, forward-only iterator over archive entries.
///
/// Stops after the first error.
pub struct Entries<'a, R: Read + 'a> {
    inner: tar::Entries<'a, Decoded<R>>,
    stats: &'a StreamStats,
    failed: bool,
}

impl<'a, R: Read + 'a> Iterator for Entries<'a, R> {
    type Item = Result<ArchiveEntry<'a, R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = match self.inner.next()? {
            Ok(raw) => ArchiveEntry::parse(raw, self.stats),
            Err(e) => Err(classify_stream_error(self.stats, e)),
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// One entry of the archive: header metadata plus a content cursor.
pub struct ArchiveEntry<'a, R: Read + 'a> {
    name: PathBuf,
    kind: Option<EntryKind>,
    type_flag: u8,
    mode: u32,
    mtime: u64,
    size: u64,
    content: tar::Entry<'a, Decoded<R>>,
}

impl<'a, R: Read + 'a> ArchiveEntry<'a, R> {
    fn parse(raw: tar::Entry<'a, Decoded<R>>, stats: &StreamStats) -> Result<Self> {
        let header_err = |what: &str, e: io::Error| {
            if stats.decoder_failed() {
                ExtractionError::Decompression(e)
            } else {
                ExtractionError::malformed(format!("invalid {what} in header: {e}"))
            }
        };

        let name = raw.path().map_err(|e| header_err("path", e))?.into_owned();
        let header = raw.header();
        let entry_type = header.entry_type();
        let mode = header.mode().map_err(|e| header_err("mode", e))?;
        let mtime = header.mtime().map_err(|e| header_err("mtime", e))?;
        let link_name = raw
            .link_name()
            .map_err(|e| header_err("link name", e))?
            .map(std::borrow::Cow::into_owned);
        let size = raw.size();

        Ok(Self {
            kind: EntryKind::from_tar(entry_type, link_name.as_deref()),
            type_flag: entry_type.as_byte(),
            name,
            mode,
            mtime,
            size,
            content: raw,
        })
    }

    /// Archive-supplied relative path. Untrusted.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Entry kind, or `None` for tar types that are not materialized.
    #[must_use]
    pub fn kind(&self) -> Option<&EntryKind> {
        self.kind.as_ref()
    }

    /// Raw tar type flag.
    #[must_use]
    pub fn type_flag(&self) -> u8 {
        self.type_flag
    }

    /// Mode bits as stored in the header.
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Modification time in seconds since the epoch.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Declared content length.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl<'a, R: Read + 'a> Read for ArchiveEntry<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::ReaderSource;
    use crate::test_utils::TarXzBuilder;
    use crate::test_utils::compress_xz;
    use crate::test_utils::create_test_tar;

    fn read_all<R: Read>(reader: &mut TarXzReader<R>) -> Vec<(PathBuf, Option<EntryKind>, Vec<u8>)> {
        let mut out = Vec::new();
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((entry.name().to_path_buf(), entry.kind().cloned(), data));
        }
        out
    }

    #[test]
    fn test_reads_all_entry_kinds() {
        let data = TarXzBuilder::new()
            .add_directory("a/")
            .add_file("a/b.txt", b"hi")
            .add_symlink("link", "a/b.txt")
            .add_hardlink("hard", "a/b.txt")
            .build();
        let mut reader = TarXzReader::from_reader("test", data.as_slice());

        let entries = read_all(&mut reader);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].1, Some(EntryKind::Directory));
        assert_eq!(entries[1].1, Some(EntryKind::RegularFile));
        assert_eq!(entries[1].2, b"hi");
        assert_eq!(
            entries[2].1,
            Some(EntryKind::SymbolicLink {
                target: PathBuf::from("a/b.txt")
            })
        );
        assert_eq!(
            entries[3].1,
            Some(EntryKind::HardLink {
                target: PathBuf::from("a/b.txt")
            })
        );
    }

    #[test]
    fn test_header_metadata() {
        let data = TarXzBuilder::new()
            .add_file_with_meta("bin/tool", b"0123456789", 0o4755, 1_700_000_000)
            .build();
        let mut reader = TarXzReader::open(ReaderSource::new("mem", data.as_slice())).unwrap();
        assert_eq!(reader.name(), "mem");

        let mut entries = reader.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.name(), Path::new("bin/tool"));
        assert_eq!(entry.mode() & 0o7777, 0o4755);
        assert_eq!(entry.mtime(), 1_700_000_000);
        assert_eq!(entry.size(), 10);
        assert_eq!(entry.type_flag(), b'0');
    }

    #[test]
    fn test_unsupported_kind_has_no_entry_kind() {
        let data = TarXzBuilder::new().add_fifo("dev/pipe").build();
        let mut reader = TarXzReader::from_reader("fifo", data.as_slice());

        let entries = read_all(&mut reader);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, None);
    }

    #[test]
    fn test_truncated_xz_is_decompression_error() {
        let content: Vec<u8> = (0u32..16_384)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();
        let mut data = TarXzBuilder::new().add_file("f", &content).build();
        data.truncate(data.len() / 2);

        let mut reader = TarXzReader::from_reader("truncated", data.as_slice());
        let err = drain_until_error(&mut reader);
        assert!(matches!(err, ExtractionError::Decompression(_)), "{err:?}");
    }

    #[test]
    fn test_not_xz_is_decompression_error() {
        let mut reader = TarXzReader::from_reader("plain", &b"this is not xz at all"[..]);
        let err = drain_until_error(&mut reader);
        assert!(matches!(err, ExtractionError::Decompression(_)), "{err:?}");
    }

    #[test]
    fn test_garbage_tar_is_malformed() {
        let data = compress_xz(&[0x41u8; 1024]);
        let mut reader = TarXzReader::from_reader("garbage", data.as_slice());
        let err = drain_until_error(&mut reader);
        assert!(
            matches!(err, ExtractionError::MalformedArchive { .. }),
            "{err:?}"
        );
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let tar = create_test_tar(vec![("file.txt", b"content")]);
        let data = compress_xz(&tar[..300]);
        let mut reader = TarXzReader::from_reader("truncated", data.as_slice());
        let err = drain_until_error(&mut reader);
        assert!(
            matches!(err, ExtractionError::MalformedArchive { .. }),
            "{err:?}"
        );
    }

    #[test]
    fn test_stats_count_bytes() {
        let data = TarXzBuilder::new().add_file("f", &[1u8; 10_000]).build();
        let mut reader = TarXzReader::from_reader("stats", data.as_slice());
        let _ = read_all(&mut reader);

        assert_eq!(reader.stats().compressed_bytes(), data.len() as u64);
        assert!(reader.stats().decompressed_bytes() >= 10_000);
        assert!(!reader.stats().decoder_failed());
    }

    #[test]
    fn test_finish_reads_stream_to_end() {
        let data = TarXzBuilder::new().add_file("f", b"abc").build();
        let mut reader = TarXzReader::from_reader("finish", data.as_slice());
        let _ = read_all(&mut reader);

        let stats = reader.finish().unwrap();
        assert_eq!(stats.compressed_bytes(), data.len() as u64);
    }

    #[test]
    fn test_finish_detects_corrupt_trailer() {
        let mut data = TarXzBuilder::new().add_file("f", b"abc").build();
        let len = data.len();
        data[len - 9] ^= 0xFF;

        let mut reader = TarXzReader::from_reader("trailer", data.as_slice());
        let result = reader.entries().and_then(|entries| {
            for entry in entries {
                let mut entry = entry?;
                io::copy(&mut entry, &mut io::sink()).map_err(|e| ExtractionError::io(Path::new("f"), e))?;
            }
            Ok(())
        });
        let result = result.and_then(|()| reader.finish().map(|_| ()));
        assert!(result.is_err());
    }

    fn drain_until_error<R: Read>(reader: &mut TarXzReader<R>) -> ExtractionError {
        let mut entries = reader.entries().expect("entries");
        loop {
            match entries.next() {
                Some(Ok(mut entry)) => {
                    let mut sink = Vec::new();
                    if let Err(e) = entry.read_to_end(&mut sink) {
                        return classify_stream_error(entries.stats, e);
                    }
                }
                Some(Err(e)) => return e,
                None => panic!("expected an error"),
            }
        }
    }
}
