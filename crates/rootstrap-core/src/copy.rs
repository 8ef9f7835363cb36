//! Bounded-buffer copy used for entry content and hard-link fallbacks.
//!
//! File content is never buffered whole: every copy goes through one fixed
//! 64 KiB buffer that is reused for the whole extraction.

use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::path::Path;

/// Buffer size for I/O operations (64 KiB).
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Reusable heap buffer for bounded copies.
///
/// # Examples
///
/// ```
/// use rootstrap_core::copy::CopyBuffer;
/// use rootstrap_core::copy::copy_with_buffer;
///
/// let mut buffer = CopyBuffer::new();
/// let mut input: &[u8] = b"hello";
/// let mut output = Vec::new();
///
/// let copied = copy_with_buffer(&mut input, &mut output, &mut buffer)?;
/// assert_eq!(copied, 5);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Box<[u8]>,
}

impl CopyBuffer {
    /// Creates a new zeroed copy buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies everything from `reader` to `writer` through `buffer`.
///
/// Interrupted reads are retried. Returns the number of bytes copied.
///
/// # Errors
///
/// Returns the first read or write error. A byte count that would overflow
/// `u64` is reported as `InvalidData`.
#[inline]
pub fn copy_with_buffer<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer.buf[..bytes_read])?;

        total = total
            .checked_add(bytes_read as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "copy length overflow"))?;
    }

    Ok(total)
}

/// Streams `reader` into a newly created (or truncated) file at `path`.
///
/// The file handle is flushed and closed before this returns, so callers may
/// change its permissions afterwards.
pub fn write_file<R: Read + ?Sized>(
    reader: &mut R,
    path: &Path,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    write_into(reader, File::create(path)?, buffer)
}

/// Streams `reader` into an already opened `file`, then flushes and closes it.
pub fn write_into<R: Read + ?Sized>(
    reader: &mut R,
    file: File,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);
    let written = copy_with_buffer(reader, &mut writer, buffer)?;
    writer.flush()?;
    Ok(written)
}

/// Copies the content of the file at `src` into a new file at `dst`.
pub fn copy_file(src: &Path, dst: &Path, buffer: &mut CopyBuffer) -> io::Result<u64> {
    let mut input = File::open(src)?;
    write_file(&mut input, dst, buffer)
}
