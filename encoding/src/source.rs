//! A bounds-checked byte source over a seekable reader.
//!
//! [`ByteSource`] keeps track of the reading position and the total
//! length of the underlying data, so that every read can be checked
//! against the bytes remaining before anything is consumed.
//! Multi-byte numbers are read in the byte order currently set,
//! which can be switched between the file meta group
//! and the main data set.

use byteordered::{ByteOrdered, Endianness};
use minidcm_core::Tag;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{self, Read, Seek, SeekFrom};

/// Error type for byte source operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bytes remain in the stream than the amount requested.
    #[snafu(display(
        "Stream truncated at position {}: requested {} bytes, {} available",
        position,
        requested,
        available
    ))]
    TruncatedStream {
        position: u64,
        requested: u64,
        available: u64,
        backtrace: Backtrace,
    },
    /// The requested position lies outside of the stream.
    #[snafu(display("Offset {} is out of range (stream length is {})", offset, len))]
    OutOfRange {
        offset: u64,
        len: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not read from source"))]
    ReadSource {
        source: io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not reposition source"))]
    SeekSource {
        source: io::Error,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A seekable source of bytes with a known length and a byte order mode.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    position: u64,
    len: u64,
    endianness: Endianness,
}

impl<R> ByteSource<R>
where
    R: Read + Seek,
{
    /// Wrap the given reader,
    /// starting at its current position in little endian mode.
    pub fn new(mut inner: R) -> Result<Self> {
        let position = inner.stream_position().context(SeekSourceSnafu)?;
        let len = inner.seek(SeekFrom::End(0)).context(SeekSourceSnafu)?;
        inner
            .seek(SeekFrom::Start(position))
            .context(SeekSourceSnafu)?;
        Ok(ByteSource {
            inner,
            position,
            len,
            endianness: Endianness::Little,
        })
    }

    /// Read exactly `n` bytes into a new vector.
    ///
    /// Fails with [`Error::TruncatedStream`] without consuming anything
    /// if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.check_remaining(n as u64)?;
        let mut buf = vec![0; n];
        self.inner.read_exact(&mut buf).context(ReadSourceSnafu)?;
        self.position += n as u64;
        Ok(buf)
    }

    /// Fill the given buffer completely.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_remaining(buf.len() as u64)?;
        self.inner.read_exact(buf).context(ReadSourceSnafu)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Read an unsigned 16-bit integer in the current byte order.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.check_remaining(2)?;
        let v = ByteOrdered::runtime(&mut self.inner, self.endianness)
            .read_u16()
            .context(ReadSourceSnafu)?;
        self.position += 2;
        Ok(v)
    }

    /// Read an unsigned 32-bit integer in the current byte order.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.check_remaining(4)?;
        let v = ByteOrdered::runtime(&mut self.inner, self.endianness)
            .read_u32()
            .context(ReadSourceSnafu)?;
        self.position += 4;
        Ok(v)
    }

    /// Read the next attribute tag in the current byte order
    /// without advancing the position.
    pub fn peek_tag(&mut self) -> Result<Tag> {
        let start = self.position;
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        self.seek(start)?;
        Ok(Tag(group, element))
    }

    /// Move to the given absolute offset, which may be at most the stream length.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        ensure!(
            offset <= self.len,
            OutOfRangeSnafu {
                offset,
                len: self.len
            }
        );
        self.inner
            .seek(SeekFrom::Start(offset))
            .context(SeekSourceSnafu)?;
        self.position = offset;
        Ok(())
    }

    /// Advance by `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.check_remaining(n)?;
        self.seek(self.position + n)
    }

    fn check_remaining(&self, requested: u64) -> Result<()> {
        let available = self.remaining();
        ensure!(
            requested <= available,
            TruncatedStreamSnafu {
                position: self.position,
                requested,
                available,
            }
        );
        Ok(())
    }
}

impl<R> ByteSource<R> {
    /// The current absolute reading position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The total length of the stream in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream holds no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of bytes between the current position and the end.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    /// The byte order used for multi-byte reads.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order used for multi-byte reads.
    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Retrieve the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Reading through this implementation keeps the position in sync,
/// so that header decoders can work on the byte source directly.
impl<R> Read for ByteSource<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = buf.len().min(usize::try_from(self.remaining()).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        self.position += n as u64;
        Ok(n)
    }
}
