//! Sources of bulk data which were left out of the in-memory object.
//!
//! When a file is read with deferred pixel data,
//! its element only holds a [`ByteRange`] into the original file.
//! A [`BulkDataSource`] brings those bytes back on request.

use minidcm_core::value::ByteRange;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A provider of byte ranges of the file an object was read from.
pub trait BulkDataSource: Send + Sync {
    /// Read exactly the bytes covered by the given range.
    fn read_range(&self, range: ByteRange) -> io::Result<Vec<u8>>;
}

/// Bulk data re-read from a file on disk.
///
/// Each request opens its own handle,
/// so that concurrent requests do not share a file cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBulkData {
    path: PathBuf,
}

impl FileBulkData {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBulkData { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BulkDataSource for FileBulkData {
    fn read_range(&self, range: ByteRange) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(range.offset))?;
        let mut buf = vec![0; range.len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl BulkDataSource for [u8] {
    fn read_range(&self, range: ByteRange) -> io::Result<Vec<u8>> {
        usize::try_from(range.offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(range.len as usize)?))
            .and_then(|r| self.get(r))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("range {:?} is out of bounds", range),
                )
            })
    }
}

impl BulkDataSource for Vec<u8> {
    fn read_range(&self, range: ByteRange) -> io::Result<Vec<u8>> {
        self.as_slice().read_range(range)
    }
}
