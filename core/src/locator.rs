// Byte-range access to an already-unwrapped filesystem region.
// Disk-image containers, encryption and partition slicing all happen
// upstream; consumers of this trait only ever see the filesystem bytes.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::CarbonError;

/// Positioned read access to a raw byte region.
///
/// Implementations must be safe to share across threads: seek position is
/// shared mutable state, so seek-based backends have to treat each
/// seek+read pair as one transaction.
pub trait DataLocator: Send + Sync {
    /// Fill `buf` with the bytes at `offset`. Short regions are an error,
    /// never a partial read.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CarbonError>;

    /// Total length of the region in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convenience wrapper allocating the target buffer.
    fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>, CarbonError> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl<T: DataLocator + ?Sized> DataLocator for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CarbonError> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

/// A locator over an image file or raw device node.
pub struct FileDataLocator {
    // The lock makes each seek+read pair atomic with respect to other
    // threads sharing this locator.
    file: Mutex<File>,
    len: u64,
}

impl FileDataLocator {
    pub fn new(file: File) -> Result<Self, CarbonError> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CarbonError> {
        Self::new(File::open(path)?)
    }
}

impl DataLocator for FileDataLocator {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CarbonError> {
        let mut file = self.file.lock().map_err(|_| {
            CarbonError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "poisoned file lock",
            ))
        })?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// An in-memory locator, mainly for tests and small synthetic images.
pub struct BufferDataLocator {
    data: Vec<u8>,
}

impl BufferDataLocator {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl DataLocator for BufferDataLocator {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CarbonError> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                CarbonError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at {} past end of {}-byte region",
                        buf.len(),
                        offset,
                        self.data.len()
                    ),
                ))
            })?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
