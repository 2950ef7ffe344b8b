//! Positioned I/O with retry-on-interrupt and short-read/short-write
//! detection (spec: Device I/O, §4.3 and §9's duplicate-descriptor note).
//!
//! Every operation here takes an explicit absolute offset; no implicit
//! seek state is assumed to survive between calls, so concurrent callers
//! (§5) never race on a shared file cursor.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use io_at::{ReadAt, WriteAt};

use crate::error::{Fat32Error, Result};

/// The backing-store contract the rest of the engine is built against.
///
/// `Filesystem` and `Fat` hold an `S: Store`, not a concrete `Device`, so
/// tests can substitute an in-memory image (see [`MemStore`]) without any
/// conditional compilation inside the engine itself.
pub trait Store: Send + Sync + Sized {
    /// Reads exactly `buf.len()` bytes at `offset`. A short read is
    /// reported as [`Fat32Error::InvalidDevice`], never returned as a
    /// partial buffer.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes exactly `buf.len()` bytes at `offset`.
    fn write_exact_at(&self, buf: &[u8], offset: u64) -> Result<()>;

    /// An independent handle to the same backing store (§9: FAT holds a
    /// duplicate descriptor so its reads don't contend on the main
    /// descriptor's cursor -- moot for `Store` since offsets are explicit,
    /// but kept so the isolation property is visible at the type level).
    fn try_clone(&self) -> Result<Self>;

    /// Total addressable size of the store in bytes, used to reject
    /// undersized images at mount (spec §8 scenario 1).
    fn len(&self) -> Result<u64>;
}

/// A backing store for the filesystem: a block-special file opened RDWR.
#[derive(Debug)]
pub struct Device {
    file: File,
}

impl Device {
    /// Opens `path` read-write, retrying the open on `EINTR`.
    pub fn open_rdwr<P: AsRef<Path>>(path: P) -> Result<Self> {
        loop {
            match OpenOptions::new().read(true).write(true).open(path.as_ref()) {
                Ok(file) => return Ok(Device { file }),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Fat32Error::Errno(e)),
            }
        }
    }

    pub fn metadata(&self) -> Result<std::fs::Metadata> {
        Ok(self.file.metadata()?)
    }
}

impl Store for Device {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => return Err(Fat32Error::InvalidDevice),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Fat32Error::Errno(e)),
            }
        }
        Ok(())
    }

    fn write_exact_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        let mut written = 0usize;
        while written < buf.len() {
            match self.file.write_at(&buf[written..], offset + written as u64) {
                Ok(0) => return Err(Fat32Error::InvalidDevice),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Fat32Error::Errno(e)),
            }
        }
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(Device {
            file: self.file.try_clone()?,
        })
    }

    fn len(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Bridges our retrying, single-offset-per-call device to the `io-at`
/// traits the wider ecosystem builds generic I/O against.
impl ReadAt for Device {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        self.file.read_at(buf, pos)
    }
}

impl WriteAt for Device {
    fn write_at(&mut self, buf: &[u8], pos: u64) -> io::Result<usize> {
        self.file.write_at(buf, pos)
    }
}

/// An in-memory [`Store`] used by tests to build synthetic FAT32 images
/// without touching a real block-special file.
#[derive(Debug, Clone)]
pub struct MemStore {
    data: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

impl MemStore {
    pub fn new(data: Vec<u8>) -> Self {
        MemStore {
            data: std::sync::Arc::new(std::sync::Mutex::new(data)),
        }
    }
}

impl Store for MemStore {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let data = self.data.lock().unwrap();
        let offset = offset as usize;
        if offset.checked_add(buf.len()).map_or(true, |end| end > data.len()) {
            return Err(Fat32Error::InvalidDevice);
        }
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_exact_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let offset = offset as usize;
        if offset.checked_add(buf.len()).map_or(true, |end| end > data.len()) {
            return Err(Fat32Error::InvalidDevice);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(MemStore {
            data: self.data.clone(),
        })
    }

    fn len(&self) -> Result<u64> {
        Ok(self.data.lock().unwrap().len() as u64)
    }
}
