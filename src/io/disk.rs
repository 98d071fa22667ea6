use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{BenchError, Result};

/// Disk operations used by the storage benchmark
pub trait DiskIO: Send + Sync {
    /// Create or truncate a file for sequential writing
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn TransferFile>>;

    /// Open an existing file for sequential reading
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn TransferFile>>;

    /// Remove a file
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Bytes available to unprivileged users on the volume holding `dir`,
    /// or `None` where the platform offers no way to ask
    fn available_space(&self, dir: &Path) -> io::Result<Option<u64>>;
}

/// Sequential file handle
pub trait TransferFile: Send {
    /// Write the whole buffer
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, returning 0 at end of file
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Flush buffered data and force it to the device
    fn sync_all(&mut self) -> io::Result<()>;

    /// Current file length
    fn file_size(&self) -> io::Result<u64>;
}

/// Buffered `std::fs::File` handle
///
/// No O_DIRECT: the page cache is part of what the write phase measures.
pub struct BufferedFile {
    file: File,
}

impl BufferedFile {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl TransferFile for BufferedFile {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn sync_all(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    fn file_size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Platform disk I/O backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDiskIO;

impl PlatformDiskIO {
    pub fn new() -> Self {
        Self
    }
}

impl DiskIO for PlatformDiskIO {
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn TransferFile>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(BufferedFile::new(file)))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn TransferFile>> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Box::new(BufferedFile::new(file)))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    #[cfg(unix)]
    #[allow(clippy::unnecessary_cast)]
    fn available_space(&self, dir: &Path) -> io::Result<Option<u64>> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(dir.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: statvfs only writes into the struct we own, and c_path is NUL terminated.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64)))
    }

    #[cfg(not(unix))]
    fn available_space(&self, _dir: &Path) -> io::Result<Option<u64>> {
        Ok(None)
    }
}

/// Guard for the file created on the target volume
///
/// Removal is explicit through `remove` so the outcome can be reported.
/// A guard dropped without removal (early return or panic) still deletes
/// the file and logs any failure.
pub struct TestFile<'a> {
    path: PathBuf,
    disk_io: &'a dyn DiskIO,
    writer: Option<Box<dyn TransferFile>>,
    written: bool,
    removed: bool,
}

impl<'a> TestFile<'a> {
    pub fn new(path: PathBuf, disk_io: &'a dyn DiskIO, writer: Box<dyn TransferFile>) -> Self {
        Self {
            path,
            disk_io,
            writer: Some(writer),
            written: false,
            removed: false,
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the write phase filled the file completely
    pub fn is_written(&self) -> bool {
        self.written
    }

    pub(crate) fn mark_written(&mut self) {
        self.written = true;
    }

    /// Hand out the write handle opened at creation; only once
    pub(crate) fn take_writer(&mut self) -> Option<Box<dyn TransferFile>> {
        self.writer.take()
    }

    pub(crate) fn disk_io(&self) -> &'a dyn DiskIO {
        self.disk_io
    }

    /// Delete the file, reporting failure
    pub fn remove(mut self) -> Result<()> {
        // Close any handle still open before unlinking
        self.writer = None;
        self.removed = true;
        debug!(path = %self.path.display(), "removing test file");
        self.disk_io
            .remove(&self.path)
            .map_err(|source| BenchError::CleanupFailed {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for TestFile<'_> {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.writer = None;
        if let Err(e) = self.disk_io.remove(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove test file");
        }
    }
}
