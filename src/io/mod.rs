//! I/O operations module
//!
//! File access for the storage benchmark behind the `DiskIO` seam, plus
//! transfer buffer allocation.

pub mod buffer;
pub mod disk;

pub use buffer::{allocate_chunk, random_chunk};
pub use disk::{BufferedFile, DiskIO, PlatformDiskIO, TestFile, TransferFile};
