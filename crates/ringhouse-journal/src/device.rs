//! Block Device Adapters
//!
//! The journal talks to storage through the `BlockDevice` trait: an async
//! random-access byte interface where every offset and buffer length is a
//! multiple of the device block size. Two adapters are provided:
//!
//! - `FileBlockDevice`: a file-backed device using tokio file I/O. The file
//!   is extended to a fixed capacity on open, so a fresh region reads back
//!   zeroes the way a real block device would. Writes are synced to stable
//!   storage before returning, which is what lets the journal treat a
//!   completed write as durable.
//! - `MemoryBlockDevice`: an in-memory device for tests. Contents survive
//!   close/open cycles within the same instance, and read/write operations
//!   are counted so tests can assert exactly how many physical I/Os an
//!   operation issued.
//!
//! Unaligned or out-of-bounds access is rejected with `InvalidInput` rather
//! than silently truncated.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;

/// Async block-addressable storage
#[async_trait]
pub trait BlockDevice: Send + Sync {
    /// Open the device for read/write access
    async fn open(&self) -> Result<()>;

    /// Flush and release the device
    async fn close(&self) -> Result<()>;

    /// Device block size in bytes (power of two, at least 512)
    fn block_size(&self) -> u32;

    /// Read `buf.len()` bytes at `offset`; both must be block-aligned
    async fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`; both must be block-aligned. The data is
    /// durable once this returns.
    async fn write(&self, offset: u64, buf: &[u8]) -> Result<()>;
}

fn check_access(block_size: u32, capacity: u64, offset: u64, len: usize) -> io::Result<()> {
    let bs = block_size as u64;
    if offset % bs != 0 || len as u64 % bs != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unaligned device access: offset {offset}, len {len}, block size {bs}"),
        ));
    }
    if offset + len as u64 > capacity {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("access beyond device capacity: offset {offset}, len {len}, capacity {capacity}"),
        ));
    }
    Ok(())
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "block device is not open")
}

/// File-backed block device
pub struct FileBlockDevice {
    path: PathBuf,
    capacity: u64,
    block_size: u32,
    file: Mutex<Option<File>>,
}

impl FileBlockDevice {
    pub fn new(path: impl Into<PathBuf>, capacity: u64, block_size: u32) -> Self {
        debug_assert!(block_size >= 512 && block_size.is_power_of_two());
        debug_assert_eq!(capacity % block_size as u64, 0);
        Self {
            path: path.into(),
            capacity,
            block_size,
            file: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[async_trait]
impl BlockDevice for FileBlockDevice {
    async fn open(&self) -> Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .await?;
        // emulate a fixed-size device: unwritten blocks read back as zeroes
        if file.metadata().await?.len() < self.capacity {
            file.set_len(self.capacity).await?;
        }
        info!(
            path = ?self.path,
            capacity = self.capacity,
            block_size = self.block_size,
            "block device opened"
        );
        *guard = Some(file);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.file.lock().await;
        if let Some(file) = guard.take() {
            file.sync_all().await?;
            debug!(path = ?self.path, "block device closed");
        }
        Ok(())
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    async fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_access(self.block_size, self.capacity, offset, buf.len())?;
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(not_open)?;
        file.seek(io::SeekFrom::Start(offset)).await?;
        file.read_exact(buf).await?;
        Ok(())
    }

    async fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        check_access(self.block_size, self.capacity, offset, buf.len())?;
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(not_open)?;
        file.seek(io::SeekFrom::Start(offset)).await?;
        file.write_all(buf).await?;
        file.sync_data().await?;
        Ok(())
    }
}

/// In-memory block device for tests; contents persist across close/open
pub struct MemoryBlockDevice {
    block_size: u32,
    buf: Mutex<Vec<u8>>,
    opened: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryBlockDevice {
    pub fn new(capacity: u64, block_size: u32) -> Self {
        debug_assert!(block_size >= 512 && block_size.is_power_of_two());
        debug_assert_eq!(capacity % block_size as u64, 0);
        Self {
            block_size,
            buf: Mutex::new(vec![0u8; capacity as usize]),
            opened: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of read operations issued so far
    pub fn read_ops(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of write operations issued so far
    pub fn write_ops(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BlockDevice for MemoryBlockDevice {
    async fn open(&self) -> Result<()> {
        self.opened.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.opened.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    async fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if !self.opened.load(Ordering::Relaxed) {
            return Err(not_open().into());
        }
        let store = self.buf.lock().await;
        check_access(self.block_size, store.len() as u64, offset, buf.len())?;
        buf.copy_from_slice(&store[offset as usize..offset as usize + buf.len()]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        if !self.opened.load(Ordering::Relaxed) {
            return Err(not_open().into());
        }
        let mut store = self.buf.lock().await;
        check_access(self.block_size, store.len() as u64, offset, buf.len())?;
        store[offset as usize..offset as usize + buf.len()].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
