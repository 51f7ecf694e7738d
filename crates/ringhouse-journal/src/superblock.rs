//! Superblock Manager
//!
//! The superblock is the single-block persistent descriptor at the head of
//! the journal region. It records the region geometry fixed at format time
//! and a snapshot of the four cursors, and is rewritten in place by
//! `sync_super`.
//!
//! Reading degrades to "absent" rather than failing: an unformatted region
//! decodes to `None`, which is how `mkfs` knows to initialize and how
//! `open_for_write` knows to refuse.

use tracing::debug;
use uuid::Uuid;

use crate::codec;
use crate::device::BlockDevice;
use crate::error::Result;

/// Persistent descriptor of a journal region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Constant identifying a formatted region
    pub magic: u64,

    /// Journal identity, assigned at format time
    pub uuid: Uuid,

    /// Device block size at format time
    pub block_size: u32,

    /// Checksum algorithm tag
    pub csum_type: u32,

    /// Status bits
    pub flag: u32,
    pub error: u32,

    /// Usable ring capacity in bytes (region size minus the superblock)
    pub max_size: u64,

    /// Bytes currently considered live
    pub used_size: u64,

    /// First device offset where records may live
    pub start_offset: u64,

    /// Next free write position
    pub written_to: u64,

    /// Durably committed high-water mark
    pub committed_to: u64,

    /// Mark consumed by the downstream applier
    pub applied_to: u64,

    /// Sequence id the next record will be numbered after
    pub cur_segment_id: u64,

    /// Region bounds on the device
    pub start: u64,
    pub end: u64,

    /// Checksum over the header image (set by the codec)
    pub csum: u32,
}

impl Superblock {
    /// Build the descriptor for a freshly formatted region. Cursors start
    /// at the head of the ring; the zero watermarks mean "nothing committed
    /// or applied yet".
    pub fn format(uuid: Uuid, block_size: u32, start: u64, end: u64) -> Self {
        let start_offset = start + block_size as u64;
        Self {
            magic: codec::SUPER_MAGIC,
            uuid,
            block_size,
            csum_type: codec::CSUM_CRC32C,
            flag: 0,
            error: 0,
            max_size: end - start - block_size as u64,
            used_size: 0,
            start_offset,
            written_to: start_offset,
            committed_to: 0,
            applied_to: 0,
            cur_segment_id: 0,
            start,
            end,
            csum: 0,
        }
    }
}

/// Read and decode the superblock at the region start. `Ok(None)` means no
/// valid superblock is present.
pub async fn read_super(device: &dyn BlockDevice, start: u64) -> Result<Option<Superblock>> {
    let block_size = device.block_size() as usize;
    let mut buf = vec![0u8; block_size];
    device.read(start, &mut buf).await?;
    debug!(start, "read superblock block");
    Ok(codec::decode_super(&buf))
}

/// Encode and write the superblock in place as one full block
pub async fn write_super(device: &dyn BlockDevice, start: u64, header: &Superblock) -> Result<()> {
    let block_size = device.block_size() as usize;
    let image = codec::encode_super(header);
    let mut buf = vec![0u8; block_size];
    buf[..image.len()].copy_from_slice(&image);
    device.write(start, &buf).await?;
    debug!(start, written_to = header.written_to, "superblock written");
    Ok(())
}
