//! On-Disk Codec
//!
//! Deterministic encoding of the superblock and record frames, plus the
//! CRC32C (Castagnoli) validation used by the read path.
//!
//! ## Record Frame Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (28 bytes)                                        │
//! │ - mdlength (4 bytes)  metadata section size, block-mult. │
//! │ - dlength  (4 bytes)  data section size, block-multiple  │
//! │ - seq      (8 bytes)  sequence id at append time         │
//! │ - committed_to (8 bytes)  commit frontier at encode time │
//! │ - crc32c   (4 bytes)                                     │
//! ├──────────────────────────────────────────────────────────┤
//! │ Inline metadata, zero-padded to mdlength                 │
//! ├──────────────────────────────────────────────────────────┤
//! │ Data payload, zero-padded to dlength                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Both sections are padded up to a block boundary so a frame always
//! occupies whole device blocks. The `committed_to` watermark is embedded
//! so a reader can learn the commit frontier as of the moment the record
//! was written.
//!
//! ## Checksum Rule
//!
//! The CRC is seeded with `!0` over the 24-byte header prefix, skips the
//! stored crc field, then continues over everything after the header.
//! `validate_record` accepts a frame iff the recomputed value equals the
//! stored one.
//!
//! ## Superblock Layout
//!
//! A fixed 116-byte little-endian image (magic, uuid, geometry, cursors,
//! csum last), zero-padded to one device block when written. The image is
//! self-checksummed; a magic or checksum mismatch decodes to `None`, which
//! callers treat as "region not initialized".

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;
use uuid::Uuid;

use ringhouse_core::JournalRecord;

use crate::error::{Error, Result};
use crate::ring::align_up;
use crate::superblock::Superblock;

/// Magic identifying a formatted journal region: "RNGHOUSE"
pub const SUPER_MAGIC: u64 = u64::from_le_bytes(*b"RNGHOUSE");

/// Checksum algorithm tag stored in the superblock
pub const CSUM_CRC32C: u32 = 1;

/// Encoded superblock image size (padded to one block on device)
pub const SUPER_ENCODED_SIZE: usize = 116;

/// Encoded record header size
pub const RECORD_HEADER_SIZE: usize = 28;

/// Byte offset of the crc field within the record header
const RECORD_CRC_OFFSET: usize = 24;

/// Block-aligned section sizes a record will occupy on device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSize {
    /// Header plus inline metadata, padded to a block multiple
    pub mdlength: u32,
    /// Data payload, padded to a block multiple
    pub dlength: u32,
}

impl RecordSize {
    pub fn total(&self) -> u64 {
        self.mdlength as u64 + self.dlength as u64
    }
}

/// Decoded per-record frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub mdlength: u32,
    pub dlength: u32,
    /// Sequence id assigned at append time
    pub seq: u64,
    /// Commit frontier at the time this record was encoded
    pub committed_to: u64,
    pub crc: u32,
}

impl RecordHeader {
    pub fn total_len(&self) -> u64 {
        self.mdlength as u64 + self.dlength as u64
    }
}

/// Compute the block-aligned sizes a record will encode to
pub fn encoded_record_length(record: &JournalRecord, block_size: u32) -> Result<RecordSize> {
    let bs = block_size as u64;
    let mdlength = align_up(RECORD_HEADER_SIZE as u64 + record.metadata.len() as u64, bs);
    let dlength = align_up(record.data.len() as u64, bs);
    if mdlength > u32::MAX as u64 || dlength > u32::MAX as u64 {
        return Err(Error::Encode(format!(
            "record sections too large to frame: mdlength {}, dlength {}",
            mdlength, dlength
        )));
    }
    Ok(RecordSize {
        mdlength: mdlength as u32,
        dlength: dlength as u32,
    })
}

/// Encode a record into its on-device frame, embedding the current commit
/// frontier and the sequence id assigned to this append
pub fn encode_record(
    record: &JournalRecord,
    block_size: u32,
    committed_to: u64,
    seq: u64,
) -> Result<Bytes> {
    let rsize = encoded_record_length(record, block_size)?;
    let total = rsize.total() as usize;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u32_le(rsize.mdlength);
    buf.put_u32_le(rsize.dlength);
    buf.put_u64_le(seq);
    buf.put_u64_le(committed_to);
    buf.put_u32_le(0); // crc, patched once the frame is complete
    buf.put_slice(&record.metadata);
    buf.resize(rsize.mdlength as usize, 0);
    buf.put_slice(&record.data);
    buf.resize(total, 0);

    let crc = frame_crc(&buf);
    buf[RECORD_CRC_OFFSET..RECORD_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
    Ok(buf.freeze())
}

/// CRC over the header prefix (seeded with !0), skipping the stored crc
/// field, continued over the remainder of the frame
fn frame_crc(frame: &[u8]) -> u32 {
    let crc = crc32c::crc32c_append(!0u32, &frame[..RECORD_CRC_OFFSET]);
    crc32c::crc32c_append(crc, &frame[RECORD_HEADER_SIZE..])
}

/// Verify a complete record frame against its stored checksum
pub fn validate_record(frame: &[u8]) -> bool {
    if frame.len() < RECORD_HEADER_SIZE {
        return false;
    }
    let stored = u32::from_le_bytes([
        frame[RECORD_CRC_OFFSET],
        frame[RECORD_CRC_OFFSET + 1],
        frame[RECORD_CRC_OFFSET + 2],
        frame[RECORD_CRC_OFFSET + 3],
    ]);
    frame_crc(frame) == stored
}

/// Decode a record header from the front of a buffer. Returns `None` when
/// the buffer cannot hold a header; field sanity is the caller's concern.
pub fn decode_record_header(buf: &[u8]) -> Option<RecordHeader> {
    if buf.len() < RECORD_HEADER_SIZE {
        return None;
    }
    let mut b = &buf[..RECORD_HEADER_SIZE];
    Some(RecordHeader {
        mdlength: b.get_u32_le(),
        dlength: b.get_u32_le(),
        seq: b.get_u64_le(),
        committed_to: b.get_u64_le(),
        crc: b.get_u32_le(),
    })
}

/// Encode the superblock into its self-checksummed on-device image
pub fn encode_super(header: &Superblock) -> BytesMut {
    let mut buf = BytesMut::with_capacity(SUPER_ENCODED_SIZE);
    buf.put_u64_le(header.magic);
    buf.put_slice(header.uuid.as_bytes());
    buf.put_u32_le(header.block_size);
    buf.put_u32_le(header.csum_type);
    buf.put_u32_le(header.flag);
    buf.put_u32_le(header.error);
    buf.put_u64_le(header.max_size);
    buf.put_u64_le(header.used_size);
    buf.put_u64_le(header.start_offset);
    buf.put_u64_le(header.written_to);
    buf.put_u64_le(header.committed_to);
    buf.put_u64_le(header.applied_to);
    buf.put_u64_le(header.cur_segment_id);
    buf.put_u64_le(header.start);
    buf.put_u64_le(header.end);
    let csum = crc32c::crc32c_append(!0u32, &buf);
    buf.put_u32_le(csum);
    buf
}

/// Decode a superblock image. Returns `None` on magic mismatch, a short
/// buffer, or a checksum mismatch: all read as "no journal here".
pub fn decode_super(buf: &[u8]) -> Option<Superblock> {
    if buf.len() < SUPER_ENCODED_SIZE {
        return None;
    }
    let mut b = &buf[..SUPER_ENCODED_SIZE];
    let magic = b.get_u64_le();
    if magic != SUPER_MAGIC {
        return None;
    }
    let mut uuid_bytes = [0u8; 16];
    b.copy_to_slice(&mut uuid_bytes);
    let header = Superblock {
        magic,
        uuid: Uuid::from_bytes(uuid_bytes),
        block_size: b.get_u32_le(),
        csum_type: b.get_u32_le(),
        flag: b.get_u32_le(),
        error: b.get_u32_le(),
        max_size: b.get_u64_le(),
        used_size: b.get_u64_le(),
        start_offset: b.get_u64_le(),
        written_to: b.get_u64_le(),
        committed_to: b.get_u64_le(),
        applied_to: b.get_u64_le(),
        cur_segment_id: b.get_u64_le(),
        start: b.get_u64_le(),
        end: b.get_u64_le(),
        csum: b.get_u32_le(),
    };
    let expected = crc32c::crc32c_append(!0u32, &buf[..SUPER_ENCODED_SIZE - 4]);
    if header.csum != expected {
        warn!(
            stored = header.csum,
            computed = expected,
            "superblock checksum mismatch, treating region as uninitialized"
        );
        return None;
    }
    Some(header)
}
