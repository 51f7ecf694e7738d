//! Journal Engine
//!
//! `CircularJournal` owns the in-memory cursors over one journal region and
//! orchestrates the codec, ring geometry, superblock manager and write
//! pipeline.
//!
//! ## Cursors
//!
//! Four offsets describe the ring state:
//!
//! - `written_to`: next free write position
//! - `committed_to`: address of the most recently committed record
//! - `applied_to`: watermark consumed by the downstream applier
//! - `start_offset`: first byte where records may live (fixed at format)
//!
//! `written_to` and `used_size` move at reservation time; `committed_to`
//! and `cur_segment_id` move only inside the pipeline's finalize phase, so
//! observers see commits in device-submission order. The cursors live in
//! two mutex-guarded groups with a fixed acquisition order (reserve, then
//! device_submission, then finalize, then commit) so concurrent submitters
//! cannot deadlock.
//!
//! ## Write Path
//!
//! ```text
//! submit_record
//!   ├─ validate      entry cap and free-space checks
//!   ├─ reserve       wrap if the header would cross the ring end,
//!   │                then claim [target, target + total)
//!   ├─ encode        frame with the commit frontier and sequence id
//!   ├─ device phase  one write, or two when the frame spans the end
//!   └─ finalize      committed_to := target, sequence id += 1
//! ```
//!
//! ## Read Path
//!
//! `read_record` recovers framing from a single block read, then issues up
//! to two more reads when the frame continues past the first block or
//! around the wrap. Checksum or framing failures read as "no record here"
//! rather than errors, so recovery can walk the ring and stop at the first
//! torn tail.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ringhouse_core::{BlockAddr, JournalRecord, LogicalPosition};

use crate::codec::{self, RecordHeader};
use crate::config::JournalConfig;
use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::pipeline::{OrderingHandle, WritePipeline};
use crate::ring::RingGeometry;
use crate::superblock::{self, Superblock};

/// Cursors advanced at reservation time
#[derive(Debug)]
struct ReserveCursors {
    written_to: u64,
    used_size: u64,
}

/// Cursors advanced inside the finalize phase
#[derive(Debug)]
struct CommitCursors {
    committed_to: u64,
    applied_to: u64,
    cur_segment_id: u64,
}

/// A circular bounded journal over one region of a block device
pub struct CircularJournal {
    device: Arc<dyn BlockDevice>,
    config: JournalConfig,
    /// Format-time descriptor; cursor fields are snapshotted fresh on sync
    header: Superblock,
    ring: RingGeometry,
    reserve: Mutex<ReserveCursors>,
    commit: Mutex<CommitCursors>,
    pipeline: WritePipeline,
}

impl fmt::Debug for CircularJournal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularJournal")
            .field("config", &self.config)
            .field("header", &self.header)
            .field("ring", &self.ring)
            .finish_non_exhaustive()
    }
}

impl CircularJournal {
    /// Format the region iff no valid superblock is present. Idempotent: an
    /// already-formatted region is left untouched, all fields included. The
    /// device is opened for the duration and closed regardless of outcome.
    pub async fn mkfs(device: Arc<dyn BlockDevice>, config: &JournalConfig) -> Result<()> {
        let block_size = device.block_size() as u64;
        if config.start % block_size != 0
            || config.end % block_size != 0
            || config.end < config.start + 2 * block_size
        {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "invalid journal region [{}, {}) for block size {}",
                    config.start, config.end, block_size
                ),
            )));
        }

        device.open().await?;
        let outcome = Self::mkfs_inner(device.as_ref(), config).await;
        let closed = device.close().await;
        outcome.and(closed)
    }

    async fn mkfs_inner(device: &dyn BlockDevice, config: &JournalConfig) -> Result<()> {
        if let Some(header) = superblock::read_super(device, config.start).await? {
            debug!(uuid = %header.uuid, "journal region already formatted");
            return Ok(());
        }
        let header = Superblock::format(
            Uuid::new_v4(),
            device.block_size(),
            config.start,
            config.end,
        );
        info!(
            uuid = %header.uuid,
            start = config.start,
            end = config.end,
            block_size = header.block_size,
            max_size = header.max_size,
            "formatting journal region"
        );
        superblock::write_super(device, config.start, &header).await
    }

    /// Open a formatted region for writing. Hydrates the cursors from the
    /// superblock and returns the current tail position.
    pub async fn open_for_write(
        device: Arc<dyn BlockDevice>,
        config: JournalConfig,
    ) -> Result<(Self, LogicalPosition)> {
        device.open().await?;
        let header = match superblock::read_super(device.as_ref(), config.start).await {
            Ok(Some(header)) => header,
            Ok(None) => {
                device.close().await?;
                return Err(Error::NotInitialized);
            }
            Err(err) => {
                let _ = device.close().await;
                return Err(err);
            }
        };

        let block_size = header.block_size as u64;
        let ring = RingGeometry::new(header.start_offset, header.max_size, block_size);
        let position = LogicalPosition::new(
            header.cur_segment_id,
            BlockAddr::new(header.written_to / block_size, header.written_to),
        );
        info!(
            uuid = %header.uuid,
            written_to = header.written_to,
            committed_to = header.committed_to,
            segment_id = header.cur_segment_id,
            "journal opened for write"
        );

        let journal = Self {
            device,
            config,
            ring,
            reserve: Mutex::new(ReserveCursors {
                written_to: header.written_to,
                used_size: header.used_size,
            }),
            commit: Mutex::new(CommitCursors {
                committed_to: header.committed_to,
                applied_to: header.applied_to,
                cur_segment_id: header.cur_segment_id,
            }),
            header,
            pipeline: WritePipeline::new(),
        };
        Ok((journal, position))
    }

    /// The pipeline submissions must pass through; make one handle per
    /// `submit_record` call
    pub fn pipeline(&self) -> &WritePipeline {
        &self.pipeline
    }

    /// Append one record. Returns the record's physical address and the
    /// logical position assigned at commit.
    pub async fn submit_record(
        &self,
        record: JournalRecord,
        handle: &OrderingHandle<'_>,
    ) -> Result<(BlockAddr, LogicalPosition)> {
        let block_size = self.device.block_size();
        let rsize = codec::encoded_record_length(&record, block_size)?;
        let total = rsize.total();

        let mut reserve = self.reserve.lock().await;
        if total > self.config.max_entry_length {
            warn!(
                size = total,
                max = self.config.max_entry_length,
                "record rejected: exceeds max entry length"
            );
            return Err(Error::RecordTooLarge {
                size: total,
                max: self.config.max_entry_length,
            });
        }
        let available = self.ring.available(reserve.used_size);
        if total > available {
            return Err(Error::OutOfSpace {
                size: total,
                available,
            });
        }

        // The frame carries the commit frontier and sequence id as of this
        // reservation; both may lag in-flight submissions ahead of us.
        let (committed_snapshot, seq_snapshot) = {
            let commit = self.commit.lock().await;
            (commit.committed_to, commit.cur_segment_id)
        };
        let frame = codec::encode_record(&record, block_size, committed_snapshot, seq_snapshot)?;
        debug_assert_eq!(frame.len() as u64, total);

        // A header never straddles the wrap: relocate the whole record to
        // the ring head and waste the residue when it would.
        let mut wrapped = false;
        if self.ring.needs_relocation(reserve.written_to, rsize.mdlength as u64) {
            debug!(
                written_to = reserve.written_to,
                mdlength = rsize.mdlength,
                "metadata would cross the ring end, relocating record to ring head"
            );
            reserve.written_to = self.ring.start_offset();
            wrapped = true;
        }
        let target = reserve.written_to;
        let next = self.ring.advance(target, total);
        wrapped = wrapped || next <= target;
        reserve.written_to = next;
        reserve.used_size += total;
        debug!(
            mdlength = rsize.mdlength,
            dlength = rsize.dlength,
            target,
            "record reserved"
        );

        // Enter the pipeline before releasing the reservation lock so
        // device-submission admission order equals reservation order.
        let device_phase = handle.enter_device_submission().await;
        drop(reserve);

        // A failed write leaves the reservation consumed; the record is
        // simply never committed.
        self.append_record(&frame, target).await?;

        let finalize_phase = handle.enter_finalize().await;
        drop(device_phase);

        let segment_id = {
            let mut commit = self.commit.lock().await;
            debug_assert!(wrapped || commit.committed_to < target);
            commit.committed_to = target;
            commit.cur_segment_id += 1;
            commit.cur_segment_id
        };
        drop(finalize_phase);

        debug!(target, segment_id, "record committed");
        let block_size = block_size as u64;
        let addr = BlockAddr::new(target / block_size, target % block_size);
        Ok((addr, LogicalPosition::new(segment_id, addr)))
    }

    /// Write an encoded frame at a device address, splitting into two
    /// writes when it crosses the ring end. Device failures propagate
    /// unchanged.
    async fn append_record(&self, frame: &[u8], addr: u64) -> Result<()> {
        let (head, tail) = self.ring.split(addr, frame.len() as u64);
        debug!(addr, head, tail, "device submission");
        self.device.write(addr, &frame[..head as usize]).await?;
        if tail > 0 {
            self.device
                .write(self.ring.start_offset(), &frame[head as usize..])
                .await?;
        }
        Ok(())
    }

    /// Read the record at a ring-relative offset. `Ok(None)` means no valid
    /// record lives there: unreadable framing, a checksum mismatch and a
    /// torn tail all land here, never in `Err`.
    pub async fn read_record(&self, offset: u64) -> Result<Option<(RecordHeader, Bytes)>> {
        let block_size = self.ring.block_size();
        let max_size = self.ring.max_size();
        if offset >= max_size || offset % block_size != 0 {
            return Ok(None);
        }

        let addr = self.ring.to_device(offset);
        let read_length = block_size.min(max_size - offset);
        let mut first = vec![0u8; read_length as usize];
        self.device.read(addr, &mut first).await?;

        let Some(header) = codec::decode_record_header(&first) else {
            return Ok(None);
        };
        let total = header.total_len();
        // Frames the encoder could never have produced read as absent.
        if header.mdlength == 0
            || header.mdlength as u64 % block_size != 0
            || header.dlength as u64 % block_size != 0
            || total > max_size
        {
            return Ok(None);
        }

        let frame = if total > read_length {
            let mut frame = BytesMut::with_capacity(total as usize);
            frame.extend_from_slice(&first);

            // Second read: the rest of the frame, clamped at the ring end.
            let next_read_addr = addr + read_length;
            let mut next_read = total - read_length;
            if next_read_addr + next_read > self.ring.end() {
                next_read = self.ring.end() - next_read_addr;
            }
            if next_read > 0 {
                let mut buf = vec![0u8; next_read as usize];
                self.device.read(next_read_addr, &mut buf).await?;
                frame.extend_from_slice(&buf);
            }

            // Third read: the residue that wrapped to the ring head.
            if (frame.len() as u64) < total {
                let residue = total - frame.len() as u64;
                debug!(
                    offset,
                    residue, "record crosses the wrap, reading residue from ring head"
                );
                let mut buf = vec![0u8; residue as usize];
                self.device.read(self.ring.start_offset(), &mut buf).await?;
                frame.extend_from_slice(&buf);
            }
            frame.freeze()
        } else {
            Bytes::from(first)
        };

        if codec::validate_record(&frame) {
            Ok(Some((header, frame)))
        } else {
            debug!(offset, "record checksum mismatch, reporting absent");
            Ok(None)
        }
    }

    /// Walk records forward from a ring-relative offset, stopping at the
    /// first absent frame (a torn tail or unwritten space) or after one
    /// full lap. Returns `(offset, header, frame)` per record.
    pub async fn recover(&self, from_offset: u64) -> Result<Vec<(u64, RecordHeader, Bytes)>> {
        let max_size = self.ring.max_size();
        let mut records = Vec::new();
        let mut offset = from_offset;
        let mut walked: u64 = 0;

        while walked < max_size {
            match self.read_record(offset).await? {
                Some((header, frame)) => {
                    let total = header.total_len();
                    records.push((offset, header, frame));
                    walked += total;
                    offset = (offset + total) % max_size;
                }
                None => break,
            }
        }

        info!(
            from = from_offset,
            records = records.len(),
            "journal recovery walk complete"
        );
        Ok(records)
    }

    /// Snapshot the live cursors into the superblock and rewrite it in
    /// place at the region start
    pub async fn sync_super(&self) -> Result<()> {
        let header = {
            let reserve = self.reserve.lock().await;
            let commit = self.commit.lock().await;
            let mut header = self.header.clone();
            header.used_size = reserve.used_size;
            header.written_to = reserve.written_to;
            header.committed_to = commit.committed_to;
            header.applied_to = commit.applied_to;
            header.cur_segment_id = commit.cur_segment_id;
            header
        };
        debug!(
            written_to = header.written_to,
            committed_to = header.committed_to,
            segment_id = header.cur_segment_id,
            "syncing journal superblock"
        );
        superblock::write_super(self.device.as_ref(), self.header.start, &header).await
    }

    /// Record that the downstream applier has consumed up to `addr`,
    /// returning `released` bytes to the ring
    pub async fn update_applied_to(&self, addr: u64, released: u64) {
        let mut reserve = self.reserve.lock().await;
        let mut commit = self.commit.lock().await;
        commit.applied_to = addr;
        reserve.used_size = reserve.used_size.saturating_sub(released);
        debug!(
            applied_to = addr,
            released,
            used_size = reserve.used_size,
            "applied watermark advanced"
        );
    }

    /// Persist the cursors and release the device
    pub async fn close(self) -> Result<()> {
        self.sync_super().await?;
        self.device.close().await
    }

    // -- observers ---------------------------------------------------

    pub fn uuid(&self) -> Uuid {
        self.header.uuid
    }

    pub fn block_size(&self) -> u32 {
        self.header.block_size
    }

    pub fn max_size(&self) -> u64 {
        self.ring.max_size()
    }

    pub fn start_offset(&self) -> u64 {
        self.ring.start_offset()
    }

    /// Map a device-absolute record address to the ring-relative offset
    /// `read_record` takes
    pub fn logical_offset(&self, addr: u64) -> u64 {
        self.ring.to_logical(addr)
    }

    pub async fn written_to(&self) -> u64 {
        self.reserve.lock().await.written_to
    }

    pub async fn used_size(&self) -> u64 {
        self.reserve.lock().await.used_size
    }

    pub async fn committed_to(&self) -> u64 {
        self.commit.lock().await.committed_to
    }

    pub async fn applied_to(&self) -> u64 {
        self.commit.lock().await.applied_to
    }

    pub async fn segment_id(&self) -> u64 {
        self.commit.lock().await.cur_segment_id
    }
}
