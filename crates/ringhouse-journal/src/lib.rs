//! Ringhouse Journal
//!
//! This crate implements a circular bounded journal: a fixed-size, on-device
//! log that persists a stream of variable-length records into a
//! pre-allocated region of a block-addressable device with wrap-around
//! allocation. It provides the durable, ordered record append underneath an
//! object-storage write path.
//!
//! ## Region Layout
//!
//! ```text
//! start                                                          end
//! ┌───────────┬──────────────────────────────────────────────────┐
//! │ superblock│                the ring (max_size)               │
//! │ (1 block) │  records, block-aligned, wrapping at the end     │
//! └───────────┴──────────────────────────────────────────────────┘
//!             ▲                                                  ▲
//!        start_offset                                start_offset + max_size
//!
//!     ── written_to ──▶  next free write position
//!     ── committed_to ─▶ last durably committed record
//!     ── applied_to ───▶ consumed by the downstream applier
//! ```
//!
//! A record is framed as `[header | metadata | data]` with both sections
//! padded to whole blocks and a CRC32C over the frame. A frame that would
//! run past the ring end is split into two physical writes; a frame whose
//! header alone would cross the end is relocated wholly to the ring head
//! instead, wasting the residue.
//!
//! ## Main Components
//!
//! ### CircularJournal
//! The engine: `mkfs`, `open_for_write`, `submit_record`, `read_record`,
//! `recover`, `sync_super`, `close`. Owns the cursors and the device.
//!
//! ### WritePipeline
//! Two named one-at-a-time phases (device_submission, finalize) every
//! submission passes through in order. Commit order equals admission order
//! even when the device completes writes out of order.
//!
//! ### BlockDevice
//! The async device seam: block-aligned reads and writes, durable on
//! completion. `FileBlockDevice` backs it with a file; `MemoryBlockDevice`
//! is the in-memory double used in tests.
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use ringhouse_journal::{CircularJournal, FileBlockDevice, JournalConfig, JournalRecord};
//!
//! let config = JournalConfig {
//!     path: "./data/journal".into(),
//!     start: 0,
//!     end: 64 * 1024 * 1024,
//!     ..Default::default()
//! };
//! let device = Arc::new(FileBlockDevice::new(&config.path, config.end, 4096));
//!
//! // one-time format (no-op if already formatted)
//! CircularJournal::mkfs(device.clone(), &config).await?;
//!
//! let (journal, tail) = CircularJournal::open_for_write(device, config).await?;
//!
//! let handle = journal.pipeline().handle();
//! let record = JournalRecord::new(Bytes::from(meta), Bytes::from(payload));
//! let (addr, position) = journal.submit_record(record, &handle).await?;
//!
//! // read it back by ring-relative offset
//! let offset = journal.logical_offset(addr.block * 4096 + addr.offset);
//! let (header, frame) = journal.read_record(offset).await?.expect("present");
//!
//! journal.close().await?;
//! ```
//!
//! ## Durability Model
//!
//! `submit_record` returns after its device writes are durable and the
//! commit cursor has advanced; `sync_super` persists the cursor snapshot
//! (including the sequence counter) into the superblock, and `close` always
//! syncs before releasing the device. After a crash without `sync_super`,
//! appends made since the last sync are still on device but the superblock
//! points at the older tail; recovery walks forward from there and stops at
//! the first torn frame.

pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod journal;
pub mod pipeline;
pub mod ring;
pub mod superblock;

pub use codec::{RecordHeader, RecordSize};
pub use config::JournalConfig;
pub use device::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
pub use error::{Error, Result};
pub use journal::CircularJournal;
pub use pipeline::{OrderingHandle, PhaseGuard, WritePipeline};
pub use ring::RingGeometry;
pub use superblock::Superblock;

pub use ringhouse_core::{BlockAddr, JournalRecord, LogicalPosition};
