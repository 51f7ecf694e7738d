//! Journal Record Data Structure
//!
//! This module defines `JournalRecord` - the unit of data handed to the
//! journal for durable append.
//!
//! ## What is a JournalRecord?
//! One entry in the on-device log, carrying:
//! - **metadata**: inline metadata written next to the record header
//!   (e.g. extent descriptors, transaction deltas)
//! - **data**: the actual payload (arbitrary bytes)
//!
//! The journal encodes both sections with block-aligned padding, so the
//! on-device footprint of a record is always a whole number of device
//! blocks. The raw (unpadded) lengths here are what callers control.
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for zero-copy hand-off into the write path
//! - Both sections are plain byte strings; the journal does not interpret
//!   them beyond framing and checksumming
//!
//! ## Example
//! ```ignore
//! let record = JournalRecord::new(
//!     Bytes::from(extent_descriptor_bytes),   // metadata
//!     Bytes::from(payload_bytes),             // data
//! );
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record to be appended to the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Inline metadata stored alongside the record header
    pub metadata: Bytes,

    /// Data payload
    pub data: Bytes,
}

impl JournalRecord {
    pub fn new(metadata: Bytes, data: Bytes) -> Self {
        Self { metadata, data }
    }

    /// Raw (unpadded) size of this record in bytes
    pub fn raw_len(&self) -> usize {
        self.metadata.len() + self.data.len()
    }

    /// True when both sections are empty
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.data.is_empty()
    }
}
