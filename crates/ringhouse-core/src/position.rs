//! Journal Positions
//!
//! Types naming a point in the journal. The journal hands these back from
//! `open_for_write` and every successful submission so callers can refer to
//! the commit frontier without understanding ring layout.
//!
//! ## Structure
//! - `BlockAddr`: a physical address as `(block, offset)` on the device
//! - `LogicalPosition`: `(segment_id, BlockAddr)` - the sequence number
//!   assigned to a record plus where it landed

use serde::{Deserialize, Serialize};

/// A physical block address on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAddr {
    /// Block index (byte offset divided by the device block size)
    pub block: u64,

    /// Byte offset component
    pub offset: u64,
}

impl BlockAddr {
    pub fn new(block: u64, offset: u64) -> Self {
        Self { block, offset }
    }
}

/// A logical position in the journal: sequence id plus physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPosition {
    /// Sequence id of the record (or of the next record, for the open
    /// position returned by `open_for_write`)
    pub segment_id: u64,

    /// Physical address the position refers to
    pub addr: BlockAddr,
}

impl LogicalPosition {
    pub fn new(segment_id: u64, addr: BlockAddr) -> Self {
        Self { segment_id, addr }
    }
}
