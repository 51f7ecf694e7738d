//! Journal Error Types
//!
//! This module defines all error types that can occur during journal
//! operations.
//!
//! ## Error Categories
//!
//! ### Device Errors
//! - `Io`: block device read/write/open/close failures, surfaced unchanged
//!
//! ### Lifecycle Errors
//! - `NotInitialized`: the region has no valid superblock (run mkfs first)
//!
//! ### Capacity Errors
//! - `RecordTooLarge`: encoded record exceeds the configured entry cap
//! - `OutOfSpace`: encoded record exceeds the free space left in the ring
//!
//! ### Encoding Errors
//! - `Encode`: serialization failure; indicates a programmer error such as
//!   a section length that cannot be framed
//!
//! A failed decode or checksum on the read path is NOT an error: it is
//! reported as a "no record here" result (`Ok(None)`), which is what lets
//! recovery walk the ring and stop cleanly at a torn tail.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal region is not initialized")]
    NotInitialized,

    #[error("record size {size} exceeds max entry length {max}")]
    RecordTooLarge { size: u64, max: u64 },

    #[error("record size {size} exceeds available space {available}")]
    OutOfSpace { size: u64, available: u64 },

    #[error("encode error: {0}")]
    Encode(String),
}
