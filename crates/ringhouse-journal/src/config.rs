//! Journal Configuration
//!
//! This module defines configuration for a journal region.
//!
//! ## JournalConfig
//!
//! Describes where the region lives and what it will accept:
//!
//! - **path**: backing device or file path
//! - **start**: device-absolute byte offset where the region begins; the
//!   first block holds the superblock
//! - **end**: device-absolute byte offset where the region ends (exclusive)
//! - **max_entry_length**: hard cap on a single record's encoded size
//!   (default: 4MB)
//!
//! `start` and `end` must be multiples of the device block size. The usable
//! ring capacity is `end - start - block_size`.
//!
//! ## Usage
//!
//! ```ignore
//! use ringhouse_journal::JournalConfig;
//!
//! let config = JournalConfig {
//!     path: "/dev/nvme0n1p3".into(),
//!     start: 0,
//!     end: 1024 * 1024 * 1024, // 1GB region
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Backing device or file path
    pub path: PathBuf,

    /// Region start offset in bytes (block-aligned)
    pub start: u64,

    /// Region end offset in bytes (block-aligned, exclusive)
    pub end: u64,

    /// Maximum encoded size of a single record (default: 4MB)
    #[serde(default = "default_max_entry_length")]
    pub max_entry_length: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ringhouse.journal"),
            start: 0,
            end: 64 * 1024 * 1024, // 64MB region
            max_entry_length: default_max_entry_length(),
        }
    }
}

fn default_max_entry_length() -> u64 {
    4 * 1024 * 1024 // 4MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JournalConfig::default();
        assert_eq!(config.start, 0);
        assert_eq!(config.end, 64 * 1024 * 1024);
        assert_eq!(config.max_entry_length, 4 * 1024 * 1024);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = JournalConfig {
            path: PathBuf::from("/tmp/journal"),
            start: 4096,
            end: 1048576,
            max_entry_length: 65536,
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: JournalConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.start, 4096);
        assert_eq!(parsed.end, 1048576);
        assert_eq!(parsed.max_entry_length, 65536);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        // max_entry_length omitted: the serde default fills it in
        let json = r#"{"path": "/tmp/j", "start": 0, "end": 1048576}"#;
        let parsed: JournalConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.max_entry_length, 4 * 1024 * 1024);
    }
}
