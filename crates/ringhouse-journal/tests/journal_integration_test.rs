//! Journal Integration Tests
//!
//! End-to-end scenarios over real file-backed and in-memory devices:
//! cursor arithmetic after appends, reopen persistence, capacity errors,
//! and the wrap-boundary behaviors (relocation with a wasted tail, split
//! frames read back across the wrap).

use std::sync::Arc;

use bytes::Bytes;
use ringhouse_journal::codec::RECORD_HEADER_SIZE;
use ringhouse_journal::{
    CircularJournal, Error, FileBlockDevice, JournalConfig, JournalRecord, MemoryBlockDevice,
};
use tempfile::TempDir;

/// Build a record that encodes to exactly (mdlength, dlength) at the
/// device block size used by the test
fn sized_record(mdlength: usize, dlength: usize) -> JournalRecord {
    assert!(mdlength >= RECORD_HEADER_SIZE);
    JournalRecord::new(
        Bytes::from(vec![0x5A; mdlength - RECORD_HEADER_SIZE]),
        Bytes::from(vec![0xC3; dlength]),
    )
}

fn mem_config(end: u64) -> JournalConfig {
    JournalConfig {
        path: "mem".into(),
        start: 0,
        end,
        max_entry_length: 4 * 1024 * 1024,
    }
}

// -------------------------------------------------------------------
// Scenario: fresh mkfs, open, one small append
// -------------------------------------------------------------------

#[tokio::test]
async fn test_fresh_mkfs_open_single_append() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal");
    let config = JournalConfig {
        path: path.clone(),
        start: 0,
        end: 1048576,
        max_entry_length: 4 * 1024 * 1024,
    };
    let device = Arc::new(FileBlockDevice::new(&path, 1048576, 4096));

    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, tail) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();
    assert_eq!(tail.segment_id, 0);
    assert_eq!(tail.addr.offset, 4096, "fresh tail sits at start_offset");

    let record = sized_record(4096, 4096);
    let handle = journal.pipeline().handle();
    let (addr, position) = journal
        .submit_record(record.clone(), &handle)
        .await
        .unwrap();

    assert_eq!(addr.block, 1);
    assert_eq!(addr.offset, 0);
    assert_eq!(position.segment_id, 1);
    assert_eq!(journal.written_to().await, 12288);
    assert_eq!(journal.committed_to().await, 4096);
    assert_eq!(journal.segment_id().await, 1);
    assert_eq!(journal.used_size().await, 8192);

    let (header, frame) = journal
        .read_record(0)
        .await
        .unwrap()
        .expect("record present at offset 0");
    assert_eq!(header.mdlength, 4096);
    assert_eq!(header.dlength, 4096);
    assert_eq!(header.seq, 0, "sequence id as of append time");
    assert_eq!(header.committed_to, 0, "nothing was committed before it");
    assert_eq!(frame.len(), 8192);
    assert_eq!(
        &frame[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + record.metadata.len()],
        &record.metadata[..]
    );
    assert_eq!(&frame[4096..4096 + record.data.len()], &record.data[..]);
}

// -------------------------------------------------------------------
// Scenario: reopen persistence
// -------------------------------------------------------------------

#[tokio::test]
async fn test_reopen_persists_cursors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal");
    let config = JournalConfig {
        path: path.clone(),
        start: 0,
        end: 1048576,
        max_entry_length: 4 * 1024 * 1024,
    };

    let device = Arc::new(FileBlockDevice::new(&path, 1048576, 4096));
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device.clone(), config.clone())
        .await
        .unwrap();
    let handle = journal.pipeline().handle();
    journal
        .submit_record(sized_record(4096, 4096), &handle)
        .await
        .unwrap();
    let uuid = journal.uuid();
    journal.close().await.unwrap();

    let (journal, tail) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();
    assert_eq!(tail.segment_id, 1);
    assert_eq!(tail.addr.offset, 12288);
    assert_eq!(tail.addr.block, 3);
    assert_eq!(journal.committed_to().await, 4096);
    assert_eq!(journal.used_size().await, 8192);
    assert_eq!(journal.uuid(), uuid, "identity survives reopen");
}

// -------------------------------------------------------------------
// Scenario: record-too-large
// -------------------------------------------------------------------

#[tokio::test]
async fn test_record_too_large_leaves_cursors_unchanged() {
    let device = Arc::new(MemoryBlockDevice::new(1048576, 4096));
    let config = JournalConfig {
        max_entry_length: 8192,
        ..mem_config(1048576)
    };
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();

    let handle = journal.pipeline().handle();
    let err = journal
        .submit_record(sized_record(4096, 8192), &handle)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RecordTooLarge { size: 12288, max: 8192 }
    ));
    assert_eq!(journal.written_to().await, 4096);
    assert_eq!(journal.committed_to().await, 0);
    assert_eq!(journal.segment_id().await, 0);

    // a record exactly at the cap is accepted
    journal
        .submit_record(sized_record(4096, 4096), &handle)
        .await
        .unwrap();
    assert_eq!(journal.segment_id().await, 1);
}

#[tokio::test]
async fn test_out_of_space() {
    // 4 blocks total: superblock + 12288 bytes of ring
    let device = Arc::new(MemoryBlockDevice::new(16384, 4096));
    let config = mem_config(16384);
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();

    let handle = journal.pipeline().handle();
    journal
        .submit_record(sized_record(4096, 4096), &handle)
        .await
        .unwrap();
    journal
        .submit_record(sized_record(4096, 0), &handle)
        .await
        .unwrap();
    assert_eq!(journal.used_size().await, 12288, "ring is full");

    let err = journal
        .submit_record(sized_record(4096, 0), &handle)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfSpace {
            size: 4096,
            available: 0
        }
    ));
}

// -------------------------------------------------------------------
// Scenario: head wrap with wasted tail
// -------------------------------------------------------------------

#[tokio::test]
async fn test_metadata_wrap_relocates_record_to_ring_head() {
    // 512-byte blocks: start_offset 512, ring end 16384, max_size 15872
    let device = Arc::new(MemoryBlockDevice::new(16384, 512));
    let config = mem_config(16384);
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();
    let handle = journal.pipeline().handle();

    // advance written_to to 2048 bytes short of the ring end
    let mut last_filler_addr = 0;
    for _ in 0..27 {
        let (addr, _) = journal
            .submit_record(sized_record(512, 0), &handle)
            .await
            .unwrap();
        last_filler_addr = addr.block * 512 + addr.offset;
    }
    assert_eq!(journal.written_to().await, 14336);

    // downstream consumed everything: the ring may be reused
    journal.update_applied_to(14336, 27 * 512).await;

    // a 4KB metadata section cannot fit in the 2048-byte residue, so the
    // record lands at the ring head and the residue is wasted
    let (addr, position) = journal
        .submit_record(sized_record(4096, 0), &handle)
        .await
        .unwrap();
    assert_eq!(addr.block, 1);
    assert_eq!(addr.offset, 0);
    assert_eq!(journal.committed_to().await, 512);
    assert_eq!(journal.written_to().await, 512 + 4096);
    assert_eq!(position.segment_id, 28);

    // the wasted residue reads as absent
    assert!(journal
        .read_record(journal.logical_offset(14336))
        .await
        .unwrap()
        .is_none());

    // the record before the waste is intact, and so is the relocated one
    assert!(journal
        .read_record(journal.logical_offset(last_filler_addr))
        .await
        .unwrap()
        .is_some());
    let (header, _) = journal
        .read_record(0)
        .await
        .unwrap()
        .expect("relocated record at ring head");
    assert_eq!(header.mdlength, 4096);
    assert_eq!(
        header.committed_to, 13824,
        "embedded watermark names the last filler"
    );
}

// -------------------------------------------------------------------
// Scenario: split frame read back across the wrap
// -------------------------------------------------------------------

#[tokio::test]
async fn test_split_record_reads_back_with_three_device_reads() {
    let device = Arc::new(MemoryBlockDevice::new(16384, 512));
    let config = mem_config(16384);
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device.clone(), config)
        .await
        .unwrap();
    let handle = journal.pipeline().handle();

    // advance written_to to 1024 bytes short of the ring end
    for _ in 0..29 {
        journal
            .submit_record(sized_record(512, 0), &handle)
            .await
            .unwrap();
    }
    assert_eq!(journal.written_to().await, 15360);
    journal.update_applied_to(15360, 29 * 512).await;

    // header fits in place, the data crosses the wrap: two physical writes
    let record = sized_record(512, 2048);
    let writes_before = device.write_ops();
    let (addr, _) = journal
        .submit_record(record.clone(), &handle)
        .await
        .unwrap();
    assert_eq!(device.write_ops() - writes_before, 2);

    let target = addr.block * 512 + addr.offset;
    assert_eq!(target, 15360);
    assert_eq!(
        journal.written_to().await,
        512 + 1536,
        "cursor continues past the wrapped tail"
    );

    // reading it back takes exactly three reads: header block, the rest of
    // the head up to the ring end, and the residue at the ring head
    let reads_before = device.read_ops();
    let (header, frame) = journal
        .read_record(journal.logical_offset(target))
        .await
        .unwrap()
        .expect("split record reads back");
    assert_eq!(device.read_ops() - reads_before, 3);

    assert_eq!(header.mdlength, 512);
    assert_eq!(header.dlength, 2048);
    assert_eq!(frame.len(), 2560);
    assert_eq!(
        &frame[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + record.metadata.len()],
        &record.metadata[..]
    );
    assert_eq!(&frame[512..512 + 2048], &record.data[..]);
}

// -------------------------------------------------------------------
// mkfs idempotence
// -------------------------------------------------------------------

#[tokio::test]
async fn test_mkfs_is_idempotent() {
    let device = Arc::new(MemoryBlockDevice::new(1048576, 4096));
    let config = mem_config(1048576);

    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device.clone(), config.clone())
        .await
        .unwrap();
    let handle = journal.pipeline().handle();
    journal
        .submit_record(sized_record(4096, 4096), &handle)
        .await
        .unwrap();
    journal
        .submit_record(sized_record(4096, 0), &handle)
        .await
        .unwrap();
    let uuid = journal.uuid();
    journal.close().await.unwrap();

    // formatting again must not touch the existing superblock
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();

    let (journal, tail) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();
    assert_eq!(journal.uuid(), uuid);
    assert_eq!(tail.segment_id, 2, "sequence counter preserved");
    assert_eq!(tail.addr.offset, 4096 + 8192 + 4096);
    assert_eq!(journal.committed_to().await, 4096 + 8192);
}

// -------------------------------------------------------------------
// Concurrent submissions: commit order and position assignment
// -------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_submissions_commit_in_order() {
    let device = Arc::new(MemoryBlockDevice::new(1048576, 4096));
    let config = mem_config(1048576);
    CircularJournal::mkfs(device.clone(), &config).await.unwrap();
    let (journal, _) = CircularJournal::open_for_write(device, config)
        .await
        .unwrap();
    let journal = Arc::new(journal);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let journal = journal.clone();
        tasks.push(tokio::spawn(async move {
            let handle = journal.pipeline().handle();
            journal
                .submit_record(sized_record(4096, 4096), &handle)
                .await
                .unwrap()
        }));
    }
    let mut positions = Vec::new();
    for task in tasks {
        positions.push(task.await.unwrap());
    }

    assert_eq!(journal.segment_id().await, 8);
    assert_eq!(journal.written_to().await, 4096 + 8 * 8192);
    assert_eq!(journal.committed_to().await, 4096 + 7 * 8192);

    // every submission got a distinct target and a distinct sequence id
    let mut segment_ids: Vec<u64> = positions.iter().map(|(_, p)| p.segment_id).collect();
    segment_ids.sort_unstable();
    assert_eq!(segment_ids, (1..=8).collect::<Vec<u64>>());
    let mut targets: Vec<u64> = positions
        .iter()
        .map(|(addr, _)| addr.block * 4096 + addr.offset)
        .collect();
    targets.sort_unstable();
    targets.dedup();
    assert_eq!(targets.len(), 8);

    // all of them read back
    for (addr, _) in &positions {
        let offset = journal.logical_offset(addr.block * 4096 + addr.offset);
        assert!(journal.read_record(offset).await.unwrap().is_some());
    }
}
