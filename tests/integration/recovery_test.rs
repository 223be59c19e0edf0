use anyhow::Result;
use tempfile::TempDir;

use pagecore::storage::disk::{DiskManager, FileDiskManager};
use pagecore::transaction::wal::{LogManager, LogRecordType};
use pagecore::{Database, EngineConfig, Page, PageId, PageManager, Permissions, TransactionId};

#[path = "../common/mod.rs"]
mod common;
use common::{open_test_database, test_config, TEST_PAGE_SIZE};

const TUPLE_SIZE: usize = 16;

fn tuple(fill: u8) -> Vec<u8> {
    vec![fill; TUPLE_SIZE]
}

fn record_types(log: &LogManager, tid: TransactionId) -> Result<Vec<LogRecordType>> {
    let mut types = Vec::new();
    for record in log.iter_forward(0)? {
        let record = record?;
        if record.txn_id == Some(tid) {
            types.push(record.record_type());
        }
    }
    Ok(types)
}

/// Insert one tuple into `pid` on behalf of a fresh transaction, leaving it running
fn insert_tuple(db: &Database, pid: PageId, fill: u8) -> Result<TransactionId> {
    let am = db.access_manager();
    let pages = PageManager::new(TEST_PAGE_SIZE, TUPLE_SIZE);
    let tid = am.begin_transaction()?;

    let page = am.pin_page(tid, pid, Permissions::ReadWrite)?;
    pages.insert_tuple(&mut page.write(), &tuple(fill))?;
    am.unpin_page(tid, pid, true)?;
    Ok(tid)
}

fn tuples_on_disk(disk: &FileDiskManager, pid: PageId) -> Result<Vec<Vec<u8>>> {
    let page = disk.read_page(pid)?;
    let pages = PageManager::new(TEST_PAGE_SIZE, TUPLE_SIZE);
    Ok(pages
        .tuples(&page)?
        .into_iter()
        .map(|(_, t)| t.to_vec())
        .collect())
}

#[test]
fn test_forced_commit_reaches_disk() -> Result<()> {
    let dir = TempDir::new()?;
    let db = open_test_database(dir.path(), 8)?;
    let pid = PageId::new(0, 0);
    db.access_manager().allocate_page(pid)?;

    let tid = insert_tuple(&db, pid, 7)?;
    db.access_manager().transaction_complete(tid, true)?;

    assert_eq!(tuples_on_disk(db.disk_manager(), pid)?, vec![tuple(7)]);
    assert_eq!(
        record_types(db.log_manager(), tid)?,
        vec![LogRecordType::Begin, LogRecordType::Update, LogRecordType::Commit]
    );
    assert!(db.lock_manager().pages_for_tid(tid).is_empty());
    Ok(())
}

#[test]
fn test_crash_before_commit_is_undone() -> Result<()> {
    let dir = TempDir::new()?;
    let pid = PageId::new(0, 0);
    let tid = {
        let db = open_test_database(dir.path(), 8)?;
        db.access_manager().allocate_page(pid)?;
        let tid = insert_tuple(&db, pid, 3)?;
        // steal: the uncommitted page reaches disk before the crash
        db.buffer_pool().flush_page(pid)?;
        assert_eq!(tuples_on_disk(db.disk_manager(), pid)?.len(), 1);
        tid
    };

    let db = open_test_database(dir.path(), 8)?;
    assert_eq!(db.recovery_report().losers, vec![tid]);
    assert_eq!(db.recovery_report().undone, 1);
    assert!(tuples_on_disk(db.disk_manager(), pid)?.is_empty());

    let types = record_types(db.log_manager(), tid)?;
    assert!(types.contains(&LogRecordType::Clr));
    assert_eq!(types.last(), Some(&LogRecordType::Abort));
    Ok(())
}

#[test]
fn test_unforced_commit_is_redone() -> Result<()> {
    let dir = TempDir::new()?;
    let config = EngineConfig {
        force_policy: false,
        ..test_config(dir.path(), 8)
    };
    let pid = PageId::new(2, 1);

    {
        let db = Database::open(config.clone())?;
        db.access_manager().allocate_page(pid)?;
        let tid = insert_tuple(&db, pid, 9)?;
        db.access_manager().transaction_complete(tid, true)?;

        // committed, but the page only lives in the cache
        assert!(db.buffer_pool().is_dirty(pid));
        assert!(tuples_on_disk(db.disk_manager(), pid)?.is_empty());
    }

    let db = Database::open(config)?;
    assert!(db.recovery_report().losers.is_empty());
    assert_eq!(db.recovery_report().redone, 1);
    assert_eq!(tuples_on_disk(db.disk_manager(), pid)?, vec![tuple(9)]);
    Ok(())
}

#[test]
fn test_recovery_is_repeatable() -> Result<()> {
    let dir = TempDir::new()?;
    let (p0, p1) = (PageId::new(0, 0), PageId::new(0, 1));

    {
        let db = open_test_database(dir.path(), 8)?;
        db.access_manager().allocate_page(p0)?;
        db.access_manager().allocate_page(p1)?;
        let winner = insert_tuple(&db, p0, 1)?;
        db.access_manager().transaction_complete(winner, true)?;
        insert_tuple(&db, p1, 2)?;
        db.buffer_pool().flush_all_pages()?;
    }

    let first = open_test_database(dir.path(), 8)?;
    let disk = first.disk_manager().clone();
    assert_eq!(first.recovery_report().losers.len(), 1);
    drop(first);

    let snapshot = (tuples_on_disk(&disk, p0)?, tuples_on_disk(&disk, p1)?);
    assert_eq!(snapshot.0, vec![tuple(1)]);
    assert!(snapshot.1.is_empty());

    // redo applies the same images again and finds no losers left
    let second = open_test_database(dir.path(), 8)?;
    assert!(second.recovery_report().losers.is_empty());
    assert_eq!(
        (tuples_on_disk(&disk, p0)?, tuples_on_disk(&disk, p1)?),
        snapshot
    );
    Ok(())
}

#[test]
fn test_interrupted_rollback_is_resumed() -> Result<()> {
    let dir = TempDir::new()?;
    let config = test_config(dir.path(), 4);
    let pid = PageId::new(1, 0);
    let image = |fill: u8| Page::from_bytes(pid, vec![fill; TEST_PAGE_SIZE]);
    let tid = TransactionId::new(5);

    {
        let disk = FileDiskManager::new(dir.path(), TEST_PAGE_SIZE)?;
        disk.allocate_page(pid)?;
        disk.write_page(&image(1))?;

        let log = LogManager::open(config.log_config())?;
        log.log_begin(tid)?;
        log.log_update(tid, &image(0), &image(1))?;
        log.log_update(tid, &image(1), &image(2))?;
        // the crash hit after the newest update had been compensated
        log.log_clr(tid, &image(1))?;
        log.force()?;
    }

    let db = Database::open(config)?;
    let report = db.recovery_report();
    assert_eq!(report.losers, vec![tid]);
    assert_eq!(report.undone, 1);
    assert_eq!(db.disk_manager().read_page(pid)?, image(0));

    let types = record_types(db.log_manager(), tid)?;
    assert_eq!(types.iter().filter(|t| **t == LogRecordType::Clr).count(), 2);
    assert_eq!(types.last(), Some(&LogRecordType::Abort));
    Ok(())
}

#[test]
fn test_checkpoint_carries_active_transactions() -> Result<()> {
    let dir = TempDir::new()?;
    let pid = PageId::new(0, 3);

    let tid = {
        let db = open_test_database(dir.path(), 8)?;
        db.access_manager().allocate_page(pid)?;
        let tid = insert_tuple(&db, pid, 4)?;
        // flushes the uncommitted page and names tid as active
        db.access_manager().checkpoint()?;
        assert!(db.log_manager().last_checkpoint().is_some());
        tid
    };

    let db = open_test_database(dir.path(), 8)?;
    assert_eq!(db.recovery_report().losers, vec![tid]);
    assert!(tuples_on_disk(db.disk_manager(), pid)?.is_empty());
    Ok(())
}

#[test]
fn test_transaction_ids_continue_after_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let pid = PageId::new(0, 0);
    let last = {
        let db = open_test_database(dir.path(), 8)?;
        db.access_manager().allocate_page(pid)?;
        let t1 = insert_tuple(&db, pid, 1)?;
        db.access_manager().transaction_complete(t1, true)?;
        let t2 = insert_tuple(&db, pid, 2)?;
        db.access_manager().transaction_complete(t2, false)?;
        t2
    };

    let db = open_test_database(dir.path(), 8)?;
    let next = db.access_manager().begin_transaction()?;
    assert!(next > last, "{} should follow {}", next, last);
    Ok(())
}
