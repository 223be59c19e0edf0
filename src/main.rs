use anyhow::Result;

use pagecore::{Database, EngineConfig, PageId, PageManager, Permissions};

const TUPLE_SIZE: usize = 16;

fn main() -> Result<()> {
    // Open (and recover) a database in ./data
    let config = EngineConfig::with_data_dir("data");
    let db = Database::open(config)?;
    println!("Recovery: {:?}", db.recovery_report());

    let access = db.access_manager();
    let page_manager = PageManager::new(db.config().page_size, TUPLE_SIZE);
    let pid = PageId::new(0, 0);
    access.allocate_page(pid)?;

    // Insert a tuple and commit
    let tid = access.begin_transaction()?;
    let page = access.pin_page(tid, pid, Permissions::ReadWrite)?;
    let slot = {
        let mut page_guard = page.write();
        page_manager.insert_tuple(&mut page_guard, b"Hello, Database!")?
    };
    println!("{} inserted a tuple into slot {} of page {}", tid, slot, pid);

    access.unpin_page(tid, pid, true)?;
    access.transaction_complete(tid, true)?;

    print!("{}", db.log_manager().dump()?);
    Ok(())
}
