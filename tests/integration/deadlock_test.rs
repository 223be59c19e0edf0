use std::sync::{Arc, Barrier};
use std::thread;

use pagecore::transaction::concurrency::{LockError, LockManager};
use pagecore::{PageId, Permissions, TransactionId};

#[path = "../common/mod.rs"]
mod common;
use common::schedule::{step, Action, Schedule};

fn pid(page_no: u32) -> PageId {
    PageId::new(0, page_no)
}

#[test]
fn test_requester_closing_the_cycle_is_aborted() {
    // T1 closes the cycle, so T1 dies and T0 gets page 2 once T1's locks are gone
    Schedule::new(Arc::new(LockManager::new())).execute(&[
        step(0, pid(1), Action::Exclusive),
        step(0, pid(1), Action::Acquired),
        step(1, pid(2), Action::Exclusive),
        step(1, pid(2), Action::Acquired),
        step(0, pid(2), Action::Exclusive),
        step(1, pid(1), Action::Exclusive),
        step(1, pid(1), Action::Aborted),
        step(0, pid(2), Action::Acquired),
    ]);
}

#[test]
fn test_shared_holders_both_upgrading_deadlock() {
    Schedule::new(Arc::new(LockManager::new())).execute(&[
        step(0, pid(1), Action::Shared),
        step(0, pid(1), Action::Acquired),
        step(1, pid(1), Action::Shared),
        step(1, pid(1), Action::Acquired),
        step(0, pid(1), Action::Exclusive),
        step(1, pid(1), Action::Exclusive),
        step(1, pid(1), Action::Aborted),
        step(0, pid(1), Action::Acquired),
    ]);
}

#[test]
fn test_three_way_cycle() {
    Schedule::new(Arc::new(LockManager::new())).execute(&[
        step(0, pid(1), Action::Exclusive),
        step(0, pid(1), Action::Acquired),
        step(1, pid(2), Action::Exclusive),
        step(1, pid(2), Action::Acquired),
        step(2, pid(3), Action::Exclusive),
        step(2, pid(3), Action::Acquired),
        step(0, pid(2), Action::Exclusive),
        step(1, pid(3), Action::Exclusive),
        step(2, pid(1), Action::Exclusive),
        step(2, pid(1), Action::Aborted),
        step(1, pid(3), Action::Acquired),
        step(1, pid(3), Action::Unlock),
        step(1, pid(2), Action::Unlock),
        step(0, pid(2), Action::Acquired),
    ]);
}

#[test]
fn test_concurrent_cycle_aborts_exactly_one() {
    let lm = Arc::new(LockManager::new());
    let (t0, t1) = (TransactionId::new(0), TransactionId::new(1));
    let (a, b) = (pid(1), pid(2));

    lm.acquire_lock(t0, a, Permissions::ReadWrite).unwrap();
    lm.acquire_lock(t1, b, Permissions::ReadWrite).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let spawn = |tid: TransactionId, want: PageId| {
        let lm = lm.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            let result = lm.acquire_lock(tid, want, Permissions::ReadWrite);
            // a transaction driver releases everything once its transaction ends
            lm.release_all_locks(tid);
            result
        })
    };

    let h0 = spawn(t0, b);
    let h1 = spawn(t1, a);
    let results = [h0.join().unwrap(), h1.join().unwrap()];

    let aborted: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(aborted.len(), 1, "results: {:?}", results);
    assert!(matches!(aborted[0], Err(LockError::Deadlock(_))));
    assert!(lm.pages_for_tid(t0).is_empty());
    assert!(lm.pages_for_tid(t1).is_empty());
}

#[test]
fn test_no_false_deadlock_on_chain() {
    // T0 waits on T1, T1 waits on T2: a chain, not a cycle
    Schedule::new(Arc::new(LockManager::new())).execute(&[
        step(2, pid(3), Action::Exclusive),
        step(2, pid(3), Action::Acquired),
        step(1, pid(2), Action::Exclusive),
        step(1, pid(2), Action::Acquired),
        step(1, pid(3), Action::Shared),
        step(0, pid(2), Action::Shared),
        step(2, pid(3), Action::Unlock),
        step(1, pid(3), Action::Acquired),
        step(1, pid(2), Action::Unlock),
        step(0, pid(2), Action::Acquired),
    ]);
}
