//! Drives lock requests from one thread per transaction in a scripted order.
//!
//! Lock requests are fire-and-forget: the worker may block inside
//! `acquire_lock`. `Acquired`/`Aborted` steps assert that the matching outcome
//! arrives; a run of consecutive outcome steps may arrive in any order. Before
//! every request or unlock the driver checks that no unexpected outcome has
//! happened in the meantime.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use pagecore::transaction::concurrency::LockManager;
use pagecore::{PageId, Permissions, TransactionId};

const SETTLE_TIME: Duration = Duration::from_millis(50);
const OUTCOME_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shared,
    Exclusive,
    Unlock,
    Acquired,
    Aborted,
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub tid: TransactionId,
    pub pid: PageId,
    pub action: Action,
}

pub fn step(tid: u64, pid: PageId, action: Action) -> Step {
    Step {
        tid: TransactionId::new(tid),
        pid,
        action,
    }
}

enum Command {
    Lock(PageId, Permissions),
    Unlock(PageId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Acquired(TransactionId, PageId),
    /// Lost a deadlock; the worker released everything it held
    Aborted(TransactionId, PageId),
    Released(TransactionId, PageId),
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<()>,
}

pub struct Schedule {
    lock_manager: Arc<LockManager>,
    workers: HashMap<TransactionId, Worker>,
    events_tx: Sender<Event>,
    events: Receiver<Event>,
    pending: Vec<Event>,
}

impl Schedule {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        let (events_tx, events) = channel::unbounded();
        Self {
            lock_manager,
            workers: HashMap::new(),
            events_tx,
            events,
            pending: Vec::new(),
        }
    }

    /// Run every step, panicking on the first deviation
    pub fn execute(mut self, steps: &[Step]) {
        let mut i = 0;
        while i < steps.len() {
            let step = steps[i];
            match step.action {
                Action::Shared | Action::Exclusive => {
                    self.assert_quiet(&step);
                    let perm = if step.action == Action::Shared {
                        Permissions::ReadOnly
                    } else {
                        Permissions::ReadWrite
                    };
                    self.send(step.tid, Command::Lock(step.pid, perm));
                    i += 1;
                }
                Action::Unlock => {
                    self.assert_quiet(&step);
                    self.send(step.tid, Command::Unlock(step.pid));
                    self.expect(vec![Event::Released(step.tid, step.pid)]);
                    i += 1;
                }
                Action::Acquired | Action::Aborted => {
                    let mut expected = Vec::new();
                    while i < steps.len()
                        && matches!(steps[i].action, Action::Acquired | Action::Aborted)
                    {
                        let s = steps[i];
                        expected.push(if s.action == Action::Acquired {
                            Event::Acquired(s.tid, s.pid)
                        } else {
                            Event::Aborted(s.tid, s.pid)
                        });
                        i += 1;
                    }
                    self.expect(expected);
                }
            }
        }

        thread::sleep(SETTLE_TIME);
        self.drain();
        assert!(self.pending.is_empty(), "unexpected outcomes at end of schedule: {:?}", self.pending);

        for (_, worker) in self.workers.drain() {
            drop(worker.commands);
            worker.handle.join().expect("worker panicked");
        }
    }

    fn send(&mut self, tid: TransactionId, command: Command) {
        let worker = self
            .workers
            .entry(tid)
            .or_insert_with(|| spawn_worker(tid, self.lock_manager.clone(), self.events_tx.clone()));
        worker.commands.send(command).expect("worker hung up");
    }

    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.pending.push(event);
        }
    }

    fn assert_quiet(&mut self, before: &Step) {
        thread::sleep(SETTLE_TIME);
        self.drain();
        assert!(
            self.pending.is_empty(),
            "unexpected outcomes {:?} before step {:?}",
            self.pending,
            before
        );
    }

    /// Wait until every expected event has happened, in any order
    fn expect(&mut self, mut expected: Vec<Event>) {
        self.pending.retain(|event| match expected.iter().position(|e| e == event) {
            Some(pos) => {
                expected.swap_remove(pos);
                false
            }
            None => true,
        });

        let deadline = Instant::now() + OUTCOME_TIMEOUT;
        while !expected.is_empty() {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(timeout) {
                Ok(event) => match expected.iter().position(|e| *e == event) {
                    Some(pos) => {
                        expected.swap_remove(pos);
                    }
                    None => self.pending.push(event),
                },
                Err(RecvTimeoutError::Timeout) => {
                    panic!("timed out waiting for {:?}; other outcomes: {:?}", expected, self.pending)
                }
                Err(RecvTimeoutError::Disconnected) => panic!("event channel closed"),
            }
        }
    }
}

fn spawn_worker(tid: TransactionId, lock_manager: Arc<LockManager>, events: Sender<Event>) -> Worker {
    let (commands, rx) = channel::unbounded::<Command>();
    let handle = thread::spawn(move || {
        for command in rx {
            let event = match command {
                Command::Lock(pid, perm) => match lock_manager.acquire_lock(tid, pid, perm) {
                    Ok(()) => Event::Acquired(tid, pid),
                    Err(_) => {
                        lock_manager.release_all_locks(tid);
                        Event::Aborted(tid, pid)
                    }
                },
                Command::Unlock(pid) => {
                    lock_manager
                        .release_lock(tid, pid)
                        .expect("unlock of a lock that is not held");
                    Event::Released(tid, pid)
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }
    });

    Worker { commands, handle }
}
