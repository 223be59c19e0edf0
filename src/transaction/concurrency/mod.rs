// Lock manager: page-level two-phase locking with deadlock detection

pub mod error;
pub mod lock_manager;
pub mod lock_table;
pub mod wait_for_graph;

pub use error::LockError;
pub use lock_manager::LockManager;
pub use lock_table::{LockMode, LockRequest, LockTableEntry};
pub use wait_for_graph::WaitForGraph;
