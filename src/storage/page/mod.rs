pub mod error;
pub mod layout;
pub mod manager;

pub use error::PageError;
pub use layout::SlotLayout;
pub use manager::PageManager;
