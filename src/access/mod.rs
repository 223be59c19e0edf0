pub mod error;
pub mod manager;

pub use error::AccessError;
pub use manager::AccessManager;
