pub mod lru;

pub use lru::LRUReplacer;
