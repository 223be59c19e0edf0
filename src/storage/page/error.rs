use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("Page is full")]
    PageFull,
    #[error("Slot {0} is already occupied")]
    SlotOccupied(usize),
    #[error("Slot {0} is empty")]
    SlotEmpty(usize),
    #[error("Invalid slot: {0}")]
    InvalidSlot(usize),
    #[error("Tuple has {actual} bytes, page stores {expected}-byte tuples")]
    TupleSizeMismatch { expected: usize, actual: usize },
    #[error("Page is {actual} bytes, layout expects {expected}")]
    PageSizeMismatch { expected: usize, actual: usize },
}
