/// Geometry of a slotted page holding fixed-size tuples.
///
/// The page starts with a bitmap marking used slots (one bit per slot, least
/// significant bit first), followed by the slots themselves packed back to back.
/// Every slot costs `tuple_size * 8 + 1` bits, which fixes the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub page_size: usize,
    pub tuple_size: usize,
    pub num_slots: usize,
    pub bitmap_size: usize,
}

impl SlotLayout {
    pub fn new(page_size: usize, tuple_size: usize) -> Self {
        let num_slots = if tuple_size == 0 {
            0
        } else {
            (page_size * 8) / (tuple_size * 8 + 1)
        };
        let bitmap_size = num_slots.div_ceil(8);

        Self {
            page_size,
            tuple_size,
            num_slots,
            bitmap_size,
        }
    }

    /// Byte offset of a slot's tuple data
    pub fn slot_offset(&self, slot: usize) -> usize {
        self.bitmap_size + slot * self.tuple_size
    }

    /// Byte index and bit mask of a slot's used flag
    pub fn bitmap_position(&self, slot: usize) -> (usize, u8) {
        (slot / 8, 1u8 << (slot % 8))
    }
}
