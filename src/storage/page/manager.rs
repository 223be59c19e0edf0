use crate::common::types::Page;
use crate::storage::page::error::PageError;
use crate::storage::page::layout::SlotLayout;

/// Stateless operations interpreting a page as fixed-size tuple slots
pub struct PageManager {
    layout: SlotLayout,
}

impl PageManager {
    pub fn new(page_size: usize, tuple_size: usize) -> Self {
        Self {
            layout: SlotLayout::new(page_size, tuple_size),
        }
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn num_slots(&self) -> usize {
        self.layout.num_slots
    }

    pub fn is_slot_used(&self, page: &Page, slot: usize) -> Result<bool, PageError> {
        self.check_page(page)?;
        self.check_slot(slot)?;
        let (byte, mask) = self.layout.bitmap_position(slot);
        Ok(page.data()[byte] & mask != 0)
    }

    pub fn num_empty_slots(&self, page: &Page) -> Result<usize, PageError> {
        let mut empty = 0;
        for slot in 0..self.layout.num_slots {
            if !self.is_slot_used(page, slot)? {
                empty += 1;
            }
        }
        Ok(empty)
    }

    /// Insert a tuple into the first free slot and return the slot number
    pub fn insert_tuple(&self, page: &mut Page, tuple: &[u8]) -> Result<usize, PageError> {
        self.check_tuple(tuple)?;
        for slot in 0..self.layout.num_slots {
            if !self.is_slot_used(page, slot)? {
                self.insert_tuple_at(page, slot, tuple)?;
                return Ok(slot);
            }
        }
        Err(PageError::PageFull)
    }

    pub fn insert_tuple_at(&self, page: &mut Page, slot: usize, tuple: &[u8]) -> Result<(), PageError> {
        self.check_tuple(tuple)?;
        if self.is_slot_used(page, slot)? {
            return Err(PageError::SlotOccupied(slot));
        }

        let offset = self.layout.slot_offset(slot);
        let (byte, mask) = self.layout.bitmap_position(slot);
        let data = page.data_mut();
        data[offset..offset + tuple.len()].copy_from_slice(tuple);
        data[byte] |= mask;

        Ok(())
    }

    /// Clear a slot. The tuple bytes are zeroed so identical logical pages serialize identically.
    pub fn delete_tuple(&self, page: &mut Page, slot: usize) -> Result<(), PageError> {
        if !self.is_slot_used(page, slot)? {
            return Err(PageError::SlotEmpty(slot));
        }

        let offset = self.layout.slot_offset(slot);
        let (byte, mask) = self.layout.bitmap_position(slot);
        let data = page.data_mut();
        data[offset..offset + self.layout.tuple_size].fill(0);
        data[byte] &= !mask;

        Ok(())
    }

    pub fn get_tuple<'a>(&self, page: &'a Page, slot: usize) -> Result<Option<&'a [u8]>, PageError> {
        if !self.is_slot_used(page, slot)? {
            return Ok(None);
        }
        let offset = self.layout.slot_offset(slot);
        Ok(Some(&page.data()[offset..offset + self.layout.tuple_size]))
    }

    /// All used slots with their tuples, in slot order
    pub fn tuples<'a>(&self, page: &'a Page) -> Result<Vec<(usize, &'a [u8])>, PageError> {
        let mut result = Vec::new();
        for slot in 0..self.layout.num_slots {
            if let Some(tuple) = self.get_tuple(page, slot)? {
                result.push((slot, tuple));
            }
        }
        Ok(result)
    }

    fn check_page(&self, page: &Page) -> Result<(), PageError> {
        if page.page_size() != self.layout.page_size {
            return Err(PageError::PageSizeMismatch {
                expected: self.layout.page_size,
                actual: page.page_size(),
            });
        }
        Ok(())
    }

    fn check_slot(&self, slot: usize) -> Result<(), PageError> {
        if slot >= self.layout.num_slots {
            return Err(PageError::InvalidSlot(slot));
        }
        Ok(())
    }

    fn check_tuple(&self, tuple: &[u8]) -> Result<(), PageError> {
        if tuple.len() != self.layout.tuple_size {
            return Err(PageError::TupleSizeMismatch {
                expected: self.layout.tuple_size,
                actual: tuple.len(),
            });
        }
        Ok(())
    }
}
