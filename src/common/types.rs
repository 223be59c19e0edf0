use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Buffer pool frame ID type
pub type FrameId = u32;

/// Byte offset of a record inside the write-ahead log
pub type LogOffset = u64;

/// Page identifier: a table id plus the page number within that table.
///
/// Used as the buffer cache key and as the unit of locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.table_id, self.page_no)
    }
}

/// Transaction identifier, unique for the lifetime of a database (including its log).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T_{}", self.0)
    }
}

/// Access level a transaction asks for when it locks a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Shared lock
    ReadOnly,
    /// Exclusive lock
    ReadWrite,
}

/// In-memory copy of one disk block.
///
/// Besides the live bytes a page keeps a frozen before-image: the contents as of
/// the moment the page was read from disk or last committed. Update log records
/// are built from the before-image and the live bytes.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
}

impl Page {
    /// Create a zero-filled page
    pub fn new(id: PageId, page_size: usize) -> Self {
        Self::from_bytes(id, vec![0; page_size])
    }

    /// Rebuild a page from its serialized bytes; the before-image starts equal to the data
    pub fn from_bytes(id: PageId, data: Vec<u8>) -> Self {
        let before_image = data.clone();
        Self {
            id,
            data,
            before_image,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    /// Serialized contents of the page
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite the page contents. `data` must be exactly one page long.
    pub fn set_data(&mut self, data: &[u8]) -> bool {
        if data.len() != self.data.len() {
            return false;
        }
        self.data.copy_from_slice(data);
        true
    }

    /// Snapshot of the page as of the last quiescent point
    pub fn before_image(&self) -> Page {
        Page::from_bytes(self.id, self.before_image.clone())
    }

    /// Whether the contents differ from the before-image
    pub fn is_modified(&self) -> bool {
        self.data != self.before_image
    }

    /// Freeze the current contents as the new before-image
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data);
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.data == other.data
    }
}

impl Eq for Page {}

/// Smart pointer to a cached page
pub type PagePtr = Arc<RwLock<Page>>;
