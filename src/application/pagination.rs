//! Offset pagination for the list endpoints.

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: u32 = 32;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A page descriptor: zero-based index plus page size. Sizes are clamped
/// so a caller cannot request unbounded result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub index: u32,
    pub size: u32,
}

impl Page {
    pub fn new(index: u32, size: u32) -> Self {
        Self {
            index,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn first() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }

    /// Build a page from an optional query parameter, using the default size.
    pub fn from_index(index: Option<u32>) -> Self {
        Self::new(index.unwrap_or(0), DEFAULT_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.index) * i64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first()
    }
}
