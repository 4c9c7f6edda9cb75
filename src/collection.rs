//! Lazy queryable collections.
//!
//! A handler that returns a [`QueryableCollection`] instead of a realized list
//! lets the resource apply item ranges without materializing every record:
//! the total is taken with [`count`](QueryableCollection::count) and only the
//! requested window is fetched with [`slice`](QueryableCollection::slice).
//! Database-backed collections typically map these onto `SELECT COUNT(*)` and
//! `LIMIT/OFFSET`.

use serde_json::Value;

/// A collection that can report its size and hand out windows cheaply.
pub trait QueryableCollection: Send {
    /// Total number of items in the collection.
    fn count(&self) -> anyhow::Result<u64>;

    /// Items in the half-open window `start..end`.
    fn slice(&self, start: u64, end: u64) -> anyhow::Result<Vec<Value>>;

    /// Every item, for responses without a requested range.
    fn all(&self) -> anyhow::Result<Vec<Value>> {
        let total = self.count()?;
        self.slice(0, total)
    }
}

/// In-memory collection over already loaded values.
#[derive(Debug, Clone, Default)]
pub struct VecCollection {
    items: Vec<Value>,
}

impl VecCollection {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }
}

impl From<Vec<Value>> for VecCollection {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

impl QueryableCollection for VecCollection {
    fn count(&self) -> anyhow::Result<u64> {
        Ok(self.items.len() as u64)
    }

    fn slice(&self, start: u64, end: u64) -> anyhow::Result<Vec<Value>> {
        let len = self.items.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = usize::try_from(end).unwrap_or(len).min(len);
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self.items[start..end].to_vec())
    }

    fn all(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.items.clone())
    }
}
