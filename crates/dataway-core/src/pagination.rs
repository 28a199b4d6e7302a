//! Pagination envelope shared by adapters and the serving engine.

use crate::condition::Clause;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Page request plus result payload. Adapters fill `total` and `data` in
/// place.
///
/// `page == 0` is a reserved sentinel meaning "unpaged": the adapter skips
/// the COUNT phase and applies `size` as a plain limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
    #[serde(skip)]
    pub offset: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clause: Option<Clause>,
    pub data: Vec<Row>,
}

impl Pagination {
    /// Create a normalized page request: page and size below 1 default to
    /// 1 and 10. The offset saturates at `u64::MAX`; callers validate
    /// request input, this constructor never panics on it.
    pub fn new(page: u64, size: u64) -> Self {
        let page = page.max(1);
        let size = if size < 1 { 10 } else { size };
        Self {
            page,
            size,
            offset: (page - 1).saturating_mul(size),
            total: 0,
            clause: None,
            data: Vec::new(),
        }
    }

    /// Create an unpaged request carrying the dataset's fixed batch limit.
    pub fn unpaged(batch_limit: u64) -> Self {
        Self {
            page: 0,
            size: batch_limit.max(1),
            offset: 0,
            total: 0,
            clause: None,
            data: Vec::new(),
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clause = Some(clause);
        self
    }

    pub fn is_unpaged(&self) -> bool {
        self.page == 0
    }

    /// Fill in the result payload.
    pub fn set(&mut self, total: u64, data: Vec<Row>) {
        self.total = total;
        self.data = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_and_size_normalize() {
        let p = Pagination::new(0, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.size, 10);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn offset_is_computed() {
        let p = Pagination::new(3, 20);
        assert_eq!(p.offset, 40);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let p = Pagination::new(u64::MAX, 10);
        assert_eq!(p.offset, u64::MAX);
        let p = Pagination::new(2, u64::MAX);
        assert_eq!(p.offset, u64::MAX);
    }

    #[test]
    fn unpaged_keeps_sentinel() {
        let p = Pagination::unpaged(500);
        assert!(p.is_unpaged());
        assert_eq!(p.size, 500);
        assert_eq!(p.offset, 0);
    }
}
