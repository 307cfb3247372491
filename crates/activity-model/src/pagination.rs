use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Offset-paginated listing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetPage {
    pub items: Vec<Transaction>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl OffsetPage {
    pub fn new(items: Vec<Transaction>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size <= 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Cursor-paginated listing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage {
    pub items: Vec<Transaction>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub limit: i64,
}
