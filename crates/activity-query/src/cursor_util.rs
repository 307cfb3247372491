use activity_cursor::Position;
use activity_model::Transaction;

/// Sorts `items` into the canonical `(created_at DESC, id DESC)` order,
/// drops everything not strictly after `cursor`, and truncates to `limit`,
/// reporting whether anything was dropped by the truncation (`has_more`).
///
/// Used by both query backends' keyset path: the relational backend already
/// receives rows in this order from the database, but the search backend's
/// hits need the same ordering imposed in memory before the cursor can be
/// applied, so both go through the same function for the guarantee in the
/// per-keyset-response invariant to hold identically on either path.
pub fn apply_cursor(mut items: Vec<Transaction>, cursor: Option<Position>, limit: i64) -> (Vec<Transaction>, bool) {
    items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

    if let Some(pos) = cursor {
        items.retain(|t| (t.created_at, t.id) < (pos.created_at, pos.id));
    }

    let limit = limit.max(0) as usize;
    let has_more = items.len() > limit;
    items.truncate(limit);
    (items, has_more)
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_model::{Product, TransactionStatus, TransactionType};
    use bigdecimal::BigDecimal;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;
    use uuid::Uuid;

    fn txn(id: u8, minute: u32) -> Transaction {
        Transaction {
            id: Uuid::from_bytes([id; 16]),
            user_id: "u1".into(),
            transaction_type: TransactionType::Card,
            product: Product::Card,
            status: TransactionStatus::Completed,
            currency: "USD".into(),
            amount: BigDecimal::from_str("1.00").unwrap(),
            metadata: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn orders_and_truncates() {
        let items = vec![txn(1, 1), txn(2, 3), txn(3, 2)];
        let (page, has_more) = apply_cursor(items, None, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, Uuid::from_bytes([2; 16]));
        assert_eq!(page[1].id, Uuid::from_bytes([3; 16]));
        assert!(has_more);
    }

    #[test]
    fn applies_cursor_strictly_after() {
        let items = vec![txn(1, 1), txn(2, 3), txn(3, 2)];
        let cursor = Position {
            id: Uuid::from_bytes([2; 16]),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 3, 0).unwrap(),
        };
        let (page, has_more) = apply_cursor(items, Some(cursor), 10);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, Uuid::from_bytes([3; 16]));
        assert_eq!(page[1].id, Uuid::from_bytes([1; 16]));
        assert!(!has_more);
    }
}
