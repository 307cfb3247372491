use activity_model::{NewTransaction, Product, Transaction, TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The document shape stored in the search index. `amount` is intentionally
/// `f64` here — the index is never the precision authority for money, the
/// relational store is (see module docs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub product: Product,
    pub status: TransactionStatus,
    pub currency: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SearchDocument {
    pub fn from_new(
        id: Uuid,
        created_at: DateTime<Utc>,
        transaction: &NewTransaction,
        search_content: String,
    ) -> Self {
        use std::str::FromStr;
        Self {
            id,
            user_id: transaction.user_id.clone(),
            transaction_type: transaction.transaction_type,
            product: transaction.product,
            status: transaction.status,
            currency: transaction.currency.clone(),
            amount: f64::from_str(&transaction.amount.to_string()).unwrap_or_default(),
            created_at,
            search_content: Some(search_content),
            metadata: transaction.metadata.clone(),
        }
    }
}

impl From<Transaction> for SearchDocument {
    fn from(t: Transaction) -> Self {
        use std::str::FromStr;
        Self {
            id: t.id,
            user_id: t.user_id,
            transaction_type: t.transaction_type,
            product: t.product,
            status: t.status,
            currency: t.currency,
            amount: f64::from_str(&t.amount.to_string()).unwrap_or_default(),
            created_at: t.created_at,
            search_content: None,
            metadata: t.metadata,
        }
    }
}

/// Reconstructs a [`Transaction`] from a search-index hit for the
/// search-primary query path. `amount` round-trips through its string
/// representation rather than a raw float-to-decimal cast, since the
/// relational store (not the index) is the precision authority; callers on
/// this path accept that as the tradeoff for reading from the index.
/// `updated_at` is always `None` — the index does not carry it.
impl From<SearchDocument> for Transaction {
    fn from(doc: SearchDocument) -> Self {
        use bigdecimal::BigDecimal;
        use std::str::FromStr;
        Self {
            id: doc.id,
            user_id: doc.user_id,
            transaction_type: doc.transaction_type,
            product: doc.product,
            status: doc.status,
            currency: doc.currency,
            amount: BigDecimal::from_str(&doc.amount.to_string()).unwrap_or_default(),
            metadata: doc.metadata,
            created_at: doc.created_at,
            updated_at: None,
        }
    }
}
