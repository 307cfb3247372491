use activity_model::{Product, Transaction, TransactionStatus, TransactionType};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

/// Mirrors the `transactions` table row-for-row; kept separate from
/// [`activity_model::Transaction`] because `search_content` is a storage
/// concern the API response never exposes.
#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub product: Product,
    pub status: TransactionStatus,
    pub currency: String,
    pub amount: BigDecimal,
    pub custom_metadata: Option<Json<serde_json::Value>>,
    #[allow(dead_code)]
    pub search_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            user_id: row.user_id,
            transaction_type: row.transaction_type,
            product: row.product,
            status: row.status,
            currency: row.currency,
            amount: row.amount,
            metadata: row.custom_metadata.map(|Json(v)| v),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
