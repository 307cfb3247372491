use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of activity a transaction represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Card,
    P2p,
    Crypto,
    TopUp,
    Withdrawal,
    BillPayment,
    Earnings,
}

impl TransactionType {
    /// The strategy-registry key for this type, matching the original
    /// factory's string keys rather than the Rust enum's own spelling.
    pub fn strategy_key(&self) -> &'static str {
        match self {
            TransactionType::Card => "card",
            TransactionType::P2p => "p2p",
            TransactionType::Crypto => "crypto",
            TransactionType::TopUp => "top_up",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::BillPayment => "bill_payment",
            TransactionType::Earnings => "earnings",
        }
    }
}

/// The product line a transaction was raised against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product", rename_all = "snake_case")]
pub enum Product {
    #[serde(rename = "Card")]
    #[sqlx(rename = "Card")]
    Card,
    #[serde(rename = "P2P")]
    #[sqlx(rename = "P2P")]
    P2p,
    #[serde(rename = "Crypto")]
    #[sqlx(rename = "Crypto")]
    Crypto,
    #[serde(rename = "Earnings")]
    #[sqlx(rename = "Earnings")]
    Earnings,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Card => "Card",
            Product::P2p => "P2P",
            Product::Crypto => "Crypto",
            Product::Earnings => "Earnings",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

/// A single activity-feed record, as stored and as returned over the API.
///
/// `metadata` is the public field name; the relational column backing it is
/// `custom_metadata` (see `activity-store-postgres`), kept distinct from the
/// field name so the column can't collide with a future top-level `metadata`
/// concept in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub product: Product,
    pub status: TransactionStatus,
    pub currency: String,
    pub amount: BigDecimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating a new transaction, prior to the id/timestamps being
/// assigned by the store. The search-index copy additionally carries a
/// version number out of band (see `activity-store-search`); it is never
/// part of the canonical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub product: Product,
    pub status: TransactionStatus,
    pub currency: String,
    pub amount: BigDecimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Filter parameters shared by both offset and cursor listing paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub user_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub product: Option<Product>,
    pub status: Option<TransactionStatus>,
    pub currency: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub search_query: Option<String>,
    pub metadata_filters: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TransactionFilter {
    /// A stable key identifying this filter set, used to build cache keys.
    /// Mirrors the original's `_build_cache_key`: sorted field=value pairs so
    /// two filters with the same content always hash identically regardless
    /// of construction order.
    pub fn cache_key(&self, prefix: &str) -> String {
        let mut parts = Vec::new();
        if let Some(v) = &self.user_id {
            parts.push(format!("user_id={v}"));
        }
        if let Some(v) = &self.transaction_type {
            parts.push(format!("transaction_type={}", v.strategy_key()));
        }
        if let Some(v) = &self.product {
            parts.push(format!("product={}", v.as_str()));
        }
        if let Some(v) = &self.status {
            parts.push(format!("status={}", v.as_str()));
        }
        if let Some(v) = &self.currency {
            parts.push(format!("currency={v}"));
        }
        if let Some(v) = &self.start_date {
            parts.push(format!("start_date={}", v.to_rfc3339()));
        }
        if let Some(v) = &self.end_date {
            parts.push(format!("end_date={}", v.to_rfc3339()));
        }
        if let Some(v) = &self.min_amount {
            parts.push(format!("min_amount={v}"));
        }
        if let Some(v) = &self.max_amount {
            parts.push(format!("max_amount={v}"));
        }
        if let Some(v) = &self.search_query {
            parts.push(format!("search_query={v}"));
        }
        if let Some(map) = &self.metadata_filters {
            let mut entries: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    format!("meta.{k}={text}")
                })
                .collect();
            entries.sort();
            parts.extend(entries);
        }
        parts.sort();
        format!("{prefix}:{}", parts.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_distinguishes_metadata_filters() {
        let mut sent = serde_json::Map::new();
        sent.insert("direction".into(), serde_json::Value::String("sent".into()));
        let mut received = serde_json::Map::new();
        received.insert("direction".into(), serde_json::Value::String("received".into()));

        let base = TransactionFilter { user_id: Some("u1".into()), ..Default::default() };
        let sent_filter = TransactionFilter { metadata_filters: Some(sent), ..base.clone() };
        let received_filter = TransactionFilter { metadata_filters: Some(received), ..base.clone() };

        assert_ne!(base.cache_key("p"), sent_filter.cache_key("p"));
        assert_ne!(sent_filter.cache_key("p"), received_filter.cache_key("p"));
    }

    #[test]
    fn cache_key_stable_regardless_of_metadata_insertion_order() {
        let mut a = serde_json::Map::new();
        a.insert("direction".into(), serde_json::Value::String("sent".into()));
        a.insert("merchant_name".into(), serde_json::Value::String("Starbucks".into()));

        let mut b = serde_json::Map::new();
        b.insert("merchant_name".into(), serde_json::Value::String("Starbucks".into()));
        b.insert("direction".into(), serde_json::Value::String("sent".into()));

        let filter_a = TransactionFilter { metadata_filters: Some(a), ..Default::default() };
        let filter_b = TransactionFilter { metadata_filters: Some(b), ..Default::default() };

        assert_eq!(filter_a.cache_key("p"), filter_b.cache_key("p"));
    }
}
