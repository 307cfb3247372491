//! The on-the-wire event envelope shared by the publisher (encode) and the
//! consumer (decode), so both sides agree on the shape independently of
//! `Transaction`'s own `Serialize`/`Deserialize` impl — the envelope's
//! `transaction` field is read field-by-field rather than strictly, so a
//! message missing individual fields is a poison message the consumer can
//! recognize and ack, not a hard parse failure.

use activity_model::{NewTransaction, Product, TransactionStatus, TransactionType};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub transaction: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// An event type recognized by the consumer; anything else is logged and
/// acknowledged without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEventType {
    Created,
    Updated,
    Deleted,
}

impl WireEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transaction.created" => Some(Self::Created),
            "transaction.updated" => Some(Self::Updated),
            "transaction.deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionFieldError {
    #[error("transaction is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("transaction field '{0}' has an invalid value")]
    InvalidField(&'static str),
}

/// A transaction payload decoded from the envelope's `transaction` field,
/// still carrying the producer-assigned `id`, optional `created_at` and
/// optional external `version` the wire format allows but `NewTransaction`
/// does not.
#[derive(Debug, Clone)]
pub struct IncomingTransaction {
    pub id: Uuid,
    pub new: NewTransaction,
    pub search_content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub version: Option<i64>,
}

/// Parses `value` into an [`IncomingTransaction`]. Field-level problems
/// (missing or unparseable enum/amount) are reported distinctly from "no
/// transaction at all" so the consumer can route them to the DLQ instead of
/// silently acking a payload it simply couldn't enrich.
pub fn parse_transaction(value: &serde_json::Value) -> Result<IncomingTransaction, TransactionFieldError> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("id"))?;
    let id = Uuid::parse_str(id).map_err(|_| TransactionFieldError::InvalidField("id"))?;

    let user_id = value
        .get("user_id")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("user_id"))?
        .to_string();

    let transaction_type = value
        .get("transaction_type")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("transaction_type"))?;
    let transaction_type: TransactionType = serde_json::from_value(serde_json::Value::String(
        transaction_type.to_string(),
    ))
    .map_err(|_| TransactionFieldError::InvalidField("transaction_type"))?;

    let product = value
        .get("product")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("product"))?;
    let product: Product = serde_json::from_value(serde_json::Value::String(product.to_string()))
        .map_err(|_| TransactionFieldError::InvalidField("product"))?;

    let status = value
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("status"))?;
    let status: TransactionStatus =
        serde_json::from_value(serde_json::Value::String(status.to_string()))
            .map_err(|_| TransactionFieldError::InvalidField("status"))?;

    let currency = value
        .get("currency")
        .and_then(|v| v.as_str())
        .ok_or(TransactionFieldError::MissingField("currency"))?
        .to_string();

    let amount_value = value
        .get("amount")
        .ok_or(TransactionFieldError::MissingField("amount"))?;
    let amount = match amount_value {
        serde_json::Value::String(s) => s
            .parse::<BigDecimal>()
            .map_err(|_| TransactionFieldError::InvalidField("amount"))?,
        serde_json::Value::Number(_) => amount_value
            .to_string()
            .parse::<BigDecimal>()
            .map_err(|_| TransactionFieldError::InvalidField("amount"))?,
        _ => return Err(TransactionFieldError::InvalidField("amount")),
    };

    let metadata = value.get("metadata").cloned().filter(|v| !v.is_null());

    let search_content = value
        .get("search_content")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let created_at = value
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let version = value.get("version").and_then(|v| v.as_i64());

    Ok(IncomingTransaction {
        id,
        new: NewTransaction {
            user_id,
            transaction_type,
            product,
            status,
            currency,
            amount,
            metadata,
        },
        search_content,
        created_at,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_transaction() {
        let value = serde_json::json!({
            "id": "6f08a7d2-2c1a-4f18-9d1a-9b0e6ad8c111",
            "user_id": "u1",
            "transaction_type": "card",
            "product": "Card",
            "status": "completed",
            "currency": "USD",
            "amount": "150.00",
            "metadata": {"merchant_name": "Starbucks"},
        });
        let parsed = parse_transaction(&value).unwrap();
        assert_eq!(parsed.new.user_id, "u1");
        assert_eq!(parsed.new.currency, "USD");
    }

    #[test]
    fn rejects_missing_id() {
        let value = serde_json::json!({"user_id": "u1"});
        assert!(matches!(
            parse_transaction(&value),
            Err(TransactionFieldError::MissingField("id"))
        ));
    }

    #[test]
    fn rejects_invalid_enum() {
        let value = serde_json::json!({
            "id": "6f08a7d2-2c1a-4f18-9d1a-9b0e6ad8c111",
            "user_id": "u1",
            "transaction_type": "not-a-real-type",
            "product": "Card",
            "status": "completed",
            "currency": "USD",
            "amount": "10.00",
        });
        assert!(matches!(
            parse_transaction(&value),
            Err(TransactionFieldError::InvalidField("transaction_type"))
        ));
    }
}
