use activity_model::NewTransaction;

use crate::TransactionStrategy;

pub struct CryptoStrategy;

impl TransactionStrategy for CryptoStrategy {
    fn build_search_content(&self, transaction: &NewTransaction) -> String {
        let mut parts = vec![
            format!("Crypto {} {}", transaction.amount, transaction.currency),
            transaction.status.as_str().to_string(),
        ];
        if let Some(metadata) = transaction.metadata.as_ref().and_then(|v| v.as_object()) {
            for key in ["crypto_type", "wallet_address"] {
                if let Some(v) = metadata.get(key).and_then(|v| v.as_str()) {
                    parts.push(v.to_string());
                }
            }
        }
        parts.join(" ")
    }
}
