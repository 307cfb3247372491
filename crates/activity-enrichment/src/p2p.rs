use activity_model::NewTransaction;

use crate::TransactionStrategy;

pub struct P2pTransferStrategy;

impl TransactionStrategy for P2pTransferStrategy {
    fn build_search_content(&self, transaction: &NewTransaction) -> String {
        let mut parts = vec![
            format!("P2P transfer {} {}", transaction.amount, transaction.currency),
            transaction.status.as_str().to_string(),
        ];
        if let Some(metadata) = transaction.metadata.as_ref().and_then(|v| v.as_object()) {
            for key in ["peer_name", "peer_email", "direction"] {
                if let Some(v) = metadata.get(key).and_then(|v| v.as_str()) {
                    parts.push(v.to_string());
                }
            }
        }
        parts.join(" ")
    }
}
