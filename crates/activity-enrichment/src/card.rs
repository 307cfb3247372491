use activity_model::NewTransaction;

use crate::TransactionStrategy;

pub struct CardPaymentStrategy;

impl TransactionStrategy for CardPaymentStrategy {
    fn build_search_content(&self, transaction: &NewTransaction) -> String {
        let mut parts = vec![
            format!("Card payment {} {}", transaction.amount, transaction.currency),
            status_word(transaction),
        ];
        if let Some(metadata) = transaction.metadata.as_ref().and_then(|v| v.as_object()) {
            for key in ["merchant_name", "merchant_category", "location"] {
                if let Some(v) = metadata.get(key).and_then(|v| v.as_str()) {
                    parts.push(v.to_string());
                }
            }
        }
        parts.join(" ")
    }
}

fn status_word(transaction: &NewTransaction) -> String {
    transaction.status.as_str().to_string()
}
