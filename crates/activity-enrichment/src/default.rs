use activity_model::NewTransaction;

use crate::TransactionStrategy;

/// Fallback for every transaction type without a dedicated strategy:
/// top-up, withdrawal, bill payment, earnings.
pub struct DefaultStrategy;

impl TransactionStrategy for DefaultStrategy {
    fn build_search_content(&self, transaction: &NewTransaction) -> String {
        format!(
            "{} {} {} {}",
            transaction.transaction_type.strategy_key(),
            transaction.amount,
            transaction.currency,
            transaction.status.as_str(),
        )
    }
}
