mod pagination;
mod transaction;

pub use pagination::{CursorPage, OffsetPage};
pub use transaction::{
    NewTransaction, Product, Transaction, TransactionFilter, TransactionStatus, TransactionType,
};
