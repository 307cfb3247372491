use activity_breaker::BreakerError;
use activity_store_postgres::StoreError;
use activity_store_search::SearchError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("transaction {0} not found")]
    NotFound(Uuid),
    #[error("circuit breaker '{0}' is open")]
    BreakerOpen(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<BreakerError<StoreError>> for QueryError {
    fn from(err: BreakerError<StoreError>) -> Self {
        match err {
            BreakerError::Open(name) => QueryError::BreakerOpen(name),
            BreakerError::Inner(StoreError::NotFound(id)) => QueryError::NotFound(id),
            BreakerError::Inner(other) => QueryError::Store(other),
        }
    }
}

impl From<BreakerError<SearchError>> for QueryError {
    fn from(err: BreakerError<SearchError>) -> Self {
        match err {
            BreakerError::Open(name) => QueryError::BreakerOpen(name),
            BreakerError::Inner(other) => QueryError::Search(other),
        }
    }
}
