//! The relational store adapter: the audit-of-record copy of every
//! transaction, queryable by offset or keyset (cursor) pagination.
//!
//! Unlike `agent-sql`'s compile-time checked `query_as!`/`query_scalar!`
//! macros, this crate uses the runtime `sqlx::query_as` builder throughout.
//! The macros need a `.sqlx` query cache built against a live database at
//! compile time; this workspace has none, so the runtime builder is the
//! correct tool here rather than a compromise.

mod filters;
mod row;

use activity_cursor::Position;
use activity_model::{NewTransaction, OffsetPage, Transaction, TransactionFilter};
use uuid::Uuid;

pub use row::TransactionRow;

/// Embedded migrations, run via [`PostgresStore::migrate`].
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transaction {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: sqlx::PgPool,
}

impl PostgresStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    #[tracing::instrument(skip(self, transaction), err)]
    pub async fn create(
        &self,
        transaction: &NewTransaction,
        search_content: &str,
    ) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions
                (user_id, transaction_type, product, status, currency, amount, custom_metadata, search_content)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, transaction_type, product, status, currency, amount,
                      custom_metadata, search_content, created_at, updated_at
            "#,
        )
        .bind(&transaction.user_id)
        .bind(transaction.transaction_type)
        .bind(transaction.product)
        .bind(transaction.status)
        .bind(&transaction.currency)
        .bind(&transaction.amount)
        .bind(transaction.metadata.clone().map(sqlx::types::Json))
        .bind(search_content)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, user_id, transaction_type, product, status, currency, amount,
                   custom_metadata, search_content, created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self, filters), err)]
    pub async fn list_offset(
        &self,
        user_id: &str,
        filters: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<OffsetPage, StoreError> {
        let builder = filters::QueryBuilder::new(user_id, filters);

        let total: i64 = builder
            .count_query()
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let offset = (page.max(1) - 1) * page_size;
        let rows: Vec<TransactionRow> = builder
            .select_query()
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(offset)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let items = rows.into_iter().map(Transaction::from).collect();
        Ok(OffsetPage::new(items, total, page, page_size))
    }

    #[tracing::instrument(skip(self, filters), err)]
    pub async fn list_cursor(
        &self,
        user_id: &str,
        filters: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Result<(Vec<Transaction>, bool), StoreError> {
        let builder = filters::QueryBuilder::new(user_id, filters);
        let mut query = builder.select_query();

        if let Some(pos) = cursor {
            query
                .push(" AND (created_at < ")
                .push_bind(pos.created_at)
                .push(" OR (created_at = ")
                .push_bind(pos.created_at)
                .push(" AND id < ")
                .push_bind(pos.id)
                .push("))");
        }

        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit + 1);

        let rows: Vec<TransactionRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let has_more = rows.len() as i64 > limit;
        let items = rows
            .into_iter()
            .take(limit as usize)
            .map(Transaction::from)
            .collect();

        Ok((items, has_more))
    }

    /// Upserts a full record by its producer-assigned `id`, used by the
    /// consumer's audit write (the API create path goes through [`create`]
    /// instead, since it has no `id` yet to assign).
    #[tracing::instrument(skip(self, transaction), err)]
    pub async fn upsert(
        &self,
        id: Uuid,
        transaction: &NewTransaction,
        search_content: &str,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions
                (id, user_id, transaction_type, product, status, currency, amount,
                 custom_metadata, search_content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, now()))
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                transaction_type = EXCLUDED.transaction_type,
                product = EXCLUDED.product,
                status = EXCLUDED.status,
                currency = EXCLUDED.currency,
                amount = EXCLUDED.amount,
                custom_metadata = EXCLUDED.custom_metadata,
                search_content = EXCLUDED.search_content,
                updated_at = now()
            RETURNING id, user_id, transaction_type, product, status, currency, amount,
                      custom_metadata, search_content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&transaction.user_id)
        .bind(transaction.transaction_type)
        .bind(transaction.product)
        .bind(transaction.status)
        .bind(&transaction.currency)
        .bind(&transaction.amount)
        .bind(transaction.metadata.clone().map(sqlx::types::Json))
        .bind(search_content)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self, metadata), err)]
    pub async fn update_metadata(
        &self,
        id: Uuid,
        metadata: serde_json::Value,
        search_content: &str,
    ) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET custom_metadata = $2, search_content = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, user_id, transaction_type, product, status, currency, amount,
                      custom_metadata, search_content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(sqlx::types::Json(metadata))
        .bind(search_content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
