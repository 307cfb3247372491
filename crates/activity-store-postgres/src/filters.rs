use activity_model::TransactionFilter;
use sqlx::{Postgres, QueryBuilder as SqlxQueryBuilder};

const SELECT_COLUMNS: &str = r#"
    id, user_id, transaction_type, product, status, currency, amount,
    custom_metadata, search_content, created_at, updated_at
"#;

/// Builds the shared `WHERE` clause for a user's transactions, reused by
/// both the offset and cursor listing paths (and by the row-count query).
pub struct QueryBuilder<'a> {
    user_id: &'a str,
    filters: &'a TransactionFilter,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(user_id: &'a str, filters: &'a TransactionFilter) -> Self {
        Self { user_id, filters }
    }

    pub fn select_query(&self) -> SqlxQueryBuilder<'a, Postgres> {
        let mut qb = SqlxQueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM transactions"));
        self.push_where(&mut qb);
        qb
    }

    pub fn count_query(&self) -> SqlxQueryBuilder<'a, Postgres> {
        let mut qb = SqlxQueryBuilder::new("SELECT COUNT(*) FROM transactions");
        self.push_where(&mut qb);
        qb
    }

    fn push_where(&self, qb: &mut SqlxQueryBuilder<'a, Postgres>) {
        qb.push(" WHERE user_id = ").push_bind(self.user_id.to_string());

        let f = self.filters;
        if let Some(v) = f.transaction_type {
            qb.push(" AND transaction_type = ").push_bind(v);
        }
        if let Some(v) = f.product {
            qb.push(" AND product = ").push_bind(v);
        }
        if let Some(v) = f.status {
            qb.push(" AND status = ").push_bind(v);
        }
        if let Some(v) = &f.currency {
            qb.push(" AND currency = ").push_bind(v.clone());
        }
        if let Some(v) = f.start_date {
            qb.push(" AND created_at >= ").push_bind(v);
        }
        if let Some(v) = f.end_date {
            qb.push(" AND created_at <= ").push_bind(v);
        }
        if let Some(v) = &f.min_amount {
            qb.push(" AND amount >= ").push_bind(v.clone());
        }
        if let Some(v) = &f.max_amount {
            qb.push(" AND amount <= ").push_bind(v.clone());
        }
        if let Some(v) = &f.search_query {
            qb.push(" AND search_content ILIKE ")
                .push_bind(format!("%{}%", v.to_lowercase()));
        }
        if let Some(map) = &f.metadata_filters {
            for (key, value) in map {
                let text_value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                qb.push(" AND (custom_metadata->>")
                    .push_bind(key.clone())
                    .push(") IS NOT NULL AND (custom_metadata->>")
                    .push_bind(key.clone())
                    .push(") = ")
                    .push_bind(text_value);
            }
        }
    }
}
