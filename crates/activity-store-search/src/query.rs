use activity_model::TransactionFilter;
use serde_json::{json, Value};

/// Whether a search returns bare ids or full documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    IdsOnly,
    Documents,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

/// Builds the `bool` query body matching the original's clause layout:
/// `must` carries the user scope and optional fuzzy text match, `filter`
/// carries everything else (exact-match enums, amount range, date range,
/// per-metadata-key term clauses).
pub fn build_search_body(
    user_id: &str,
    query: Option<&str>,
    filters: &TransactionFilter,
    paging: Paging,
) -> Value {
    let mut must = vec![json!({"term": {"user_id": user_id}})];
    if let Some(q) = query {
        must.push(json!({
            "match": {
                "search_content": {
                    "query": q,
                    "fuzziness": "AUTO",
                    "operator": "or"
                }
            }
        }));
    }

    let mut filter = Vec::new();
    if let Some(v) = filters.transaction_type {
        filter.push(json!({"term": {"transaction_type": v.strategy_key()}}));
    }
    if let Some(v) = &filters.product {
        filter.push(json!({"term": {"product": v.as_str()}}));
    }
    if let Some(v) = &filters.status {
        filter.push(json!({"term": {"status": v.as_str()}}));
    }
    if let Some(v) = &filters.currency {
        filter.push(json!({"term": {"currency": v}}));
    }
    if let Some(map) = &filters.metadata_filters {
        for (key, value) in map {
            let text_value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            filter.push(json!({"term": {format!("metadata.{key}"): text_value}}));
        }
    }
    if filters.min_amount.is_some() || filters.max_amount.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(v) = &filters.min_amount {
            range.insert("gte".into(), json!(v.to_string()));
        }
        if let Some(v) = &filters.max_amount {
            range.insert("lte".into(), json!(v.to_string()));
        }
        filter.push(json!({"range": {"amount": range}}));
    }
    if filters.start_date.is_some() || filters.end_date.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(v) = filters.start_date {
            range.insert("gte".into(), json!(v.to_rfc3339()));
        }
        if let Some(v) = filters.end_date {
            range.insert("lte".into(), json!(v.to_rfc3339()));
        }
        filter.push(json!({"range": {"created_at": range}}));
    }

    let mut bool_query = serde_json::Map::new();
    bool_query.insert("must".into(), json!(must));
    if !filter.is_empty() {
        bool_query.insert("filter".into(), json!(filter));
    }

    json!({
        "query": {"bool": bool_query},
        "sort": [{"created_at": {"order": "desc"}}],
        "from": (paging.page.max(1) - 1) * paging.page_size,
        "size": paging.page_size,
    })
}
