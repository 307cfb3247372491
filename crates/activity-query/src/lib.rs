//! The dual-path query service: one cache-aside, cursor-encoding front end
//! ([`QueryService`]) parameterized over whichever [`QueryBackend`] was
//! selected at process startup — the relational store as primary
//! ([`RelationalBackend`]) or the search index as primary
//! ([`SearchBackend`]). Both satisfy the same trait, so call sites never
//! know which is active.

mod backend;
mod cursor_util;
mod error;
mod service;

pub use backend::{QueryBackend, RelationalBackend, SearchBackend};
pub use error::QueryError;
pub use service::{QueryService, RELATIONAL_CACHE_NAMESPACE, SEARCH_CACHE_NAMESPACE};
