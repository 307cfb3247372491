//! Opaque keyset-pagination cursors.
//!
//! A cursor encodes the `(created_at, id)` pair of the last row seen in the
//! canonical `(created_at DESC, id DESC)` listing order, so the next page can
//! resume with `WHERE (created_at, id) < (cursor.created_at, cursor.id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    NotBase64,
    #[error("cursor does not contain valid json")]
    NotJson,
    #[error("cursor is missing required fields")]
    MissingFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CursorData {
    id: Uuid,
    created_at: DateTime<Utc>,
}

/// The decoded position a cursor resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Encodes a position into an opaque, URL-safe cursor string.
///
/// Serializes the cursor payload with sorted keys before encoding so that
/// the same position always produces the same cursor string.
pub fn encode(position: Position) -> String {
    let data = CursorData {
        id: position.id,
        created_at: position.created_at,
    };
    // serde_json's map serialization for a fixed-field struct already emits
    // fields in declaration order; sort explicitly via a BTreeMap so the
    // encoding is stable even if the struct's field order ever changes.
    let value = serde_json::to_value(&data).expect("cursor data always serializes");
    let sorted: std::collections::BTreeMap<String, serde_json::Value> =
        value.as_object().expect("cursor data is an object").clone().into_iter().collect();
    let json = serde_json::to_string(&sorted).expect("sorted map always serializes");
    base64::encode_config(json.as_bytes(), base64::URL_SAFE_NO_PAD)
}

/// Decodes a cursor string produced by [`encode`]. Returns an error for any
/// malformed, tampered, or foreign input rather than panicking.
pub fn decode(cursor: &str) -> Result<Position, CursorError> {
    let bytes =
        base64::decode_config(cursor, base64::URL_SAFE_NO_PAD).map_err(|_| CursorError::NotBase64)?;
    let data: CursorData = serde_json::from_slice(&bytes).map_err(|_| CursorError::NotJson)?;
    Ok(Position {
        id: data.id,
        created_at: data.created_at,
    })
}

/// `true` iff `cursor` decodes successfully.
pub fn is_valid(cursor: &str) -> bool {
    decode(cursor).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let pos = Position {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let cursor = encode(pos);
        let decoded = decode(&cursor).unwrap();
        assert_eq!(decoded.id, pos.id);
        // Round trip through RFC3339 may reorder the timezone representation
        // but must preserve the instant.
        assert_eq!(decoded.created_at.timestamp_micros(), pos.created_at.timestamp_micros());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not a cursor").is_err());
        assert!(!is_valid("not a cursor"));
    }

    #[test]
    fn rejects_tampered_payload() {
        let pos = Position {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let mut cursor = encode(pos);
        cursor.push('x');
        assert!(decode(&cursor).is_err());
    }
}
