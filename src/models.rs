//! Row shapes returned by the backend procedures.
//!
//! DESIGN
//! ======
//! The backend owns every entity; this crate only reads rows. Listings and
//! exports pass the raw [`Row`] through in the backend's key order. The few
//! typed structs below name the fields the portal acts on, keep everything
//! else in `extra`, and decode each field leniently so one odd column never
//! drops a row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A backend row exactly as returned.
pub type Row = Map<String, Value>;

// =============================================================================
// BLOCKED USERS
// =============================================================================

/// Lifecycle of a no-show block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Active,
    Unblocked,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedUser {
    #[serde(default, deserialize_with = "lenient::uuid")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub blocked_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub blocked_until: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub consecutive_misses: Option<i64>,
    #[serde(default, deserialize_with = "lenient::status")]
    pub status: BlockStatus,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub days_remaining: Option<i64>,
    #[serde(default, deserialize_with = "lenient::uuid")]
    pub unblocked_by: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub unblocked_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Row,
}

impl BlockedUser {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BlockStatus::Active
    }
}

/// Row returned by the automatic no-show check for each newly blocked user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewlyBlocked {
    #[serde(default, deserialize_with = "lenient::uuid")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub consecutive_misses: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub blocked_until: Option<String>,
    #[serde(flatten)]
    pub extra: Row,
}

// =============================================================================
// BOOKINGS
// =============================================================================

/// Annadanam booking as read by the pass flow.
///
/// Admin listings and exports never go through this struct: they carry the
/// backend's [`Row`] untouched, so donations and contact messages have no
/// typed form at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnadanamBooking {
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: Option<String>,
    /// Half-hour label, e.g. `"1:00 PM - 1:30 PM"`.
    #[serde(default, deserialize_with = "lenient::text")]
    pub session: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub qty: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::uuid")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub attended_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: Row,
}

/// String value of `key` in a raw row.
#[must_use]
pub fn text<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Authenticated user as reported by the backend's auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

// =============================================================================
// LENIENT FIELDS
// =============================================================================

/// Field decoders for columns whose JSON type depends on the backend's
/// configuration (`numeric` as text, phone numbers as numbers). A value of
/// the wrong shape decodes as `None` instead of failing the whole row.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use uuid::Uuid;

    use super::BlockStatus;

    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn integer<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn uuid<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Uuid>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::String(s) => Uuid::parse_str(s.trim()).ok(),
            _ => None,
        })
    }

    pub fn status<'de, D: Deserializer<'de>>(de: D) -> Result<BlockStatus, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::String(s) => match s.as_str() {
                "active" => BlockStatus::Active,
                "unblocked" => BlockStatus::Unblocked,
                _ => BlockStatus::Unknown,
            },
            _ => BlockStatus::Unknown,
        })
    }
}
