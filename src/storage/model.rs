use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Schema-less key/value pairs carried verbatim between client and store
pub type Fields = Map<String, Value>;

/// Keys every new date entry must carry
pub const REQUIRED_ENTRY_KEYS: [&str; 2] = ["location", "activity"];

/// Identifier of a date entry: the store-native object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateId(ObjectId);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid date id {0:?}: expected 24 hex digits")]
pub struct InvalidDateId(pub String);

impl DateId {
    /// Allocate a fresh, unique id
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl FromStr for DateId {
    type Err = InvalidDateId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s.trim())
            .map(Self)
            .map_err(|_| InvalidDateId(s.to_string()))
    }
}

impl TryFrom<String> for DateId {
    type Error = InvalidDateId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateId> for String {
    fn from(id: DateId) -> Self {
        id.0.to_hex()
    }
}

impl From<ObjectId> for DateId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl fmt::Display for DateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// One outing document with its embedded reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateEntry {
    #[serde(rename = "_id")]
    pub id: DateId,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub review_rating: f64,
    #[serde(flatten)]
    pub fields: Fields,
}

impl DateEntry {
    pub fn review_by(&self, user_id: &str) -> Option<&Review> {
        self.reviews.iter().find(|r| r.is_by(user_id))
    }
}

/// A user's review embedded in a date entry.
///
/// Reviews written before `user_id` was required may lack one; a stored
/// `user_id` or `date_added` of an unexpected type stays in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub rating: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Review {
    /// Build a review from a request body, stamping it with `now`.
    ///
    /// `user_id` overrides whatever the body says when given; otherwise the
    /// body must carry a string `user_id`. A `rating` key is always required.
    pub fn from_fields(
        mut body: Fields,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let body_user = body.remove("user_id");
        let user_id = match (user_id, body_user) {
            (Some(uid), _) => uid.to_string(),
            (None, Some(Value::String(uid))) if !uid.is_empty() => uid,
            (None, Some(_)) => return Err(ReviewError::UserIdNotString),
            (None, None) => return Err(ReviewError::MissingKey("user_id")),
        };
        let rating = body.remove("rating").ok_or(ReviewError::MissingKey("rating"))?;
        body.remove("date_added");

        Ok(Self {
            user_id: Some(user_id),
            rating,
            date_added: Some(now),
            extra: body,
        })
    }

    pub fn is_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    /// Numeric rating, if the stored value is a number
    pub fn numeric_rating(&self) -> Option<f64> {
        self.rating.as_f64()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("review must include {0}")]
    MissingKey(&'static str),
    #[error("review user_id must be a non-empty string")]
    UserIdNotString,
}

/// Body of a new date entry that passed the presence check
#[derive(Debug, Clone, PartialEq)]
pub struct NewDateEntry(Fields);

impl NewDateEntry {
    /// Accept the body only if every required key is present.
    ///
    /// A client `_id` is dropped. A new entry always starts with no reviews
    /// and a `review_rating` of `0.0`, whatever the body says.
    pub fn from_fields(mut fields: Fields) -> Option<Self> {
        if !REQUIRED_ENTRY_KEYS.iter().all(|k| fields.contains_key(*k)) {
            return None;
        }
        fields.remove("_id");
        fields.insert("reviews".to_string(), Value::Array(Vec::new()));
        fields.insert("review_rating".to_string(), Value::from(0.0));
        Some(Self(fields))
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }
}

/// Result of the guarded review insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Added,
    AlreadyReviewed,
    EntryMissing,
}

/// Strip keys a merge update must never touch: the id, and the review
/// state that only the review routes may change
pub fn mergeable_fields(mut fields: Fields) -> Fields {
    fields.remove("_id");
    fields.remove("reviews");
    fields.remove("review_rating");
    fields
}
