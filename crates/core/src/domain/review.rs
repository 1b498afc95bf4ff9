use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::validation::parse_rate;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub String);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", alias = "id")]
    pub id: ReviewId,
    #[serde(deserialize_with = "rate_from_number_or_string")]
    pub rate: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewFields {
    pub rate: u8,
    pub comment: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReviewPatch {
    pub rate: Option<u8>,
    pub comment: Option<String>,
}

impl From<ReviewFields> for ReviewPatch {
    fn from(fields: ReviewFields) -> Self {
        Self { rate: Some(fields.rate), comment: Some(fields.comment) }
    }
}

/// Older snapshots stored the rate exactly as submitted, sometimes as a string.
fn rate_from_number_or_string<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_rate(&value).ok_or_else(|| D::Error::custom(format!("invalid review rate `{value}`")))
}

impl Review {
    pub fn new(id: ReviewId, fields: ReviewFields, now: DateTime<Utc>) -> Self {
        Self { id, rate: fields.rate, comment: fields.comment, created_at: now, updated_at: None }
    }

    pub fn apply(&mut self, patch: ReviewPatch, now: DateTime<Utc>) {
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
        self.updated_at = Some(now);
    }
}
