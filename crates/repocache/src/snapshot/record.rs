//! Normalized repository record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Stable identity of a record. Immutable across syncs.
pub type RecordId = u64;

/// Repository visibility levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    /// GitHub Enterprise: visible to members of the enterprise.
    Internal,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
            Visibility::Internal => write!(f, "internal"),
        }
    }
}

/// One repository's normalized metadata, as stored in the snapshot file.
///
/// Field names match the persisted JSON document. Timestamps are kept as the
/// strings the API returned; use [`Record::activity_at`] for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    /// Size in KB.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

impl Record {
    /// Minimal record with only identity, name and last-update timestamp set.
    pub fn new(id: RecordId, name: impl Into<String>, updated_at: Option<&str>) -> Self {
        let name = name.into();
        Self {
            id,
            full_name: name.clone(),
            name,
            description: None,
            language: None,
            stargazers_count: 0,
            forks_count: 0,
            updated_at: updated_at.map(String::from),
            pushed_at: None,
            size: 0,
            private: false,
            fork: false,
            html_url: String::new(),
            clone_url: String::new(),
            topics: Vec::new(),
            archived: false,
            disabled: false,
            visibility: None,
        }
    }

    /// The activity timestamp used for watermarks and early stop.
    ///
    /// Uses `updated_at`, falling back to `pushed_at` when it is missing or
    /// empty. Returns `None` when the chosen value does not parse.
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        let raw = [self.updated_at.as_deref(), self.pushed_at.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())?;
        parse_timestamp(raw)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse an API timestamp leniently.
///
/// Accepts RFC 3339 (`2024-01-05T10:00:00Z`) and bare dates (`2024-01-05`,
/// interpreted as midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
