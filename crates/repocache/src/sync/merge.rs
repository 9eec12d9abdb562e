//! Delta reconciliation of fetched records against the prior snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::snapshot::{Record, RecordId};

/// How a cycle's records were combined with the prior snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Fetched records replaced the snapshot outright.
    Replace,
    /// Right-biased union of prior and fetched records.
    Union,
    /// A replace would have dropped records, so the union was kept instead.
    ShrinkGuarded,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Union => "union",
            Self::ShrinkGuarded => "shrink_guarded",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-biased union keyed by record identity.
///
/// Fetched records come first in fetch order, followed by prior-only records
/// in their prior order. When an identity appears more than once in `fresh`,
/// the last occurrence wins.
pub fn merge(prior: Vec<Record>, fresh: Vec<Record>) -> Vec<Record> {
    let mut merged: Vec<Record> = Vec::with_capacity(prior.len() + fresh.len());
    let mut index: HashMap<RecordId, usize> = HashMap::with_capacity(merged.capacity());

    for record in fresh {
        match index.get(&record.id) {
            Some(&slot) => merged[slot] = record,
            None => {
                index.insert(record.id, merged.len());
                merged.push(record);
            }
        }
    }

    for record in prior {
        if !index.contains_key(&record.id) {
            index.insert(record.id, merged.len());
            merged.push(record);
        }
    }

    merged
}

/// Decide between replacing the snapshot and merging into it.
///
/// A prior snapshot with records and a watermark is always merged into, even
/// when nothing was fetched. Otherwise the fetch ran to exhaustion and is a
/// full listing, so it replaces the prior records unless that would shrink
/// the snapshot while `allow_shrink` is off.
pub fn reconcile(
    prior: Option<Vec<Record>>,
    fresh: Vec<Record>,
    watermark: Option<DateTime<Utc>>,
    allow_shrink: bool,
) -> (Vec<Record>, MergeStrategy) {
    let prior = prior.unwrap_or_default();

    if !prior.is_empty() && watermark.is_some() {
        return (merge(prior, fresh), MergeStrategy::Union);
    }

    let replaced = merge(Vec::new(), fresh);
    if replaced.len() < prior.len() && !allow_shrink {
        tracing::warn!(
            prior = prior.len(),
            fetched = replaced.len(),
            "Full listing is smaller than the prior snapshot, keeping prior records"
        );
        return (merge(prior, replaced), MergeStrategy::ShrinkGuarded);
    }

    (replaced, MergeStrategy::Replace)
}
