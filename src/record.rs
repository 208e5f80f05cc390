//! Progress records and shape normalization
//!
//! A progress record always carries three fields: the lesson map, the
//! project map, and an update timestamp. All "maybe missing field" handling
//! lives in [`ProgressRecord::normalize`], a total decode at the store
//! boundary; nothing downstream deals with partial payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::LamadError;

/// Which completion map a toggle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Lessons,
    Projects,
}

impl ProgressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressKind::Lessons => "lessons",
            ProgressKind::Projects => "projects",
        }
    }
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressKind {
    type Err = LamadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lessons" => Ok(ProgressKind::Lessons),
            "projects" => Ok(ProgressKind::Projects),
            other => Err(LamadError::Validation(format!(
                "unknown progress type: {other} (expected lessons or projects)"
            ))),
        }
    }
}

/// Per-user completion record, one per derived storage key per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub lessons: BTreeMap<String, bool>,
    pub projects: BTreeMap<String, bool>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Empty record stamped with the current time.
    pub fn empty() -> Self {
        Self {
            lessons: BTreeMap::new(),
            projects: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Shape-normalize an arbitrary JSON payload into a record.
    ///
    /// Total: each field is salvaged independently, so a record with a
    /// valid lesson map and a garbage timestamp keeps its lessons. Missing
    /// or malformed maps coerce to empty; a missing or malformed timestamp
    /// coerces to now. Idempotent over already-normalized payloads.
    pub fn normalize(value: &serde_json::Value) -> Self {
        let map_field = |name: &str| -> BTreeMap<String, bool> {
            value
                .get(name)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default()
        };

        let updated_at = value
            .get("updatedAt")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(Utc::now);

        Self {
            lessons: map_field("lessons"),
            projects: map_field("projects"),
            updated_at,
        }
    }

    /// Decode a persisted payload. Absent or unparsable text is treated as
    /// an empty record, never as an error.
    pub fn decode(payload: Option<&str>) -> Self {
        match payload.and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok()) {
            Some(value) => Self::normalize(&value),
            None => Self::empty(),
        }
    }

    /// Stamp the record with the current time. Called on every write.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Set a completion flag.
    pub fn set(&mut self, kind: ProgressKind, id: &str, value: bool) {
        let map = match kind {
            ProgressKind::Lessons => &mut self.lessons,
            ProgressKind::Projects => &mut self.projects,
        };
        map.insert(id.to_string(), value);
    }

    /// Whether an item is marked done.
    pub fn is_done(&self, kind: ProgressKind, id: &str) -> bool {
        let map = match kind {
            ProgressKind::Lessons => &self.lessons,
            ProgressKind::Projects => &self.projects,
        };
        map.get(id).copied().unwrap_or(false)
    }

    /// Completion counts and percentages against the page's item lists.
    pub fn completion(&self, lesson_ids: &[&str], project_ids: &[&str]) -> CompletionSummary {
        CompletionSummary {
            lessons: CategoryProgress::tally(&self.lessons, lesson_ids),
            projects: CategoryProgress::tally(&self.projects, project_ids),
        }
    }
}

/// Done/total/percent for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub done: usize,
    pub total: usize,
    pub percent: u32,
}

impl CategoryProgress {
    fn tally(map: &BTreeMap<String, bool>, ids: &[&str]) -> Self {
        let done = ids
            .iter()
            .filter(|id| map.get(**id).copied().unwrap_or(false))
            .count();
        let total = ids.len();
        let percent = if total == 0 {
            0
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u32
        };
        Self { done, total, percent }
    }
}

/// Completion summary rendered into progress bars by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub lessons: CategoryProgress,
    pub projects: CategoryProgress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_fills_missing_fields() {
        let record = ProgressRecord::normalize(&json!({}));
        assert!(record.lessons.is_empty());
        assert!(record.projects.is_empty());
    }

    #[test]
    fn test_normalize_idempotent() {
        let input = json!({
            "lessons": {"l1": true},
            "updatedAt": "2024-06-01T12:00:00Z"
        });
        let once = ProgressRecord::normalize(&input);
        let twice =
            ProgressRecord::normalize(&serde_json::to_value(&once).expect("serializable"));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_preserves_timestamp() {
        let record = ProgressRecord::normalize(&json!({
            "updatedAt": "2024-06-01T12:00:00Z"
        }));
        assert_eq!(record.updated_at.to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_normalize_salvages_fields_independently() {
        // Lessons valid, timestamp garbage: keep the lessons.
        let record = ProgressRecord::normalize(&json!({
            "lessons": {"l1": true},
            "projects": 42,
            "updatedAt": "not a date"
        }));
        assert_eq!(record.lessons.get("l1"), Some(&true));
        assert!(record.projects.is_empty());
    }

    #[test]
    fn test_decode_garbage_is_empty() {
        let record = ProgressRecord::decode(Some("{not json"));
        assert!(record.lessons.is_empty());
        assert!(record.projects.is_empty());

        let record = ProgressRecord::decode(None);
        assert!(record.lessons.is_empty());
    }

    #[test]
    fn test_serialized_layout_is_camel_case() {
        let record = ProgressRecord::empty();
        let value = serde_json::to_value(&record).expect("serializable");
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("lessons").is_some());
        assert!(value.get("projects").is_some());
    }

    #[test]
    fn test_set_and_is_done() {
        let mut record = ProgressRecord::empty();
        record.set(ProgressKind::Lessons, "l1", true);
        assert!(record.is_done(ProgressKind::Lessons, "l1"));
        assert!(!record.is_done(ProgressKind::Lessons, "l2"));
        assert!(!record.is_done(ProgressKind::Projects, "l1"));

        record.set(ProgressKind::Lessons, "l1", false);
        assert!(!record.is_done(ProgressKind::Lessons, "l1"));
    }

    #[test]
    fn test_completion_math() {
        let mut record = ProgressRecord::empty();
        record.set(ProgressKind::Lessons, "l1", true);
        record.set(ProgressKind::Lessons, "l2", false);
        record.set(ProgressKind::Projects, "p1", true);

        let summary = record.completion(&["l1", "l2", "l3"], &["p1"]);
        assert_eq!(summary.lessons.done, 1);
        assert_eq!(summary.lessons.total, 3);
        assert_eq!(summary.lessons.percent, 33);
        assert_eq!(summary.projects.percent, 100);
    }

    #[test]
    fn test_completion_empty_lists() {
        let record = ProgressRecord::empty();
        let summary = record.completion(&[], &[]);
        assert_eq!(summary.lessons.percent, 0);
        assert_eq!(summary.projects.percent, 0);
    }

    #[test]
    fn test_progress_kind_parse() {
        assert_eq!("lessons".parse::<ProgressKind>().unwrap(), ProgressKind::Lessons);
        assert_eq!("projects".parse::<ProgressKind>().unwrap(), ProgressKind::Projects);
        assert!("badges".parse::<ProgressKind>().is_err());
    }
}
