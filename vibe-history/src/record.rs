//! History record types and queries

use serde::{Deserialize, Serialize};
use std::fmt;
use vibe_analysis::{AnalysisResult, AnalysisType, TimeRange};

/// Opaque owner/session identifier scoping a history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Persisted, immutable analysis result with identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub owner: OwnerId,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

impl HistoryRecord {
    pub fn analysis_type(&self) -> AnalysisType {
        self.result.analysis_type()
    }

    pub fn time_range(&self) -> TimeRange {
        self.result.time_range
    }
}

/// Filter for listing an owner's history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub analysis_type: Option<AnalysisType>,
    pub time_range: Option<TimeRange>,
    /// Keep only the newest `limit` records
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = Some(analysis_type);
        self
    }

    pub fn time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record passes the type and time-range filters
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        self.analysis_type
            .map_or(true, |t| t == record.analysis_type())
            && self.time_range.map_or(true, |r| r == record.time_range())
    }
}
