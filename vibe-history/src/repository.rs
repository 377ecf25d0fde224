//! History repository interface

use thiserror::Error;
use vibe_analysis::{AnalysisResult, AnalysisType, TimeRange};

use crate::record::{HistoryQuery, HistoryRecord, OwnerId};

/// Errors that can occur during history operations
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Timestamp out of storable range")]
    TimestampOutOfRange,
    #[error("Corrupt history record {id}: {message}")]
    CorruptRecord { id: i64, message: String },
}

/// Append-only store of completed analyses
///
/// Implementations hand out distinct, never-reused ids to concurrent appends
/// and make each append visible atomically, so racing appends cannot collide.
/// Listings are newest-first by `created_at`; records with equal timestamps
/// list most-recent-append first. Reads return owned copies.
pub trait HistoryRepository: Send + Sync {
    /// Store a result for `owner`, assigning a fresh id
    fn append(
        &self,
        owner: &OwnerId,
        result: AnalysisResult,
    ) -> Result<HistoryRecord, HistoryError>;

    /// Records for `owner` passing `query`, newest first
    fn query(
        &self,
        owner: &OwnerId,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRecord>, HistoryError>;

    /// Remove every record of `owner`, returning how many were removed
    fn clear(&self, owner: &OwnerId) -> Result<usize, HistoryError>;

    /// All records for `owner`, newest first; empty history is an empty list
    fn list(&self, owner: &OwnerId) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.query(owner, &HistoryQuery::all())
    }

    /// Newest record of one analysis type and time range
    fn latest(
        &self,
        owner: &OwnerId,
        analysis_type: AnalysisType,
        time_range: TimeRange,
    ) -> Result<Option<HistoryRecord>, HistoryError> {
        let query = HistoryQuery::all()
            .analysis_type(analysis_type)
            .time_range(time_range)
            .limit(1);
        Ok(self.query(owner, &query)?.into_iter().next())
    }
}
