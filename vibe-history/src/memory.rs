//! In-process history store

use parking_lot::RwLock;
use tracing::info;
use vibe_analysis::AnalysisResult;

use crate::record::{HistoryQuery, HistoryRecord, OwnerId};
use crate::repository::{HistoryError, HistoryRepository};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: Vec<HistoryRecord>,
}

/// History kept in memory, lost when dropped
///
/// Id assignment and insertion happen under one write lock, so readers see
/// a record either fully or not at all.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    inner: RwLock<Inner>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all owners
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryRepository for MemoryHistory {
    fn append(
        &self,
        owner: &OwnerId,
        result: AnalysisResult,
    ) -> Result<HistoryRecord, HistoryError> {
        let mut inner = self.inner.write();
        // The counter only grows, so ids stay distinct across clears
        inner.next_id += 1;
        let id = inner.next_id;

        let record = HistoryRecord {
            id,
            owner: owner.clone(),
            result,
        };
        inner.records.push(record.clone());
        drop(inner);

        info!(
            id,
            owner = %owner,
            analysis_type = %record.analysis_type(),
            "Appended history record"
        );
        Ok(record)
    }

    fn query(
        &self,
        owner: &OwnerId,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records: Vec<HistoryRecord> = self
            .inner
            .read()
            .records
            .iter()
            .filter(|r| &r.owner == owner && query.matches(r))
            .cloned()
            .collect();

        // Ids grow with append order, so they break timestamp ties
        records.sort_by(|a, b| {
            b.result
                .created_at
                .cmp(&a.result.created_at)
                .then(b.id.cmp(&a.id))
        });
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn clear(&self, owner: &OwnerId) -> Result<usize, HistoryError> {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        inner.records.retain(|r| &r.owner != owner);
        let removed = before - inner.records.len();
        drop(inner);

        info!(owner = %owner, removed, "Cleared history");
        Ok(removed)
    }
}
