//! Analysis history for Vibe - storage and retrieval of completed analyses

mod memory;
mod record;
mod repository;
mod sqlite;

pub use memory::MemoryHistory;
pub use record::{HistoryQuery, HistoryRecord, OwnerId};
pub use repository::{HistoryError, HistoryRepository};
pub use sqlite::SqliteHistory;

/// Shared behavioural checks run against every backend
#[cfg(test)]
pub(crate) mod test_support {
    use crate::{HistoryQuery, HistoryRepository, OwnerId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use vibe_analysis::{
        AnalysisRequest, AnalysisResult, AnalysisType, Analyzer, RawTrack, TimeRange, TrackSet,
    };

    pub const CONCURRENT_THREADS: usize = 8;
    pub const CONCURRENT_PER_THREAD: usize = 25;
    pub const CONCURRENT_TOTAL: usize = CONCURRENT_THREADS * CONCURRENT_PER_THREAD;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn tracks() -> TrackSet {
        TrackSet::from_raw(vec![
            RawTrack::new("a").with_name("Alpha").with_genres(["pop"]),
            RawTrack::new("b").with_genres(["rock", "pop"]),
        ])
    }

    /// Analysis created `offset_secs` after a fixed base time
    pub fn result_at(
        analysis_type: AnalysisType,
        time_range: TimeRange,
        offset_secs: i64,
    ) -> AnalysisResult {
        Analyzer::new().run_at(
            AnalysisRequest::new(analysis_type, time_range),
            &tracks(),
            base_time() + Duration::seconds(offset_secs),
        )
    }

    pub fn tempo_result(time_range: TimeRange) -> AnalysisResult {
        use vibe_analysis::FeatureChannel;
        let set = TrackSet::from_raw((0..4).map(|i| {
            FeatureChannel::ALL
                .iter()
                .fold(RawTrack::new(format!("t{}", i)), |raw, &c| raw.with(c, 0.25))
                .with(FeatureChannel::Tempo, if i % 2 == 0 { 100.0 } else { 120.0 })
        }));
        Analyzer::with_tempo_bins(4).run_at(
            AnalysisRequest::new(AnalysisType::Tempo, time_range),
            &set,
            base_time() + Duration::nanoseconds(123_456_789),
        )
    }

    fn ids(records: &[crate::HistoryRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    pub fn check_empty_history(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("nobody");
        assert!(repo.list(&owner).unwrap().is_empty());
        assert!(repo
            .latest(&owner, AnalysisType::Tempo, TimeRange::MediumTerm)
            .unwrap()
            .is_none());
    }

    pub fn check_newest_first(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("me");
        let append = |analysis_type, offset| {
            repo.append(&owner, result_at(analysis_type, TimeRange::MediumTerm, offset))
                .unwrap()
        };
        let a = append(AnalysisType::Tempo, 10);
        let b = append(AnalysisType::Mood, 30);
        let c = append(AnalysisType::Genre, 20);

        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert_eq!(ids(&repo.list(&owner).unwrap()), vec![b.id, c.id, a.id]);
    }

    pub fn check_equal_timestamp_tie_break(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("me");
        let append = |analysis_type, offset| {
            repo.append(&owner, result_at(analysis_type, TimeRange::ShortTerm, offset))
                .unwrap()
        };
        let a = append(AnalysisType::Tempo, 0);
        let b = append(AnalysisType::Mood, 10);
        let c = append(AnalysisType::Genre, 20);
        let d = append(AnalysisType::Tempo, 20);

        assert_eq!(ids(&repo.list(&owner).unwrap()), vec![d.id, c.id, b.id, a.id]);
    }

    pub fn check_owner_scoping(repo: &dyn HistoryRepository) {
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");
        for (owner, analysis_type, offset) in [
            (&alice, AnalysisType::Tempo, 0),
            (&bob, AnalysisType::Mood, 1),
            (&alice, AnalysisType::Genre, 2),
        ] {
            repo.append(owner, result_at(analysis_type, TimeRange::MediumTerm, offset))
                .unwrap();
        }

        let records = repo.list(&alice).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.owner == alice));
        assert_eq!(repo.list(&bob).unwrap().len(), 1);
    }

    pub fn check_query_filters_and_limit(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("me");
        for (i, analysis_type) in [
            AnalysisType::Tempo,
            AnalysisType::Mood,
            AnalysisType::Tempo,
            AnalysisType::Genre,
            AnalysisType::Tempo,
        ]
        .into_iter()
        .enumerate()
        {
            let range = if i % 2 == 0 { TimeRange::ShortTerm } else { TimeRange::LongTerm };
            repo.append(&owner, result_at(analysis_type, range, i as i64)).unwrap();
        }

        let tempo = repo
            .query(&owner, &HistoryQuery::all().analysis_type(AnalysisType::Tempo))
            .unwrap();
        assert_eq!(tempo.len(), 3);
        assert!(tempo.iter().all(|r| r.analysis_type() == AnalysisType::Tempo));

        let long_term = repo
            .query(&owner, &HistoryQuery::all().time_range(TimeRange::LongTerm))
            .unwrap();
        assert_eq!(long_term.len(), 2);

        let newest_two = repo.query(&owner, &HistoryQuery::all().limit(2)).unwrap();
        assert_eq!(newest_two.len(), 2);
        assert_eq!(newest_two[0].analysis_type(), AnalysisType::Tempo);
        assert_eq!(newest_two[1].analysis_type(), AnalysisType::Genre);

        assert!(repo.query(&owner, &HistoryQuery::all().limit(0)).unwrap().is_empty());
    }

    pub fn check_latest(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("me");
        let append = |time_range, offset| {
            repo.append(&owner, result_at(AnalysisType::Genre, time_range, offset))
                .unwrap()
        };
        append(TimeRange::LongTerm, 0);
        let newest = append(TimeRange::LongTerm, 60);
        append(TimeRange::ShortTerm, 120);

        let latest = repo
            .latest(&owner, AnalysisType::Genre, TimeRange::LongTerm)
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newest.id);
        assert!(repo
            .latest(&owner, AnalysisType::Mood, TimeRange::LongTerm)
            .unwrap()
            .is_none());
    }

    pub fn check_clear(repo: &dyn HistoryRepository) {
        let me = OwnerId::new("me");
        let other = OwnerId::new("other");
        for (owner, analysis_type, offset) in [
            (&me, AnalysisType::Tempo, 0),
            (&me, AnalysisType::Mood, 1),
            (&other, AnalysisType::Mood, 2),
        ] {
            repo.append(owner, result_at(analysis_type, TimeRange::MediumTerm, offset))
                .unwrap();
        }

        assert_eq!(repo.clear(&me).unwrap(), 2);
        assert!(repo.list(&me).unwrap().is_empty());
        assert_eq!(repo.list(&other).unwrap().len(), 1);
        assert_eq!(repo.clear(&me).unwrap(), 0);

        // Ids are never handed out twice, even after a clear
        let again = repo
            .append(&me, result_at(AnalysisType::Tempo, TimeRange::MediumTerm, 3))
            .unwrap();
        assert!(again.id > 3);
    }

    pub fn check_returns_copies(repo: &dyn HistoryRepository) {
        let owner = OwnerId::new("me");
        let stored = repo
            .append(&owner, result_at(AnalysisType::Mood, TimeRange::MediumTerm, 0))
            .unwrap();

        let mut first = repo.list(&owner).unwrap();
        first[0].result.time_range = TimeRange::LongTerm;
        let second = repo.list(&owner).unwrap();
        assert_eq!(second[0], stored);
    }

    /// Spawn writer threads appending tempo results for `owner`
    fn spawn_writers<R>(repo: &Arc<R>, owner: &OwnerId) -> Vec<JoinHandle<Vec<i64>>>
    where
        R: HistoryRepository + 'static,
    {
        (0..CONCURRENT_THREADS)
            .map(|t| {
                let repo = Arc::clone(repo);
                let owner = owner.clone();
                thread::spawn(move || {
                    (0..CONCURRENT_PER_THREAD)
                        .map(|i| {
                            let offset = (t * 100 + i) as i64;
                            let result =
                                result_at(AnalysisType::Tempo, TimeRange::MediumTerm, offset);
                            repo.append(&owner, result).unwrap().id
                        })
                        .collect()
                })
            })
            .collect()
    }

    pub fn check_concurrent_appends<R>(repo: Arc<R>)
    where
        R: HistoryRepository + 'static,
    {
        let owner = OwnerId::new("shared");
        let ids: HashSet<i64> = spawn_writers(&repo, &owner)
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), CONCURRENT_TOTAL);

        let listed = repo.list(&owner).unwrap();
        assert_eq!(listed.len(), CONCURRENT_TOTAL);
        assert!(listed
            .windows(2)
            .all(|w| w[0].result.created_at >= w[1].result.created_at));
    }

    /// A reader listing while writers append only ever sees whole records
    pub fn check_reads_during_appends<R>(repo: Arc<R>)
    where
        R: HistoryRepository + 'static,
    {
        let owner = OwnerId::new("shared");
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let repo = Arc::clone(&repo);
            let owner = owner.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = 0;
                loop {
                    // Sampled before listing so the last pass follows every append
                    let finished = done.load(Ordering::Acquire);
                    let listed = repo.list(&owner).unwrap();

                    let ids: HashSet<i64> = listed.iter().map(|r| r.id).collect();
                    assert_eq!(ids.len(), listed.len());
                    for record in &listed {
                        let offset = (record.result.created_at - base_time()).num_seconds();
                        assert_eq!(record.owner, owner);
                        assert_eq!(
                            record.result,
                            result_at(AnalysisType::Tempo, TimeRange::MediumTerm, offset)
                        );
                    }
                    assert!(listed.len() >= seen);
                    seen = listed.len();

                    if finished {
                        return seen;
                    }
                }
            })
        };

        for writer in spawn_writers(&repo, &owner) {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        assert_eq!(reader.join().unwrap(), CONCURRENT_TOTAL);
    }
}
