//! Analysis classification: dispatches a requested analysis type to the
//! matching statistics and assembles the result payload
//!
//! Three payload shapes share one result envelope; the shape is a tagged
//! union so both producers and renderers match on it exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::features::FeatureChannel;
use crate::histogram::{bin, RangeCount, DEFAULT_BINS};
use crate::stats::{mean, std_dev};
use crate::track::TrackSet;

/// Errors that reject an analysis request before any computation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid analysis type: {0} (expected tempo, mood or genre)")]
    InvalidAnalysisType(String),
    #[error("Invalid time range: {0} (expected short_term, medium_term or long_term)")]
    InvalidTimeRange(String),
}

/// Requested classification of the output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Tempo,
    Mood,
    Genre,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 3] = [
        AnalysisType::Tempo,
        AnalysisType::Mood,
        AnalysisType::Genre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Tempo => "tempo",
            AnalysisType::Mood => "mood",
            AnalysisType::Genre => "genre",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| AnalysisError::InvalidAnalysisType(s.to_string()))
    }
}

/// Listening-history window an analysis is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [
        TimeRange::ShortTerm,
        TimeRange::MediumTerm,
        TimeRange::LongTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| AnalysisError::InvalidTimeRange(s.to_string()))
    }
}

/// Mean, spread and binned distribution of tempo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoTrends {
    pub mean_tempo: f64,
    pub std_tempo: f64,
    pub distribution: Vec<RangeCount>,
}

/// One point of the valence x energy scatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPoint {
    pub track: String,
    pub valence: f64,
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodMap {
    pub mood_map: Vec<MoodPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreDistribution {
    pub distribution: Vec<GenreCount>,
}

/// Analysis output, one shape per [`AnalysisType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysisType", content = "payload", rename_all = "lowercase")]
pub enum AnalysisPayload {
    Tempo(TempoTrends),
    Mood(MoodMap),
    Genre(GenreDistribution),
}

impl AnalysisPayload {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            AnalysisPayload::Tempo(_) => AnalysisType::Tempo,
            AnalysisPayload::Mood(_) => AnalysisType::Mood,
            AnalysisPayload::Genre(_) => AnalysisType::Genre,
        }
    }
}

/// Result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub time_range: TimeRange,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: AnalysisPayload,
}

impl AnalysisResult {
    pub fn analysis_type(&self) -> AnalysisType {
        self.payload.analysis_type()
    }
}

/// Validated analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub analysis_type: AnalysisType,
    pub time_range: TimeRange,
}

impl AnalysisRequest {
    pub fn new(analysis_type: AnalysisType, time_range: TimeRange) -> Self {
        Self {
            analysis_type,
            time_range,
        }
    }

    /// Parse a request from its wire names
    pub fn parse(analysis_type: &str, time_range: &str) -> Result<Self, AnalysisError> {
        Ok(Self {
            analysis_type: analysis_type.parse()?,
            time_range: time_range.parse()?,
        })
    }
}

/// Runs analyses over a normalized track set
///
/// Stateless apart from its bin configuration; every call works on the
/// borrowed track set and returns an independent result.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    tempo_bins: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Create an analyzer with the generic bin count for tempo
    pub fn new() -> Self {
        Self::with_tempo_bins(DEFAULT_BINS)
    }

    pub fn with_tempo_bins(tempo_bins: usize) -> Self {
        Self {
            tempo_bins: tempo_bins.max(1),
        }
    }

    pub fn tempo_bins(&self) -> usize {
        self.tempo_bins
    }

    /// Run a request, stamping the result with the current time
    pub fn run(&self, request: AnalysisRequest, tracks: &TrackSet) -> AnalysisResult {
        self.run_at(request, tracks, Utc::now())
    }

    /// Run a request with an explicit creation time
    pub fn run_at(
        &self,
        request: AnalysisRequest,
        tracks: &TrackSet,
        created_at: DateTime<Utc>,
    ) -> AnalysisResult {
        AnalysisResult {
            time_range: request.time_range,
            created_at,
            payload: self.payload(request.analysis_type, tracks),
        }
    }

    /// Parse and run; unknown types are rejected before the tracks are read
    pub fn analyze(
        &self,
        analysis_type: &str,
        time_range: &str,
        tracks: &TrackSet,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = AnalysisRequest::parse(analysis_type, time_range)?;
        Ok(self.run(request, tracks))
    }

    pub fn payload(&self, analysis_type: AnalysisType, tracks: &TrackSet) -> AnalysisPayload {
        debug!(%analysis_type, tracks = tracks.total_tracks(), "Running analysis");
        match analysis_type {
            AnalysisType::Tempo => AnalysisPayload::Tempo(self.tempo_trends(tracks)),
            AnalysisType::Mood => AnalysisPayload::Mood(mood_map(tracks)),
            AnalysisType::Genre => AnalysisPayload::Genre(genre_distribution(tracks)),
        }
    }

    pub fn tempo_trends(&self, tracks: &TrackSet) -> TempoTrends {
        let tempos = tracks.channel_values(FeatureChannel::Tempo);
        TempoTrends {
            mean_tempo: mean(&tempos),
            std_tempo: std_dev(&tempos),
            distribution: bin(&tempos, self.tempo_bins).distribution(),
        }
    }
}

/// Valence x energy scatter, one point per analyzed track in playlist order
pub fn mood_map(tracks: &TrackSet) -> MoodMap {
    let mood_map = tracks
        .entries()
        .iter()
        .filter_map(|entry| {
            entry.features.as_ref().map(|v| MoodPoint {
                track: entry.label().to_string(),
                valence: v.valence,
                energy: v.energy,
            })
        })
        .collect();
    MoodMap { mood_map }
}

/// Genre occurrence counts, descending by count, ties in first-seen order
///
/// Counts every non-blank tag of every track, whether or not the track has
/// audio features.
pub fn genre_distribution(tracks: &TrackSet) -> GenreDistribution {
    let mut distribution: Vec<GenreCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for genre in tracks.entries().iter().flat_map(|e| e.genres.iter()) {
        let genre = genre.trim();
        if genre.is_empty() {
            continue;
        }
        match index.get(genre) {
            Some(&i) => distribution[i].count += 1,
            None => {
                index.insert(genre, distribution.len());
                distribution.push(GenreCount {
                    genre: genre.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    distribution.sort_by(|a, b| b.count.cmp(&a.count));
    GenreDistribution { distribution }
}
