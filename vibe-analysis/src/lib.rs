//! Audio-feature analytics for Vibe
//!
//! Normalizes per-track feature records, computes summary statistics and
//! equal-width histograms, and assembles tempo, mood and genre analyses.

mod analysis;
mod features;
mod histogram;
mod stats;
mod track;

pub use analysis::{
    genre_distribution, mood_map, AnalysisError, AnalysisPayload, AnalysisRequest, AnalysisResult,
    AnalysisType, Analyzer, GenreCount, GenreDistribution, MoodMap, MoodPoint, TempoTrends,
    TimeRange,
};
pub use features::{
    normalize, FeatureChannel, FeatureVector, Incomplete, IncompleteReason, CHANNEL_COUNT,
};
pub use histogram::{
    bin, channel_histogram, feature_histograms, Bucket, Histogram, RangeCount, DEFAULT_BINS,
    FEATURE_BINS, HISTOGRAM_CHANNELS,
};
pub use stats::{
    averages, channel_mean, channel_std_dev, mean, std_dev, ChannelStats, PlaylistStats,
};
pub use track::{RawTrack, TrackEntry, TrackSet};
