//! Equal-width binning for histogram charts

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::features::FeatureChannel;
use crate::track::TrackSet;

/// Default bin count for per-feature histograms
pub const FEATURE_BINS: usize = 8;

/// Default bin count for generic distributions
pub const DEFAULT_BINS: usize = 10;

/// Width used when every value is identical
const DEGENERATE_WIDTH: f64 = f64::EPSILON;

/// Channels shown in the feature histogram chart
pub const HISTOGRAM_CHANNELS: [FeatureChannel; 3] = [
    FeatureChannel::Danceability,
    FeatureChannel::Energy,
    FeatureChannel::Valence,
];

/// One contiguous sub-range and the number of values inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl Bucket {
    /// Range label with fixed 2-decimal formatting, e.g. `"120.00-128.75"`
    pub fn label(&self) -> String {
        format!("{:.2}-{:.2}", self.start, self.end)
    }
}

/// Labelled bucket as consumed by chart renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCount {
    pub range: String,
    pub count: usize,
}

impl From<&Bucket> for RangeCount {
    fn from(bucket: &Bucket) -> Self {
        Self {
            range: bucket.label(),
            count: bucket.count,
        }
    }
}

/// Equal-width histogram
///
/// Buckets are ordered left to right, contiguous and non-overlapping:
/// `[start, end)` for all but the last, which is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    buckets: Vec<Bucket>,
}

impl Histogram {
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all bucket counts
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(Bucket::label).collect()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.buckets.iter().map(|b| b.count).collect()
    }

    /// Labelled distribution for serialization
    pub fn distribution(&self) -> Vec<RangeCount> {
        self.buckets.iter().map(RangeCount::from).collect()
    }
}

/// Partition `values` into `bin_count` equal-width buckets
///
/// A `bin_count` of zero is treated as one. Empty input yields `bin_count`
/// zero-width, zero-count buckets. When all values are equal every value
/// lands in the first bucket. Non-finite values are skipped; for finite
/// input the bucket counts always sum to `values.len()`.
pub fn bin(values: &[f64], bin_count: usize) -> Histogram {
    let bin_count = bin_count.max(1);

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() != values.len() {
        warn!(
            skipped = values.len() - finite.len(),
            "Skipping non-finite values while binning"
        );
    }

    if finite.is_empty() {
        let buckets = (0..bin_count)
            .map(|_| Bucket {
                start: 0.0,
                end: 0.0,
                count: 0,
            })
            .collect();
        return Histogram { buckets };
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min {
        (max - min) / bin_count as f64
    } else {
        DEGENERATE_WIDTH
    };

    let mut counts = vec![0usize; bin_count];
    for value in &finite {
        let idx = ((value - min) / width).floor();
        // `as usize` saturates, so a huge quotient still lands in the last bucket
        let idx = (idx.max(0.0) as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    let buckets = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let start = min + width * i as f64;
            let end = if i + 1 == bin_count && max > min {
                max
            } else {
                min + width * (i + 1) as f64
            };
            Bucket { start, end, count }
        })
        .collect();

    Histogram { buckets }
}

/// Histogram of one channel over the complete vectors of a track set
pub fn channel_histogram(
    tracks: &TrackSet,
    channel: FeatureChannel,
    bin_count: usize,
) -> Histogram {
    bin(&tracks.channel_values(channel), bin_count)
}

/// Danceability, energy and valence histograms, in that order
pub fn feature_histograms(tracks: &TrackSet, bin_count: usize) -> Vec<(FeatureChannel, Histogram)> {
    HISTOGRAM_CHANNELS
        .iter()
        .map(|&channel| (channel, channel_histogram(tracks, channel, bin_count)))
        .collect()
}
