//! Summary statistics over feature channels
//!
//! Empty input is not an error: means and standard deviations of an empty
//! set are `0`, which renderers show as "no data".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::{FeatureChannel, FeatureVector, CHANNEL_COUNT};
use crate::track::TrackSet;

/// Arithmetic mean, `0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    finite_or_zero(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by N), `0` for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    finite_or_zero(variance.sqrt())
}

/// Mean of one channel over a set of vectors
pub fn channel_mean<'a, I>(channel: FeatureChannel, vectors: I) -> f64
where
    I: IntoIterator<Item = &'a FeatureVector>,
{
    let values: Vec<f64> = vectors.into_iter().map(|v| v.get(channel)).collect();
    mean(&values)
}

/// Population standard deviation of one channel over a set of vectors
pub fn channel_std_dev<'a, I>(channel: FeatureChannel, vectors: I) -> f64
where
    I: IntoIterator<Item = &'a FeatureVector>,
{
    let values: Vec<f64> = vectors.into_iter().map(|v| v.get(channel)).collect();
    std_dev(&values)
}

/// Means of all eight channels, computed in a single pass
pub fn averages<'a, I>(vectors: I) -> BTreeMap<FeatureChannel, f64>
where
    I: IntoIterator<Item = &'a FeatureVector>,
{
    let mut sums = [0.0f64; CHANNEL_COUNT];
    let mut count = 0usize;
    for vector in vectors {
        for (sum, value) in sums.iter_mut().zip(vector.values()) {
            *sum += value;
        }
        count += 1;
    }

    FeatureChannel::ALL
        .iter()
        .map(|&channel| {
            let avg = if count == 0 {
                0.0
            } else {
                finite_or_zero(sums[channel.index()] / count as f64)
            };
            (channel, avg)
        })
        .collect()
}

/// Mean, spread and extent of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ChannelStats {
    /// All fields are `0` for empty input
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            mean: mean(values),
            std_dev: std_dev(values),
            min: finite_or_zero(min),
            max: finite_or_zero(max),
        }
    }
}

/// Playlist-level statistics for the summary and radar views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStats {
    /// Tracks in the snapshot, including those without features
    pub total_tracks: usize,
    /// Tracks with a complete feature vector
    pub analyzed_tracks: usize,
    pub averages: BTreeMap<FeatureChannel, f64>,
    pub std_devs: BTreeMap<FeatureChannel, f64>,
}

impl PlaylistStats {
    pub fn compute(tracks: &TrackSet) -> Self {
        let std_devs = FeatureChannel::ALL
            .iter()
            .map(|&channel| (channel, std_dev(&tracks.channel_values(channel))))
            .collect();

        Self {
            total_tracks: tracks.total_tracks(),
            analyzed_tracks: tracks.analyzed_tracks(),
            averages: averages(tracks.vectors()),
            std_devs,
        }
    }

    /// Per-channel mean/std-dev/min/max, in canonical channel order
    pub fn channel_stats(tracks: &TrackSet) -> Vec<(FeatureChannel, ChannelStats)> {
        FeatureChannel::ALL
            .iter()
            .map(|&channel| {
                (
                    channel,
                    ChannelStats::from_values(&tracks.channel_values(channel)),
                )
            })
            .collect()
    }
}

// Overflowing sums of huge finite inputs must still render
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
