//! Per-track audio feature vectors and the normalizer that builds them
//!
//! A vector is either complete (all eight channels usable) or absent.
//! Raw records with a missing, non-numeric or out-of-range channel are
//! rejected as [`Incomplete`] and never reach the statistics.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::track::RawTrack;

/// Number of feature channels carried by every vector
pub const CHANNEL_COUNT: usize = 8;

/// One named numeric dimension of a track's audio profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureChannel {
    Danceability,
    Energy,
    Valence,
    Tempo,
    Acousticness,
    Instrumentalness,
    Liveness,
    Speechiness,
}

impl FeatureChannel {
    /// All channels in canonical order
    pub const ALL: [FeatureChannel; CHANNEL_COUNT] = [
        FeatureChannel::Danceability,
        FeatureChannel::Energy,
        FeatureChannel::Valence,
        FeatureChannel::Tempo,
        FeatureChannel::Acousticness,
        FeatureChannel::Instrumentalness,
        FeatureChannel::Liveness,
        FeatureChannel::Speechiness,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureChannel::Danceability => "danceability",
            FeatureChannel::Energy => "energy",
            FeatureChannel::Valence => "valence",
            FeatureChannel::Tempo => "tempo",
            FeatureChannel::Acousticness => "acousticness",
            FeatureChannel::Instrumentalness => "instrumentalness",
            FeatureChannel::Liveness => "liveness",
            FeatureChannel::Speechiness => "speechiness",
        }
    }

    /// Position of this channel in [`FeatureChannel::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Whether values of this channel are confined to `[0, 1]`
    ///
    /// Tempo is the only unbounded channel (BPM, strictly positive).
    pub fn is_unit_interval(&self) -> bool {
        !matches!(self, FeatureChannel::Tempo)
    }

    fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        if self.is_unit_interval() {
            (0.0..=1.0).contains(&value)
        } else {
            value > 0.0
        }
    }
}

impl fmt::Display for FeatureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureChannel::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown feature channel: {}", s))
    }
}

/// Why a raw record could not be turned into a [`FeatureVector`]
#[derive(Debug, Clone, PartialEq)]
pub enum IncompleteReason {
    /// Record carries no usable track id
    MissingId,
    /// Channel absent (or JSON null)
    Missing(FeatureChannel),
    /// Channel present but not a number or numeric string
    NotNumeric(FeatureChannel),
    /// Channel numeric but non-finite or outside its valid range
    OutOfRange(FeatureChannel, f64),
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::MissingId => f.write_str("missing track id"),
            IncompleteReason::Missing(c) => write!(f, "missing {}", c),
            IncompleteReason::NotNumeric(c) => write!(f, "non-numeric {}", c),
            IncompleteReason::OutOfRange(c, v) => write!(f, "{} out of range: {}", c, v),
        }
    }
}

/// Per-track rejection: the track is excluded from aggregation but still
/// counted in the playlist's total
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Track {track_id} incomplete: {reason}")]
pub struct Incomplete {
    pub track_id: String,
    pub reason: IncompleteReason,
}

/// Complete audio feature vector for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub track_id: String,
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    /// Beats per minute
    pub tempo: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub speechiness: f64,
}

impl FeatureVector {
    /// Value of a single channel
    pub fn get(&self, channel: FeatureChannel) -> f64 {
        match channel {
            FeatureChannel::Danceability => self.danceability,
            FeatureChannel::Energy => self.energy,
            FeatureChannel::Valence => self.valence,
            FeatureChannel::Tempo => self.tempo,
            FeatureChannel::Acousticness => self.acousticness,
            FeatureChannel::Instrumentalness => self.instrumentalness,
            FeatureChannel::Liveness => self.liveness,
            FeatureChannel::Speechiness => self.speechiness,
        }
    }

    /// All channel values in [`FeatureChannel::ALL`] order
    pub fn values(&self) -> [f64; CHANNEL_COUNT] {
        FeatureChannel::ALL.map(|c| self.get(c))
    }
}

/// Validate and coerce a raw record into a [`FeatureVector`]
///
/// Numbers and numeric strings are accepted. A blank track id, a missing
/// or non-numeric channel, a non-positive tempo or a bounded channel
/// outside `[0, 1]` yields [`Incomplete`].
pub fn normalize(raw: &RawTrack) -> Result<FeatureVector, Incomplete> {
    if raw.track_id.trim().is_empty() {
        return Err(Incomplete {
            track_id: raw.track_id.clone(),
            reason: IncompleteReason::MissingId,
        });
    }

    let mut values = [0.0f64; CHANNEL_COUNT];
    for channel in FeatureChannel::ALL {
        values[channel.index()] =
            coerce(channel, raw.channel(channel)).map_err(|reason| Incomplete {
                track_id: raw.track_id.clone(),
                reason,
            })?;
    }

    let [
        danceability,
        energy,
        valence,
        tempo,
        acousticness,
        instrumentalness,
        liveness,
        speechiness,
    ] = values;
    Ok(FeatureVector {
        track_id: raw.track_id.clone(),
        danceability,
        energy,
        valence,
        tempo,
        acousticness,
        instrumentalness,
        liveness,
        speechiness,
    })
}

fn coerce(channel: FeatureChannel, value: Option<&Value>) -> Result<f64, IncompleteReason> {
    let number = match value {
        None | Some(Value::Null) => return Err(IncompleteReason::Missing(channel)),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .ok_or(IncompleteReason::NotNumeric(channel))?;

    if channel.accepts(number) {
        Ok(number)
    } else {
        Err(IncompleteReason::OutOfRange(channel, number))
    }
}
