//! Track records as handed over by the provider, and the normalized track set

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::features::{normalize, FeatureChannel, FeatureVector};

/// Raw per-track record, any field potentially absent or malformed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrack {
    /// Empty when the record has no usable id
    #[serde(
        default,
        alias = "track_id",
        alias = "id",
        deserialize_with = "lenient_id"
    )]
    pub track_id: String,
    /// Display name
    #[serde(
        default,
        alias = "track",
        deserialize_with = "lenient_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Genre tags resolved upstream from artist metadata
    #[serde(default, deserialize_with = "lenient_genres")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub danceability: Option<Value>,
    #[serde(default)]
    pub energy: Option<Value>,
    #[serde(default)]
    pub valence: Option<Value>,
    #[serde(default)]
    pub tempo: Option<Value>,
    #[serde(default)]
    pub acousticness: Option<Value>,
    #[serde(default)]
    pub instrumentalness: Option<Value>,
    #[serde(default)]
    pub liveness: Option<Value>,
    #[serde(default)]
    pub speechiness: Option<Value>,
}

impl RawTrack {
    /// Create a record with only an id (no features, no genres)
    pub fn new(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            ..Self::default()
        }
    }

    /// Raw value of a channel, if present
    pub fn channel(&self, channel: FeatureChannel) -> Option<&Value> {
        match channel {
            FeatureChannel::Danceability => self.danceability.as_ref(),
            FeatureChannel::Energy => self.energy.as_ref(),
            FeatureChannel::Valence => self.valence.as_ref(),
            FeatureChannel::Tempo => self.tempo.as_ref(),
            FeatureChannel::Acousticness => self.acousticness.as_ref(),
            FeatureChannel::Instrumentalness => self.instrumentalness.as_ref(),
            FeatureChannel::Liveness => self.liveness.as_ref(),
            FeatureChannel::Speechiness => self.speechiness.as_ref(),
        }
    }

    /// Set a channel to a numeric value
    pub fn with(mut self, channel: FeatureChannel, value: f64) -> Self {
        let value = Some(Value::from(value));
        match channel {
            FeatureChannel::Danceability => self.danceability = value,
            FeatureChannel::Energy => self.energy = value,
            FeatureChannel::Valence => self.valence = value,
            FeatureChannel::Tempo => self.tempo = value,
            FeatureChannel::Acousticness => self.acousticness = value,
            FeatureChannel::Instrumentalness => self.instrumentalness = value,
            FeatureChannel::Liveness => self.liveness = value,
            FeatureChannel::Speechiness => self.speechiness = value,
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }
}

/// Ids may arrive as strings or numbers; anything else leaves the id blank
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// A non-list value counts as no genres; non-string tags are dropped
fn lenient_genres<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(tags) => tags
            .into_iter()
            .filter_map(|tag| match tag {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// One track of a playlist snapshot after normalization
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub track_id: String,
    pub name: Option<String>,
    pub genres: Vec<String>,
    /// `None` when the raw record was incomplete
    pub features: Option<FeatureVector>,
}

impl TrackEntry {
    /// Display name, falling back to the track id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.track_id)
    }
}

/// Ordered, normalized playlist snapshot
///
/// Every input track is kept (so `total_tracks` counts them all); only
/// tracks with a complete vector take part in feature statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    entries: Vec<TrackEntry>,
}

impl TrackSet {
    /// Normalize raw records, preserving playlist order
    pub fn from_raw<I>(tracks: I) -> Self
    where
        I: IntoIterator<Item = RawTrack>,
    {
        let entries: Vec<TrackEntry> = tracks
            .into_iter()
            .map(|raw| {
                let features = match normalize(&raw) {
                    Ok(vector) => Some(vector),
                    Err(incomplete) => {
                        debug!(
                            track_id = %incomplete.track_id,
                            reason = %incomplete.reason,
                            "Excluding incomplete track"
                        );
                        None
                    }
                };
                TrackEntry {
                    track_id: raw.track_id,
                    name: raw.name,
                    genres: raw.genres,
                    features,
                }
            })
            .collect();

        let set = Self { entries };
        debug!(
            total = set.total_tracks(),
            analyzed = set.analyzed_tracks(),
            "Normalized track set"
        );
        set
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    /// Complete feature vectors in playlist order
    pub fn vectors(&self) -> impl Iterator<Item = &FeatureVector> + '_ {
        self.entries.iter().filter_map(|e| e.features.as_ref())
    }

    /// Values of one channel over all complete vectors
    pub fn channel_values(&self, channel: FeatureChannel) -> Vec<f64> {
        self.vectors().map(|v| v.get(channel)).collect()
    }

    /// Number of tracks in the snapshot, including incomplete ones
    pub fn total_tracks(&self) -> usize {
        self.entries.len()
    }

    /// Number of tracks with a complete feature vector
    pub fn analyzed_tracks(&self) -> usize {
        self.vectors().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RawTrack> for TrackSet {
    fn from_iter<I: IntoIterator<Item = RawTrack>>(iter: I) -> Self {
        Self::from_raw(iter)
    }
}
