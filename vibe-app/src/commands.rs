//! Command definitions and handlers for the `vibe` binary

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vibe_analysis::{
    feature_histograms, AnalysisRequest, AnalysisType, Analyzer, FeatureChannel, PlaylistStats,
    RangeCount, RawTrack, TimeRange, TrackSet,
};
use vibe_history::{HistoryQuery, HistoryRepository, MemoryHistory, OwnerId, SqliteHistory};

use crate::config::Config;

/// Playlist audio-feature analytics
#[derive(Parser, Debug)]
#[command(name = "vibe", version, about)]
pub struct Cli {
    /// History database (overrides the configured path)
    #[arg(long, global = true, env = "VIBE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Keep history in memory for this invocation only
    #[arg(long, global = true)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a tempo, mood or genre analysis over a track list
    Analyze {
        /// Analysis type: tempo, mood or genre
        analysis_type: String,
        /// Track list as JSON (`-` for stdin)
        #[arg(long, short)]
        input: PathBuf,
        /// short_term, medium_term or long_term
        #[arg(long)]
        time_range: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        /// Print the result without recording it in history
        #[arg(long)]
        no_save: bool,
        #[arg(long)]
        tempo_bins: Option<usize>,
    },
    /// Playlist statistics and feature histograms
    Stats {
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long)]
        bins: Option<usize>,
    },
    /// List past analyses, newest first
    History {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long = "type")]
        analysis_type: Option<String>,
        #[arg(long)]
        time_range: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Most recent analysis of one type and time range
    Latest {
        analysis_type: String,
        #[arg(long)]
        time_range: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Delete every history record of an owner
    Clear {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Serialize)]
struct FeatureHistogramView {
    channel: FeatureChannel,
    distribution: Vec<RangeCount>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    #[serde(flatten)]
    stats: PlaylistStats,
    histograms: Vec<FeatureHistogramView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearView {
    owner: OwnerId,
    removed: usize,
}

/// Execute a parsed command line, writing JSON to `out`
pub fn run(cli: Cli, config: Config, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Command::Analyze {
            analysis_type,
            input,
            time_range,
            owner,
            no_save,
            tempo_bins,
        } => {
            // Reject the request before any track data is read
            let request = AnalysisRequest::parse(
                &analysis_type,
                time_range
                    .as_deref()
                    .unwrap_or_else(|| config.time_range.as_str()),
            )?;
            let tracks = read_tracks(&input)?;
            let analyzer = Analyzer::with_tempo_bins(tempo_bins.unwrap_or(config.tempo_bins));
            let result = analyzer.run(request, &tracks);

            if no_save {
                write_json(out, &result)
            } else {
                let repo = open_repository(&cli.database, cli.memory, &config)?;
                let record = repo.append(&owner_of(owner, &config), result)?;
                write_json(out, &record)
            }
        }
        Command::Stats { input, bins } => {
            let tracks = read_tracks(&input)?;
            let histograms = feature_histograms(&tracks, bins.unwrap_or(config.feature_bins))
                .into_iter()
                .map(|(channel, histogram)| FeatureHistogramView {
                    channel,
                    distribution: histogram.distribution(),
                })
                .collect();
            write_json(
                out,
                &StatsView {
                    stats: PlaylistStats::compute(&tracks),
                    histograms,
                },
            )
        }
        Command::History {
            owner,
            analysis_type,
            time_range,
            limit,
        } => {
            let query = HistoryQuery {
                analysis_type: analysis_type
                    .as_deref()
                    .map(str::parse::<AnalysisType>)
                    .transpose()?,
                time_range: time_range
                    .as_deref()
                    .map(str::parse::<TimeRange>)
                    .transpose()?,
                limit: Some(limit.unwrap_or(config.history_limit)),
            };
            let repo = open_repository(&cli.database, cli.memory, &config)?;
            let records = repo.query(&owner_of(owner, &config), &query)?;
            debug!(count = records.len(), "Listed history");
            write_json(out, &records)
        }
        Command::Latest {
            analysis_type,
            time_range,
            owner,
        } => {
            let request = AnalysisRequest::parse(
                &analysis_type,
                time_range
                    .as_deref()
                    .unwrap_or_else(|| config.time_range.as_str()),
            )?;
            let repo = open_repository(&cli.database, cli.memory, &config)?;
            let record = repo.latest(
                &owner_of(owner, &config),
                request.analysis_type,
                request.time_range,
            )?;
            write_json(out, &record)
        }
        Command::Clear { owner } => {
            let owner = owner_of(owner, &config);
            let repo = open_repository(&cli.database, cli.memory, &config)?;
            let removed = repo.clear(&owner)?;
            write_json(out, &ClearView { owner, removed })
        }
        Command::Config { save } => {
            if save {
                let path = Config::config_path();
                config
                    .save()
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), "Saved configuration");
            }
            write_json(out, &config)
        }
    }
}

fn owner_of(owner: Option<String>, config: &Config) -> OwnerId {
    OwnerId::new(owner.unwrap_or_else(|| config.owner.clone()))
}

fn open_repository(
    database: &Option<PathBuf>,
    memory: bool,
    config: &Config,
) -> Result<Box<dyn HistoryRepository>> {
    if memory {
        return Ok(Box::new(MemoryHistory::new()));
    }
    let path = database.as_ref().unwrap_or(&config.database_path);
    let repo = SqliteHistory::open(path)
        .with_context(|| format!("Failed to open history database {}", path.display()))?;
    Ok(Box::new(repo))
}

/// Read and normalize a JSON track list from a file or stdin
fn read_tracks(input: &Path) -> Result<TrackSet> {
    let content = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read track list from stdin")?;
        buf
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("Failed to read track list {}", input.display()))?
    };

    let raw: Vec<RawTrack> =
        serde_json::from_str(&content).context("Track list is not a JSON array of tracks")?;
    let tracks = TrackSet::from_raw(raw);
    info!(
        total = tracks.total_tracks(),
        analyzed = tracks.analyzed_tracks(),
        "Loaded track list"
    );
    Ok(tracks)
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                database_path: dir.path().join("history.db"),
                ..Config::default()
            };
            Self { dir, config }
        }

        fn write_tracks(&self, tracks: Value) -> PathBuf {
            let path = self.dir.path().join("tracks.json");
            fs::write(&path, tracks.to_string()).unwrap();
            path
        }

        fn run(&self, args: &[&str]) -> Result<Value> {
            let cli = Cli::try_parse_from(std::iter::once("vibe").chain(args.iter().copied()))?;
            let mut out = Vec::new();
            run(cli, self.config.clone(), &mut out)?;
            Ok(serde_json::from_slice(&out)?)
        }
    }

    fn track(id: &str, tempo: f64, genre: &str) -> Value {
        json!({
            "trackId": id,
            "name": format!("Song {}", id),
            "genres": [genre],
            "danceability": 0.5,
            "energy": 0.6,
            "valence": 0.4,
            "tempo": tempo,
            "acousticness": 0.1,
            "instrumentalness": 0.0,
            "liveness": 0.2,
            "speechiness": 0.05
        })
    }

    #[test]
    fn test_analyze_and_history() {
        let fx = Fixture::new();
        let input = fx.write_tracks(json!([
            track("a", 100.0, "rock"),
            track("b", 120.0, "pop"),
            track("c", 140.0, "pop"),
        ]));
        let input = input.to_str().unwrap();

        let tempo = fx.run(&["analyze", "tempo", "--input", input, "--tempo-bins", "4"]).unwrap();
        assert_eq!(tempo["analysisType"], "tempo");
        assert_eq!(tempo["payload"]["meanTempo"], 120.0);
        assert_eq!(tempo["payload"]["distribution"].as_array().unwrap().len(), 4);

        let genre = fx
            .run(&["analyze", "genre", "--input", input, "--time-range", "long_term"])
            .unwrap();
        assert_eq!(genre["payload"]["distribution"][0]["genre"], "pop");

        let history = fx.run(&["history"]).unwrap();
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["analysisType"], "genre");
        assert_eq!(history[1]["analysisType"], "tempo");

        let tempo_only = fx.run(&["history", "--type", "tempo"]).unwrap();
        assert_eq!(tempo_only.as_array().unwrap().len(), 1);

        let latest = fx.run(&["latest", "genre", "--time-range", "long_term"]).unwrap();
        assert_eq!(latest["id"], genre["id"]);

        let cleared = fx.run(&["clear"]).unwrap();
        assert_eq!(cleared["removed"], 2);
        assert!(fx.run(&["history"]).unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_type_rejected_before_reading_input() {
        let fx = Fixture::new();
        let missing = fx.dir.path().join("does-not-exist.json");
        let err = fx
            .run(&["analyze", "loudness", "--input", missing.to_str().unwrap()])
            .unwrap_err();
        assert!(err.to_string().contains("Invalid analysis type"));
    }

    #[test]
    fn test_no_save_leaves_history_empty() {
        let fx = Fixture::new();
        let input = fx.write_tracks(json!([track("a", 100.0, "rock")]));
        let result = fx
            .run(&["analyze", "mood", "--input", input.to_str().unwrap(), "--no-save"])
            .unwrap();
        assert_eq!(result["payload"]["moodMap"][0]["track"], "Song a");
        assert!(result.get("id").is_none());
        assert!(fx.run(&["history"]).unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_stats_counts_incomplete_tracks() {
        let fx = Fixture::new();
        let input = fx.write_tracks(json!([
            track("a", 100.0, "rock"),
            {"trackId": "b", "tempo": "fast"},
        ]));
        let stats = fx.run(&["stats", "--input", input.to_str().unwrap()]).unwrap();
        assert_eq!(stats["totalTracks"], 2);
        assert_eq!(stats["analyzedTracks"], 1);
        assert_eq!(stats["histograms"].as_array().unwrap().len(), 3);
        assert_eq!(stats["histograms"][1]["channel"], "energy");
    }

    #[test]
    fn test_malformed_track_fields_do_not_abort() {
        let fx = Fixture::new();
        let input = fx.write_tracks(json!([
            track("a", 100.0, "rock"),
            {"tempo": 130},
            {"trackId": "c", "genres": null},
            {"trackId": "d", "name": 7, "genres": ["rock", 3]},
        ]));
        let input = input.to_str().unwrap();

        let stats = fx.run(&["stats", "--input", input]).unwrap();
        assert_eq!(stats["totalTracks"], 4);
        assert_eq!(stats["analyzedTracks"], 1);

        let genre = fx.run(&["analyze", "genre", "--input", input, "--no-save"]).unwrap();
        assert_eq!(genre["payload"]["distribution"][0]["genre"], "rock");
        assert_eq!(genre["payload"]["distribution"][0]["count"], 2);
    }

    #[test]
    fn test_latest_missing_is_null() {
        let fx = Fixture::new();
        assert_eq!(fx.run(&["latest", "mood"]).unwrap(), Value::Null);
    }

    #[test]
    fn test_memory_flag_skips_database() {
        let fx = Fixture::new();
        let input = fx.write_tracks(json!([track("a", 100.0, "rock")]));
        let record = fx
            .run(&["--memory", "analyze", "tempo", "--input", input.to_str().unwrap()])
            .unwrap();
        assert_eq!(record["id"], 1);
        assert!(!fx.config.database_path.exists());
    }
}
