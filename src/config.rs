//! Matching configuration.
//!
//! Loaded from TOML; every field has a default so an absent file or a
//! partial file is fine. Paths to the stores come from the environment.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::genre;

pub const CONFIG_PATH_ENV: &str = "MIXWHEEL_CONFIG";
pub const DB_PATH_ENV: &str = "MIXWHEEL_DB_PATH";
pub const STORE_PATH_ENV: &str = "MIXWHEEL_STORE_PATH";

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// BPM tolerance bounds. A bound `b` turns a reference tempo into a window
/// edge `bpm / (1 + b)`; each pair is `(upper, lower)` and yields the window
/// `[bpm / (1 + upper), bpm / (1 + lower)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ToleranceConfig {
    pub same_key_upper: f64,
    pub same_key_lower: f64,
    /// Window for candidates a semitone below the target code, sped up to land on it.
    pub up_key_upper: f64,
    pub up_key_lower: f64,
    /// Window for candidates a semitone above the target code, slowed down to land on it.
    pub down_key_upper: f64,
    pub down_key_lower: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            same_key_upper: 0.0293,
            same_key_lower: -0.0284,
            up_key_upper: 0.0905,
            up_key_lower: 0.0293,
            down_key_upper: -0.0284,
            down_key_lower: -0.083,
        }
    }
}

impl ToleranceConfig {
    fn pairs(&self) -> [(&'static str, f64, f64); 3] {
        [
            ("same_key", self.same_key_upper, self.same_key_lower),
            ("up_key", self.up_key_upper, self.up_key_lower),
            ("down_key", self.down_key_upper, self.down_key_lower),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WeightConfig {
    pub camelot: f64,
    pub bpm: f64,
    pub similarity: f64,
    pub freshness: f64,
    pub genre: f64,
    pub label: f64,
    pub artist: f64,
    pub energy: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            camelot: 0.20,
            bpm: 0.20,
            similarity: 0.15,
            freshness: 0.10,
            genre: 0.10,
            label: 0.05,
            artist: 0.10,
            energy: 0.10,
        }
    }
}

impl WeightConfig {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.camelot,
            self.bpm,
            self.similarity,
            self.freshness,
            self.genre,
            self.label,
            self.artist,
            self.energy,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ResultsConfig {
    pub max_results: usize,
    pub result_threshold: usize,
    pub cutoff_threshold_score: f64,
    /// Entries skipped at the head of the same-key bucket.
    pub same_key_start_index: usize,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            max_results: 40,
            result_threshold: 10,
            cutoff_threshold_score: 50.0,
            same_key_start_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MatchConfig {
    pub tolerance: ToleranceConfig,
    pub weights: WeightConfig,
    pub results: ResultsConfig,
    /// Genre pairs scored as related (order-insensitive, case-insensitive).
    pub related_genres: Vec<(String, String)>,
    /// Label values meaning "no real label" (self-released, white label).
    pub label_sentinels: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceConfig::default(),
            weights: WeightConfig::default(),
            results: ResultsConfig::default(),
            related_genres: genre::default_related_pairs(),
            label_sentinels: vec!["CDR".to_string()],
        }
    }
}

impl MatchConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, MatchError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| MatchError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, MatchError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw).map_err(|e| match e {
                MatchError::Config(msg) => MatchError::Config(format!("{}: {msg}", path.display())),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(MatchError::Io(e)),
        }
    }

    /// Load from an explicit path, else `MIXWHEEL_CONFIG`, else the default location.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, MatchError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(default_config_path);
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MatchError::Config(format!(
                "scoring weights must sum to 1.0 (got {sum:.6})"
            )));
        }
        if let Some(w) = self.weights.as_array().iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(MatchError::Config(format!(
                "scoring weights must be finite and non-negative (got {w})"
            )));
        }
        for (name, upper, lower) in self.tolerance.pairs() {
            if !upper.is_finite() || !lower.is_finite() || upper <= -1.0 || lower <= -1.0 {
                return Err(MatchError::Config(format!(
                    "{name} tolerance bounds must be finite and greater than -1"
                )));
            }
            if upper < lower {
                return Err(MatchError::Config(format!(
                    "{name}_upper ({upper}) must not be below {name}_lower ({lower})"
                )));
            }
        }
        if !self.results.cutoff_threshold_score.is_finite() {
            return Err(MatchError::Config(
                "cutoff_threshold_score must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_label_sentinel(&self, label: &str) -> bool {
        let label = label.trim();
        self.label_sentinels
            .iter()
            .any(|sentinel| sentinel.trim().eq_ignore_ascii_case(label))
    }

    pub fn genres_related(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.trim(), b.trim());
        self.related_genres.iter().any(|(x, y)| {
            (x.eq_ignore_ascii_case(a) && y.eq_ignore_ascii_case(b))
                || (x.eq_ignore_ascii_case(b) && y.eq_ignore_ascii_case(a))
        })
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixwheel")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixwheel")
        .join("config.toml")
}

/// Library (track/artist) database path.
pub fn resolve_db_path() -> PathBuf {
    std::env::var(DB_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir().join("library.sqlite3"))
}

/// Similarity feature store path.
pub fn resolve_store_path() -> PathBuf {
    std::env::var(STORE_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir().join("features.sqlite3"))
}
