use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::camelot::CamelotCode;

/// A track as the matching engine sees it. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artists: Vec<String>,
    pub remixers: Vec<String>,
    pub bpm: Option<f64>,
    /// Canonical lowercase key, e.g. `c#m` or `ab`.
    pub key: Option<String>,
    pub camelot_code: Option<CamelotCode>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub energy: Option<u8>,
    /// Unix timestamp (seconds).
    pub date_added: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Track {
    /// Empty record with only an id and title. Handy for synthetic references.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artists: Vec::new(),
            remixers: Vec::new(),
            bpm: None,
            key: None,
            camelot_code: None,
            genre: None,
            label: None,
            energy: None,
            date_added: None,
            file_path: None,
            comment: None,
        }
    }

    /// Usable BPM: present, finite and positive.
    pub fn usable_bpm(&self) -> Option<f64> {
        self.bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0)
    }

    pub fn is_matchable(&self) -> bool {
        self.usable_bpm().is_some() && self.camelot_code.is_some()
    }

    /// Which of the fields required for matching are absent.
    pub fn missing_match_fields(&self) -> Vec<MatchField> {
        let mut missing = Vec::new();
        if self.usable_bpm().is_none() {
            missing.push(MatchField::Bpm);
        }
        if self.camelot_code.is_none() {
            missing.push(MatchField::CamelotCode);
        }
        missing
    }

    /// Primary artists followed by remixers, trimmed, empties dropped.
    pub fn credited_names(&self) -> impl Iterator<Item = &str> {
        self.artists
            .iter()
            .chain(self.remixers.iter())
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
    }

    /// Merge metadata regenerated from another source into fields that are
    /// still empty on this record.
    pub fn fill_missing_from(&mut self, meta: TrackMetadata) {
        if self.title.trim().is_empty()
            && let Some(title) = meta.title
        {
            self.title = title;
        }
        if self.artists.is_empty() {
            self.artists = meta.artists;
        }
        if self.remixers.is_empty() {
            self.remixers = meta.remixers;
        }
        if self.usable_bpm().is_none() {
            self.bpm = meta.bpm.or(self.bpm);
        }
        if self.key.is_none() {
            self.key = meta.key;
        }
        if self.camelot_code.is_none() {
            self.camelot_code = meta.camelot_code;
        }
        if self.genre.is_none() {
            self.genre = meta.genre;
        }
        if self.label.is_none() {
            self.label = meta.label;
        }
        if self.energy.is_none() {
            self.energy = meta.energy;
        }
        if self.comment.is_none() {
            self.comment = meta.comment;
        }
    }
}

/// Metadata regenerated from a track's live tags. Every field is optional;
/// an empty record is the degraded result of a failed read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub remixers: Vec<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub camelot_code: Option<CamelotCode>,
    pub genre: Option<String>,
    pub label: Option<String>,
    pub energy: Option<u8>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Bpm,
    CamelotCode,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bpm => "bpm",
            Self::CamelotCode => "camelot_code",
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeyCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LibrarySummary {
    pub total_tracks: i64,
    pub matchable_tracks: i64,
    pub artist_count: i64,
    pub avg_bpm: f64,
    pub key_distribution: Vec<KeyCount>,
}
