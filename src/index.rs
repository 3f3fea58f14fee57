//! Collection index: Camelot code -> exact BPM -> tracks, plus the
//! collection-wide statistics the scorer normalizes against.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::camelot::{self, CamelotCode};
use crate::error::MatchError;
use crate::types::{Track, TrackMetadata};

/// Regenerates metadata for a track whose stored record cannot be matched.
pub trait MetadataFallback: Send + Sync {
    fn regenerate(&self, track: &Track) -> Result<TrackMetadata, MatchError>;
}

/// Fallback that never finds anything. Tracks that arrive incomplete stay
/// incomplete.
pub struct NoFallback;

impl MetadataFallback for NoFallback {
    fn regenerate(&self, _track: &Track) -> Result<TrackMetadata, MatchError> {
        Ok(TrackMetadata::default())
    }
}

/// BPM used as an ordered map key. Exact value, no binning.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bpm(pub f64);

impl PartialEq for Bpm {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Bpm {}

impl PartialOrd for Bpm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bpm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub type CamelotMap = BTreeMap<CamelotCode, BTreeMap<Bpm, Vec<Arc<Track>>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    pub track_count: usize,
    pub indexed_count: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
    pub time_range: i64,
    #[serde(skip)]
    pub label_counts: HashMap<String, usize>,
    pub total_label_occurrences: usize,
    #[serde(skip)]
    pub artist_counts: HashMap<String, usize>,
    pub total_artist_occurrences: usize,
    pub max_similarity_value: Option<f64>,
}

impl CollectionStats {
    pub fn label_count(&self, label: &str) -> usize {
        self.label_counts.get(label.trim()).copied().unwrap_or(0)
    }

    pub fn artist_count(&self, name: &str) -> usize {
        self.artist_counts.get(name.trim()).copied().unwrap_or(0)
    }

    /// The `limit` most frequent labels, most frequent first, ties by name.
    pub fn top_labels(&self, limit: usize) -> Vec<(String, usize)> {
        top_counts(&self.label_counts, limit)
    }

    pub fn top_artists(&self, limit: usize) -> Vec<(String, usize)> {
        top_counts(&self.artist_counts, limit)
    }
}

fn top_counts(counts: &HashMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> =
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTrack {
    pub track_id: i64,
    pub title: String,
    pub reason: String,
}

/// Tracks that could not be indexed. Informational; building never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub fallback_attempts: usize,
    pub fallback_failures: usize,
    pub skipped: Vec<SkippedTrack>,
}

/// One immutable snapshot of the collection. Replaced wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    index: CamelotMap,
    by_id: HashMap<i64, Arc<Track>>,
    stats: CollectionStats,
    report: BuildReport,
}

impl Collection {
    pub fn index(&self) -> &CamelotMap {
        &self.index
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Any track from the snapshot, indexed or not.
    pub fn track(&self, id: i64) -> Option<&Arc<Track>> {
        self.by_id.get(&id)
    }

    /// Tracks at `code` whose BPM lies in `[low, high]`, ascending by BPM.
    pub fn tracks_in_range(
        &self,
        code: CamelotCode,
        low: f64,
        high: f64,
    ) -> impl Iterator<Item = &Arc<Track>> + '_ {
        let by_bpm = if low <= high {
            self.index.get(&code)
        } else {
            None
        };
        by_bpm
            .into_iter()
            .flat_map(move |by_bpm| by_bpm.range(Bpm(low)..=Bpm(high)))
            .flat_map(|(_, tracks)| tracks.iter())
    }
}

/// Build a collection snapshot from a full track list.
///
/// Tracks missing BPM or a Camelot code go through `fallback` first; if they
/// are still incomplete they are left out of the index (but still count
/// toward the statistics) and recorded in the build report.
pub fn build_index(
    tracks: &[Track],
    fallback: &dyn MetadataFallback,
    max_similarity_value: Option<f64>,
) -> Collection {
    let mut collection = Collection::default();
    let mut oldest: Option<i64> = None;
    let mut newest: Option<i64> = None;

    for original in tracks {
        let track = resolve_track(original, fallback, &mut collection.report);

        for name in track.credited_names() {
            *collection.stats.artist_counts.entry(name.to_string()).or_insert(0) += 1;
            collection.stats.total_artist_occurrences += 1;
        }
        if let Some(label) = track.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            *collection.stats.label_counts.entry(label.to_string()).or_insert(0) += 1;
            collection.stats.total_label_occurrences += 1;
        }
        if let Some(ts) = track.date_added {
            oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }

        let track = Arc::new(track);
        match (track.usable_bpm(), track.camelot_code) {
            (Some(bpm), Some(code)) => {
                collection
                    .index
                    .entry(code)
                    .or_default()
                    .entry(Bpm(bpm))
                    .or_default()
                    .push(Arc::clone(&track));
                collection.stats.indexed_count += 1;
            }
            _ => {
                let missing: Vec<&str> = track
                    .missing_match_fields()
                    .iter()
                    .map(|f| f.as_str())
                    .collect();
                collection.report.skipped.push(SkippedTrack {
                    track_id: track.id,
                    title: track.title.clone(),
                    reason: format!("missing {}", missing.join(" and ")),
                });
            }
        }
        collection.by_id.insert(track.id, track);
    }

    collection.stats.track_count = tracks.len();
    collection.stats.oldest_timestamp = oldest;
    collection.stats.newest_timestamp = newest;
    collection.stats.time_range = match (oldest, newest) {
        (Some(o), Some(n)) => n - o,
        _ => 0,
    };
    collection.stats.max_similarity_value = max_similarity_value;

    tracing::info!(
        tracks = collection.stats.track_count,
        indexed = collection.stats.indexed_count,
        skipped = collection.report.skipped.len(),
        fallback_failures = collection.report.fallback_failures,
        "collection index built"
    );
    collection
}

fn resolve_track(original: &Track, fallback: &dyn MetadataFallback, report: &mut BuildReport) -> Track {
    let mut track = original.clone();
    if track.camelot_code.is_none() {
        track.camelot_code = track.key.as_deref().and_then(camelot::key_to_camelot);
    }
    if track.is_matchable() {
        return track;
    }

    report.fallback_attempts += 1;
    let meta = match fallback.regenerate(&track) {
        Ok(meta) => meta,
        Err(e) => {
            report.fallback_failures += 1;
            tracing::warn!(track_id = track.id, title = %track.title, "metadata fallback failed: {e}");
            TrackMetadata::default()
        }
    };
    track.fill_missing_from(meta);
    if track.camelot_code.is_none() {
        track.camelot_code = track.key.as_deref().and_then(camelot::key_to_camelot);
    }
    track
}
