//! The matching session: owns the current collection snapshot and answers
//! `find_matches` requests against it.

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::camelot::{self, CamelotCode};
use crate::candidates::{CandidateGenerator, TransitionBuckets};
use crate::config::{MatchConfig, ResultsConfig};
use crate::error::MatchError;
use crate::index::{Collection, MetadataFallback, build_index};
use crate::ranking::{RankedResult, rank_bucket};
use crate::scoring::{Scorer, SimilarityStore};
use crate::types::Track;

/// Where tracks come from.
pub trait TrackStore: Send + Sync {
    /// Full snapshot of the library.
    fn load_all_tracks(&self) -> Result<Vec<Track>, MatchError>;

    /// Resolve a user-supplied identifier. Misses are `TrackNotFound`.
    fn find_track(&self, identifier: &str) -> Result<TrackLookup, MatchError>;
}

/// How an identifier resolved to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMethod {
    Id,
    Title,
    /// Title equal only after trimming and ignoring case.
    LooseTitle,
    FilePath,
    FileName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackLookup {
    pub track: Track,
    pub method: LookupMethod,
}

impl TrackLookup {
    /// Anything but an id or exact title hit means the stored title
    /// disagrees with what the caller asked for.
    pub fn advisory(&self, identifier: &str) -> Option<MatchWarning> {
        let matched_by = match self.method {
            LookupMethod::Id | LookupMethod::Title => return None,
            LookupMethod::LooseTitle => "case-insensitive title",
            LookupMethod::FilePath => "file path",
            LookupMethod::FileName => "file name",
        };
        Some(MatchWarning::MetadataInconsistency {
            track_id: self.track.id,
            identifier: identifier.to_string(),
            detail: format!(
                "matched by {matched_by} but the stored title is '{}'",
                self.track.title
            ),
        })
    }
}

/// Non-fatal notes attached to a successful match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchWarning {
    MetadataInconsistency {
        track_id: i64,
        identifier: String,
        detail: String,
    },
    /// The reference exists in the store but not in the loaded snapshot.
    StaleSnapshot { track_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub reference: Track,
    pub same_key: Vec<RankedResult>,
    /// Tracks a semitone below, slowed in and pitched up.
    pub step_up: Vec<RankedResult>,
    /// Tracks a semitone above, sped in and pitched down.
    pub step_down: Vec<RankedResult>,
    pub warnings: Vec<MatchWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReloadSummary {
    pub previous_tracks: usize,
    pub tracks: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub fallback_failures: usize,
}

pub struct MatchSession {
    tracks: Box<dyn TrackStore>,
    similarity: Box<dyn SimilarityStore>,
    fallback: Box<dyn MetadataFallback>,
    config: MatchConfig,
    collection: RwLock<Arc<Collection>>,
    /// Held across build and swap so reloads land in the order they read the store.
    reloading: Mutex<()>,
}

impl MatchSession {
    /// Build the first snapshot and start a session.
    pub fn open(
        tracks: Box<dyn TrackStore>,
        similarity: Box<dyn SimilarityStore>,
        fallback: Box<dyn MetadataFallback>,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        config.validate()?;
        let collection = build_collection(tracks.as_ref(), similarity.as_ref(), fallback.as_ref())?;
        Ok(Self {
            tracks,
            similarity,
            fallback,
            config,
            collection: RwLock::new(Arc::new(collection)),
            reloading: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Current snapshot. Stays valid after a reload swaps in a new one.
    pub fn snapshot(&self) -> Result<Arc<Collection>, MatchError> {
        let guard = self.collection.read().map_err(|_| MatchError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Rebuild the collection from the store and swap it in.
    pub fn reload(&self) -> Result<ReloadSummary, MatchError> {
        let _reloading = self.reloading.lock().map_err(|_| MatchError::LockPoisoned)?;
        let fresh = Arc::new(build_collection(
            self.tracks.as_ref(),
            self.similarity.as_ref(),
            self.fallback.as_ref(),
        )?);
        let previous = {
            let mut guard = self.collection.write().map_err(|_| MatchError::LockPoisoned)?;
            std::mem::replace(&mut *guard, Arc::clone(&fresh))
        };

        let summary = ReloadSummary {
            previous_tracks: previous.stats().track_count,
            tracks: fresh.stats().track_count,
            indexed: fresh.stats().indexed_count,
            skipped: fresh.report().skipped.len(),
            fallback_failures: fresh.report().fallback_failures,
        };
        tracing::info!(
            previous = summary.previous_tracks,
            tracks = summary.tracks,
            indexed = summary.indexed,
            "collection reloaded"
        );
        Ok(summary)
    }

    pub fn find_matches(&self, identifier: &str) -> Result<MatchReport, MatchError> {
        self.find_matches_with(identifier, &self.config.results)
    }

    /// `find_matches` with a caller-supplied result policy.
    pub fn find_matches_with(
        &self,
        identifier: &str,
        policy: &ResultsConfig,
    ) -> Result<MatchReport, MatchError> {
        let lookup = self.tracks.find_track(identifier)?;
        let collection = self.snapshot()?;
        let mut warnings: Vec<MatchWarning> = lookup.advisory(identifier).into_iter().collect();

        let reference = match collection.track(lookup.track.id) {
            Some(track) => Arc::clone(track),
            None => {
                tracing::warn!(track_id = lookup.track.id, "reference is not in the loaded collection");
                warnings.push(MatchWarning::StaleSnapshot {
                    track_id: lookup.track.id,
                });
                let mut track = lookup.track;
                if track.camelot_code.is_none() {
                    track.camelot_code = track.key.as_deref().and_then(camelot::key_to_camelot);
                }
                Arc::new(track)
            }
        };

        let generator = CandidateGenerator::new(&collection, &self.config.tolerance);
        let buckets = generator.get_transition_matches(&reference)?;
        Ok(self.rank(&collection, buckets, policy, warnings))
    }

    /// Matches for a bare tempo and code, with no stored reference.
    pub fn find_matches_for_tempo(
        &self,
        bpm: f64,
        code: CamelotCode,
        policy: &ResultsConfig,
    ) -> Result<MatchReport, MatchError> {
        let collection = self.snapshot()?;
        let generator = CandidateGenerator::new(&collection, &self.config.tolerance);
        let buckets = generator.for_tempo_and_key(bpm, code)?;
        Ok(self.rank(&collection, buckets, policy, Vec::new()))
    }

    fn rank(
        &self,
        collection: &Collection,
        mut buckets: TransitionBuckets,
        policy: &ResultsConfig,
        warnings: Vec<MatchWarning>,
    ) -> MatchReport {
        if buckets.is_empty() {
            tracing::debug!(track_id = buckets.reference.id, "no harmonic candidates in range");
        }
        let candidates = buckets.len();
        let scorer = Scorer::new(&self.config, collection.stats(), self.similarity.as_ref());
        let same_key = rank_bucket(
            &mut buckets.same_key,
            &scorer,
            policy,
            policy.same_key_start_index,
        );
        let step_up = rank_bucket(&mut buckets.lower_key, &scorer, policy, 0);
        let step_down = rank_bucket(&mut buckets.higher_key, &scorer, policy, 0);

        tracing::info!(
            track_id = buckets.reference.id,
            candidates,
            same_key = same_key.len(),
            step_up = step_up.len(),
            step_down = step_down.len(),
            "matches ranked"
        );
        MatchReport {
            reference: buckets.reference.as_ref().clone(),
            same_key,
            step_up,
            step_down,
            warnings,
        }
    }
}

fn build_collection(
    tracks: &dyn TrackStore,
    similarity: &dyn SimilarityStore,
    fallback: &dyn MetadataFallback,
) -> Result<Collection, MatchError> {
    let all = tracks.load_all_tracks()?;
    Ok(build_index(&all, fallback, similarity.max_similarity()))
}
