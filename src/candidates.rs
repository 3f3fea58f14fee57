//! Transition candidates: every indexed track that is a harmonic neighbour
//! of the reference and sits inside the BPM window for its bucket.

use std::sync::Arc;

use serde::Serialize;

use crate::camelot::{self, CamelotCode};
use crate::config::ToleranceConfig;
use crate::error::MatchError;
use crate::index::Collection;
use crate::scoring::TransitionMatch;
use crate::types::Track;

/// Id given to references built from a bare tempo and code. Store ids start at 1.
pub const SYNTHETIC_REFERENCE_ID: i64 = 0;

/// Sectors between a code and the one a semitone away.
const PITCH_SHIFT_SECTORS: i32 = 7;

/// Window edge for `bpm` at tolerance `bound`.
pub fn get_bpm_bound(bpm: f64, bound: f64) -> f64 {
    bpm / (1.0 + bound)
}

/// Inclusive BPM window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BpmWindow {
    pub low: f64,
    pub high: f64,
}

impl BpmWindow {
    pub fn new(bpm: f64, upper: f64, lower: f64) -> Self {
        Self {
            low: get_bpm_bound(bpm, upper),
            high: get_bpm_bound(bpm, lower),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.low && bpm <= self.high
    }
}

/// The three windows around one reference tempo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoWindows {
    pub same_key: BpmWindow,
    /// Candidates a semitone above, faster, to be pitched down.
    pub higher_key: BpmWindow,
    /// Candidates a semitone below, slower, to be pitched up.
    pub lower_key: BpmWindow,
}

impl TempoWindows {
    pub fn new(bpm: f64, t: &ToleranceConfig) -> Self {
        Self {
            same_key: BpmWindow::new(bpm, t.same_key_upper, t.same_key_lower),
            higher_key: BpmWindow::new(bpm, t.down_key_upper, t.down_key_lower),
            lower_key: BpmWindow::new(bpm, t.up_key_upper, t.up_key_lower),
        }
    }
}

#[derive(Debug)]
pub struct TransitionBuckets {
    pub reference: Arc<Track>,
    pub same_key: Vec<TransitionMatch>,
    pub higher_key: Vec<TransitionMatch>,
    pub lower_key: Vec<TransitionMatch>,
}

impl TransitionBuckets {
    fn new(reference: Arc<Track>) -> Self {
        Self {
            reference,
            same_key: Vec::new(),
            higher_key: Vec::new(),
            lower_key: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.same_key.len() + self.higher_key.len() + self.lower_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct CandidateGenerator<'a> {
    collection: &'a Collection,
    tolerance: &'a ToleranceConfig,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(collection: &'a Collection, tolerance: &'a ToleranceConfig) -> Self {
        Self {
            collection,
            tolerance,
        }
    }

    /// All transition candidates for `reference`, bucketed by tempo shift.
    pub fn get_transition_matches(
        &self,
        reference: &Arc<Track>,
    ) -> Result<TransitionBuckets, MatchError> {
        let (Some(bpm), Some(code)) = (reference.usable_bpm(), reference.camelot_code) else {
            return Err(MatchError::IncompleteTrackMetadata {
                track_id: reference.id,
                title: reference.title.clone(),
                missing: reference.missing_match_fields(),
            });
        };

        let windows = TempoWindows::new(bpm, self.tolerance);
        let mut buckets = TransitionBuckets::new(Arc::clone(reference));
        for (target, priority) in camelot::harmonic_codes(code) {
            self.collect(&mut buckets.same_key, reference, target, windows.same_key, priority);
            self.collect(
                &mut buckets.higher_key,
                reference,
                target.shifted(PITCH_SHIFT_SECTORS),
                windows.higher_key,
                priority,
            );
            self.collect(
                &mut buckets.lower_key,
                reference,
                target.shifted(-PITCH_SHIFT_SECTORS),
                windows.lower_key,
                priority,
            );
        }

        tracing::debug!(
            track_id = reference.id,
            code = %code,
            bpm,
            same_key = buckets.same_key.len(),
            higher_key = buckets.higher_key.len(),
            lower_key = buckets.lower_key.len(),
            "transition candidates"
        );
        Ok(buckets)
    }

    /// Candidates for a tempo and code with no stored reference track.
    pub fn for_tempo_and_key(
        &self,
        bpm: f64,
        code: CamelotCode,
    ) -> Result<TransitionBuckets, MatchError> {
        let mut reference = Track::new(SYNTHETIC_REFERENCE_ID, format!("{code} @ {bpm} BPM"));
        reference.bpm = Some(bpm);
        reference.camelot_code = Some(code);
        self.get_transition_matches(&Arc::new(reference))
    }

    fn collect(
        &self,
        bucket: &mut Vec<TransitionMatch>,
        reference: &Arc<Track>,
        target: CamelotCode,
        window: BpmWindow,
        priority: camelot::CamelotPriority,
    ) {
        bucket.extend(
            self.collection
                .tracks_in_range(target, window.low, window.high)
                .filter(|candidate| candidate.id != reference.id)
                .map(|candidate| {
                    TransitionMatch::new(Arc::clone(candidate), Arc::clone(reference), priority)
                }),
        );
    }
}
