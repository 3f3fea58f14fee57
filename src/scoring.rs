//! Transition scoring.
//!
//! Each candidate gets a weighted sum of eight factors in [0, 1], scaled to
//! [0, 100]. Scores are memoized on the `TransitionMatch` itself.

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::camelot::CamelotPriority;
use crate::config::{MatchConfig, ToleranceConfig};
use crate::index::CollectionStats;
use crate::types::Track;

/// Penalty applied when the candidate is slower than the reference.
const SLOWER_DISCOUNT: f64 = 0.9;
/// Neutral freshness when a candidate has no timestamp.
const NEUTRAL_FRESHNESS: f64 = 0.5;
const ENERGY_SCALE: f64 = 10.0;

/// Precomputed acoustic similarity between two tracks, as a distance
/// (smaller is more similar).
pub trait SimilarityStore: Send + Sync {
    fn lookup_similarity(&self, reference_id: i64, candidate_id: i64) -> Option<f64>;

    /// Largest distance in the store, used to normalize lookups.
    fn max_similarity(&self) -> Option<f64>;
}

/// Store with no features. Every similarity subscore is 0.
#[cfg(test)]
pub struct NoSimilarity;

#[cfg(test)]
impl SimilarityStore for NoSimilarity {
    fn lookup_similarity(&self, _reference_id: i64, _candidate_id: i64) -> Option<f64> {
        None
    }

    fn max_similarity(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Camelot,
    Bpm,
    Similarity,
    Freshness,
    Genre,
    Label,
    Artist,
    Energy,
}

impl Factor {
    pub const ALL: [Self; 8] = [
        Self::Camelot,
        Self::Bpm,
        Self::Similarity,
        Self::Freshness,
        Self::Genre,
        Self::Label,
        Self::Artist,
        Self::Energy,
    ];
}

/// One subscore per factor plus the weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FactorScores {
    pub camelot: f64,
    pub bpm: f64,
    pub similarity: f64,
    pub freshness: f64,
    pub genre: f64,
    pub label: f64,
    pub artist: f64,
    pub energy: f64,
    /// Weighted total in [0, 100].
    pub total: f64,
}

impl FactorScores {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Camelot => self.camelot,
            Factor::Bpm => self.bpm,
            Factor::Similarity => self.similarity,
            Factor::Freshness => self.freshness,
            Factor::Genre => self.genre,
            Factor::Label => self.label,
            Factor::Artist => self.artist,
            Factor::Energy => self.energy,
        }
    }

    fn perfect() -> Self {
        Self {
            camelot: 1.0,
            bpm: 1.0,
            similarity: 1.0,
            freshness: 1.0,
            genre: 1.0,
            label: 1.0,
            artist: 1.0,
            energy: 1.0,
            total: 100.0,
        }
    }
}

/// A candidate that may follow a reference track. Created per request.
pub struct TransitionMatch {
    pub candidate: Arc<Track>,
    pub reference: Arc<Track>,
    pub priority: CamelotPriority,
    scores: OnceCell<FactorScores>,
}

impl TransitionMatch {
    pub fn new(candidate: Arc<Track>, reference: Arc<Track>, priority: CamelotPriority) -> Self {
        Self {
            candidate,
            reference,
            priority,
            scores: OnceCell::new(),
        }
    }

    /// Total score, computing it on first use.
    pub fn score(&self, scorer: &Scorer<'_>) -> f64 {
        self.scores(scorer).total
    }

    pub fn scores(&self, scorer: &Scorer<'_>) -> &FactorScores {
        self.scores.get_or_init(|| scorer.compute(self))
    }

    /// Scores if already computed.
    #[cfg(test)]
    pub fn cached_scores(&self) -> Option<&FactorScores> {
        self.scores.get()
    }

    /// Ranking order: higher total, then higher similarity, then higher
    /// freshness come first. Remaining ties fall back to title and id.
    pub fn rank_cmp(&self, other: &Self, scorer: &Scorer<'_>) -> Ordering {
        let (a, b) = (self.scores(scorer), other.scores(scorer));
        b.total
            .total_cmp(&a.total)
            .then_with(|| b.similarity.total_cmp(&a.similarity))
            .then_with(|| b.freshness.total_cmp(&a.freshness))
            .then_with(|| self.candidate.title.cmp(&other.candidate.title))
            .then_with(|| self.candidate.id.cmp(&other.candidate.id))
    }
}

impl fmt::Debug for TransitionMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionMatch")
            .field("candidate", &self.candidate.id)
            .field("reference", &self.reference.id)
            .field("priority", &self.priority)
            .field("scores", &self.scores.get())
            .finish()
    }
}

/// Scoring context for one collection snapshot.
pub struct Scorer<'a> {
    config: &'a MatchConfig,
    stats: &'a CollectionStats,
    similarity: &'a dyn SimilarityStore,
}

impl<'a> Scorer<'a> {
    pub fn new(
        config: &'a MatchConfig,
        stats: &'a CollectionStats,
        similarity: &'a dyn SimilarityStore,
    ) -> Self {
        Self {
            config,
            stats,
            similarity,
        }
    }

    pub fn compute(&self, m: &TransitionMatch) -> FactorScores {
        let (reference, candidate) = (m.reference.as_ref(), m.candidate.as_ref());
        if same_title(&reference.title, &candidate.title) {
            return FactorScores::perfect();
        }

        let mut scores = FactorScores {
            camelot: camelot_factor(m.priority),
            bpm: bpm_factor(reference.usable_bpm(), candidate.usable_bpm(), &self.config.tolerance),
            similarity: self.similarity_factor(reference.id, candidate.id),
            freshness: self.freshness_factor(candidate.date_added),
            genre: self.genre_factor(reference.genre.as_deref(), candidate.genre.as_deref()),
            label: self.label_factor(reference.label.as_deref(), candidate.label.as_deref()),
            artist: self.artist_factor(reference, candidate),
            energy: energy_factor(reference.energy, candidate.energy),
            total: 0.0,
        };
        let weights = self.config.weights.as_array();
        let weighted: f64 = Factor::ALL
            .iter()
            .zip(weights)
            .map(|(factor, weight)| scores.get(*factor) * weight)
            .sum();
        scores.total = (100.0 * weighted).clamp(0.0, 100.0);
        scores
    }

    fn similarity_factor(&self, reference_id: i64, candidate_id: i64) -> f64 {
        let Some(max) = self
            .stats
            .max_similarity_value
            .filter(|m| m.is_finite() && *m > 0.0)
        else {
            return 0.0;
        };
        match self.similarity.lookup_similarity(reference_id, candidate_id) {
            Some(value) if value.is_finite() && value >= 0.0 => (1.0 - value / max).max(0.0),
            Some(value) => {
                tracing::debug!(reference_id, candidate_id, value, "ignoring malformed similarity value");
                0.0
            }
            None => 0.0,
        }
    }

    fn freshness_factor(&self, date_added: Option<i64>) -> f64 {
        let (Some(ts), Some(oldest)) = (date_added, self.stats.oldest_timestamp) else {
            return NEUTRAL_FRESHNESS;
        };
        if self.stats.time_range <= 0 {
            return NEUTRAL_FRESHNESS;
        }
        ((ts - oldest) as f64 / self.stats.time_range as f64).clamp(0.0, 1.0)
    }

    fn genre_factor(&self, reference: Option<&str>, candidate: Option<&str>) -> f64 {
        let (Some(a), Some(b)) = (non_blank(reference), non_blank(candidate)) else {
            return 0.0;
        };
        if a.eq_ignore_ascii_case(b) {
            1.0
        } else if self.config.genres_related(a, b) {
            0.5
        } else {
            0.0
        }
    }

    fn label_factor(&self, reference: Option<&str>, candidate: Option<&str>) -> f64 {
        let (Some(a), Some(b)) = (non_blank(reference), non_blank(candidate)) else {
            return 0.0;
        };
        if a != b || self.config.is_label_sentinel(a) {
            return 0.0;
        }
        rarity(self.stats.label_count(a), self.stats.total_label_occurrences)
    }

    fn artist_factor(&self, reference: &Track, candidate: &Track) -> f64 {
        let reference_names: Vec<&str> = reference.credited_names().collect();
        let mut overlap: Vec<&str> = Vec::new();
        for name in candidate.credited_names() {
            if reference_names.contains(&name) && !overlap.contains(&name) {
                overlap.push(name);
            }
        }
        if overlap.is_empty() {
            return 0.0;
        }
        let total = self.stats.total_artist_occurrences;
        let sum: f64 = overlap
            .iter()
            .map(|name| rarity(self.stats.artist_count(name), total))
            .sum();
        sum / overlap.len() as f64
    }
}

/// Smoothed log2, safe at zero.
pub fn log2_smoothed(x: f64) -> f64 {
    (x + 1.0).log2()
}

/// `1 - log2(count+1) / log2(total+1)`: 1 for unseen names, 0 when one
/// name makes up the whole collection.
fn rarity(count: usize, total: usize) -> f64 {
    let denominator = log2_smoothed(total as f64);
    if denominator <= 0.0 {
        return 0.0;
    }
    (1.0 - log2_smoothed(count as f64) / denominator).clamp(0.0, 1.0)
}

pub fn camelot_factor(priority: CamelotPriority) -> f64 {
    match priority {
        CamelotPriority::OneOctaveJump => 0.1,
        CamelotPriority::AdjacentSectorWithLetterFlip => 0.25,
        CamelotPriority::MajorMinorRelative => 0.9,
        other => f64::from(other.value()) / f64::from(CamelotPriority::SameKey.value()),
    }
}

/// Signed relative-difference bands derived from the tolerance bounds.
/// A window bound `b` maps to `1 / (1 + b) - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmBands {
    pub same: (f64, f64),
    pub faster: (f64, f64),
    pub slower: (f64, f64),
}

impl BpmBands {
    pub fn from_tolerance(t: &ToleranceConfig) -> Self {
        let rel = |bound: f64| 1.0 / (1.0 + bound) - 1.0;
        Self {
            same: (rel(t.same_key_upper), rel(t.same_key_lower)),
            faster: (rel(t.down_key_upper), rel(t.down_key_lower)),
            slower: (rel(t.up_key_upper), rel(t.up_key_lower)),
        }
    }
}

pub fn bpm_factor(reference: Option<f64>, candidate: Option<f64>, tolerance: &ToleranceConfig) -> f64 {
    let (Some(reference), Some(candidate)) = (reference, candidate) else {
        return 0.0;
    };
    let diff = (candidate - reference) / reference;
    let bands = BpmBands::from_tolerance(tolerance);

    let (low, high) = bands.same;
    let closeness = if diff >= 0.0 && diff <= high {
        linear_falloff(diff, high)
    } else if diff < 0.0 && diff >= low {
        linear_falloff(diff, low)
    } else if let Some(score) = triangular(diff, bands.faster) {
        score
    } else if let Some(score) = triangular(diff, bands.slower) {
        score
    } else {
        0.0
    };

    let closeness = if diff < 0.0 {
        closeness * SLOWER_DISCOUNT
    } else {
        closeness
    };
    closeness.clamp(0.0, 1.0)
}

/// 1 at zero, 0 at `edge`.
fn linear_falloff(diff: f64, edge: f64) -> f64 {
    if edge == 0.0 {
        return if diff == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - diff / edge
}

/// Peak of 1 at the band midpoint, 0 at either edge. `None` outside the band.
fn triangular(diff: f64, band: (f64, f64)) -> Option<f64> {
    let (lo, hi) = if band.0 <= band.1 {
        band
    } else {
        (band.1, band.0)
    };
    if diff < lo || diff > hi {
        return None;
    }
    let half = (hi - lo) / 2.0;
    if half <= 0.0 {
        return Some(1.0);
    }
    let mid = lo + half;
    Some(1.0 - (diff - mid).abs() / half)
}

pub fn energy_factor(reference: Option<u8>, candidate: Option<u8>) -> f64 {
    let (Some(a), Some(b)) = (reference, candidate) else {
        return 0.0;
    };
    (1.0 - (f64::from(a) - f64::from(b)).abs() / ENERGY_SCALE).clamp(0.0, 1.0)
}

fn same_title(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::index::tests::track;
    use crate::index::{NoFallback, build_index};

    struct FixedSimilarity(HashMap<(i64, i64), f64>);

    impl SimilarityStore for FixedSimilarity {
        fn lookup_similarity(&self, reference_id: i64, candidate_id: i64) -> Option<f64> {
            self.0.get(&(reference_id, candidate_id)).copied()
        }

        fn max_similarity(&self) -> Option<f64> {
            self.0.values().copied().reduce(f64::max)
        }
    }

    fn stats_for(tracks: &[Track], similarity: &dyn SimilarityStore) -> CollectionStats {
        build_index(tracks, &NoFallback, similarity.max_similarity())
            .stats()
            .clone()
    }

    fn pair(reference: Track, candidate: Track, priority: CamelotPriority) -> TransitionMatch {
        TransitionMatch::new(Arc::new(candidate), Arc::new(reference), priority)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn camelot_factor_table() {
        assert_eq!(camelot_factor(CamelotPriority::SameKey), 1.0);
        assert_eq!(camelot_factor(CamelotPriority::MajorMinorRelative), 0.9);
        assert!(approx(camelot_factor(CamelotPriority::OneKeyStep), 4.0 / 6.0));
        assert_eq!(camelot_factor(CamelotPriority::AdjacentSectorWithLetterFlip), 0.25);
        assert_eq!(camelot_factor(CamelotPriority::OneOctaveJump), 0.1);
        assert!(approx(camelot_factor(CamelotPriority::TwoSectorJump), 1.0 / 6.0));
    }

    #[test]
    fn bpm_factor_near_zero_difference() {
        let t = ToleranceConfig::default();
        let score = bpm_factor(Some(128.0), Some(128.3), &t);
        assert!((score - 0.92).abs() < 0.005, "got {score}");
        assert_eq!(bpm_factor(Some(128.0), Some(128.0), &t), 1.0);
    }

    #[test]
    fn bpm_factor_penalizes_slower_candidates() {
        let t = ToleranceConfig::default();
        let faster = bpm_factor(Some(128.0), Some(129.0), &t);
        let slower = bpm_factor(Some(128.0), Some(127.0), &t);
        assert!(slower < faster);
        assert!(slower > 0.0);
    }

    #[test]
    fn bpm_factor_pitched_bands_peak_in_the_middle() {
        let t = ToleranceConfig::default();
        let bands = BpmBands::from_tolerance(&t);
        let mid_faster = (bands.faster.0 + bands.faster.1) / 2.0;
        let at_mid = bpm_factor(Some(100.0), Some(100.0 * (1.0 + mid_faster)), &t);
        assert!(approx(at_mid, 1.0), "got {at_mid}");
        let mid_slower = (bands.slower.0 + bands.slower.1) / 2.0;
        let at_slow_mid = bpm_factor(Some(100.0), Some(100.0 * (1.0 + mid_slower)), &t);
        assert!(approx(at_slow_mid, 0.9), "got {at_slow_mid}");
        assert_eq!(bpm_factor(Some(100.0), Some(120.0), &t), 0.0);
        assert_eq!(bpm_factor(Some(100.0), Some(80.0), &t), 0.0);
    }

    #[test]
    fn bpm_bands_follow_the_candidate_windows() {
        let bands = BpmBands::from_tolerance(&ToleranceConfig::default());
        assert!(approx(bands.same.1, 0.02923));
        assert!(approx(bands.same.0, -0.02847));
        assert!(approx(bands.faster.0, bands.same.1));
        assert!(approx(bands.slower.1, bands.same.0));
    }

    #[test]
    fn bpm_factor_missing_side_is_zero() {
        let t = ToleranceConfig::default();
        assert_eq!(bpm_factor(None, Some(120.0), &t), 0.0);
        assert_eq!(bpm_factor(Some(120.0), None, &t), 0.0);
    }

    #[test]
    fn energy_factor_degrades_when_missing() {
        assert_eq!(energy_factor(Some(6), None), 0.0);
        assert_eq!(energy_factor(None, None), 0.0);
        assert!(approx(energy_factor(Some(6), Some(8)), 0.8));
    }

    #[test]
    fn identical_title_scores_exactly_100() {
        let config = MatchConfig::default();
        let reference = track(1, "Xtal", 128.0, "08A");
        let mut candidate = track(2, "Xtal", 90.0, "02B");
        candidate.label = Some("CDR".into());
        let stats = stats_for(&[reference.clone(), candidate.clone()], &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        let m = pair(reference, candidate, CamelotPriority::TwoSectorJump);
        assert_eq!(m.score(&scorer), 100.0);
        assert!(m.scores(&scorer).bpm == 1.0 && m.scores(&scorer).energy == 1.0);
    }

    #[test]
    fn title_differing_in_case_is_scored_normally() {
        let config = MatchConfig::default();
        let reference = track(1, "Intro", 128.0, "08A");
        let candidate = track(2, "INTRO ", 90.0, "02B");
        let stats = stats_for(&[reference.clone(), candidate.clone()], &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        let m = pair(reference, candidate, CamelotPriority::TwoSectorJump);
        let score = m.score(&scorer);
        assert!(score < 100.0, "got {score}");
        assert_eq!(m.scores(&scorer).bpm, 0.0);
    }

    #[test]
    fn label_sentinel_scores_zero() {
        let config = MatchConfig::default();
        let mut reference = track(1, "A", 128.0, "08A");
        let mut candidate = track(2, "B", 128.0, "08A");
        reference.label = Some("CDR".into());
        candidate.label = Some("CDR".into());
        let stats = stats_for(&[reference.clone(), candidate.clone()], &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        let m = pair(reference, candidate, CamelotPriority::SameKey);
        assert_eq!(m.scores(&scorer).label, 0.0);
    }

    #[test]
    fn rare_labels_and_artists_score_higher() {
        let config = MatchConfig::default();
        let mut tracks = Vec::new();
        for id in 0..8 {
            let mut t = track(id, &format!("Big {id}"), 128.0, "08A");
            t.label = Some("Big Label".into());
            t.artists = vec!["Prolific".into()];
            tracks.push(t);
        }
        let mut rare_a = track(100, "Rare A", 128.0, "08A");
        rare_a.label = Some("Tiny Label".into());
        rare_a.artists = vec!["Prolific".into(), "Obscure".into()];
        let mut rare_b = track(101, "Rare B", 128.0, "08A");
        rare_b.label = Some("Tiny Label".into());
        rare_b.artists = vec!["Obscure".into()];
        tracks.push(rare_a.clone());
        tracks.push(rare_b.clone());

        let stats = stats_for(&tracks, &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        let big = pair(tracks[0].clone(), tracks[1].clone(), CamelotPriority::SameKey);
        let rare = pair(rare_a.clone(), rare_b, CamelotPriority::SameKey);
        let big_scores = *big.scores(&scorer);
        let rare_scores = *rare.scores(&scorer);
        assert!(rare_scores.label > big_scores.label);
        assert!(rare_scores.artist > big_scores.artist);

        // "Prolific" appears 9 times out of 11 credits.
        let expected = 1.0 - log2_smoothed(9.0) / log2_smoothed(11.0);
        assert!(approx(big_scores.artist, expected));
        let no_overlap = pair(rare_a, track(7, "Nobody", 128.0, "08A"), CamelotPriority::SameKey);
        assert_eq!(no_overlap.scores(&scorer).artist, 0.0);
    }

    #[test]
    fn genre_exact_related_and_unrelated() {
        let config = MatchConfig::default();
        let stats = CollectionStats::default();
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        assert_eq!(scorer.genre_factor(Some("Trance"), Some("trance")), 1.0);
        assert_eq!(scorer.genre_factor(Some("Trance"), Some("Psytrance")), 0.5);
        assert_eq!(scorer.genre_factor(Some("Trance"), Some("Techno")), 0.0);
        assert_eq!(scorer.genre_factor(None, Some("Techno")), 0.0);
        assert_eq!(scorer.genre_factor(Some(" "), Some(" ")), 0.0);
    }

    #[test]
    fn freshness_normalizes_or_defaults() {
        let config = MatchConfig::default();
        let mut old = track(1, "Old", 128.0, "08A");
        old.date_added = Some(100);
        let mut new = track(2, "New", 128.0, "08A");
        new.date_added = Some(300);
        let undated = track(3, "Undated", 128.0, "08A");
        let stats = stats_for(&[old.clone(), new.clone(), undated.clone()], &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        assert_eq!(scorer.freshness_factor(new.date_added), 1.0);
        assert_eq!(scorer.freshness_factor(old.date_added), 0.0);
        assert_eq!(scorer.freshness_factor(Some(200)), 0.5);
        assert_eq!(scorer.freshness_factor(undated.date_added), 0.5);
    }

    #[test]
    fn similarity_normalizes_and_ignores_malformed_values() {
        let config = MatchConfig::default();
        let store = FixedSimilarity(HashMap::from([
            ((1, 2), 1.0),
            ((1, 3), 4.0),
            ((1, 4), f64::NAN),
            ((1, 5), -2.0),
        ]));
        let stats = CollectionStats {
            max_similarity_value: Some(4.0),
            ..Default::default()
        };
        let scorer = Scorer::new(&config, &stats, &store);
        assert!(approx(scorer.similarity_factor(1, 2), 0.75));
        assert_eq!(scorer.similarity_factor(1, 3), 0.0);
        assert_eq!(scorer.similarity_factor(1, 4), 0.0);
        assert_eq!(scorer.similarity_factor(1, 5), 0.0);
        assert_eq!(scorer.similarity_factor(1, 99), 0.0);
    }

    #[test]
    fn scores_are_bounded_and_memoized() {
        let config = MatchConfig::default();
        let mut tracks = Vec::new();
        for id in 0..30 {
            let mut t = track(id, &format!("T{id}"), 100.0 + id as f64 * 1.7, "08A");
            t.energy = Some((id % 11) as u8);
            t.date_added = Some(id * 86_400);
            t.genre = Some(if id % 2 == 0 { "Trance" } else { "Psytrance" }.into());
            t.label = Some(format!("L{}", id % 3));
            t.artists = vec![format!("A{}", id % 4)];
            tracks.push(t);
        }
        let stats = stats_for(&tracks, &NoSimilarity);
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        for reference in &tracks {
            for candidate in &tracks {
                for priority in CamelotPriority::ALL {
                    let m = pair(reference.clone(), candidate.clone(), priority);
                    assert!(m.cached_scores().is_none());
                    let score = m.score(&scorer);
                    assert!((0.0..=100.0).contains(&score), "{score}");
                    assert_eq!(m.cached_scores().map(|s| s.total), Some(score));
                }
            }
        }
    }

    #[test]
    fn rank_cmp_breaks_ties_on_similarity_then_freshness() {
        let config = MatchConfig::default();
        let stats = CollectionStats::default();
        let scorer = Scorer::new(&config, &stats, &NoSimilarity);
        let reference = Arc::new(track(1, "Ref", 128.0, "08A"));
        let make = |id: i64, total: f64, similarity: f64, freshness: f64| {
            let m = TransitionMatch::new(
                Arc::new(track(id, &format!("C{id}"), 128.0, "08A")),
                Arc::clone(&reference),
                CamelotPriority::SameKey,
            );
            m.scores
                .set(FactorScores {
                    similarity,
                    freshness,
                    total,
                    ..Default::default()
                })
                .unwrap();
            m
        };
        let a = make(2, 80.0, 0.1, 0.1);
        let b = make(3, 80.0, 0.5, 0.0);
        let c = make(4, 80.0, 0.5, 0.9);
        let d = make(5, 90.0, 0.0, 0.0);
        assert_eq!(d.rank_cmp(&a, &scorer), Ordering::Less);
        assert_eq!(b.rank_cmp(&a, &scorer), Ordering::Less);
        assert_eq!(c.rank_cmp(&b, &scorer), Ordering::Less);
        assert_eq!(a.rank_cmp(&a, &scorer), Ordering::Equal);
    }
}
