//! Ordering and truncation of a scored bucket for display.

use serde::Serialize;

use crate::camelot::{CamelotCode, CamelotPriority};
use crate::config::ResultsConfig;
use crate::scoring::{FactorScores, Scorer, TransitionMatch};

/// One displayed candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub score: f64,
    pub candidate_id: i64,
    pub candidate_title: String,
    pub artists: Vec<String>,
    pub bpm: Option<f64>,
    pub camelot_code: Option<CamelotCode>,
    pub priority: CamelotPriority,
    pub subscores: FactorScores,
}

impl RankedResult {
    fn from_match(m: &TransitionMatch, scorer: &Scorer<'_>) -> Self {
        let scores = *m.scores(scorer);
        Self {
            score: scores.total,
            candidate_id: m.candidate.id,
            candidate_title: m.candidate.title.clone(),
            artists: m.candidate.artists.clone(),
            bpm: m.candidate.bpm,
            camelot_code: m.candidate.camelot_code,
            priority: m.priority,
            subscores: scores,
        }
    }
}

/// Sort `matches` best first (in place, stable) and return the display view.
///
/// The first `start_index` entries are skipped. At most `max_results` are
/// returned, and once more than `result_threshold` have been emitted the list
/// ends at the first score under `cutoff_threshold_score`.
pub fn rank_bucket(
    matches: &mut [TransitionMatch],
    scorer: &Scorer<'_>,
    policy: &ResultsConfig,
    start_index: usize,
) -> Vec<RankedResult> {
    matches.sort_by(|a, b| a.rank_cmp(b, scorer));

    let mut results = Vec::new();
    for m in matches.iter().skip(start_index) {
        if results.len() >= policy.max_results {
            break;
        }
        let score = m.score(scorer);
        if results.len() > policy.result_threshold && score < policy.cutoff_threshold_score {
            break;
        }
        results.push(RankedResult::from_match(m, scorer));
    }
    results
}
