//! Hierarchical score aggregation: criterion -> pillar -> dimension -> global.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ratio, round2, ScoringError};
use crate::catalog::{CatalogReader, MAX_POINTS_PER_CRITERION, MAX_POINTS_PER_PILLAR};
use crate::ledger::Answer;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar_code: String,
    pub pillar_name: String,
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub answered_count: u32,
}

impl PillarScore {
    /// Numeric depth of the pillar (`P3` -> 3).
    pub fn index(&self) -> Option<u32> {
        crate::catalog::pillar_index(&self.pillar_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension_code: String,
    pub dimension_name: String,
    /// 0-3 scale.
    pub score: f64,
    pub percentage: f64,
    pub total_points: u32,
    pub max_points: u32,
    pub pillar_scores: Vec<PillarScore>,
    pub answered_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub dimension_scores: Vec<DimensionScore>,
    pub global_score: f64,
    pub global_percentage: f64,
}

#[derive(Default, Clone, Copy)]
struct Tally {
    points: u32,
    answered: u32,
}

// =============================================================================
// Engine
// =============================================================================

/// Aggregate a session's answers into a score report.
///
/// Answers are grouped through the catalog's `criterion_id -> (dimension,
/// pillar)` index. An answer pointing at a criterion the catalog does not
/// know, or scored above the per-criterion maximum, is a data error. Empty
/// catalogs and empty answer sets are not: they yield zero-valued reports.
pub fn compute_report<C>(catalog: &C, answers: &[Answer]) -> Result<ScoreReport, ScoringError>
where
    C: CatalogReader + ?Sized,
{
    let mut tallies: HashMap<(&str, &str), Tally> = HashMap::new();
    for answer in answers {
        if u32::from(answer.score) > MAX_POINTS_PER_CRITERION {
            return Err(ScoringError::config(format!(
                "answer for {} scored {} (max {MAX_POINTS_PER_CRITERION})",
                answer.criterion_id, answer.score
            )));
        }
        let key = catalog.locate(&answer.criterion_id).ok_or_else(|| {
            ScoringError::config(format!(
                "answer references unknown criterion {}",
                answer.criterion_id
            ))
        })?;
        let tally = tallies.entry(key).or_default();
        tally.points += u32::from(answer.score);
        tally.answered += 1;
    }

    let mut dimension_scores = Vec::with_capacity(catalog.list_dimensions().len());
    let mut raw_sum = 0.0;

    for dimension in catalog.list_dimensions() {
        let pillars = catalog.list_pillars(&dimension.code);
        let mut pillar_scores = Vec::with_capacity(pillars.len());
        let mut total_points = 0u32;
        let mut answered_count = 0u32;

        for pillar in pillars {
            let tally = tallies
                .get(&(dimension.code.as_str(), pillar.code.as_str()))
                .copied()
                .unwrap_or_default();
            total_points += tally.points;
            answered_count += tally.answered;
            pillar_scores.push(PillarScore {
                pillar_code: pillar.code.clone(),
                pillar_name: pillar.name.clone(),
                score: tally.points,
                max_score: MAX_POINTS_PER_PILLAR,
                percentage: round2(
                    ratio(f64::from(tally.points), f64::from(MAX_POINTS_PER_PILLAR)) * 100.0,
                ),
                answered_count: tally.answered,
            });
        }

        let max_points = MAX_POINTS_PER_PILLAR * pillar_scores.len() as u32;
        let fraction = ratio(f64::from(total_points), f64::from(max_points));
        let raw_score = fraction * f64::from(MAX_POINTS_PER_CRITERION);
        raw_sum += raw_score;

        dimension_scores.push(DimensionScore {
            dimension_code: dimension.code.clone(),
            dimension_name: dimension.name.clone(),
            score: round2(raw_score),
            percentage: round2(fraction * 100.0),
            total_points,
            max_points,
            pillar_scores,
            answered_count,
        });
    }

    let global_score = round2(ratio(raw_sum, dimension_scores.len() as f64));
    let global_percentage =
        round2(global_score / f64::from(MAX_POINTS_PER_CRITERION) * 100.0);

    Ok(ScoreReport {
        dimension_scores,
        global_score,
        global_percentage,
    })
}
