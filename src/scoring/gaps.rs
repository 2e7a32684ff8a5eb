//! Gap analysis: achieved pillar depth versus the depth the profile expects.

use serde::{Deserialize, Serialize};

use super::engine::DimensionScore;
use super::maturity::MaturityLevel;
use super::ScoringError;

/// Percentage a pillar must reach to count as achieved.
pub const PILLAR_ACHIEVED_PERCENTAGE: f64 = 50.0;

/// Shortfall (in pillars) from which a gap is high priority.
const HIGH_PRIORITY_SHORTFALL: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    High,
    Medium,
}

impl GapPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub dimension_code: String,
    pub dimension_name: String,
    pub achieved_pillar: u32,
    pub target_pillar: u32,
    pub gap_description: String,
    pub priority: GapPriority,
}

impl Gap {
    pub fn shortfall(&self) -> u32 {
        self.target_pillar.saturating_sub(self.achieved_pillar)
    }
}

/// Highest pillar index whose percentage reaches the bar, or 0.
///
/// This is the maximum qualifying index, not a count: P1 and P3 passing with
/// P2 failing still yields 3.
pub fn achieved_pillar(dimension: &DimensionScore) -> u32 {
    dimension
        .pillar_scores
        .iter()
        .filter(|p| p.percentage >= PILLAR_ACHIEVED_PERCENTAGE)
        .filter_map(|p| p.index())
        .max()
        .unwrap_or(0)
}

/// Gaps for every dimension falling short of the level's target pillar.
pub fn find_gaps(dimension_scores: &[DimensionScore], level: MaturityLevel) -> Vec<Gap> {
    let target = level.target_pillar();
    dimension_scores
        .iter()
        .filter_map(|dimension| {
            let achieved = achieved_pillar(dimension);
            if achieved >= target {
                return None;
            }
            let priority = if target - achieved >= HIGH_PRIORITY_SHORTFALL {
                GapPriority::High
            } else {
                GapPriority::Medium
            };
            Some(Gap {
                dimension_code: dimension.dimension_code.clone(),
                dimension_name: dimension.dimension_name.clone(),
                achieved_pillar: achieved,
                target_pillar: target,
                gap_description: format!(
                    "{}: achieved pillar P{achieved}, target P{target} for the {level} profile",
                    dimension.dimension_name
                ),
                priority,
            })
        })
        .collect()
}

/// [`find_gaps`] for a level given by name; unknown names are config errors.
pub fn find_gaps_for(
    dimension_scores: &[DimensionScore],
    level: &str,
) -> Result<Vec<Gap>, ScoringError> {
    Ok(find_gaps(dimension_scores, level.parse()?))
}
