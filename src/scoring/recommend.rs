//! Deterministic recommendation list.

use super::engine::DimensionScore;
use super::gaps::{Gap, GapPriority};
use super::maturity::MaturityLevel;

pub const MAX_RECOMMENDATIONS: usize = 6;

/// High-priority gaps named in the leading recommendation.
const NAMED_HIGH_GAPS: usize = 2;
/// Weakest dimensions considered for an "improve" line.
const WEAKEST_DIMENSIONS: usize = 2;
/// Dimensions below this percentage get an "improve" line.
const WEAK_PERCENTAGE: f64 = 40.0;

fn profile_advice(level: MaturityLevel) -> [&'static str; 3] {
    match level {
        MaturityLevel::Beginner => [
            "Establish a clear digital strategy with measurable objectives",
            "Train teams on core digital tools",
            "Set up digital communication processes",
        ],
        MaturityLevel::Emergent => [
            "Structure the existing digital initiatives",
            "Invest in technology infrastructure",
            "Develop a culture of digital innovation",
        ],
        MaturityLevel::Challenger => [
            "Optimize the existing digital processes",
            "Integrate artificial intelligence and automation",
            "Strengthen data security and compliance",
        ],
        MaturityLevel::Leader => [
            "Sustain digital operational excellence",
            "Explore emerging technologies (AI, blockchain, IoT)",
            "Become a digital transformation role model in your sector",
        ],
    }
}

/// Ordered advice: high-priority gaps, then the weakest dimensions, then
/// profile advice, cut to [`MAX_RECOMMENDATIONS`].
pub fn recommend(
    dimension_scores: &[DimensionScore],
    gaps: &[Gap],
    level: MaturityLevel,
) -> Vec<String> {
    let mut out = Vec::new();

    let high: Vec<&str> = gaps
        .iter()
        .filter(|g| g.priority == GapPriority::High)
        .take(NAMED_HIGH_GAPS)
        .map(|g| g.dimension_name.as_str())
        .collect();
    if !high.is_empty() {
        out.push(format!("High priority: strengthen {}", high.join(", ")));
    }

    let mut by_percentage: Vec<&DimensionScore> = dimension_scores.iter().collect();
    by_percentage.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
    for dimension in by_percentage.into_iter().take(WEAKEST_DIMENSIONS) {
        if dimension.percentage < WEAK_PERCENTAGE {
            out.push(format!(
                "Improve {} (currently {:.0}%)",
                dimension.dimension_name, dimension.percentage
            ));
        }
    }

    out.extend(profile_advice(level).iter().map(|s| s.to_string()));
    out.truncate(MAX_RECOMMENDATIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimension(name: &str, percentage: f64) -> DimensionScore {
        DimensionScore {
            dimension_code: name.to_uppercase(),
            dimension_name: name.to_string(),
            score: percentage * 3.0 / 100.0,
            percentage,
            total_points: 0,
            max_points: 36,
            pillar_scores: Vec::new(),
            answered_count: 0,
        }
    }

    fn gap(name: &str, priority: GapPriority) -> Gap {
        Gap {
            dimension_code: name.to_uppercase(),
            dimension_name: name.to_string(),
            achieved_pillar: 0,
            target_pillar: 2,
            gap_description: String::new(),
            priority,
        }
    }

    #[test]
    fn assembly_order_and_cap() {
        let dims = vec![
            dimension("Strategy", 30.0),
            dimension("Technology", 10.0),
            dimension("Security", 20.0),
        ];
        let gaps = vec![
            gap("Strategy", GapPriority::High),
            gap("Technology", GapPriority::Medium),
            gap("Security", GapPriority::High),
            gap("Culture", GapPriority::High),
        ];
        let recs = recommend(&dims, &gaps, MaturityLevel::Emergent);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert_eq!(recs[0], "High priority: strengthen Strategy, Security");
        assert_eq!(recs[1], "Improve Technology (currently 10%)");
        assert_eq!(recs[2], "Improve Security (currently 20%)");
        assert_eq!(recs[3], "Structure the existing digital initiatives");
        assert_eq!(recs[5], "Develop a culture of digital innovation");
    }

    #[test]
    fn weak_line_needs_percentage_below_forty() {
        let dims = vec![dimension("Strategy", 40.0), dimension("Processes", 39.6)];
        let recs = recommend(&dims, &[], MaturityLevel::Leader);
        assert_eq!(recs[0], "Improve Processes (currently 40%)");
        assert_eq!(recs.len(), 4);
    }

    #[test]
    fn empty_inputs_yield_profile_advice_only() {
        let recs = recommend(&[], &[], MaturityLevel::Beginner);
        assert_eq!(recs.len(), 3);
    }
}
