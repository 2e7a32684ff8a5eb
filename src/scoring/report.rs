//! Composite results object and its text rendering.

use serde::{Deserialize, Serialize};

use super::engine::{compute_report, DimensionScore};
use super::gaps::{achieved_pillar, find_gaps, Gap};
use super::maturity::{classify, MaturityProfile};
use super::recommend::recommend;
use super::ScoringError;
use crate::catalog::CatalogReader;
use crate::ledger::Answer;

/// Everything downstream reporting consumes. Field names are a stable
/// contract for JSON consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResults {
    pub global_score: f64,
    pub global_percentage: f64,
    pub maturity_profile: MaturityProfile,
    pub dimension_scores: Vec<DimensionScore>,
    pub gaps: Vec<Gap>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub session_id: String,
    pub company_name: String,
    #[serde(flatten)]
    pub results: CompleteResults,
}

pub fn complete_results<C>(catalog: &C, answers: &[Answer]) -> Result<CompleteResults, ScoringError>
where
    C: CatalogReader + ?Sized,
{
    let report = compute_report(catalog, answers)?;
    let maturity_profile = classify(report.global_percentage);
    let gaps = find_gaps(&report.dimension_scores, maturity_profile.level);
    let recommendations = recommend(&report.dimension_scores, &gaps, maturity_profile.level);

    Ok(CompleteResults {
        global_score: report.global_score,
        global_percentage: report.global_percentage,
        maturity_profile,
        dimension_scores: report.dimension_scores,
        gaps,
        recommendations,
    })
}

// =============================================================================
// Qualitative labels
// =============================================================================

/// Label for a dimension's 0-3 score.
pub fn dimension_label(score: f64) -> &'static str {
    if score >= 2.5 {
        "Excellent"
    } else if score >= 2.0 {
        "Very good"
    } else if score >= 1.5 {
        "Good"
    } else if score >= 1.0 {
        "Average"
    } else {
        "Needs improvement"
    }
}

/// Label for a pillar's completion percentage.
pub fn pillar_level(percentage: f64) -> &'static str {
    if percentage >= 76.0 {
        "Excellent"
    } else if percentage >= 51.0 {
        "Very good"
    } else if percentage >= 26.0 {
        "Good"
    } else if percentage >= 1.0 {
        "Average"
    } else {
        "Needs improvement"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrengthsAndWeaknesses {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

pub fn strengths_and_weaknesses(dimension_scores: &[DimensionScore]) -> StrengthsAndWeaknesses {
    let mut out = StrengthsAndWeaknesses::default();
    for dim in dimension_scores {
        let name = &dim.dimension_name;
        if dim.score >= 2.5 {
            out.strengths
                .push(format!("Excellence in {name} with an advanced maturity level"));
        } else if dim.score >= 2.0 {
            out.strengths
                .push(format!("Good command of {name} with established practices"));
        } else if dim.score >= 1.5 {
            out.strengths
                .push(format!("Solid base in {name} with room to develop"));
        } else {
            out.weaknesses
                .push(format!("Significant improvement opportunity in {name}"));
        }
    }
    out
}

/// Concrete first steps for dimensions scoring below 1.5.
fn dimension_advice(code: &str) -> Option<&'static str> {
    match code {
        "STRAT" => Some(
            "Define a digital vision aligned with business goals; start with 2-3 priority initiatives.",
        ),
        "CULTURE" => Some("Invest in team training and run digital awareness workshops."),
        "CLIENT" => Some(
            "Grow the digital presence and customer channels; track interactions in a simple CRM.",
        ),
        "PROCESS" => Some("Digitalize key processes, starting with the most repetitive ones."),
        "TECH" => Some("Audit the technical infrastructure and favour cloud solutions."),
        "SECURITY" => Some(
            "Put basic security in place: regular backups, strong passwords, cyber-risk training.",
        ),
        _ => None,
    }
}

// =============================================================================
// Markdown
// =============================================================================

pub fn render_markdown(session: &SessionResults) -> String {
    let results = &session.results;
    let mut out = String::new();
    out.push_str("# Digital Maturity Report\n\n");
    out.push_str(&format!("- Company: {}\n", session.company_name));
    out.push_str(&format!("- Session: `{}`\n", session.session_id));
    out.push_str(&format!(
        "- Global score: {:.2} / 3 ({:.2}%)\n",
        results.global_score, results.global_percentage
    ));
    out.push_str(&format!(
        "- Profile: {}\n",
        results.maturity_profile.description
    ));

    out.push_str("\n## Dimensions\n\n");
    out.push_str("| Dimension | Score | % | Points | Achieved pillar | Level |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for dim in &results.dimension_scores {
        out.push_str(&format!(
            "| {} | {:.2} | {:.2} | {}/{} | P{} | {} |\n",
            dim.dimension_name,
            dim.score,
            dim.percentage,
            dim.total_points,
            dim.max_points,
            achieved_pillar(dim),
            dimension_label(dim.score)
        ));
    }

    for dim in &results.dimension_scores {
        out.push_str(&format!("\n### {}\n\n", dim.dimension_name));
        for pillar in &dim.pillar_scores {
            out.push_str(&format!(
                "- {} {}: {}/{} ({:.2}%, {}) answered {}\n",
                pillar.pillar_code,
                pillar.pillar_name,
                pillar.score,
                pillar.max_score,
                pillar.percentage,
                pillar_level(pillar.percentage),
                pillar.answered_count
            ));
        }
    }

    let sw = strengths_and_weaknesses(&results.dimension_scores);
    if !sw.strengths.is_empty() {
        out.push_str("\n## Strengths\n\n");
        for line in &sw.strengths {
            out.push_str(&format!("- {line}\n"));
        }
    }
    if !sw.weaknesses.is_empty() {
        out.push_str("\n## Weaknesses\n\n");
        for line in &sw.weaknesses {
            out.push_str(&format!("- {line}\n"));
        }
    }

    out.push_str("\n## Gaps\n\n");
    if results.gaps.is_empty() {
        out.push_str("- none\n");
    }
    for gap in &results.gaps {
        out.push_str(&format!(
            "- [{}] {}\n",
            gap.priority.as_str(),
            gap.gap_description
        ));
    }

    out.push_str("\n## Recommendations\n\n");
    for (i, rec) in results.recommendations.iter().enumerate() {
        out.push_str(&format!("{}. {rec}\n", i + 1));
    }
    let advice: Vec<(&str, &str)> = results
        .dimension_scores
        .iter()
        .filter(|d| d.score < 1.5)
        .filter_map(|d| dimension_advice(&d.dimension_code).map(|a| (d.dimension_name.as_str(), a)))
        .collect();
    if !advice.is_empty() {
        out.push_str("\n### First steps\n\n");
        for (name, line) in advice {
            out.push_str(&format!("- **{name}**: {line}\n"));
        }
    }
    out
}
