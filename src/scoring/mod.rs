//! Scoring and gap analysis.
//!
//! Everything here is a pure, synchronous function of a catalog and a
//! snapshot of answers. Callers fetch the answers (see [`crate::ledger`]) and
//! hand them in; no module in this tree does I/O.

pub mod engine;
pub mod error;
pub mod gaps;
pub mod maturity;
pub mod recommend;
pub mod report;

pub use engine::{compute_report, DimensionScore, PillarScore, ScoreReport};
pub use error::ScoringError;
pub use gaps::{achieved_pillar, find_gaps, find_gaps_for, Gap, GapPriority};
pub use maturity::{classify, MaturityLevel, MaturityProfile};
pub use recommend::{recommend, MAX_RECOMMENDATIONS};
pub use report::{
    complete_results, dimension_label, pillar_level, render_markdown, strengths_and_weaknesses,
    CompleteResults, SessionResults, StrengthsAndWeaknesses,
};

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
