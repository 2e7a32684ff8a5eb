use maturity_harness::catalog::{Catalog, CatalogReader, Criterion, CriterionFilter, Dimension, Pillar};
use maturity_harness::ledger::Answer;
use maturity_harness::scoring::{
    achieved_pillar, classify, complete_results, compute_report, find_gaps, recommend, GapPriority,
    MaturityLevel, MAX_RECOMMENDATIONS,
};
use proptest::prelude::*;

fn strat_catalog() -> Catalog {
    let dimension = Dimension {
        code: "STRAT".into(),
        name: "Strategy".into(),
        description: String::new(),
    };
    let pillars = (1..=4)
        .map(|p| Pillar {
            dimension_code: "STRAT".into(),
            code: format!("P{p}"),
            name: format!("Pillar {p}"),
        })
        .collect();
    let criteria = (1..=4)
        .flat_map(|p| {
            (1..=3).map(move |c| Criterion {
                criterion_id: format!("STRAT-P{p}-C{c}"),
                dimension_code: "STRAT".into(),
                pillar_code: format!("P{p}"),
                text: format!("Criterion {p}.{c}"),
                options: Vec::new(),
                next_linear: None,
            })
        })
        .collect();
    Catalog::linked(vec![dimension], pillars, criteria).unwrap()
}

fn answers_for<'a>(ids: impl IntoIterator<Item = &'a str>, score: u8) -> Vec<Answer> {
    ids.into_iter()
        .map(|id| Answer::scored("s", id, score).unwrap())
        .collect()
}

/// Catalog with `shape[d][p]` criteria in pillar `P{p+1}` of dimension `D{d+1}`.
fn shaped_catalog(shape: &[Vec<usize>]) -> Catalog {
    let mut dimensions = Vec::new();
    let mut pillars = Vec::new();
    let mut criteria = Vec::new();
    for (d, pillar_sizes) in shape.iter().enumerate() {
        let dim = format!("D{}", d + 1);
        dimensions.push(Dimension {
            code: dim.clone(),
            name: format!("Dimension {}", d + 1),
            description: String::new(),
        });
        for (p, &size) in pillar_sizes.iter().enumerate() {
            let pillar = format!("P{}", p + 1);
            pillars.push(Pillar {
                dimension_code: dim.clone(),
                code: pillar.clone(),
                name: format!("Pillar {}", p + 1),
            });
            for c in 1..=size {
                criteria.push(Criterion {
                    criterion_id: format!("{dim}-{pillar}-C{c}"),
                    dimension_code: dim.clone(),
                    pillar_code: pillar.clone(),
                    text: format!("Criterion {dim}.{pillar}.{c}"),
                    options: Vec::new(),
                    next_linear: None,
                });
            }
        }
    }
    Catalog::linked(dimensions, pillars, criteria).unwrap()
}

/// One score per criterion in linear order; `None` leaves it unanswered.
fn answers_from(catalog: &Catalog, scores: &[Option<u8>]) -> Vec<Answer> {
    catalog
        .list_criteria(&CriterionFilter::all())
        .into_iter()
        .zip(scores)
        .filter_map(|(c, score)| {
            score.map(|s| Answer::scored("s", c.criterion_id.clone(), s).unwrap())
        })
        .collect()
}

/// 1..=6 dimensions, 1..=4 pillars each, 1..=3 criteria per pillar, with a
/// score or a skip for every criterion.
fn session_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<Option<u8>>)> {
    prop::collection::vec(prop::collection::vec(1usize..=3, 1..=4), 1..=6).prop_flat_map(
        |shape| {
            let total: usize = shape.iter().flatten().sum();
            (
                Just(shape),
                prop::collection::vec(prop::option::of(0u8..=3), total),
            )
        },
    )
}

proptest! {
    #[test]
    fn sums_and_bounds_hold_for_any_session((shape, scores) in session_strategy()) {
        let catalog = shaped_catalog(&shape);
        let answers = answers_from(&catalog, &scores);
        let report = compute_report(&catalog, &answers).unwrap();
        prop_assert_eq!(report.dimension_scores.len(), shape.len());

        let mut raw_sum = 0.0;
        for (dim, pillar_sizes) in report.dimension_scores.iter().zip(&shape) {
            let pillar_sum: u32 = dim.pillar_scores.iter().map(|p| p.score).sum();
            prop_assert_eq!(pillar_sum, dim.total_points);
            prop_assert_eq!(dim.max_points, 9 * pillar_sizes.len() as u32);
            prop_assert!((0.0..=3.0).contains(&dim.score));
            prop_assert!((0.0..=100.0).contains(&dim.percentage));
            for pillar in &dim.pillar_scores {
                prop_assert!(pillar.score <= pillar.max_score);
                prop_assert!((0.0..=100.0).contains(&pillar.percentage));
            }
            raw_sum += f64::from(dim.total_points) / f64::from(dim.max_points) * 3.0;
        }
        let expected = raw_sum / report.dimension_scores.len() as f64;
        prop_assert!((report.global_score - expected).abs() <= 0.01);
        prop_assert!((0.0..=100.0).contains(&report.global_percentage));
    }

    #[test]
    fn results_stay_consistent_for_any_session((shape, scores) in session_strategy()) {
        let catalog = shaped_catalog(&shape);
        let answers = answers_from(&catalog, &scores);
        let results = complete_results(&catalog, &answers).unwrap();

        prop_assert!(results.recommendations.len() <= MAX_RECOMMENDATIONS);
        prop_assert_eq!(results.maturity_profile.level, classify(results.global_percentage).level);

        let target = results.maturity_profile.level.target_pillar();
        for gap in &results.gaps {
            prop_assert!(gap.achieved_pillar < gap.target_pillar);
            prop_assert_eq!(gap.target_pillar, target);
            let expected = if gap.shortfall() >= 2 { GapPriority::High } else { GapPriority::Medium };
            prop_assert_eq!(gap.priority, expected);
        }
        let short = results
            .dimension_scores
            .iter()
            .filter(|d| achieved_pillar(d) < target)
            .count();
        prop_assert_eq!(results.gaps.len(), short);
    }

    #[test]
    fn recommendations_never_exceed_the_cap(
        (shape, scores) in session_strategy(),
        level_idx in 0usize..4,
    ) {
        let catalog = shaped_catalog(&shape);
        let answers = answers_from(&catalog, &scores);
        let report = compute_report(&catalog, &answers).unwrap();
        let level = MaturityLevel::ALL[level_idx];
        let gaps = find_gaps(&report.dimension_scores, level);
        let recs = recommend(&report.dimension_scores, &gaps, level);
        prop_assert!(recs.len() <= MAX_RECOMMENDATIONS, "{}: {:?}", level, recs);
    }
}

#[test]
fn all_criteria_at_max_is_a_leader_without_gaps() {
    let catalog = strat_catalog();
    let ids: Vec<String> = catalog
        .list_criteria(&CriterionFilter::all())
        .iter()
        .map(|c| c.criterion_id.clone())
        .collect();
    let answers = answers_for(ids.iter().map(String::as_str), 3);

    let results = complete_results(&catalog, &answers).unwrap();
    let strat = &results.dimension_scores[0];
    assert!(strat.pillar_scores.iter().all(|p| p.score == 9));
    assert_eq!(strat.total_points, 36);
    assert_eq!(strat.score, 3.0);
    assert_eq!(results.global_percentage, 100.0);
    assert_eq!(results.maturity_profile.level, MaturityLevel::Leader);
    assert_eq!(achieved_pillar(strat), 4);
    assert!(results.gaps.is_empty());
}

#[test]
fn partial_first_pillar_is_a_beginner_with_medium_gap() {
    let catalog = strat_catalog();
    let answers = answers_for(["STRAT-P1-C1", "STRAT-P1-C2", "STRAT-P1-C3"], 1);

    let results = complete_results(&catalog, &answers).unwrap();
    let strat = &results.dimension_scores[0];
    assert_eq!(strat.pillar_scores[0].percentage, 33.33);
    assert_eq!(strat.total_points, 3);
    assert_eq!(strat.percentage, 8.33);
    assert_eq!(strat.score, 0.25);
    assert_eq!(results.global_percentage, 8.33);
    assert_eq!(results.maturity_profile.level, MaturityLevel::Beginner);

    assert_eq!(results.gaps.len(), 1);
    let gap = &results.gaps[0];
    assert_eq!(gap.achieved_pillar, 0);
    assert_eq!(gap.target_pillar, 1);
    assert_eq!(gap.priority, GapPriority::Medium);
}

#[test]
fn empty_session_scores_zero_with_a_gap_per_dimension() {
    let catalog = Catalog::builtin().unwrap();
    let results = complete_results(&catalog, &[]).unwrap();

    assert_eq!(results.global_score, 0.0);
    assert_eq!(results.global_percentage, 0.0);
    assert_eq!(results.maturity_profile.level, MaturityLevel::Beginner);
    assert!(results
        .dimension_scores
        .iter()
        .all(|d| d.score == 0.0 && d.total_points == 0));
    assert_eq!(results.gaps.len(), catalog.list_dimensions().len());
    assert!(results.gaps.iter().all(|g| g.achieved_pillar == 0));
    assert!(results.recommendations.len() <= MAX_RECOMMENDATIONS);
}

#[test]
fn empty_catalog_yields_an_empty_report() {
    let results = complete_results(&Catalog::empty(), &[]).unwrap();
    assert!(results.dimension_scores.is_empty());
    assert_eq!(results.global_score, 0.0);
    assert!(results.gaps.is_empty());
}

#[test]
fn classifier_band_edges() {
    let cases = [
        (0.0, MaturityLevel::Beginner),
        (25.0, MaturityLevel::Beginner),
        (25.01, MaturityLevel::Emergent),
        (50.0, MaturityLevel::Emergent),
        (75.0, MaturityLevel::Challenger),
        (100.0, MaturityLevel::Leader),
    ];
    for (pct, level) in cases {
        assert_eq!(classify(pct).level, level, "percentage {pct}");
    }
}

#[test]
fn no_gaps_when_every_dimension_reaches_target() {
    let catalog = Catalog::builtin().unwrap();
    // P1 and P2 fully answered everywhere: every dimension reaches pillar 2.
    let answers: Vec<Answer> = catalog
        .list_criteria(&CriterionFilter::all())
        .into_iter()
        .filter(|c| c.pillar_code == "P1" || c.pillar_code == "P2")
        .map(|c| Answer::scored("s", c.criterion_id.clone(), 3).unwrap())
        .collect();
    let report = compute_report(&catalog, &answers).unwrap();

    assert!(find_gaps(&report.dimension_scores, MaturityLevel::Beginner).is_empty());
    assert!(find_gaps(&report.dimension_scores, MaturityLevel::Emergent).is_empty());
    assert_eq!(
        find_gaps(&report.dimension_scores, MaturityLevel::Leader).len(),
        6
    );
}

#[test]
fn leader_target_on_an_empty_session_fills_the_cap() {
    let catalog = Catalog::builtin().unwrap();
    let report = compute_report(&catalog, &[]).unwrap();
    let gaps = find_gaps(&report.dimension_scores, MaturityLevel::Leader);
    assert!(gaps.iter().all(|g| g.priority == GapPriority::High));

    let recs = recommend(&report.dimension_scores, &gaps, MaturityLevel::Leader);
    assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
    assert!(recs[0].starts_with("High priority: strengthen"));
}

#[test]
fn unknown_criterion_is_a_config_error() {
    let catalog = strat_catalog();
    let answers = answers_for(["TECH-P1-C1"], 2);
    let err = compute_report(&catalog, &answers).unwrap_err();
    assert_eq!(err.code(), "config_error");
}
