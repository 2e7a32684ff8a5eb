use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use maturity_harness::assessment::{Assessment, AssessmentError, NextQuestion};
use maturity_harness::catalog::{Catalog, Criterion, Dimension, Pillar};
use maturity_harness::interviewer::{
    EvaluationSource, FallbackInterviewer, Interviewer, TurnContext, TurnEvaluation,
};
use maturity_harness::ledger::{
    Answer, AnswerLedger, CompanyInfo, LedgerError, LedgerReader, MemoryLedger, NewAnswer,
    QuestionRecord, RecordedTurn, SessionRecord, SessionStatus, SqliteLedger, TurnRecord,
};
use maturity_harness::scoring::{GapPriority, MaturityLevel};
use tempfile::tempdir;

fn criterion(id: &str, pillar: &str, text: &str) -> Criterion {
    Criterion {
        criterion_id: id.to_string(),
        dimension_code: "STRAT".into(),
        pillar_code: pillar.to_string(),
        text: text.to_string(),
        options: Vec::new(),
        next_linear: None,
    }
}

fn small_catalog() -> Catalog {
    Catalog::linked(
        vec![Dimension {
            code: "STRAT".into(),
            name: "Strategy".into(),
            description: "Digital vision".into(),
        }],
        vec![
            Pillar {
                dimension_code: "STRAT".into(),
                code: "P1".into(),
                name: "Awareness".into(),
            },
            Pillar {
                dimension_code: "STRAT".into(),
                code: "P2".into(),
                name: "Planning".into(),
            },
        ],
        vec![
            criterion("STRAT-P1-C1", "P1", "Management is aware of digital stakes."),
            criterion("STRAT-P1-C2", "P1", "A digital budget exists."),
            criterion("STRAT-P2-C1", "P2", "A written digital roadmap exists."),
        ],
    )
    .unwrap()
}

fn company() -> CompanyInfo {
    CompanyInfo {
        name: "Acme".into(),
        sector: "Retail".into(),
        size: "10-49".into(),
    }
}

/// Scores answers from a fixed script and records what it was shown.
#[derive(Default)]
struct ScriptedInterviewer {
    scores: Mutex<Vec<u8>>,
    seen: Mutex<Vec<(usize, Option<String>)>>,
}

impl ScriptedInterviewer {
    fn new(scores: &[u8]) -> Self {
        Self {
            scores: Mutex::new(scores.iter().rev().copied().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Interviewer for ScriptedInterviewer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn opening_question(&self, _session_id: &str, criterion: &Criterion) -> String {
        format!("Opening: {}", criterion.text)
    }

    async fn evaluate(&self, ctx: &TurnContext) -> TurnEvaluation {
        self.seen.lock().unwrap().push((
            ctx.history.len(),
            ctx.next.as_ref().map(|c| c.criterion_id.clone()),
        ));
        let score = self.scores.lock().unwrap().pop().unwrap_or(0);
        TurnEvaluation {
            score,
            justification: format!("scripted {score}"),
            reaction: "Noted.".into(),
            next_question: ctx
                .next
                .as_ref()
                .map(|c| format!("Next: {}", c.criterion_id)),
            source: EvaluationSource::Llm,
        }
    }
}

/// Memory ledger whose first turn write fails, as a dropped connection would.
struct FailFirstTurn {
    inner: MemoryLedger,
    armed: AtomicBool,
}

impl FailFirstTurn {
    fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            armed: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl LedgerReader for FailFirstTurn {
    async fn find_answers(
        &self,
        session_id: &str,
        criterion_prefix: Option<&str>,
    ) -> Result<Vec<Answer>, LedgerError> {
        self.inner.find_answers(session_id, criterion_prefix).await
    }
}

#[async_trait]
impl AnswerLedger for FailFirstTurn {
    async fn create_session(
        &self,
        company: CompanyInfo,
        total_questions: u32,
        first_criterion_id: &str,
    ) -> Result<SessionRecord, LedgerError> {
        self.inner
            .create_session(company, total_questions, first_criterion_id)
            .await
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionRecord, LedgerError> {
        self.inner.get_session(session_id).await
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), LedgerError> {
        self.inner.update_session(session).await
    }

    async fn append_question(
        &self,
        session_id: &str,
        criterion_id: &str,
        text: &str,
    ) -> Result<QuestionRecord, LedgerError> {
        self.inner.append_question(session_id, criterion_id, text).await
    }

    async fn last_question(
        &self,
        session_id: &str,
        criterion_id: &str,
    ) -> Result<Option<QuestionRecord>, LedgerError> {
        self.inner.last_question(session_id, criterion_id).await
    }

    async fn count_questions(&self, session_id: &str) -> Result<u32, LedgerError> {
        self.inner.count_questions(session_id).await
    }

    async fn append_answer(&self, answer: NewAnswer) -> Result<Answer, LedgerError> {
        self.inner.append_answer(answer).await
    }

    async fn record_turn(&self, turn: TurnRecord) -> Result<RecordedTurn, LedgerError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Io(std::io::Error::other("disk went away")));
        }
        self.inner.record_turn(turn).await
    }
}

async fn answer_current(service: &Assessment, session_id: &str, text: &str) -> u8 {
    match service.next_question(session_id).await.unwrap() {
        NextQuestion::Question { .. } => {}
        NextQuestion::Completed => panic!("session completed early"),
    }
    service.submit_answer(session_id, text).await.unwrap().score
}

#[tokio::test]
async fn full_session_walks_catalog_and_scores_results() {
    let interviewer = Arc::new(ScriptedInterviewer::new(&[3, 3, 0]));
    let service = Assessment::new(
        Arc::new(small_catalog()),
        Arc::new(MemoryLedger::new()),
        interviewer.clone(),
    );

    let session = service.start(company()).await.unwrap();
    assert_eq!(session.total_questions, 3);
    assert_eq!(session.current_criterion_id.as_deref(), Some("STRAT-P1-C1"));

    let first = service.next_question(&session.id).await.unwrap();
    match &first {
        NextQuestion::Question { question, .. } => {
            assert_eq!(
                question.question_text,
                "Opening: Management is aware of digital stakes."
            );
        }
        NextQuestion::Completed => panic!("expected a question"),
    }

    let outcome = service.submit_answer(&session.id, "first").await.unwrap();
    assert_eq!(outcome.score, 3);
    assert_eq!(outcome.progress, 1);
    assert!(!outcome.completed);
    let next = outcome.next_question.expect("second question");
    assert_eq!(next.criterion_id, "STRAT-P1-C2");
    assert_eq!(next.question_text, "Next: STRAT-P1-C2");

    // The stored follow-up is served again rather than regenerated.
    match service.next_question(&session.id).await.unwrap() {
        NextQuestion::Question { question, progress, total } => {
            assert_eq!(question.question_id, next.question_id);
            assert_eq!((progress, total), (1, 3));
        }
        NextQuestion::Completed => panic!("expected a question"),
    }

    service.submit_answer(&session.id, "second").await.unwrap();
    let last = service.submit_answer(&session.id, "third").await.unwrap();
    assert!(last.completed);
    assert!(last.next_question.is_none());
    assert_eq!((last.progress, last.total), (3, 3));

    let seen = interviewer.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (0, Some("STRAT-P1-C2".to_string())),
            (1, Some("STRAT-P2-C1".to_string())),
            (2, None),
        ]
    );

    assert_eq!(
        service.next_question(&session.id).await.unwrap(),
        NextQuestion::Completed
    );
    let err = service.submit_answer(&session.id, "again").await.unwrap_err();
    assert!(matches!(err, AssessmentError::Completed(_)));

    let results = service.results(&session.id).await.unwrap();
    assert_eq!(results.company_name, "Acme");
    let r = &results.results;
    let strat = &r.dimension_scores[0];
    assert_eq!(strat.total_points, 6);
    assert_eq!(strat.max_points, 18);
    assert_eq!(strat.score, 1.0);
    assert_eq!(strat.percentage, 33.33);
    assert_eq!(strat.pillar_scores[0].percentage, 66.67);
    assert_eq!(r.global_score, 1.0);
    assert_eq!(r.global_percentage, 33.33);
    assert_eq!(r.maturity_profile.level, MaturityLevel::Emergent);

    assert_eq!(r.gaps.len(), 1);
    assert_eq!(r.gaps[0].achieved_pillar, 1);
    assert_eq!(r.gaps[0].target_pillar, 2);
    assert_eq!(r.gaps[0].priority, GapPriority::Medium);

    assert_eq!(r.recommendations.len(), 4);
    assert_eq!(r.recommendations[0], "Improve Strategy (currently 33%)");
}

#[tokio::test]
async fn export_includes_company_dates_and_answers() {
    let service = Assessment::new(
        Arc::new(small_catalog()),
        Arc::new(MemoryLedger::new()),
        Arc::new(FallbackInterviewer),
    );
    let session = service.start(company()).await.unwrap();

    let partial = service.export(&session.id).await.unwrap();
    assert!(partial.diagnostic_date.is_some());
    assert!(partial.completion_date.is_none());
    assert!(partial.detailed_answers.is_empty());
    assert_eq!(partial.results.global_score, 0.0);

    let yes = "Yes, we have a structured and automated process in place.";
    let none = "No, nothing at all.";
    assert_eq!(answer_current(&service, &session.id, yes).await, 3);
    assert_eq!(answer_current(&service, &session.id, none).await, 0);
    assert_eq!(answer_current(&service, &session.id, yes).await, 3);

    let export = service.export(&session.id).await.unwrap();
    assert_eq!(export.company_info, company());
    assert!(export.completion_date.is_some());
    assert_eq!(export.detailed_answers.len(), 3);
    assert_eq!(export.detailed_answers[1].criterion_id, "STRAT-P1-C2");
    assert_eq!(export.detailed_answers[1].criterion_text, "A digital budget exists.");
    assert_eq!(export.detailed_answers[1].user_text, none);
    assert_eq!(export.detailed_answers[1].score, 0);
    assert!(!export.detailed_answers[1].ai_reaction.is_empty());

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["company_info"]["name"], "Acme");
    assert_eq!(json["results"]["maturity_profile"]["level"], "emergent");
}

#[tokio::test]
async fn sqlite_backed_session_survives_a_new_service() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.sqlite");
    let catalog = Arc::new(small_catalog());

    let session_id = {
        let service = Assessment::new(
            catalog.clone(),
            Arc::new(SqliteLedger::new(&path).unwrap()),
            Arc::new(FallbackInterviewer),
        );
        let session = service.start(company()).await.unwrap();
        answer_current(
            &service,
            &session.id,
            "We are partially rolling out this approach now",
        )
        .await;
        session.id
    };

    let service = Assessment::new(
        catalog,
        Arc::new(SqliteLedger::new(&path).unwrap()),
        Arc::new(FallbackInterviewer),
    );
    let session = service.session(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.progress, 1);
    assert_eq!(session.current_criterion_id.as_deref(), Some("STRAT-P1-C2"));

    match service.next_question(&session_id).await.unwrap() {
        NextQuestion::Question { question, .. } => {
            assert_eq!(question.criterion_id, "STRAT-P1-C2");
        }
        NextQuestion::Completed => panic!("expected a question"),
    }

    let results = service.results(&session_id).await.unwrap();
    assert_eq!(results.results.dimension_scores[0].total_points, 2);
}

#[tokio::test]
async fn builtin_catalog_session_starts_at_first_criterion() {
    let service = Assessment::new(
        Arc::new(Catalog::builtin().unwrap()),
        Arc::new(MemoryLedger::new()),
        Arc::new(FallbackInterviewer),
    );
    let session = service.start(company()).await.unwrap();
    assert_eq!(session.total_questions, 72);

    let outcome = {
        service.next_question(&session.id).await.unwrap();
        service
            .submit_answer(&session.id, "No, nothing at all.")
            .await
            .unwrap()
    };
    assert_eq!(outcome.score, 0);
    assert_eq!(outcome.source, EvaluationSource::Fallback);
    assert_eq!(
        outcome.next_question.map(|q| q.criterion_id).as_deref(),
        Some("STRAT-P1-C2")
    );
}

#[tokio::test]
async fn retried_turn_after_a_failed_write_counts_once() {
    let service = Assessment::new(
        Arc::new(small_catalog()),
        Arc::new(FailFirstTurn::new()),
        Arc::new(ScriptedInterviewer::new(&[3, 3])),
    );
    let session = service.start(company()).await.unwrap();
    service.next_question(&session.id).await.unwrap();

    let err = service
        .submit_answer(&session.id, "We track it monthly")
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::Ledger(LedgerError::Io(_))));

    let unchanged = service.session(&session.id).await.unwrap();
    assert_eq!(unchanged.progress, 0);
    assert_eq!(unchanged.current_criterion_id.as_deref(), Some("STRAT-P1-C1"));

    let outcome = service
        .submit_answer(&session.id, "We track it monthly")
        .await
        .unwrap();
    assert_eq!(outcome.progress, 1);
    assert_eq!(
        outcome.next_question.map(|q| q.criterion_id).as_deref(),
        Some("STRAT-P1-C2")
    );

    let results = service.results(&session.id).await.unwrap();
    let p1 = &results.results.dimension_scores[0].pillar_scores[0];
    assert_eq!(p1.answered_count, 1);
    assert_eq!(p1.score, 3);
}
