//! Assessment service: session lifecycle around the scoring engine.
//!
//! A session walks the catalog's linear order. Each turn stores the question
//! asked, scores the answer through the configured [`Interviewer`], then
//! stores the answer, the next question and the moved cursor in one ledger
//! write. Results are recomputed from the
//! ledger on every call and are valid for partial sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{Catalog, Criterion};
use crate::interviewer::{fallback_question, EvaluationSource, HistoryTurn, Interviewer, TurnContext};
use crate::ledger::{
    now_epoch, AnswerLedger, CompanyInfo, LedgerError, LedgerReader, NewAnswer, QuestionRecord,
    SessionRecord, SessionStatus, TurnRecord,
};
use crate::scoring::{complete_results, CompleteResults, ScoringError, SessionResults};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("session {0} is already completed")]
    Completed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AssessmentError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Scoring(e) => matches!(e, ScoringError::NotFound(_)),
            Self::Ledger(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: String,
    pub question_text: String,
    pub criterion_id: String,
    pub dimension: String,
    pub pillar: String,
}

impl QuestionView {
    fn new(question: QuestionRecord, criterion: &Criterion) -> Self {
        Self {
            question_id: question.id,
            question_text: question.text,
            criterion_id: criterion.criterion_id.clone(),
            dimension: criterion.dimension_code.clone(),
            pillar: criterion.pillar_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextQuestion {
    Question {
        question: QuestionView,
        progress: u32,
        total: u32,
    },
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub score: u8,
    pub explanation: String,
    pub ai_reaction: String,
    pub source: EvaluationSource,
    pub progress: u32,
    pub total: u32,
    pub completed: bool,
    pub next_question: Option<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedAnswer {
    pub criterion_id: String,
    pub criterion_text: String,
    pub user_text: String,
    pub score: u8,
    pub explanation: String,
    pub ai_reaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: String,
    pub company_info: CompanyInfo,
    /// RFC 3339.
    pub diagnostic_date: Option<String>,
    pub completion_date: Option<String>,
    pub results: CompleteResults,
    pub detailed_answers: Vec<DetailedAnswer>,
}

fn rfc3339(epoch: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(epoch, 0).map(|d| d.to_rfc3339())
}

// =============================================================================
// Service
// =============================================================================

pub struct Assessment {
    catalog: Arc<Catalog>,
    ledger: Arc<dyn AnswerLedger>,
    interviewer: Arc<dyn Interviewer>,
    /// Serializes turns within one session.
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Assessment {
    pub fn new(
        catalog: Arc<Catalog>,
        ledger: Arc<dyn AnswerLedger>,
        interviewer: Arc<dyn Interviewer>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            interviewer,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn interviewer_name(&self) -> &'static str {
        self.interviewer.name()
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        match self.session_locks.lock() {
            Ok(mut locks) => locks.entry(session_id.to_string()).or_default().clone(),
            // A poisoned map only loses serialization, not data.
            Err(poisoned) => poisoned
                .into_inner()
                .entry(session_id.to_string())
                .or_default()
                .clone(),
        }
    }

    /// Drop the turn lock of a finished session. Later calls only read.
    fn release_session_lock(&self, session_id: &str) {
        match self.session_locks.lock() {
            Ok(mut locks) => locks.remove(session_id),
            Err(poisoned) => poisoned.into_inner().remove(session_id),
        };
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.session_locks.lock().map(|l| l.len()).unwrap_or_default()
    }

    fn current_criterion(&self, session: &SessionRecord) -> Result<&Criterion, AssessmentError> {
        let id = session.current_criterion_id.as_deref().ok_or_else(|| {
            ScoringError::config(format!("session {} has no current criterion", session.id))
        })?;
        self.catalog
            .criterion(id)
            .ok_or_else(|| ScoringError::config(format!("unknown criterion {id}")).into())
    }

    pub async fn start(&self, company: CompanyInfo) -> Result<SessionRecord, AssessmentError> {
        if company.name.trim().is_empty() {
            return Err(AssessmentError::InvalidInput(
                "company name is required".to_string(),
            ));
        }
        let first = self
            .catalog
            .first()
            .ok_or_else(|| ScoringError::not_found("catalog has no criteria"))?;
        let session = self
            .ledger
            .create_session(
                company,
                self.catalog.total_criteria() as u32,
                &first.criterion_id,
            )
            .await?;
        info!(
            session_id = %session.id,
            total_questions = session.total_questions,
            interviewer = self.interviewer.name(),
            "assessment started"
        );
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionRecord, AssessmentError> {
        Ok(self.ledger.get_session(session_id).await?)
    }

    /// Question for the current criterion, generated and stored on first ask.
    pub async fn next_question(&self, session_id: &str) -> Result<NextQuestion, AssessmentError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.ledger.get_session(session_id).await?;
        if session.is_completed() {
            return Ok(NextQuestion::Completed);
        }
        let criterion = self.current_criterion(&session)?;

        let question = match self
            .ledger
            .last_question(session_id, &criterion.criterion_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let asked = self.ledger.count_questions(session_id).await?;
                let text = if asked == 0 {
                    self.interviewer
                        .opening_question(session_id, criterion)
                        .await
                } else {
                    fallback_question(criterion)
                };
                debug!(session_id, criterion_id = %criterion.criterion_id, "question stored");
                self.ledger
                    .append_question(session_id, &criterion.criterion_id, &text)
                    .await?
            }
        };

        Ok(NextQuestion::Question {
            question: QuestionView::new(question, criterion),
            progress: session.progress,
            total: session.total_questions,
        })
    }

    /// Score an answer to the current question and advance the session.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<AnswerOutcome, AssessmentError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(AssessmentError::InvalidInput(
                "answer text is empty".to_string(),
            ));
        }

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.ledger.get_session(session_id).await?;
        if session.is_completed() {
            return Err(AssessmentError::Completed(session.id));
        }
        let current = self.current_criterion(&session)?;
        let question = self
            .ledger
            .last_question(session_id, &current.criterion_id)
            .await?
            .ok_or_else(|| {
                ScoringError::config(format!(
                    "no question asked for {} in session {session_id}",
                    current.criterion_id
                ))
            })?;

        let history = self
            .ledger
            .find_answers(session_id, None)
            .await?
            .into_iter()
            .map(|a| HistoryTurn {
                criterion_id: a.criterion_id,
                user_text: a.user_text,
                score: a.score,
            })
            .collect();
        let next = self.catalog.next(&current.criterion_id);

        let evaluation = self
            .interviewer
            .evaluate(&TurnContext {
                session_id: session_id.to_string(),
                history,
                answer: user_text.to_string(),
                current: current.clone(),
                next: next.cloned(),
            })
            .await;

        session.progress += 1;
        let next_question = match next {
            Some(next) => {
                let text = evaluation
                    .next_question
                    .clone()
                    .unwrap_or_else(|| fallback_question(next));
                session.current_criterion_id = Some(next.criterion_id.clone());
                Some((next.criterion_id.clone(), text))
            }
            None => {
                session.status = SessionStatus::Completed;
                session.completed_at = Some(now_epoch());
                None
            }
        };

        let recorded = self
            .ledger
            .record_turn(TurnRecord {
                answer: NewAnswer {
                    session_id: session_id.to_string(),
                    question_id: Some(question.id),
                    criterion_id: current.criterion_id.clone(),
                    user_text: user_text.to_string(),
                    score: evaluation.score,
                    explanation: Some(evaluation.justification.clone()),
                    reaction: Some(evaluation.reaction.clone()),
                },
                next_question,
                session: session.clone(),
            })
            .await?;

        info!(
            session_id,
            criterion_id = %current.criterion_id,
            score = evaluation.score,
            source = ?evaluation.source,
            progress = session.progress,
            "answer scored"
        );

        let next_question = match (recorded.next_question, next) {
            (Some(stored), Some(next)) => Some(QuestionView::new(stored, next)),
            _ => None,
        };
        if session.is_completed() {
            info!(session_id, answered = session.progress, "assessment completed");
            self.release_session_lock(session_id);
        }

        Ok(AnswerOutcome {
            score: evaluation.score,
            explanation: evaluation.justification,
            ai_reaction: evaluation.reaction,
            source: evaluation.source,
            progress: session.progress,
            total: session.total_questions,
            completed: next_question.is_none(),
            next_question,
        })
    }

    pub async fn results(&self, session_id: &str) -> Result<SessionResults, AssessmentError> {
        let session = self.ledger.get_session(session_id).await?;
        let answers = self.ledger.find_answers(session_id, None).await?;
        let results = complete_results(self.catalog.as_ref(), &answers)?;
        Ok(SessionResults {
            session_id: session.id,
            company_name: session.company.name,
            results,
        })
    }

    pub async fn export(&self, session_id: &str) -> Result<SessionExport, AssessmentError> {
        let session = self.ledger.get_session(session_id).await?;
        let answers = self.ledger.find_answers(session_id, None).await?;
        let results = complete_results(self.catalog.as_ref(), &answers)?;
        let detailed_answers = answers
            .into_iter()
            .map(|a| DetailedAnswer {
                criterion_text: self
                    .catalog
                    .criterion(&a.criterion_id)
                    .map(|c| c.text.clone())
                    .unwrap_or_default(),
                criterion_id: a.criterion_id,
                user_text: a.user_text,
                score: a.score,
                explanation: a.explanation.unwrap_or_default(),
                ai_reaction: a.reaction.unwrap_or_default(),
            })
            .collect();

        Ok(SessionExport {
            session_id: session.id,
            company_info: session.company,
            diagnostic_date: rfc3339(session.created_at),
            completion_date: session.completed_at.and_then(rfc3339),
            results,
            detailed_answers,
        })
    }
}
