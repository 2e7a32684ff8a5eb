#![forbid(unsafe_code)]

//! # maturity-harness
//!
//! Conversational digital-maturity assessment for small and medium businesses.
//!
//! An interviewer (LLM-backed or a deterministic keyword heuristic) walks a
//! company through a fixed catalog of criteria: dimensions, each split into
//! four pillars of three criteria. Every answer is scored 0..=3 and appended to
//! a ledger. The scoring engine turns the ledger into per-pillar and
//! per-dimension scores, a global score, a maturity profile, gaps against the
//! profile's target pillar and a short list of recommendations.
//!
//! The engine is pure and deterministic: the same catalog and answers always
//! produce the same report. Only question phrasing and answer scoring touch a
//! model, and both fall back to the heuristic when the model is unavailable.

pub mod assessment;
pub mod catalog;
pub mod config;
pub mod gateway;
pub mod interviewer;
pub mod ledger;
pub mod prompts;
pub mod scoring;

pub use assessment::{
    AnswerOutcome, Assessment, AssessmentError, DetailedAnswer, NextQuestion, QuestionView,
    SessionExport,
};
pub use catalog::{Catalog, CatalogReader, Criterion, CriterionFilter, Dimension, Pillar};
pub use config::{AiProvider, AppConfig, ConfigError};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use interviewer::{build_interviewer, FallbackInterviewer, Interviewer, LlmInterviewer};
pub use ledger::{
    Answer, AnswerLedger, CompanyInfo, LedgerError, LedgerReader, MemoryLedger, SessionRecord,
    SessionStatus, SqliteLedger,
};
pub use scoring::{
    compute_report, find_gaps, recommend, CompleteResults, DimensionScore, Gap, MaturityLevel,
    MaturityProfile, ScoreReport, ScoringError, SessionResults,
};
