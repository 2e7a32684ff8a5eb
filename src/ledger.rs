//! Answer ledger: sessions, asked questions and scored answers.
//!
//! The ledger is append-only for answers. The scoring engine only reads from
//! it; the assessment service is the sole writer. Two backends:
//! - [`SqliteLedger`] persists to a local SQLite file (WAL journal)
//! - [`MemoryLedger`] keeps everything in-process (tests, offline scoring)

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::MAX_POINTS_PER_CRITERION;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "abandoned" => Self::Abandoned,
            _ => Self::InProgress,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub company: CompanyInfo,
    pub status: SessionStatus,
    /// Number of answered questions.
    pub progress: u32,
    pub total_questions: u32,
    pub current_criterion_id: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl SessionRecord {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub session_id: String,
    pub criterion_id: String,
    pub text: String,
    /// 1-based position of the question in the session.
    pub order: u32,
    pub created_at: i64,
}

/// One scored observation for a (session, criterion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub question_id: Option<String>,
    pub criterion_id: String,
    #[serde(default)]
    pub user_text: String,
    pub score: u8,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl Answer {
    /// Minimal scored answer with no interview context.
    pub fn scored(
        session_id: impl Into<String>,
        criterion_id: impl Into<String>,
        score: u8,
    ) -> Result<Self, LedgerError> {
        check_score(score)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            question_id: None,
            criterion_id: criterion_id.into(),
            user_text: String::new(),
            score,
            explanation: None,
            reaction: None,
            created_at: now_epoch(),
        })
    }
}

/// Answer to append; the ledger assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub session_id: String,
    pub question_id: Option<String>,
    pub criterion_id: String,
    pub user_text: String,
    pub score: u8,
    pub explanation: Option<String>,
    pub reaction: Option<String>,
}

impl NewAnswer {
    fn into_answer(self) -> Answer {
        Answer {
            id: Uuid::new_v4().to_string(),
            session_id: self.session_id,
            question_id: self.question_id,
            criterion_id: self.criterion_id,
            user_text: self.user_text,
            score: self.score,
            explanation: self.explanation,
            reaction: self.reaction,
            created_at: now_epoch(),
        }
    }
}

/// Writes of one answered turn.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub answer: NewAnswer,
    /// `(criterion_id, text)` of the question to ask next.
    pub next_question: Option<(String, String)>,
    /// Session state after the turn.
    pub session: SessionRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTurn {
    pub answer: Answer,
    pub next_question: Option<QuestionRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid ledger data: {0}")]
    Config(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn check_score(score: u8) -> Result<(), LedgerError> {
    if u32::from(score) > MAX_POINTS_PER_CRITERION {
        return Err(LedgerError::Config(format!(
            "score {score} outside 0..={MAX_POINTS_PER_CRITERION}"
        )));
    }
    Ok(())
}

// =============================================================================
// Traits
// =============================================================================

/// Read side consumed by scoring.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Answers of a session in insertion order, optionally restricted to
    /// criterion ids starting with `criterion_prefix`.
    /// Fails with `NotFound` when the session is unknown.
    async fn find_answers(
        &self,
        session_id: &str,
        criterion_prefix: Option<&str>,
    ) -> Result<Vec<Answer>, LedgerError>;
}

/// Full ledger used by the assessment service.
#[async_trait]
pub trait AnswerLedger: LedgerReader {
    async fn create_session(
        &self,
        company: CompanyInfo,
        total_questions: u32,
        first_criterion_id: &str,
    ) -> Result<SessionRecord, LedgerError>;

    async fn get_session(&self, session_id: &str) -> Result<SessionRecord, LedgerError>;

    /// Persist progress, status and cursor of an existing session.
    async fn update_session(&self, session: &SessionRecord) -> Result<(), LedgerError>;

    async fn append_question(
        &self,
        session_id: &str,
        criterion_id: &str,
        text: &str,
    ) -> Result<QuestionRecord, LedgerError>;

    /// Most recent question asked for a criterion in a session.
    async fn last_question(
        &self,
        session_id: &str,
        criterion_id: &str,
    ) -> Result<Option<QuestionRecord>, LedgerError>;

    async fn count_questions(&self, session_id: &str) -> Result<u32, LedgerError>;

    async fn append_answer(&self, answer: NewAnswer) -> Result<Answer, LedgerError>;

    /// Store an answered turn as one unit: the answer, the question for the
    /// next criterion when there is one, and the advanced session. Either all
    /// three land or none do.
    async fn record_turn(&self, turn: TurnRecord) -> Result<RecordedTurn, LedgerError>;
}

// =============================================================================
// SQLite backend
// =============================================================================

#[derive(Clone)]
pub struct SqliteLedger {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             CREATE TABLE IF NOT EXISTS sessions (\
               id TEXT PRIMARY KEY,\
               company_name TEXT NOT NULL,\
               company_sector TEXT NOT NULL,\
               company_size TEXT NOT NULL,\
               status TEXT NOT NULL,\
               progress INTEGER NOT NULL,\
               total_questions INTEGER NOT NULL,\
               current_criterion_id TEXT,\
               created_at INTEGER NOT NULL,\
               completed_at INTEGER \
             );\
             CREATE TABLE IF NOT EXISTS questions (\
               id TEXT PRIMARY KEY,\
               session_id TEXT NOT NULL REFERENCES sessions(id),\
               criterion_id TEXT NOT NULL,\
               text TEXT NOT NULL,\
               ord INTEGER NOT NULL,\
               created_at INTEGER NOT NULL \
             );\
             CREATE INDEX IF NOT EXISTS questions_session ON questions(session_id, criterion_id);\
             CREATE TABLE IF NOT EXISTS answers (\
               id TEXT PRIMARY KEY,\
               session_id TEXT NOT NULL REFERENCES sessions(id),\
               question_id TEXT,\
               criterion_id TEXT NOT NULL,\
               user_text TEXT NOT NULL,\
               score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 3),\
               explanation TEXT,\
               reaction TEXT,\
               created_at INTEGER NOT NULL \
             );\
             CREATE INDEX IF NOT EXISTS answers_session ON answers(session_id, criterion_id);",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("MATURITY_STORE_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from(".maturity_ledger.sqlite")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        let guard = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        f(&guard)
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError> + Send + 'static,
        R: Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || ledger.with_conn(f))
            .await
            .map_err(|e| LedgerError::Join(e.to_string()))?
    }

    /// Write a session's answers as JSON lines.
    pub async fn export_answers_jsonl(
        &self,
        session_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<usize, LedgerError> {
        let answers = self.find_answers(session_id, None).await?;
        let mut file = std::fs::File::create(path)?;
        for answer in &answers {
            let line =
                serde_json::to_string(answer).map_err(|e| LedgerError::Serde(e.to_string()))?;
            writeln!(file, "{line}")?;
        }
        Ok(answers.len())
    }
}

fn session_exists(conn: &Connection, session_id: &str) -> Result<bool, LedgerError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn answer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(0)?,
        session_id: row.get(1)?,
        question_id: row.get(2)?,
        criterion_id: row.get(3)?,
        user_text: row.get(4)?,
        score: row.get::<_, i64>(5)?.clamp(0, i64::from(u8::MAX)) as u8,
        explanation: row.get(6)?,
        reaction: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn question_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionRecord> {
    Ok(QuestionRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        criterion_id: row.get(2)?,
        text: row.get(3)?,
        order: row.get::<_, i64>(4)?.max(0) as u32,
        created_at: row.get(5)?,
    })
}

#[async_trait]
impl LedgerReader for SqliteLedger {
    async fn find_answers(
        &self,
        session_id: &str,
        criterion_prefix: Option<&str>,
    ) -> Result<Vec<Answer>, LedgerError> {
        let session_id = session_id.to_string();
        let prefix = criterion_prefix.map(str::to_string);
        self.blocking(move |conn| {
            if !session_exists(conn, &session_id)? {
                return Err(LedgerError::NotFound(format!("session {session_id}")));
            }
            let mut stmt = conn.prepare(
                "SELECT id, session_id, question_id, criterion_id, user_text, score,\
                        explanation, reaction, created_at \
                 FROM answers WHERE session_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![session_id], answer_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                let answer = row?;
                if prefix
                    .as_deref()
                    .map_or(true, |p| answer.criterion_id.starts_with(p))
                {
                    out.push(answer);
                }
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl AnswerLedger for SqliteLedger {
    async fn create_session(
        &self,
        company: CompanyInfo,
        total_questions: u32,
        first_criterion_id: &str,
    ) -> Result<SessionRecord, LedgerError> {
        let session = SessionRecord {
            id: Uuid::new_v4().to_string(),
            company,
            status: SessionStatus::InProgress,
            progress: 0,
            total_questions,
            current_criterion_id: Some(first_criterion_id.to_string()),
            created_at: now_epoch(),
            completed_at: None,
        };
        let row = session.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (\
                    id, company_name, company_sector, company_size, status, progress,\
                    total_questions, current_criterion_id, created_at, completed_at \
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.id,
                    row.company.name,
                    row.company.sector,
                    row.company.size,
                    row.status.as_str(),
                    row.progress,
                    row.total_questions,
                    row.current_criterion_id,
                    row.created_at,
                    row.completed_at,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionRecord, LedgerError> {
        let session_id = session_id.to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, company_name, company_sector, company_size, status, progress,\
                        total_questions, current_criterion_id, created_at, completed_at \
                 FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        company: CompanyInfo {
                            name: row.get(1)?,
                            sector: row.get(2)?,
                            size: row.get(3)?,
                        },
                        status: SessionStatus::from_db(&row.get::<_, String>(4)?),
                        progress: row.get::<_, i64>(5)?.max(0) as u32,
                        total_questions: row.get::<_, i64>(6)?.max(0) as u32,
                        current_criterion_id: row.get(7)?,
                        created_at: row.get(8)?,
                        completed_at: row.get(9)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(format!("session {session_id}")))
        })
        .await
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), LedgerError> {
        let row = session.clone();
        self.blocking(move |conn| write_session(conn, &row)).await
    }

    async fn append_question(
        &self,
        session_id: &str,
        criterion_id: &str,
        text: &str,
    ) -> Result<QuestionRecord, LedgerError> {
        let session_id = session_id.to_string();
        let criterion_id = criterion_id.to_string();
        let text = text.to_string();
        self.blocking(move |conn| insert_question(conn, &session_id, &criterion_id, &text))
            .await
    }

    async fn last_question(
        &self,
        session_id: &str,
        criterion_id: &str,
    ) -> Result<Option<QuestionRecord>, LedgerError> {
        let session_id = session_id.to_string();
        let criterion_id = criterion_id.to_string();
        self.blocking(move |conn| {
            let question = conn
                .query_row(
                    "SELECT id, session_id, criterion_id, text, ord, created_at \
                     FROM questions WHERE session_id = ?1 AND criterion_id = ?2 \
                     ORDER BY ord DESC, rowid DESC LIMIT 1",
                    params![session_id, criterion_id],
                    question_from_row,
                )
                .optional()?;
            Ok(question)
        })
        .await
    }

    async fn count_questions(&self, session_id: &str) -> Result<u32, LedgerError> {
        let session_id = session_id.to_string();
        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM questions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u32)
        })
        .await
    }

    async fn append_answer(&self, answer: NewAnswer) -> Result<Answer, LedgerError> {
        check_score(answer.score)?;
        let answer = answer.into_answer();
        let row = answer.clone();
        self.blocking(move |conn| insert_answer(conn, &row)).await?;
        Ok(answer)
    }

    async fn record_turn(&self, turn: TurnRecord) -> Result<RecordedTurn, LedgerError> {
        check_score(turn.answer.score)?;
        let answer = turn.answer.into_answer();
        let next_question = turn.next_question;
        let session = turn.session;
        self.blocking(move |conn| {
            let tx = conn.unchecked_transaction()?;
            match record_turn_inner(&tx, &answer, next_question, &session) {
                Ok(question) => {
                    tx.commit()?;
                    Ok(RecordedTurn {
                        answer,
                        next_question: question,
                    })
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
        .await
    }
}

fn record_turn_inner(
    conn: &Connection,
    answer: &Answer,
    next_question: Option<(String, String)>,
    session: &SessionRecord,
) -> Result<Option<QuestionRecord>, LedgerError> {
    if answer.session_id != session.id {
        return Err(LedgerError::Config(format!(
            "answer for session {} recorded against session {}",
            answer.session_id, session.id
        )));
    }
    insert_answer(conn, answer)?;
    let question = next_question
        .map(|(criterion_id, text)| insert_question(conn, &session.id, &criterion_id, &text))
        .transpose()?;
    write_session(conn, session)?;
    Ok(question)
}

fn insert_answer(conn: &Connection, row: &Answer) -> Result<(), LedgerError> {
    if !session_exists(conn, &row.session_id)? {
        return Err(LedgerError::NotFound(format!("session {}", row.session_id)));
    }
    conn.execute(
        "INSERT INTO answers (\
            id, session_id, question_id, criterion_id, user_text, score,\
            explanation, reaction, created_at \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.id,
            row.session_id,
            row.question_id,
            row.criterion_id,
            row.user_text,
            row.score,
            row.explanation,
            row.reaction,
            row.created_at,
        ],
    )?;
    Ok(())
}

fn insert_question(
    conn: &Connection,
    session_id: &str,
    criterion_id: &str,
    text: &str,
) -> Result<QuestionRecord, LedgerError> {
    if !session_exists(conn, session_id)? {
        return Err(LedgerError::NotFound(format!("session {session_id}")));
    }
    let asked: i64 = conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    let question = QuestionRecord {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        criterion_id: criterion_id.to_string(),
        text: text.to_string(),
        order: asked.max(0) as u32 + 1,
        created_at: now_epoch(),
    };
    conn.execute(
        "INSERT INTO questions (id, session_id, criterion_id, text, ord, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            question.id,
            question.session_id,
            question.criterion_id,
            question.text,
            question.order,
            question.created_at,
        ],
    )?;
    Ok(question)
}

fn write_session(conn: &Connection, row: &SessionRecord) -> Result<(), LedgerError> {
    let updated = conn.execute(
        "UPDATE sessions SET status = ?1, progress = ?2, current_criterion_id = ?3,\
                completed_at = ?4 \
         WHERE id = ?5",
        params![
            row.status.as_str(),
            row.progress,
            row.current_criterion_id,
            row.completed_at,
            row.id,
        ],
    )?;
    if updated == 0 {
        return Err(LedgerError::NotFound(format!("session {}", row.id)));
    }
    Ok(())
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<String, SessionRecord>,
    questions: Vec<QuestionRecord>,
    answers: Vec<Answer>,
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&mut MemoryState) -> Result<R, LedgerError>,
    {
        let mut guard = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        f(&mut guard)
    }
}

fn require_session<'a>(
    state: &'a MemoryState,
    session_id: &str,
) -> Result<&'a SessionRecord, LedgerError> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| LedgerError::NotFound(format!("session {session_id}")))
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn find_answers(
        &self,
        session_id: &str,
        criterion_prefix: Option<&str>,
    ) -> Result<Vec<Answer>, LedgerError> {
        self.with_state(|state| {
            require_session(state, session_id)?;
            Ok(state
                .answers
                .iter()
                .filter(|a| a.session_id == session_id)
                .filter(|a| criterion_prefix.map_or(true, |p| a.criterion_id.starts_with(p)))
                .cloned()
                .collect())
        })
    }
}

#[async_trait]
impl AnswerLedger for MemoryLedger {
    async fn create_session(
        &self,
        company: CompanyInfo,
        total_questions: u32,
        first_criterion_id: &str,
    ) -> Result<SessionRecord, LedgerError> {
        let session = SessionRecord {
            id: Uuid::new_v4().to_string(),
            company,
            status: SessionStatus::InProgress,
            progress: 0,
            total_questions,
            current_criterion_id: Some(first_criterion_id.to_string()),
            created_at: now_epoch(),
            completed_at: None,
        };
        self.with_state(|state| {
            state.sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionRecord, LedgerError> {
        self.with_state(|state| require_session(state, session_id).cloned())
    }

    async fn update_session(&self, session: &SessionRecord) -> Result<(), LedgerError> {
        self.with_state(|state| {
            let slot = state
                .sessions
                .get_mut(&session.id)
                .ok_or_else(|| LedgerError::NotFound(format!("session {}", session.id)))?;
            *slot = session.clone();
            Ok(())
        })
    }

    async fn append_question(
        &self,
        session_id: &str,
        criterion_id: &str,
        text: &str,
    ) -> Result<QuestionRecord, LedgerError> {
        self.with_state(|state| {
            require_session(state, session_id)?;
            Ok(push_question(state, session_id, criterion_id, text))
        })
    }

    async fn last_question(
        &self,
        session_id: &str,
        criterion_id: &str,
    ) -> Result<Option<QuestionRecord>, LedgerError> {
        self.with_state(|state| {
            Ok(state
                .questions
                .iter()
                .rev()
                .find(|q| q.session_id == session_id && q.criterion_id == criterion_id)
                .cloned())
        })
    }

    async fn count_questions(&self, session_id: &str) -> Result<u32, LedgerError> {
        self.with_state(|state| {
            Ok(state
                .questions
                .iter()
                .filter(|q| q.session_id == session_id)
                .count() as u32)
        })
    }

    async fn append_answer(&self, answer: NewAnswer) -> Result<Answer, LedgerError> {
        check_score(answer.score)?;
        self.with_state(|state| {
            require_session(state, &answer.session_id)?;
            let answer = answer.into_answer();
            state.answers.push(answer.clone());
            Ok(answer)
        })
    }

    async fn record_turn(&self, turn: TurnRecord) -> Result<RecordedTurn, LedgerError> {
        check_score(turn.answer.score)?;
        self.with_state(|state| {
            let session = turn.session;
            if turn.answer.session_id != session.id {
                return Err(LedgerError::Config(format!(
                    "answer for session {} recorded against session {}",
                    turn.answer.session_id, session.id
                )));
            }
            require_session(state, &session.id)?;

            let answer = turn.answer.into_answer();
            state.answers.push(answer.clone());
            let next_question = turn
                .next_question
                .map(|(criterion_id, text)| push_question(state, &session.id, &criterion_id, &text));
            state.sessions.insert(session.id.clone(), session);
            Ok(RecordedTurn {
                answer,
                next_question,
            })
        })
    }
}

fn push_question(
    state: &mut MemoryState,
    session_id: &str,
    criterion_id: &str,
    text: &str,
) -> QuestionRecord {
    let asked = state
        .questions
        .iter()
        .filter(|q| q.session_id == session_id)
        .count();
    let question = QuestionRecord {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        criterion_id: criterion_id.to_string(),
        text: text.to_string(),
        order: asked as u32 + 1,
        created_at: now_epoch(),
    };
    state.questions.push(question.clone());
    question
}

pub(crate) fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
