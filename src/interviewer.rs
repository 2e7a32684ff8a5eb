//! Interview strategies: phrase questions and score free-text answers.
//!
//! [`LlmInterviewer`] asks a chat model; [`FallbackInterviewer`] uses a
//! keyword heuristic and fixed phrasing. The service holds one of them as an
//! `Arc<dyn Interviewer>` chosen at startup by [`build_interviewer`].
//! Neither variant fails: LLM errors degrade to the fallback behaviour.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Criterion, MAX_POINTS_PER_CRITERION};
use crate::config::{AiProvider, AppConfig};
use crate::gateway::{
    Attribution, ChatGateway, ChatModel, ChatRequest, ProviderGateway, TracingUsageSink,
};
use crate::prompts::{render_evaluation, render_opening};

/// Output cap for the opening question.
const OPENING_MAX_TOKENS: u32 = 200;

// =============================================================================
// Types
// =============================================================================

/// One earlier exchange, fed back to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub criterion_id: String,
    pub user_text: String,
    pub score: u8,
}

#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub history: Vec<HistoryTurn>,
    pub answer: String,
    pub current: Criterion,
    /// `None` on the last criterion.
    pub next: Option<Criterion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEvaluation {
    /// Always within 0..=3.
    pub score: u8,
    pub justification: String,
    pub reaction: String,
    pub next_question: Option<String>,
    pub source: EvaluationSource,
}

#[async_trait]
pub trait Interviewer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn opening_question(&self, session_id: &str, criterion: &Criterion) -> String;

    async fn evaluate(&self, ctx: &TurnContext) -> TurnEvaluation;
}

// =============================================================================
// Fallback heuristic
// =============================================================================

const ABSENCE_KEYWORDS: &[&str] = &[
    "no",
    "none",
    "nothing",
    "never",
    "not at all",
    "not yet",
    "absent",
    "nonexistent",
    "dont have",
    "does not exist",
];

const BASIC_KEYWORDS: &[&str] = &[
    "basic",
    "simple",
    "manual",
    "manually",
    "occasional",
    "occasionally",
    "sometimes",
    "few",
    "limited",
    "minimal",
    "beginning",
];

const DEVELOPING_KEYWORDS: &[&str] = &[
    "in progress",
    "developing",
    "partially",
    "partial",
    "some",
    "several",
    "gradually",
    "moderately",
    "rolling out",
];

const MATURE_KEYWORDS: &[&str] = &[
    "yes",
    "regularly",
    "systematic",
    "systematically",
    "mature",
    "advanced",
    "structured",
    "optimized",
    "automated",
    "complete",
    "integrated",
    "always",
    "all",
];

/// Lowercased words joined by single spaces and padded, so that phrase
/// lookups match whole words only.
fn normalize(text: &str) -> (String, usize) {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    (format!(" {} ", words.join(" ")), words.len())
}

fn count_hits(padded: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|kw| padded.contains(&format!(" {kw} ")))
        .count()
}

/// Best-effort 0-3 score from an answer's wording and length.
pub fn estimate_score(answer: &str) -> u8 {
    let (padded, word_count) = normalize(answer);
    let absent = count_hits(&padded, ABSENCE_KEYWORDS);
    let basic = count_hits(&padded, BASIC_KEYWORDS);
    let developing = count_hits(&padded, DEVELOPING_KEYWORDS);
    let mature = count_hits(&padded, MATURE_KEYWORDS);

    if absent > 0 || word_count < 5 {
        0
    } else if mature >= 2 || (mature > 0 && word_count > 30) {
        3
    } else if developing > 0 || (basic > 0 && word_count > 15) {
        2
    } else if basic > 0 || word_count > 10 {
        1
    } else if word_count < 15 {
        1
    } else {
        2
    }
}

/// Stable pick among `len` alternatives keyed by `key`.
fn pick(key: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let digest = blake3::hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(head) % len as u64) as usize
}

pub fn fallback_reaction(score: u8, answer: &str) -> &'static str {
    const REACTIONS: [[&str; 3]; 4] = [
        [
            "I see, this is an area you are just starting on.",
            "That is a point worth developing in the future.",
            "No problem, this is an opportunity to improve.",
        ],
        [
            "Good, you have laid the first foundations!",
            "That is a good start, let's keep exploring.",
            "Interesting, you are in an initial phase here.",
        ],
        [
            "Very good! You are on the right track.",
            "Great, you are making progress in this area!",
            "I can see you have already made significant headway.",
        ],
        [
            "Impressive! You have a mature approach.",
            "Excellent! You are very advanced on this point.",
            "Well done! That is an exemplary practice.",
        ],
    ];
    let row = &REACTIONS[usize::from(score.min(MAX_POINTS_PER_CRITERION as u8))];
    row[pick(answer, row.len())]
}

fn lower_first(text: &str) -> String {
    let text = text.trim().trim_end_matches(['.', '?', '!']);
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Templated question for a criterion, varied per dimension.
pub fn fallback_question(criterion: &Criterion) -> String {
    let topic = lower_first(&criterion.text);
    let templates: Vec<String> = match criterion.dimension_code.as_str() {
        "STRAT" => vec![
            format!("Regarding {topic}, how does this translate concretely in your company?"),
            format!("Can you describe where things currently stand on {topic}?"),
            format!("Where are you today with respect to {topic}?"),
        ],
        "CULTURE" => vec![
            format!("Within your team, how does {topic} show up?"),
            format!("Can you tell me about {topic} in your organization?"),
            format!("How would you describe {topic} across your teams?"),
        ],
        "CLIENT" => vec![
            format!("When it comes to {topic}, what have you put in place with your customers?"),
            format!("How do you currently handle {topic}?"),
            format!("Can you describe your approach to {topic}?"),
        ],
        "PROCESS" => vec![
            format!("In your internal processes, where do you stand on {topic}?"),
            format!("How is {topic} organized in your company?"),
            format!("Can you tell me how you manage {topic}?"),
        ],
        "TECH" => vec![
            format!("On the technical side, what does {topic} look like for you?"),
            format!("Which tools or equipment do you have for {topic}?"),
            format!("Can you describe your situation regarding {topic}?"),
        ],
        "SECURITY" => vec![
            format!("On security, where are you with {topic}?"),
            format!("How do you approach {topic}?"),
            format!("What have you put in place regarding {topic}?"),
        ],
        _ => vec![
            format!("Let's talk about {topic}. What is your current situation?"),
            format!("Regarding {topic}, can you tell me more?"),
        ],
    };
    let idx = pick(&criterion.criterion_id, templates.len());
    templates.into_iter().nth(idx).unwrap_or_default()
}

pub fn fallback_opening(criterion: &Criterion) -> String {
    format!(
        "Hello! Let's start your digital maturity diagnostic. {} Can you tell me more?",
        criterion.text.trim()
    )
}

/// Deterministic interviewer used offline or when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackInterviewer;

impl FallbackInterviewer {
    pub fn evaluation(ctx: &TurnContext) -> TurnEvaluation {
        let score = estimate_score(&ctx.answer);
        TurnEvaluation {
            score,
            justification: "Score estimated from the wording of the answer".to_string(),
            reaction: fallback_reaction(score, &ctx.answer).to_string(),
            next_question: ctx.next.as_ref().map(fallback_question),
            source: EvaluationSource::Fallback,
        }
    }
}

#[async_trait]
impl Interviewer for FallbackInterviewer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn opening_question(&self, _session_id: &str, criterion: &Criterion) -> String {
        fallback_opening(criterion)
    }

    async fn evaluate(&self, ctx: &TurnContext) -> TurnEvaluation {
        Self::evaluation(ctx)
    }
}

// =============================================================================
// LLM interviewer
// =============================================================================

#[derive(Debug, Deserialize)]
struct LlmTurn {
    evaluation: Option<LlmEvaluation>,
    #[serde(default)]
    ai_reaction: Option<String>,
    #[serde(default)]
    next_question: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmEvaluation {
    score: Option<serde_json::Value>,
    #[serde(default)]
    justification: Option<String>,
}

/// First balanced `{...}` block in a model reply.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find('{') else {
        return trimmed;
    };
    let remainder = &trimmed[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &remainder[..=i];
                }
            }
            _ => {}
        }
    }
    trimmed
}

/// Score as an integer within 0..=3; accepts numbers and numeric strings.
fn clamp_score(value: &serde_json::Value) -> Option<u8> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, f64::from(MAX_POINTS_PER_CRITERION)) as u8)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a model reply into an evaluation. Missing reaction/question fields
/// are filled from the fallback; a missing or unusable score is an error.
fn parse_turn(raw: &str, ctx: &TurnContext) -> Result<TurnEvaluation, String> {
    let turn: LlmTurn =
        serde_json::from_str(extract_json(raw)).map_err(|e| format!("invalid JSON: {e}"))?;
    let evaluation = turn.evaluation.ok_or("missing evaluation")?;
    let score = evaluation
        .score
        .as_ref()
        .and_then(clamp_score)
        .ok_or("missing or non-numeric score")?;

    let next_question = ctx.next.as_ref().map(|next| {
        non_empty(turn.next_question.clone()).unwrap_or_else(|| fallback_question(next))
    });

    Ok(TurnEvaluation {
        score,
        justification: non_empty(evaluation.justification)
            .unwrap_or_else(|| "Scored by the interviewer model".to_string()),
        reaction: non_empty(turn.ai_reaction)
            .unwrap_or_else(|| fallback_reaction(score, &ctx.answer).to_string()),
        next_question,
        source: EvaluationSource::Llm,
    })
}

pub struct LlmInterviewer<G: ChatGateway> {
    gateway: G,
    model: ChatModel,
    temperature: f32,
    max_tokens: u32,
}

impl<G: ChatGateway> LlmInterviewer<G> {
    pub fn new(gateway: G, model: ChatModel) -> Self {
        Self {
            gateway,
            model,
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    fn request(&self, prompt: crate::prompts::PromptInstance, attribution: Attribution) -> ChatRequest {
        ChatRequest::new(self.model.clone(), prompt.to_messages(), attribution)
            .temperature(self.temperature)
    }
}

#[async_trait]
impl<G: ChatGateway> Interviewer for LlmInterviewer<G> {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn opening_question(&self, session_id: &str, criterion: &Criterion) -> String {
        let req = self
            .request(
                render_opening(criterion),
                Attribution::new("interviewer::opening").with_session(session_id),
            )
            .max_tokens(OPENING_MAX_TOKENS);

        match self.gateway.chat(req).await {
            Ok(resp) if !resp.content.trim().is_empty() => resp.content.trim().to_string(),
            Ok(_) => {
                warn!(
                    session_id,
                    criterion_id = %criterion.criterion_id,
                    "empty opening question from model; using fallback"
                );
                fallback_opening(criterion)
            }
            Err(err) => {
                warn!(
                    session_id,
                    criterion_id = %criterion.criterion_id,
                    error = %err,
                    "opening question failed; using fallback"
                );
                fallback_opening(criterion)
            }
        }
    }

    async fn evaluate(&self, ctx: &TurnContext) -> TurnEvaluation {
        let prompt = render_evaluation(&ctx.history, &ctx.answer, &ctx.current, ctx.next.as_ref());
        let mut req = self
            .request(
                prompt,
                Attribution::new("interviewer::evaluate").with_session(&ctx.session_id),
            )
            .max_tokens(self.max_tokens);
        if self.model.supports_json_mode() {
            req = req.json();
        }

        let resp = match self.gateway.chat(req).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    session_id = %ctx.session_id,
                    criterion_id = %ctx.current.criterion_id,
                    error = %err,
                    "evaluation call failed; using fallback scoring"
                );
                return FallbackInterviewer::evaluation(ctx);
            }
        };

        match parse_turn(&resp.content, ctx) {
            Ok(evaluation) => {
                debug!(
                    session_id = %ctx.session_id,
                    criterion_id = %ctx.current.criterion_id,
                    score = evaluation.score,
                    "model evaluation parsed"
                );
                evaluation
            }
            Err(reason) => {
                warn!(
                    session_id = %ctx.session_id,
                    criterion_id = %ctx.current.criterion_id,
                    error = %reason,
                    "failed to parse evaluation JSON; using fallback scoring"
                );
                FallbackInterviewer::evaluation(ctx)
            }
        }
    }
}

/// Build the interviewer selected by configuration.
///
/// A missing `OPENROUTER_API_KEY` is not fatal: the fallback interviewer is
/// used and a warning logged.
pub fn build_interviewer(config: &AppConfig) -> Arc<dyn Interviewer> {
    match config.ai_provider {
        AiProvider::Fallback => Arc::new(FallbackInterviewer),
        AiProvider::OpenRouter => {
            match ProviderGateway::from_env(Arc::new(TracingUsageSink), config.gateway_config()) {
                Ok(gateway) => Arc::new(
                    LlmInterviewer::new(gateway, ChatModel::openrouter(&config.model))
                        .temperature(config.temperature)
                        .max_tokens(config.max_tokens),
                ),
                Err(err) => {
                    warn!(error = %err, "openrouter unavailable; using fallback interviewer");
                    Arc::new(FallbackInterviewer)
                }
            }
        }
    }
}
