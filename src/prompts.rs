//! Prompt templates for the interview turns.
//!
//! Rendering only; provider-agnostic. All respondent text and catalog text is
//! XML-escaped before it lands inside a tag.

use crate::catalog::Criterion;
use crate::gateway::Message;
use crate::interviewer::HistoryTurn;

/// Rendered prompt ready for the gateway.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters so answers cannot close our tags.
pub fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

// =============================================================================
// Templates
// =============================================================================

pub const OPENING_QUESTION: PromptTemplate = PromptTemplate {
    slug: "opening_question_v1",
    system: r#"You are a friendly digital maturity consultant running a diagnostic interview.

Write a warm opening question that:
- introduces yourself and the diagnostic
- explains that you will assess the company's digital maturity
- asks about the given criterion naturally

Professional, conversational tone. Two or three sentences at most. Output only the question."#,
    user: r#"<criterion id="{criterion_id}">
{criterion_text}
</criterion>

Your welcoming opening question:"#,
};

pub const EVALUATE_TURN: PromptTemplate = PromptTemplate {
    slug: "evaluate_turn_v1",
    system: r#"You are an expert digital transformation consultant running a maturity diagnostic as a real conversation, not a questionnaire.

For each turn:
1. EVALUATE the latest answer against the current criterion's options (score 0-3)
2. REACT briefly and empathetically to what the respondent shared
3. ASK about the next criterion conversationally, referencing earlier answers when relevant

Never just restate the criterion text as the question.

Scoring guide: 0 = absent, 1 = basic/initial, 2 = intermediate/developing, 3 = advanced/mature.

Return only JSON:
{"evaluation": {"score": 0-3, "justification": "why"}, "ai_reaction": "short reaction", "next_question": "question or null"}"#,
    user: r#"<conversation>
{history}
</conversation>

<latest_answer>
{answer}
</latest_answer>

<current_criterion id="{criterion_id}">
<topic>{criterion_text}</topic>
<options>
{options}
</options>
</current_criterion>

{next_block}

json:"#,
};

// =============================================================================
// Rendering
// =============================================================================

pub fn render_opening(criterion: &Criterion) -> PromptInstance {
    let user = OPENING_QUESTION
        .user
        .replace("{criterion_id}", &escape_xml_chars(&criterion.criterion_id))
        .replace("{criterion_text}", &escape_xml_chars(criterion.text.trim()));
    PromptInstance {
        template_slug: OPENING_QUESTION.slug.to_string(),
        system: OPENING_QUESTION.system.to_string(),
        user,
    }
}

fn render_history(history: &[HistoryTurn]) -> String {
    if history.is_empty() {
        return "This is the first question.".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            format!(
                "Q{} ({}): respondent said \"{}\" [score {}]",
                i + 1,
                escape_xml_chars(&turn.criterion_id),
                escape_xml_chars(turn.user_text.trim()),
                turn.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_evaluation(
    history: &[HistoryTurn],
    answer: &str,
    current: &Criterion,
    next: Option<&Criterion>,
) -> PromptInstance {
    let options = if current.options.is_empty() {
        "- (no predefined options)".to_string()
    } else {
        current
            .options
            .iter()
            .map(|o| format!("- Score {}: {}", o.score, escape_xml_chars(&o.text)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let next_block = match next {
        Some(next) => format!(
            "<next_criterion id=\"{}\">\n<topic>{}</topic>\n</next_criterion>",
            escape_xml_chars(&next.criterion_id),
            escape_xml_chars(next.text.trim())
        ),
        None => "This was the last criterion: set next_question to null.".to_string(),
    };

    let user = EVALUATE_TURN
        .user
        .replace("{history}", &render_history(history))
        .replace("{answer}", &escape_xml_chars(answer.trim()))
        .replace("{criterion_id}", &escape_xml_chars(&current.criterion_id))
        .replace("{criterion_text}", &escape_xml_chars(current.text.trim()))
        .replace("{options}", &options)
        .replace("{next_block}", &next_block);

    PromptInstance {
        template_slug: EVALUATE_TURN.slug.to_string(),
        system: EVALUATE_TURN.system.to_string(),
        user,
    }
}

// =============================================================================
// TESTS
// =============================================================================
