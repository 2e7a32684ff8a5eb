use std::sync::Arc;
use std::time::Duration;

use maturity_harness::catalog::Criterion;
use maturity_harness::gateway::openrouter::OpenRouterAdapter;
use maturity_harness::gateway::{ChatModel, GatewayConfig, NoopUsageSink, ProviderGateway};
use maturity_harness::interviewer::{
    estimate_score, EvaluationSource, HistoryTurn, Interviewer, LlmInterviewer, TurnContext,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Gateway = ProviderGateway<NoopUsageSink>;

fn interviewer(server: &MockServer) -> LlmInterviewer<Gateway> {
    let adapter =
        OpenRouterAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5), None, None)
            .unwrap();
    let gateway = ProviderGateway::with_config(
        adapter,
        Arc::new(NoopUsageSink),
        GatewayConfig {
            max_retries: 0,
            retry_base_delay: Duration::from_millis(0),
            max_retry_delay: Duration::from_millis(0),
        },
    );
    LlmInterviewer::new(gateway, ChatModel::openrouter("openai/gpt-4o-mini"))
        .temperature(0.2)
        .max_tokens(300)
}

fn criterion(id: &str, text: &str) -> Criterion {
    Criterion {
        criterion_id: id.to_string(),
        dimension_code: "TECH".into(),
        pillar_code: "P1".into(),
        text: text.to_string(),
        options: Vec::new(),
        next_linear: None,
    }
}

fn context(answer: &str, last: bool) -> TurnContext {
    TurnContext {
        session_id: "sess-1".into(),
        history: vec![HistoryTurn {
            criterion_id: "TECH-P1-C1".into(),
            user_text: "We use laptops".into(),
            score: 1,
        }],
        answer: answer.to_string(),
        current: criterion("TECH-P1-C2", "Staff have professional email addresses."),
        next: (!last).then(|| criterion("TECH-P1-C3", "Files are backed up regularly.")),
    }
}

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 50, "completion_tokens": 30 }
    }))
}

#[tokio::test]
async fn llm_evaluation_is_parsed_from_json_reply() {
    let server = MockServer::start().await;
    let content = json!({
        "evaluation": { "score": 2, "justification": "Most staff use a company domain." },
        "ai_reaction": "Nice, that is well under way.",
        "next_question": "How do you back up your files today?"
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-4o-mini",
            "response_format": { "type": "json_object" },
            "max_tokens": 300,
            "user": "sess-1"
        })))
        .respond_with(reply(&content))
        .expect(1)
        .mount(&server)
        .await;

    let eval = interviewer(&server)
        .evaluate(&context("Most of us have company addresses", false))
        .await;
    assert_eq!(eval.source, EvaluationSource::Llm);
    assert_eq!(eval.score, 2);
    assert_eq!(eval.justification, "Most staff use a company domain.");
    assert_eq!(eval.reaction, "Nice, that is well under way.");
    assert_eq!(
        eval.next_question.as_deref(),
        Some("How do you back up your files today?")
    );
}

#[tokio::test]
async fn llm_score_is_clamped_and_wrapped_json_is_extracted() {
    let server = MockServer::start().await;
    let content = format!(
        "Here is my assessment:\n```json\n{}\n```",
        json!({
            "evaluation": { "score": "7", "justification": "Fully in place." },
            "ai_reaction": "",
            "next_question": "What about {backups}?"
        })
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(reply(&content))
        .mount(&server)
        .await;

    let eval = interviewer(&server)
        .evaluate(&context("Everyone has one", false))
        .await;
    assert_eq!(eval.source, EvaluationSource::Llm);
    assert_eq!(eval.score, 3);
    assert!(!eval.reaction.is_empty());
    assert_eq!(eval.next_question.as_deref(), Some("What about {backups}?"));
}

#[tokio::test]
async fn last_criterion_never_yields_a_next_question() {
    let server = MockServer::start().await;
    let content = json!({
        "evaluation": { "score": 1, "justification": "Partial." },
        "ai_reaction": "Thanks!",
        "next_question": "Anything else?"
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(reply(&content))
        .mount(&server)
        .await;

    let eval = interviewer(&server)
        .evaluate(&context("Some of us do", true))
        .await;
    assert_eq!(eval.score, 1);
    assert!(eval.next_question.is_none());
}

#[tokio::test]
async fn unparseable_reply_falls_back_to_heuristic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(reply("I think this deserves a two."))
        .mount(&server)
        .await;

    let answer = "No, nothing at all.";
    let eval = interviewer(&server).evaluate(&context(answer, false)).await;
    assert_eq!(eval.source, EvaluationSource::Fallback);
    assert_eq!(eval.score, estimate_score(answer));
    assert!(eval.next_question.is_some());
}

#[tokio::test]
async fn provider_failure_falls_back_to_heuristic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let eval = interviewer(&server)
        .evaluate(&context("We are partially rolling out this approach now", false))
        .await;
    assert_eq!(eval.source, EvaluationSource::Fallback);
    assert_eq!(eval.score, 2);
}

#[tokio::test]
async fn opening_question_uses_model_text_or_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "max_tokens": 200 })))
        .respond_with(reply("  Hello! Does your team use professional email?  "))
        .mount(&server)
        .await;

    let current = criterion("TECH-P1-C2", "Staff have professional email addresses.");
    let text = interviewer(&server)
        .opening_question("sess-1", &current)
        .await;
    assert_eq!(text, "Hello! Does your team use professional email?");

    let down = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&down)
        .await;
    let text = interviewer(&down).opening_question("sess-1", &current).await;
    assert!(text.contains("Staff have professional email addresses."));
}
