//! Chat model pricing registry.
//!
//! Costs are in nanodollars (1e-9 USD) per token.

use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_nanos_per_token: i64,
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(input: i64, output: i64) -> Self {
        Self {
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        (input_tokens as i64) * self.input_nanos_per_token
            + (output_tokens as i64) * self.output_nanos_per_token
    }
}

// =============================================================================
// PRICING DATA
// =============================================================================

// Verify periodically against OpenRouter model pages.
// GPT-4o-mini: $0.15/1M input, $0.60/1M output
const GPT_4O_MINI: ModelPricing = ModelPricing::new(150, 600);
// GPT-5-mini: $0.25/1M input, $2.00/1M output
const GPT_5_MINI: ModelPricing = ModelPricing::new(250, 2_000);
// Gemini 2.0 Flash: $0.10/1M input, $0.40/1M output
const GEMINI_20_FLASH: ModelPricing = ModelPricing::new(100, 400);
// Gemini 1.5 Flash: $0.075/1M input, $0.30/1M output (rounded up to whole nanos)
const GEMINI_15_FLASH: ModelPricing = ModelPricing::new(75, 300);
// Claude 3.5 Haiku: $0.80/1M input, $4.00/1M output
const CLAUDE_35_HAIKU: ModelPricing = ModelPricing::new(800, 4_000);

/// Used for models missing from the table.
const UNKNOWN_MODEL: ModelPricing = ModelPricing::new(1_000, 5_000);

static PRICING_MAP: OnceLock<HashMap<&'static str, ModelPricing>> = OnceLock::new();

fn init_pricing() -> HashMap<&'static str, ModelPricing> {
    let mut map = HashMap::new();
    map.insert("openai/gpt-4o-mini", GPT_4O_MINI);
    map.insert("openai/gpt-4o-mini-2024-07-18", GPT_4O_MINI);
    map.insert("openai/gpt-5-mini", GPT_5_MINI);
    map.insert("google/gemini-2.0-flash-001", GEMINI_20_FLASH);
    map.insert("google/gemini-flash-1.5", GEMINI_15_FLASH);
    map.insert("anthropic/claude-3-5-haiku", CLAUDE_35_HAIKU);
    map
}

pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    PRICING_MAP.get_or_init(init_pricing).get(model_id).copied()
}

pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    get_pricing(model)
        .unwrap_or(UNKNOWN_MODEL)
        .calculate_cost(input_tokens, output_tokens)
}
