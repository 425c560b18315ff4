//! "Random Stream": canned replies and widgets, no LLM involved.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::error::UpstreamError;
use crate::llm::{LlmResponse, ToolCall, ToolFunction};
use crate::responder::ResponseSource;
use crate::widgets::Entry;

const CHART_ROWS: usize = 20;
const CHART_SERIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Text,
    OutputWidget,
    InputWidget,
}

const REPLY_KINDS: [ReplyKind; 3] = [
    ReplyKind::InputWidget,
    ReplyKind::Text,
    ReplyKind::OutputWidget,
];

pub struct RandomAssistant {
    rng: Mutex<StdRng>,
}

impl Default for RandomAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomAssistant {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    /// One reply to `user_message`: plain text or a single widget tool call.
    pub fn generate(&self, user_message: &str) -> LlmResponse {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let kind = REPLY_KINDS.choose(&mut *rng).copied().unwrap_or(ReplyKind::Text);
        match kind {
            ReplyKind::Text => LlmResponse {
                content: Some(random_text(&mut *rng, user_message)),
                tool_calls: None,
            },
            ReplyKind::OutputWidget => {
                let (name, args) = random_output_widget(&mut *rng);
                widget_reply(&mut *rng, name, args)
            }
            ReplyKind::InputWidget => {
                let (name, args) = random_input_widget(&mut *rng);
                widget_reply(&mut *rng, name, args)
            }
        }
    }
}

fn widget_reply(rng: &mut impl Rng, name: &str, args: Value) -> LlmResponse {
    LlmResponse {
        content: None,
        tool_calls: Some(vec![ToolCall {
            id: format!("call_random_{:08x}", rng.gen::<u32>()),
            call_type: "function".into(),
            function: ToolFunction {
                name: name.to_string(),
                arguments: args.to_string(),
            },
        }]),
    }
}

fn random_text(rng: &mut impl Rng, user_message: &str) -> String {
    let replies = [
        format!("Thanks for sharing: {}", user_message),
        "Could you elaborate on that?".to_string(),
        "Interesting point!".to_string(),
        "I appreciate your input.".to_string(),
        "Let's discuss further.".to_string(),
        "That's a great question.".to_string(),
        "I see. Tell me more.".to_string(),
        format!("You said: {}. Let's explore that.", user_message),
        "What makes you say that?".to_string(),
        "How does that make you feel?".to_string(),
    ];
    let i = rng.gen_range(0..replies.len());
    replies[i].clone()
}

// Box-Muller; rand 0.8 has no normal distribution without rand_distr.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn random_series(rng: &mut impl Rng) -> Value {
    let rows: Vec<Vec<f64>> = (0..CHART_ROWS)
        .map(|_| (0..CHART_SERIES).map(|_| standard_normal(rng)).collect())
        .collect();
    json!(rows)
}

fn random_output_widget(rng: &mut impl Rng) -> (&'static str, Value) {
    match rng.gen_range(0..5) {
        0 => ("LineChart", json!({ "data": random_series(rng) })),
        1 => ("BarChart", json!({ "data": random_series(rng) })),
        2 => (
            "Image",
            json!({ "url": "https://via.placeholder.com/150", "caption": "A placeholder image" }),
        ),
        3 => (
            "Table",
            json!({ "data": {
                "Column 1": ["A", "B", "C"],
                "Column 2": [1, 2, 3],
                "Column 3": [4.5, 5.5, 6.5]
            }}),
        ),
        _ => (
            "Markdown",
            json!({
                "content": "### This is a Markdown header\n\nHere is some **bold** text and *italic* text."
            }),
        ),
    }
}

fn random_input_widget(rng: &mut impl Rng) -> (&'static str, Value) {
    match rng.gen_range(0..8) {
        0 => ("TextInput", json!({ "label": "Assistant asks: Please provide your name:" })),
        1 => (
            "Selectbox",
            json!({
                "label": "Assistant asks: Choose your favorite color:",
                "options": ["Red", "Green", "Blue", "Yellow", "Purple", "Orange"]
            }),
        ),
        2 => (
            "Slider",
            json!({
                "label": "Assistant asks: Rate your experience from 1 to 10:",
                "min_value": 1,
                "max_value": 10,
                "default": 5
            }),
        ),
        3 => ("Checkbox", json!({ "label": "Assistant asks: Do you agree with the terms?" })),
        4 => ("DateInput", json!({ "label": "Assistant asks: Select your birth date:" })),
        5 => ("TimeInput", json!({ "label": "Assistant asks: What time works best for you?" })),
        6 => (
            "NumberInput",
            json!({
                "label": "Assistant asks: Enter a number:",
                "min_value": 0,
                "max_value": 100,
                "default": 50
            }),
        ),
        _ => (
            "TextArea",
            json!({ "label": "Assistant asks: Please describe your issue in detail:" }),
        ),
    }
}

#[async_trait]
impl ResponseSource for RandomAssistant {
    async fn respond(&self, history: &[Entry]) -> Result<LlmResponse, UpstreamError> {
        let user_message = match history.last() {
            Some(Entry::User { content }) => content.as_str(),
            _ => "",
        };
        Ok(self.generate(user_message))
    }

    async fn follow_up(&self, _history: &[Entry]) -> Result<Option<String>, UpstreamError> {
        Ok(None)
    }
}
