use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::llm::ToolCall;
use crate::widgets::{build_entry, lookup, Entry};

pub const UNKNOWN_TOOL_APOLOGY: &str = "Sorry, I encountered an unknown widget type.";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// The entry to append plus the tool output string returned to the LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub entry: Entry,
    pub output: String,
}

/// Widget tools are always available; custom functions are registered from
/// the active assistant's configuration.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    functions: BTreeSet<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_functions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register_function(name);
        }
        registry
    }

    /// Widget keys cannot be shadowed.
    pub fn register_function(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if lookup(&name).is_some() {
            return false;
        }
        self.functions.insert(name)
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        let name = canonical_name(tool_name);
        lookup(name).is_some() || self.functions.contains(name)
    }

    pub fn dispatch(
        &self,
        tool_name: &str,
        arguments: &Value,
        history_len: usize,
    ) -> Result<Dispatched, DispatchError> {
        let name = canonical_name(tool_name);
        let args = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(DispatchError::InvalidArguments {
                    tool: name.to_string(),
                    reason: "arguments must be a JSON object".into(),
                })
            }
        };

        if let Some(spec) = lookup(name) {
            let key = format!("{}_{}", name, history_len);
            let entry = build_entry(spec, args, key).map_err(|e| DispatchError::InvalidArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?;
            tracing::info!(tool = name, "displayed widget");
            return Ok(Dispatched {
                entry,
                output: format!("Displayed a {}.", name),
            });
        }

        if self.functions.contains(name) {
            let pretty = serde_json::to_string_pretty(&Value::Object(args)).unwrap_or_default();
            tracing::info!(tool = name, "recorded custom function call");
            return Ok(Dispatched {
                entry: Entry::assistant(format!(
                    "Requested `{}` with arguments:\n```json\n{}\n```",
                    name, pretty
                )),
                output: format!("Recorded a call to {}.", name),
            });
        }

        Err(DispatchError::UnknownTool(name.to_string()))
    }

    /// Like [`ToolRegistry::dispatch`] but unknown tools or bad arguments
    /// become an apology entry instead of an error.
    pub fn dispatch_or_apologize(
        &self,
        tool_name: &str,
        arguments: &Value,
        history_len: usize,
    ) -> Dispatched {
        match self.dispatch(tool_name, arguments, history_len) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(tool = tool_name, error = %e, "tool dispatch failed");
                Dispatched {
                    entry: Entry::assistant(UNKNOWN_TOOL_APOLOGY),
                    output: e.to_string(),
                }
            }
        }
    }
}

// Schema-derived tool names sometimes keep the model suffix, e.g. "SliderSchema".
fn canonical_name(tool_name: &str) -> &str {
    match tool_name.strip_suffix("Schema") {
        Some(stripped) if lookup(stripped).is_some() => stripped,
        _ => tool_name,
    }
}

pub fn parse_arguments(raw: &str) -> Result<Value, DispatchError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw).map_err(|e| DispatchError::InvalidArguments {
        tool: String::new(),
        reason: format!("Failed to parse tool args: {}", e),
    })
}

/// Only the first tool call of a reply is handled; the rest are dropped.
pub fn first_tool_call(calls: &[ToolCall]) -> Option<&ToolCall> {
    if calls.len() > 1 {
        let ignored: Vec<&str> = calls[1..].iter().map(|c| c.function.name.as_str()).collect();
        tracing::warn!(?ignored, "multiple tool calls in one turn; handling only the first");
    }
    calls.first()
}
