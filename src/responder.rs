//! Where assistant replies come from: the LLM, or the random generator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{self, AppConfig};
use crate::configurations::assistants::stored_config;
use crate::configurations::functions::function_schemas;
use crate::db::DbError;
use crate::dispatch::ToolRegistry;
use crate::error::{ConfigError, UpstreamError};
use crate::llm::{
    code_interpreter_reply, ChatMessage, LlmClient, LlmResponse, ToolCall, ToolFunction,
};
use crate::schema::FunctionSchema;
use crate::store;
use crate::ui_tools::ui_tool_schemas;
use crate::widgets::{Entry, InputWidget, WidgetKind};

#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Reply to a history whose last entry is the new user message.
    async fn respond(&self, history: &[Entry]) -> Result<LlmResponse, UpstreamError>;

    /// Text to show after a widget was displayed, if any. The history ends
    /// with the widget entry.
    async fn follow_up(&self, history: &[Entry]) -> Result<Option<String>, UpstreamError>;

    /// The tools this source may call.
    fn registry(&self) -> ToolRegistry {
        ToolRegistry::new()
    }
}

/// Chat-completions backed source: UI tools plus the assistant's functions.
/// A message sent right after a file upload goes to a code interpreter instead.
pub struct LlmResponder {
    client: LlmClient,
    system_prompt: String,
    functions: Vec<FunctionSchema>,
    response_format: Option<Value>,
}

impl LlmResponder {
    pub fn new(client: LlmClient, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            functions: vec![],
            response_format: None,
        }
    }

    pub fn with_functions(mut self, functions: Vec<FunctionSchema>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_response_format(mut self, response_format: Option<Value>) -> Self {
        self.response_format = response_format;
        self
    }

    async fn chat(&self, history: &[Entry]) -> Result<LlmResponse, UpstreamError> {
        let response = self
            .client
            .chat(self.messages(history), self.tools(), self.response_format.clone())
            .await?;
        Ok(response)
    }

    fn tools(&self) -> Vec<Value> {
        let mut tools = ui_tool_schemas();
        tools.extend(self.functions.iter().map(FunctionSchema::to_tool_declaration));
        tools
    }

    fn messages(&self, history: &[Entry]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];
        messages.extend(transcript(history));
        messages
    }
}

#[async_trait]
impl ResponseSource for LlmResponder {
    async fn respond(&self, history: &[Entry]) -> Result<LlmResponse, UpstreamError> {
        if let Some(files) = pending_uploads(history) {
            tracing::info!(files = files.len(), "answering with the code interpreter");
            let messages = transcript(history);
            let reply =
                code_interpreter_reply(&self.client, &self.system_prompt, &files, &messages).await?;
            return Ok(LlmResponse {
                content: Some(reply),
                tool_calls: None,
            });
        }

        let response = self.chat(history).await?;
        tracing::debug!(
            has_text = response.content.is_some(),
            tool_calls = response.tool_calls.as_ref().map_or(0, Vec::len),
            "llm replied"
        );
        Ok(response)
    }

    async fn follow_up(&self, history: &[Entry]) -> Result<Option<String>, UpstreamError> {
        let response = self.chat(history).await?;
        if response.tool_calls.as_ref().is_some_and(|c| !c.is_empty()) {
            tracing::warn!("ignoring tool calls in follow-up reply");
        }
        Ok(response.content.filter(|c| !c.trim().is_empty()))
    }

    fn registry(&self) -> ToolRegistry {
        ToolRegistry::with_functions(self.functions.iter().map(|f| f.name.clone()))
    }
}

/// Client built from the stored settings.
pub fn llm_client(db_path: &Path) -> Result<LlmClient, ConfigError> {
    let settings = store::get_settings_map(db_path)?;
    let app = AppConfig::from_settings(&settings);
    Ok(LlmClient::new(app.llm_config(), config::api_key(&settings)?)?)
}

/// Responder for a stored assistant, or the plain system prompt without one.
pub fn build_llm_responder(
    db_path: &Path,
    assistant_id: Option<&str>,
) -> Result<LlmResponder, ConfigError> {
    let settings = store::get_settings_map(db_path)?;
    let app = AppConfig::from_settings(&settings);
    let api_key = config::api_key(&settings)?;

    let Some(id) = assistant_id else {
        let client = LlmClient::new(app.llm_config(), api_key)?;
        return Ok(LlmResponder::new(client, app.system_prompt));
    };
    let assistant = stored_config(db_path, id)?.ok_or_else(|| DbError::NotFound {
        table: "assistants",
        id: id.to_string(),
    })?;
    let functions = function_schemas(db_path, &assistant.function_ids)?;
    let client = LlmClient::new(assistant.llm_config(&app.llm_config()), api_key)?;
    tracing::debug!(assistant_id = id, functions = functions.len(), "built assistant responder");
    Ok(LlmResponder::new(client, assistant.instructions)
        .with_functions(functions)
        .with_response_format(assistant.response_format.chat_format()))
}

/// Files from an uploader answered right before the latest user message.
pub fn pending_uploads(history: &[Entry]) -> Option<Vec<PathBuf>> {
    let [.., Entry::Input(widget), Entry::User { .. }] = history else {
        return None;
    };
    let files = widget.file_paths();
    (!files.is_empty()).then_some(files)
}

// Uploads are described by file name; local paths stay on this machine.
fn shown_answer(widget: &InputWidget, value: &Value) -> String {
    if widget.kind == WidgetKind::FileUploader {
        let names: Vec<String> = widget
            .file_paths()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        return format!("uploaded {}", names.join(", "));
    }
    shown(value)
}

fn shown(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn widget_call(id: String, name: &str, arguments: &Value) -> ToolCall {
    ToolCall {
        id,
        call_type: "function".into(),
        function: ToolFunction {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

/// Chat messages equivalent to `history`. Widgets become a tool call plus its
/// acknowledgement; an answered input widget adds a user message with the value.
pub fn transcript(history: &[Entry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len());
    for (i, entry) in history.iter().enumerate() {
        match entry {
            Entry::User { content } => messages.push(ChatMessage::user(content)),
            Entry::Assistant { content } => messages.push(ChatMessage::assistant(content)),
            Entry::Input(w) => {
                let id = format!("call_{}", w.key);
                let name = w.kind.key();
                messages.push(ChatMessage::assistant_tool_call(
                    None,
                    widget_call(id.clone(), name, &Value::Object(w.config.clone())),
                ));
                messages.push(ChatMessage::tool_output(id, format!("Displayed a {}.", name)));
                if let Some(note) = &w.content {
                    messages.push(ChatMessage::assistant(note));
                }
                if let Some(value) = w.value.as_ref().filter(|_| w.is_answered()) {
                    let answer = format!("{}: {}", w.label(), shown_answer(w, value));
                    messages.push(ChatMessage::user(answer));
                }
            }
            Entry::Output(w) => {
                let id = format!("call_{}_{}", w.kind.key(), i);
                let name = w.kind.key();
                let call = widget_call(id.clone(), name, &w.data);
                messages.push(ChatMessage::assistant_tool_call(None, call));
                messages.push(ChatMessage::tool_output(id, format!("Displayed a {}.", name)));
                if let Some(note) = &w.content {
                    messages.push(ChatMessage::assistant(note));
                }
            }
        }
    }
    messages
}
