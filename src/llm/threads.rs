//! Code interpreter runs over files the user uploaded.
//!
//! A throwaway assistant with the `code_interpreter` tool and the uploaded
//! file ids is created per run, a thread is started from the conversation,
//! and the run is polled until it settles.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::assistants::{decode, AssistantApi};
use crate::llm::client::LlmClient;
use crate::llm::types::{ChatMessage, LlmError};

pub const RUN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_RUN_POLLS: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Still worth polling.
    pub fn is_pending(self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<Value>,
}

impl Run {
    fn failure(&self) -> LlmError {
        let detail = self
            .last_error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no details");
        LlmError::InvalidResponse(format!(
            "code interpreter run ended as {:?}: {}",
            self.status, detail
        ))
    }
}

/// Create-assistant body for a code interpreter over `file_ids`.
pub fn code_interpreter_payload(instructions: &str, model: &str, file_ids: &[String]) -> Value {
    json!({
        "instructions": instructions,
        "model": model,
        "tools": [{ "type": "code_interpreter" }],
        "tool_resources": { "code_interpreter": { "file_ids": file_ids } },
    })
}

/// Threads only take plain user and assistant text.
pub fn thread_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|m| m.role == "user" || m.role == "assistant")
        .filter_map(|m| {
            let content = m.content.as_deref().filter(|c| !c.trim().is_empty())?;
            Some(json!({ "role": m.role, "content": content }))
        })
        .collect()
}

/// Text of the newest assistant message in a thread message list.
pub fn reply_text(list: &Value) -> Option<String> {
    let newest = list.get("data")?.as_array()?.first()?;
    if newest.get("role").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    let parts: Vec<&str> = newest
        .get("content")?
        .as_array()?
        .iter()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|part| part.pointer("/text/value").and_then(Value::as_str))
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

impl LlmClient {
    pub async fn upload_file(&self, path: &Path) -> Result<String, LlmError> {
        let bytes =
            std::fs::read(path).map_err(|e| LlmError::File(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let raw = self.send_file("files", "assistants", &name, bytes).await?;
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidResponse("file upload returned no id".into()))?;
        tracing::info!(file_id = id, file = %path.display(), "uploaded file");
        Ok(id.to_string())
    }

    async fn wait_for_run(&self, mut run: Run) -> Result<Run, LlmError> {
        let mut polls = 0;
        while run.status.is_pending() {
            if polls >= MAX_RUN_POLLS {
                tracing::warn!(run_id = %run.id, "code interpreter run did not finish in time");
                return Err(LlmError::Timeout);
            }
            polls += 1;
            tokio::time::sleep(RUN_POLL_INTERVAL).await;
            let path = format!("threads/{}/runs/{}", run.thread_id, run.id);
            run = decode(self.send_json(Method::GET, &path, None, true).await?)?;
        }
        tracing::debug!(run_id = %run.id, status = ?run.status, polls, "run settled");
        Ok(run)
    }

    async fn run_thread(
        &self,
        assistant_id: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let body = json!({
            "assistant_id": assistant_id,
            "thread": { "messages": thread_messages(messages) },
        });
        let raw = self.send_json(Method::POST, "threads/runs", Some(&body), true).await?;
        let started: Run = decode(raw)?;
        let run = self.wait_for_run(started).await?;
        if run.status != RunStatus::Completed {
            return Err(run.failure());
        }

        let path = format!("threads/{}/messages?order=desc&limit=1", run.thread_id);
        let list = self.send_json(Method::GET, &path, None, true).await?;
        reply_text(&list)
            .ok_or_else(|| LlmError::InvalidResponse("run finished without a reply".into()))
    }
}

/// Upload `files`, answer the conversation with a code interpreter over them,
/// and delete the temporary assistant again.
pub async fn code_interpreter_reply(
    client: &LlmClient,
    instructions: &str,
    files: &[PathBuf],
    messages: &[ChatMessage],
) -> Result<String, LlmError> {
    let mut file_ids = Vec::with_capacity(files.len());
    for path in files {
        file_ids.push(client.upload_file(path).await?);
    }

    let payload = code_interpreter_payload(instructions, &client.config().model, &file_ids);
    let assistant = client.create_assistant(&payload).await?;
    let reply = client.run_thread(&assistant.id, messages).await;
    if let Err(e) = client.delete_assistant(&assistant.id).await {
        tracing::warn!(
            assistant_id = %assistant.id,
            error = %e,
            "could not delete code interpreter assistant"
        );
    }
    reply
}
