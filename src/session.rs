use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::conversation::{self, chat_state, ChatState, RenderPass};
use crate::dispatch::{first_tool_call, parse_arguments, Dispatched, UNKNOWN_TOOL_APOLOGY};
use crate::error::UpstreamError;
use crate::llm::LlmError;
use crate::models::{new_id, ID};
use crate::responder::ResponseSource;
use crate::tool_log;
use crate::widgets::{Entry, WidgetError};

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("chat input is blocked until widget {0} is answered")]
    Blocked(String),
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// What one turn appended to the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub appended: usize,
    pub tool: Option<String>,
    pub state: ChatState,
}

/// Which response source drives a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionMode {
    /// Random Stream: canned replies, no LLM.
    #[default]
    Random,
    Llm { assistant_id: Option<ID> },
}

/// One conversation. Every operation takes the session explicitly.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: ID,
    pub mode: SessionMode,
    pub history: Vec<Entry>,
    #[serde(skip)]
    log_db: Option<PathBuf>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            mode: SessionMode::default(),
            history: vec![],
            log_db: None,
        }
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Persist every dispatched tool call to the `tool_calls` table.
    pub fn with_tool_log(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.log_db = Some(db_path.into());
        self
    }

    pub fn state(&self) -> ChatState {
        chat_state(&self.history)
    }

    pub fn render(&mut self) -> RenderPass {
        conversation::render_pass(&mut self.history)
    }

    pub fn answer_widget(&mut self, key: &str, value: Value) -> Result<(), WidgetError> {
        conversation::answer_widget(&mut self.history, key, value)?;
        tracing::debug!(session_id = %self.id, key, "widget answered");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Run one turn. On error the history is left exactly as it was.
    pub async fn submit_user_message(
        &mut self,
        text: &str,
        source: &dyn ResponseSource,
    ) -> Result<TurnOutcome, TurnError> {
        if let ChatState::BlockedOnWidget { key, .. } = self.state() {
            return Err(TurnError::Blocked(key));
        }
        if text.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let before = self.history.len();
        match self.run_turn(text, source).await {
            Ok(tool) => {
                conversation::lock_stale_widgets(&mut self.history);
                let outcome = TurnOutcome {
                    appended: self.history.len() - before,
                    tool,
                    state: self.state(),
                };
                tracing::debug!(
                    session_id = %self.id,
                    blocked = outcome.state.is_blocked(),
                    "turn finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.history.truncate(before);
                tracing::warn!(
                    session_id = %self.id,
                    error = %e,
                    "turn failed, history rolled back"
                );
                Err(e.into())
            }
        }
    }

    async fn run_turn(
        &mut self,
        text: &str,
        source: &dyn ResponseSource,
    ) -> Result<Option<String>, UpstreamError> {
        self.history.push(Entry::user(text));
        let reply = source.respond(&self.history).await?;

        let call = reply.tool_calls.as_deref().and_then(first_tool_call).cloned();
        let Some(call) = call else {
            let text = reply
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    LlmError::InvalidResponse("reply has neither text nor a tool call".into())
                })?;
            self.history.push(Entry::assistant(text));
            return Ok(None);
        };

        let name = call.function.name.clone();
        let history_len = self.history.len();
        let (dispatched, args) = match parse_arguments(&call.function.arguments) {
            Ok(args) => (source.registry().dispatch_or_apologize(&name, &args, history_len), args),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "unparseable tool arguments");
                let dispatched = Dispatched {
                    entry: Entry::assistant(UNKNOWN_TOOL_APOLOGY),
                    output: e.to_string(),
                };
                (dispatched, json!({ "_raw": call.function.arguments }))
            }
        };
        self.log_call(&name, &args, &dispatched.output)?;

        let is_widget = matches!(dispatched.entry, Entry::Input(_) | Entry::Output(_));
        let mut entry = dispatched.entry;
        if let Some(text) = reply.content.as_deref().filter(|t| !t.trim().is_empty()) {
            entry.append_content(text);
        }
        self.history.push(entry);

        if is_widget {
            if let Some(note) = source.follow_up(&self.history).await? {
                if let Some(last) = self.history.last_mut() {
                    last.append_content(&note);
                }
            }
        }
        Ok(Some(name))
    }

    fn log_call(&self, name: &str, args: &Value, output: &str) -> Result<(), UpstreamError> {
        if let Some(db_path) = &self.log_db {
            let result = Value::String(output.to_string());
            tool_log::log_tool_call(db_path, &self.id, name, args, &result)?;
        }
        Ok(())
    }
}

type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// Live sessions by id. A turn holds its session's lock until it finishes,
/// so each session has a single writer.
#[derive(Default)]
pub struct SessionStore {
    sessions: tokio::sync::Mutex<HashMap<ID, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ChatSession) -> ID {
        let id = session.id.clone();
        self.sessions.lock().await.insert(id.clone(), Arc::new(tokio::sync::Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{PLACEHOLDER_ACCEPTING, PLACEHOLDER_SELECTION};
    use crate::db::{init_db, DbPaths};
    use crate::dispatch::ToolRegistry;
    use crate::llm::{LlmError, LlmResponse, ToolCall, ToolFunction};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays scripted replies in order.
    struct Scripted {
        replies: Mutex<Vec<Result<LlmResponse, LlmError>>>,
        follow_up: Option<String>,
        fail_follow_up: bool,
        functions: Vec<&'static str>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<LlmResponse, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                follow_up: None,
                fail_follow_up: false,
                functions: vec![],
            }
        }
    }

    #[async_trait]
    impl ResponseSource for Scripted {
        async fn respond(&self, _history: &[Entry]) -> Result<LlmResponse, UpstreamError> {
            let mut replies = self.replies.lock().unwrap();
            Ok(replies.remove(0)?)
        }

        async fn follow_up(&self, history: &[Entry]) -> Result<Option<String>, UpstreamError> {
            assert!(matches!(history.last(), Some(Entry::Input(_) | Entry::Output(_))));
            if self.fail_follow_up {
                return Err(LlmError::Timeout.into());
            }
            Ok(self.follow_up.clone())
        }

        fn registry(&self) -> ToolRegistry {
            ToolRegistry::with_functions(self.functions.iter().copied())
        }
    }

    fn text(s: &str) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse { content: Some(s.into()), tool_calls: None })
    }

    fn tool(name: &str, args: &str) -> Result<LlmResponse, LlmError> {
        let call = |id: &str| ToolCall {
            id: id.into(),
            call_type: "function".into(),
            function: ToolFunction { name: name.into(), arguments: args.into() },
        };
        Ok(LlmResponse { content: None, tool_calls: Some(vec![call("a"), call("b")]) })
    }

    #[tokio::test]
    async fn test_text_turn() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![text("hello")]);
        let outcome = session.submit_user_message("hi", &source).await.unwrap();
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.tool, None);
        assert_eq!(session.history, vec![Entry::user("hi"), Entry::assistant("hello")]);
        assert_eq!(session.render().chat_input.placeholder, PLACEHOLDER_ACCEPTING);
    }

    #[tokio::test]
    async fn test_slider_turn_blocks_until_answered() {
        let mut session = ChatSession::new();
        let mut source = Scripted::new(vec![
            tool("Slider", r#"{"label": "Rate", "min_value": 1, "max_value": 10}"#),
            text("thanks"),
        ]);
        source.follow_up = Some("Move the slider.".into());

        let outcome = session.submit_user_message("rate me", &source).await.unwrap();
        assert_eq!(outcome.tool.as_deref(), Some("Slider"));
        assert_eq!(session.history.len(), 2);
        let widget = session.history[1].as_input().unwrap();
        assert_eq!(widget.key, "Slider_1");
        assert_eq!(widget.content.as_deref(), Some("Move the slider."));

        let pass = session.render();
        assert!(pass.chat_input.disabled);
        assert_eq!(pass.chat_input.placeholder, PLACEHOLDER_SELECTION);
        assert!(matches!(
            session.submit_user_message("next", &source).await,
            Err(TurnError::Blocked(key)) if key == "Slider_1"
        ));
        assert_eq!(session.history.len(), 2);

        session.answer_widget("Slider_1", json!(7)).unwrap();
        session.submit_user_message("done", &source).await.unwrap();
        assert_eq!(session.history.len(), 4);
        // moved past: the slider keeps its value but is locked
        let widget = session.history[1].as_input().unwrap();
        assert!(widget.disabled);
        assert_eq!(widget.value, Some(json!(7)));
    }

    #[tokio::test]
    async fn test_file_uploader_turn_hands_files_to_the_next_message() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![
            tool("FileUploader", r#"{"label": "Upload the sales data", "type": ["csv"]}"#),
            text("The total is 42."),
        ]);

        session.submit_user_message("analyse my sales", &source).await.unwrap();
        assert!(session.render().chat_input.disabled);
        assert!(session.answer_widget("FileUploader_1", json!(["/tmp/sales.pdf"])).is_err());
        session.answer_widget("FileUploader_1", json!(["/tmp/sales.csv"])).unwrap();
        assert!(!session.render().chat_input.disabled);

        session.history.push(Entry::user("what is the total?"));
        let files = crate::responder::pending_uploads(&session.history).unwrap();
        assert_eq!(files, vec![std::path::PathBuf::from("/tmp/sales.csv")]);
        session.history.pop();

        session.submit_user_message("what is the total?", &source).await.unwrap();
        assert_eq!(session.history.last(), Some(&Entry::assistant("The total is 42.")));
        assert!(session.history[1].as_input().unwrap().disabled);
    }

    #[tokio::test]
    async fn test_unknown_tool_apologizes() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![tool("Hologram", "{}"), tool("Slider", "{not json")]);
        session.submit_user_message("hi", &source).await.unwrap();
        assert_eq!(session.history[1], Entry::assistant(UNKNOWN_TOOL_APOLOGY));
        session.submit_user_message("again", &source).await.unwrap();
        assert_eq!(session.history[3], Entry::assistant(UNKNOWN_TOOL_APOLOGY));
        assert!(!session.state().is_blocked());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![]);
        assert!(matches!(session.submit_user_message("  ", &source).await, Err(TurnError::EmptyMessage)));
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_history_unchanged() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![text("one"), Err(LlmError::RateLimited)]);
        session.submit_user_message("first", &source).await.unwrap();
        let before = session.history.clone();

        let err = session.submit_user_message("second", &source).await.unwrap_err();
        assert!(matches!(err, TurnError::Upstream(UpstreamError::Llm(LlmError::RateLimited))));
        assert_eq!(session.history, before);

        let mut source = Scripted::new(vec![tool("Markdown", r#"{"content": "x"}"#)]);
        source.fail_follow_up = true;
        assert!(session.submit_user_message("third", &source).await.is_err());
        assert_eq!(session.history, before);
    }

    #[tokio::test]
    async fn test_blank_reply_is_an_error_not_an_empty_bubble() {
        let mut session = ChatSession::new();
        let source = Scripted::new(vec![Ok(LlmResponse::default()), text("  \n")]);

        let err = session.submit_user_message("hello", &source).await.unwrap_err();
        assert!(matches!(err, TurnError::Upstream(UpstreamError::Llm(LlmError::InvalidResponse(_)))));
        assert!(session.history.is_empty());

        assert!(session.submit_user_message("hello again", &source).await.is_err());
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_custom_function_and_tool_log() {
        let temp = TempDir::new().unwrap();
        let paths = DbPaths::in_dir(temp.path()).unwrap();
        init_db(&paths.db_path).unwrap();

        let mut session = ChatSession::new().with_tool_log(&paths.db_path);
        let mut source = Scripted::new(vec![tool("get_weather", r#"{"city": "Oslo"}"#)]);
        source.functions = vec!["get_weather"];
        session.submit_user_message("weather?", &source).await.unwrap();
        assert!(session.history[1].content().unwrap().contains("get_weather"));

        let rows = tool_log::list_tool_calls(&paths.db_path, &session.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "get_weather");
        assert_eq!(rows[0].result_json, r#""Recorded a call to get_weather.""#);
    }

    #[tokio::test]
    async fn test_random_stream_session() {
        let mut session = ChatSession::new();
        let source = crate::random_assistant::RandomAssistant::seeded(11);
        for i in 0..20 {
            if let ChatState::BlockedOnWidget { key, .. } = session.state() {
                let kind = session.history.last().unwrap().as_input().unwrap().kind;
                let value = match kind {
                    crate::widgets::WidgetKind::Checkbox => json!(true),
                    crate::widgets::WidgetKind::DateInput => json!("2024-01-31"),
                    crate::widgets::WidgetKind::TimeInput => json!("09:30"),
                    crate::widgets::WidgetKind::Selectbox => json!("Red"),
                    crate::widgets::WidgetKind::Slider | crate::widgets::WidgetKind::NumberInput => json!(5),
                    _ => json!("text"),
                };
                session.answer_widget(&key, value).unwrap();
            }
            session.submit_user_message(&format!("message {}", i), &source).await.unwrap();
            let pass = session.render();
            let enabled = session.history.iter().filter(|e| e.as_input().is_some_and(|w| !w.disabled)).count();
            assert!(enabled <= 1);
            assert_eq!(pass.entries.len(), session.history.len());
        }
    }

    #[tokio::test]
    async fn test_session_store() {
        let store = SessionStore::new();
        let id = store.insert(ChatSession::new()).await;
        assert_eq!(store.len().await, 1);

        let shared = store.get(&id).await.unwrap();
        {
            let mut session = shared.lock().await;
            let source = Scripted::new(vec![text("hello")]);
            session.submit_user_message("hi", &source).await.unwrap();
        }
        assert_eq!(store.get(&id).await.unwrap().lock().await.history.len(), 2);
        assert!(store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
    }
}
