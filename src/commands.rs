use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tauri::State;

use crate::config::AppConfig;
use crate::configurations::{assistants, functions, prompts, AssistantConfig};
use crate::conversation::RenderPass;
use crate::models::*;
use crate::responder::{build_llm_responder, llm_client};
use crate::schema::FunctionDisplay;
use crate::session::{ChatSession, SessionMode, TurnOutcome};
use crate::{store, tool_log, ui_tools, AppState};

#[derive(Debug, Serialize)]
pub struct SessionView {
  pub id: ID,
  pub mode: SessionMode,
  pub render: RenderPass,
}

#[derive(Debug, Serialize)]
pub struct TurnView {
  pub outcome: TurnOutcome,
  pub render: RenderPass,
}

#[tauri::command]
pub fn db_health(state: State<'_, AppState>) -> Result<serde_json::Value, String> {
  crate::db::connect(&state.db_path).map_err(|e| e.to_string())?;
  Ok(serde_json::json!({ "ok": true, "path": state.db_path.to_string_lossy() }))
}

// Settings

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<Vec<SettingsKV>, String> {
  store::get_settings(&state.db_path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_settings(state: State<'_, AppState>, pairs: Vec<SettingInput>) -> Result<(), String> {
  store::set_settings(&state.db_path, &pairs).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_app_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
  AppConfig::load(&state.db_path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn ui_tool_schemas() -> Vec<Value> {
  ui_tools::ui_tool_schemas()
}

// Chat sessions

#[tauri::command]
pub async fn create_session(
  state: State<'_, AppState>,
  mode: SessionMode,
) -> Result<SessionView, String> {
  if let SessionMode::Llm { assistant_id: Some(id) } = &mode {
    assistants::stored_config(&state.db_path, id)
      .map_err(|e| e.to_string())?
      .ok_or_else(|| format!("assistant not found: {}", id))?;
  }
  let mut session = ChatSession::new().with_mode(mode.clone()).with_tool_log(&state.db_path);
  let render = session.render();
  let id = state.sessions.insert(session).await;
  tracing::info!(session_id = %id, ?mode, "session created");
  Ok(SessionView { id, mode, render })
}

#[tauri::command]
pub async fn close_session(state: State<'_, AppState>, session_id: String) -> Result<bool, String> {
  Ok(state.sessions.remove(&session_id).await)
}

#[tauri::command]
pub async fn reset_session(
  state: State<'_, AppState>,
  session_id: String,
) -> Result<RenderPass, String> {
  let shared = state.sessions.get(&session_id).await.ok_or("session not found")?;
  let mut session = shared.lock().await;
  session.reset();
  Ok(session.render())
}

#[tauri::command]
pub async fn render_session(
  state: State<'_, AppState>,
  session_id: String,
) -> Result<RenderPass, String> {
  let shared = state.sessions.get(&session_id).await.ok_or("session not found")?;
  let mut session = shared.lock().await;
  Ok(session.render())
}

#[tauri::command]
pub async fn send_message(
  state: State<'_, AppState>,
  session_id: String,
  text: String,
) -> Result<TurnView, String> {
  let shared = state.sessions.get(&session_id).await.ok_or("session not found")?;
  let mut session = shared.lock().await;

  let outcome = match session.mode.clone() {
    SessionMode::Random => session.submit_user_message(&text, &state.random).await,
    SessionMode::Llm { assistant_id } => {
      let responder =
        build_llm_responder(&state.db_path, assistant_id.as_deref()).map_err(|e| e.to_string())?;
      session.submit_user_message(&text, &responder).await
    }
  }
  .map_err(|e| e.to_string())?;

  Ok(TurnView { outcome, render: session.render() })
}

#[tauri::command]
pub async fn answer_widget(
  state: State<'_, AppState>,
  session_id: String,
  key: String,
  value: Value,
) -> Result<RenderPass, String> {
  let shared = state.sessions.get(&session_id).await.ok_or("session not found")?;
  let mut session = shared.lock().await;
  session.answer_widget(&key, value).map_err(|e| e.to_string())?;
  Ok(session.render())
}

#[tauri::command]
pub fn list_tool_calls(
  state: State<'_, AppState>,
  session_id: String,
) -> Result<Vec<ToolCallRow>, String> {
  tool_log::list_tool_calls(&state.db_path, &session_id).map_err(|e| e.to_string())
}

// Prompts

#[tauri::command]
pub fn list_prompts(state: State<'_, AppState>) -> Result<Vec<Record>, String> {
  prompts::list_prompts(&state.db_path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn new_prompt() -> Record {
  prompts::new_prompt()
}

#[tauri::command]
pub async fn save_prompt(
  state: State<'_, AppState>,
  prompt_id: String,
  name: String,
  value: String,
) -> Result<Record, String> {
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  prompts::save_prompt(&state.db_path, &api, &prompt_id, &name, &value)
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_prompt(state: State<'_, AppState>, prompt_id: String) -> Result<bool, String> {
  prompts::delete_prompt(&state.db_path, &prompt_id).map_err(|e| e.to_string())
}

// Function tools

#[tauri::command]
pub fn list_functions(state: State<'_, AppState>) -> Result<Vec<FunctionDisplay>, String> {
  functions::load_functions(&state.db_path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn new_function() -> FunctionDisplay {
  functions::new_function()
}

#[tauri::command]
pub fn ui_tool_functions() -> Result<Vec<FunctionDisplay>, String> {
  ui_tools::ui_tool_displays().map_err(|e| e.to_string())
}

/// Expert mode: the display as schema JSON.
#[tauri::command]
pub fn function_to_json(display: FunctionDisplay) -> String {
  display.to_schema().to_pretty_json()
}

/// Expert mode: apply edited JSON; on a parse error the caller keeps its display.
#[tauri::command]
pub fn function_from_json(
  mut display: FunctionDisplay,
  text: String,
) -> Result<FunctionDisplay, String> {
  display.reload_from_json(&text).map_err(|e| e.to_string())?;
  Ok(display)
}

#[tauri::command]
pub async fn save_function(
  state: State<'_, AppState>,
  display: FunctionDisplay,
) -> Result<Record, String> {
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  functions::save_function(&state.db_path, &api, &display)
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_function(state: State<'_, AppState>, function_id: String) -> Result<bool, String> {
  functions::delete_function(&state.db_path, &function_id).map_err(|e| e.to_string())
}

// Assistants

#[tauri::command]
pub fn list_assistants(state: State<'_, AppState>) -> Result<BTreeMap<ID, String>, String> {
  assistants::list_assistants(&state.db_path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn new_assistant_id() -> ID {
  assistants::new_assistant_id()
}

#[tauri::command]
pub async fn load_assistant(
  state: State<'_, AppState>,
  assistant_id: String,
) -> Result<AssistantConfig, String> {
  let stored = assistants::stored_config(&state.db_path, &assistant_id).map_err(|e| e.to_string())?;
  if let Some(config) = stored {
    return Ok(config);
  }
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  assistants::load_assistant(&api, &assistant_id).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn save_assistant(
  state: State<'_, AppState>,
  assistant_id: String,
  config: AssistantConfig,
) -> Result<Record, String> {
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  assistants::save_assistant(&state.db_path, &api, &assistant_id, &config)
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_assistant(
  state: State<'_, AppState>,
  assistant_id: String,
) -> Result<bool, String> {
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  assistants::delete_assistant(&state.db_path, &api, &assistant_id)
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn import_remote_assistants(
  state: State<'_, AppState>,
  limit: Option<u32>,
) -> Result<usize, String> {
  let api = llm_client(&state.db_path).map_err(|e| e.to_string())?;
  assistants::import_remote_assistants(&state.db_path, &api, limit.unwrap_or(20))
    .await
    .map_err(|e| e.to_string())
}

// Data dump

fn dump_path(state: &AppState) -> Result<PathBuf, String> {
  let config = AppConfig::load(&state.db_path).map_err(|e| e.to_string())?;
  let path = PathBuf::from(config.data_dump_file);
  Ok(if path.is_absolute() { path } else { state.data_dir.join(path) })
}

#[tauri::command]
pub fn export_data(state: State<'_, AppState>) -> Result<usize, String> {
  let path = dump_path(&state)?;
  store::export_to_file(&state.db_path, &path).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn import_data(state: State<'_, AppState>) -> Result<usize, String> {
  let path = dump_path(&state)?;
  store::import_from_file(&state.db_path, &path).map_err(|e| e.to_string())
}
