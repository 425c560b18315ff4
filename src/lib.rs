pub mod config;
pub mod configurations;
pub mod conversation;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod models;
pub mod random_assistant;
pub mod responder;
pub mod schema;
pub mod session;
pub mod store;
pub mod tool_log;
pub mod ui_tools;
pub mod widgets;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub struct AppState {
  pub db_path: std::path::PathBuf,
  pub data_dir: std::path::PathBuf,
  pub sessions: session::SessionStore,
  pub random: random_assistant::RandomAssistant,
}

#[cfg(feature = "desktop")]
pub fn run() {
  use tauri::Manager;

  config::init_tracing();

  tauri::Builder::default()
    .plugin(tauri_plugin_dialog::init())
    .setup(|app| {
      let paths = db::paths(app.handle())?;
      db::init_db(&paths.db_path)?;
      tracing::info!(path = %paths.db_path.display(), "database ready");
      app.manage(AppState {
        db_path: paths.db_path,
        data_dir: paths.data_dir,
        sessions: session::SessionStore::new(),
        random: random_assistant::RandomAssistant::new(),
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      commands::db_health,
      commands::get_settings,
      commands::set_settings,
      commands::get_app_config,
      commands::ui_tool_schemas,
      commands::create_session,
      commands::close_session,
      commands::reset_session,
      commands::render_session,
      commands::send_message,
      commands::answer_widget,
      commands::list_tool_calls,
      commands::list_prompts,
      commands::new_prompt,
      commands::save_prompt,
      commands::delete_prompt,
      commands::list_functions,
      commands::new_function,
      commands::ui_tool_functions,
      commands::function_to_json,
      commands::function_from_json,
      commands::save_function,
      commands::delete_function,
      commands::list_assistants,
      commands::new_assistant_id,
      commands::load_assistant,
      commands::save_assistant,
      commands::delete_assistant,
      commands::import_remote_assistants,
      commands::export_data,
      commands::import_data,
    ])
    .run(tauri::generate_context!())
    .unwrap_or_else(|e| tracing::error!(error = %e, "error while running tauri application"));
}
