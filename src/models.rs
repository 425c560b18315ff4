use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ID = String;

/// Row shape shared by the prompts, functions and assistants tables.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Record {
  pub id: ID,
  pub name: String,
  pub value: String, // prompt text | function schema json | assistant config json
  #[serde(default)]
  pub used_by: Vec<ID>, // assistant ids
  #[serde(default)]
  pub updated_at: String,
}

impl Record {
  pub fn new(id: impl Into<ID>, name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      value: value.into(),
      used_by: vec![],
      updated_at: now_iso(),
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SettingsKV {
  pub key: String,
  pub value: String,
  pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingInput {
  pub key: String,
  pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolCallRow {
  pub id: ID,
  pub session_id: ID,
  pub name: String,
  pub args_json: String,
  pub result_json: String,
  pub created_at: String,
}

/// 22 chars: url-safe base64 of a v4 uuid without padding.
pub fn new_id() -> ID {
  URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

pub fn now_iso() -> String {
  // RFC3339-ish without nanos; good enough for sorting/display.
  let t = time::OffsetDateTime::now_utc();
  t.format(&time::format_description::well_known::Rfc3339)
    .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_id_length() {
    let id = new_id();
    assert_eq!(id.len(), 22);
    assert!(!id.contains('='));
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }

  #[test]
  fn test_new_id_unique() {
    assert_ne!(new_id(), new_id());
  }
}
