use std::path::Path;

use serde_json::json;

use crate::configurations::assistants;
use crate::error::{check_not_empty, ConfigError, ValidationError};
use crate::llm::AssistantApi;
use crate::models::{new_id, Record};
use crate::store::KvTable;

pub const NEW_PROMPT_NAME: &str = "New Prompt";

pub fn list_prompts(db_path: &Path) -> Result<Vec<Record>, ConfigError> {
    Ok(KvTable::prompts(db_path).scan()?)
}

/// An unsaved prompt with a fresh id.
pub fn new_prompt() -> Record {
    Record::new(new_id(), NEW_PROMPT_NAME, "")
}

/// Create or update a prompt. Assistants built on an existing prompt are
/// re-synced so their instructions follow the new text.
pub async fn save_prompt(
    db_path: &Path,
    api: &dyn AssistantApi,
    id: &str,
    name: &str,
    value: &str,
) -> Result<Record, ConfigError> {
    check_not_empty("prompt name", name)?;
    check_not_empty("prompt text", value)?;

    let table = KvTable::prompts(db_path);
    let Some(mut existing) = table.get(id)? else {
        let saved = table.put(&Record::new(id, name, value))?;
        tracing::info!(prompt_id = id, name, "saved new prompt");
        return Ok(saved);
    };

    existing.name = name.to_string();
    existing.value = value.to_string();
    let saved = table.put(&existing)?;
    tracing::info!(prompt_id = id, name, used_by = saved.used_by.len(), "updated prompt");

    for assistant_id in &saved.used_by {
        if assistants::stored_config(db_path, assistant_id)?.is_some() {
            assistants::resync_assistant(db_path, api, assistant_id).await?;
        } else {
            api.update_assistant(assistant_id, &json!({ "instructions": value })).await?;
        }
    }
    Ok(saved)
}

/// Refuses while any assistant still uses the prompt.
pub fn delete_prompt(db_path: &Path, id: &str) -> Result<bool, ConfigError> {
    let table = KvTable::prompts(db_path);
    if let Some(record) = table.get(id)? {
        if !record.used_by.is_empty() {
            return Err(ValidationError::InUse {
                kind: "prompt",
                id: id.to_string(),
                used_by: record.used_by,
            }
            .into());
        }
    }
    let deleted = table.delete(id)?;
    if deleted {
        tracing::info!(prompt_id = id, "deleted prompt");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurations::fake::{Call, FakeAssistants};
    use crate::configurations::AssistantConfig;
    use crate::db::init_db;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.sqlite");
        init_db(&db_path).unwrap();
        (temp, db_path)
    }

    #[tokio::test]
    async fn test_save_new_and_existing_prompt() {
        let (_temp, db) = setup();
        let api = FakeAssistants::default();
        let prompt = new_prompt();
        assert_eq!(prompt.name, NEW_PROMPT_NAME);

        save_prompt(&db, &api, &prompt.id, "Greeter", "Say hi.").await.unwrap();
        let saved = save_prompt(&db, &api, &prompt.id, "Greeter v2", "Say hello.").await.unwrap();
        assert_eq!(saved.value, "Say hello.");
        assert_eq!(list_prompts(&db).unwrap().len(), 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let (_temp, db) = setup();
        let api = FakeAssistants::default();
        let err = save_prompt(&db, &api, "p1", "Name", "  ").await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ValidationError::Empty("prompt text"))));
        assert!(list_prompts(&db).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_propagates_to_assistants() {
        let (_temp, db) = setup();
        let api = FakeAssistants::default();
        save_prompt(&db, &api, "p1", "Greeter", "Say hi.").await.unwrap();

        let config = AssistantConfig { prompt_id: "p1".into(), ..AssistantConfig::default() };
        let saved = assistants::save_assistant(&db, &api, "tmp_x", &config).await.unwrap();
        // an assistant known only remotely gets a bare instructions update
        KvTable::prompts(&db).add_used_by("p1", "asst_remote_only").unwrap();

        save_prompt(&db, &api, "p1", "Greeter", "Say hello.").await.unwrap();
        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        match &calls[1] {
            Call::Update(id, payload) => {
                assert_eq!(id, &saved.id);
                assert_eq!(payload["instructions"], "Say hello.");
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(calls[2], Call::Update("asst_remote_only".into(), json!({"instructions": "Say hello."})));
        let stored = assistants::stored_config(&db, &saved.id).unwrap().unwrap();
        assert_eq!(stored.instructions, "Say hello.");
    }

    #[tokio::test]
    async fn test_delete_prompt_in_use() {
        let (_temp, db) = setup();
        let api = FakeAssistants::default();
        save_prompt(&db, &api, "p1", "Greeter", "Say hi.").await.unwrap();
        KvTable::prompts(&db).add_used_by("p1", "asst_1").unwrap();

        assert!(matches!(
            delete_prompt(&db, "p1"),
            Err(ConfigError::Validation(ValidationError::InUse { .. }))
        ));
        KvTable::prompts(&db).remove_used_by("p1", "asst_1").unwrap();
        assert!(delete_prompt(&db, "p1").unwrap());
        assert!(!delete_prompt(&db, "p1").unwrap());
    }
}
