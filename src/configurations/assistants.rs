use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::configurations::functions::function_schemas;
use crate::error::{check_not_empty, check_range, ConfigError, ValidationError};
use crate::llm::{AssistantApi, LlmConfig, RemoteAssistant};
use crate::models::{new_id, Record, ID};
use crate::schema::FunctionSchema;
use crate::store::KvTable;

pub const TMP_PREFIX: &str = "tmp_";
pub const REMOTE_PREFIX: &str = "asst_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
    JsonSchema { json_schema: Value },
}

impl ResponseFormat {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "type": "text" }))
    }

    /// `response_format` for a chat completion; plain text sends none.
    pub fn chat_format(&self) -> Option<Value> {
        match self {
            ResponseFormat::Text => None,
            other => Some(other.to_value()),
        }
    }

    /// `"auto"` and unrecognised shapes read as text.
    pub fn from_value(value: Option<&Value>) -> Self {
        value
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub name: String,
    pub prompt_id: ID,
    /// Resolved from the prompt on every save.
    #[serde(default)]
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(default)]
    pub file_search: bool,
    #[serde(default)]
    pub code_interpreter: bool,
    #[serde(default)]
    pub function_ids: Vec<ID>,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "New Assistant".into(),
            prompt_id: String::new(),
            instructions: "You are a helpful assistant.".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            top_p: 1.0,
            file_search: false,
            code_interpreter: false,
            function_ids: vec![],
            response_format: ResponseFormat::Text,
        }
    }
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_not_empty("assistant name", &self.name)?;
        check_not_empty("prompt", &self.prompt_id)?;
        check_not_empty("model", &self.model)?;
        check_range("temperature", self.temperature, 0.0, 1.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        if let ResponseFormat::JsonSchema { json_schema } = &self.response_format {
            if !json_schema.is_object() {
                return Err(ValidationError::Invalid {
                    field: "json_schema",
                    reason: "must be a JSON object".into(),
                });
            }
        }
        Ok(())
    }

    /// `prompt_id` plus one `function_<i>` entry per function, in order.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("prompt_id".into(), Value::String(self.prompt_id.clone()));
        for (i, id) in self.function_ids.iter().enumerate() {
            metadata.insert(format!("function_{}", i), Value::String(id.clone()));
        }
        metadata
    }

    /// Body for the create and update endpoints.
    pub fn payload(&self, functions: &[FunctionSchema]) -> Value {
        let mut tools = vec![];
        if self.file_search {
            tools.push(json!({ "type": "file_search" }));
        }
        if self.code_interpreter {
            tools.push(json!({ "type": "code_interpreter" }));
        }
        tools.extend(functions.iter().map(FunctionSchema::to_tool_declaration));

        json!({
            "name": self.name,
            "instructions": self.instructions,
            "model": self.model,
            "temperature": self.temperature,
            "top_p": self.top_p,
            "tools": tools,
            "response_format": self.response_format.to_value(),
            "metadata": self.metadata(),
        })
    }

    /// Rebuild a config from what the hosted API returns.
    pub fn from_remote(remote: &RemoteAssistant) -> Self {
        let defaults = Self::default();
        let has_tool = |name: &str| {
            remote
                .tools
                .iter()
                .any(|t| t.get("type").and_then(Value::as_str) == Some(name))
        };

        let mut functions: BTreeMap<usize, ID> = BTreeMap::new();
        for (key, value) in &remote.metadata {
            let (Some(index), Some(id)) = (
                key.strip_prefix("function_").and_then(|i| i.parse::<usize>().ok()),
                value.as_str(),
            ) else {
                continue;
            };
            functions.insert(index, id.to_string());
        }

        Self {
            name: remote.name.clone().unwrap_or_default(),
            prompt_id: remote
                .metadata
                .get("prompt_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            instructions: remote.instructions.clone().unwrap_or_default(),
            model: if remote.model.is_empty() { defaults.model } else { remote.model.clone() },
            temperature: remote.temperature.unwrap_or(defaults.temperature),
            top_p: remote.top_p.unwrap_or(defaults.top_p),
            file_search: has_tool("file_search"),
            code_interpreter: has_tool("code_interpreter"),
            function_ids: functions.into_values().collect(),
            response_format: ResponseFormat::from_value(remote.response_format.as_ref()),
        }
    }

    /// Chat settings for a session driven by this assistant.
    pub fn llm_config(&self, base: &LlmConfig) -> LlmConfig {
        LlmConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: Some(self.top_p),
            ..base.clone()
        }
    }

    fn to_record(&self, id: &str) -> Result<Record, ConfigError> {
        let value = serde_json::to_string_pretty(self).map_err(crate::db::DbError::from)?;
        Ok(Record::new(id, self.name.clone(), value))
    }
}

pub fn is_saved(id: &str) -> bool {
    id.starts_with(REMOTE_PREFIX)
}

/// Id for an assistant that exists only in the editor.
pub fn new_assistant_id() -> ID {
    format!("{}{}", TMP_PREFIX, new_id())
}

/// Id -> name of the locally known assistants.
pub fn list_assistants(db_path: &Path) -> Result<BTreeMap<ID, String>, ConfigError> {
    Ok(KvTable::assistants(db_path).names()?)
}

pub fn stored_config(db_path: &Path, id: &str) -> Result<Option<AssistantConfig>, ConfigError> {
    let Some(record) = KvTable::assistants(db_path).get(id)? else {
        return Ok(None);
    };
    let config = serde_json::from_str(&record.value).map_err(crate::db::DbError::from)?;
    Ok(Some(config))
}

/// Unsaved ids give the defaults; saved ones are read back from the API.
pub async fn load_assistant(
    api: &dyn AssistantApi,
    id: &str,
) -> Result<AssistantConfig, ConfigError> {
    if !is_saved(id) {
        return Ok(AssistantConfig::default());
    }
    let remote = api.retrieve_assistant(id).await?;
    Ok(AssistantConfig::from_remote(&remote))
}

/// Fill in the prompt text and the function schemas the config points at.
fn resolve(
    db_path: &Path,
    config: &AssistantConfig,
) -> Result<(AssistantConfig, Vec<FunctionSchema>), ConfigError> {
    let prompt = KvTable::prompts(db_path).require(&config.prompt_id)?;
    let functions = function_schemas(db_path, &config.function_ids)?;
    let mut resolved = config.clone();
    resolved.instructions = prompt.value;
    Ok((resolved, functions))
}

/// Create (unsaved id) or update (remote id) the assistant, then register it
/// in its prompt's and functions' `used_by` lists.
pub async fn save_assistant(
    db_path: &Path,
    api: &dyn AssistantApi,
    id: &str,
    config: &AssistantConfig,
) -> Result<Record, ConfigError> {
    config.validate()?;
    let (resolved, functions) = resolve(db_path, config)?;
    let payload = resolved.payload(&functions);

    let remote = if is_saved(id) {
        api.update_assistant(id, &payload).await?
    } else {
        api.create_assistant(&payload).await?
    };
    let assistant_id = remote.id;

    let table = KvTable::assistants(db_path);
    if is_saved(id) {
        if let Some(previous) = stored_config(db_path, id)? {
            deregister(db_path, &assistant_id, &previous, Some(&resolved))?;
        }
    } else {
        table.delete(id)?;
    }
    register(db_path, &assistant_id, &resolved)?;

    let saved = table.put(&resolved.to_record(&assistant_id)?)?;
    tracing::info!(assistant_id = %assistant_id, name = %resolved.name, "saved assistant");
    Ok(saved)
}

/// Push the stored config again, e.g. after its prompt or a function changed.
pub async fn resync_assistant(
    db_path: &Path,
    api: &dyn AssistantApi,
    id: &str,
) -> Result<(), ConfigError> {
    let config = stored_config(db_path, id)?.ok_or_else(|| crate::db::DbError::NotFound {
        table: "assistants",
        id: id.to_string(),
    })?;
    let (resolved, functions) = resolve(db_path, &config)?;
    api.update_assistant(id, &resolved.payload(&functions)).await?;
    KvTable::assistants(db_path).put(&resolved.to_record(id)?)?;
    tracing::info!(assistant_id = id, "re-synced assistant");
    Ok(())
}

/// Deregister from prompt and functions, then delete remotely and locally.
/// An unsaved assistant is only dropped locally.
pub async fn delete_assistant(
    db_path: &Path,
    api: &dyn AssistantApi,
    id: &str,
) -> Result<bool, ConfigError> {
    let table = KvTable::assistants(db_path);
    if !is_saved(id) {
        return Ok(table.delete(id)?);
    }

    let config = match stored_config(db_path, id)? {
        Some(config) => config,
        None => AssistantConfig::from_remote(&api.retrieve_assistant(id).await?),
    };
    deregister(db_path, id, &config, None)?;
    api.delete_assistant(id).await?;
    table.delete(id)?;
    tracing::info!(assistant_id = id, "deleted assistant");
    Ok(true)
}

/// Store remote assistants that are not known locally. Returns how many
/// were added.
pub async fn import_remote_assistants(
    db_path: &Path,
    api: &dyn AssistantApi,
    limit: u32,
) -> Result<usize, ConfigError> {
    let table = KvTable::assistants(db_path);
    let mut added = 0;
    for remote in api.list_assistants(limit).await? {
        if table.get(&remote.id)?.is_some() {
            continue;
        }
        let config = AssistantConfig::from_remote(&remote);
        table.put(&config.to_record(&remote.id)?)?;
        added += 1;
    }
    tracing::info!(added, "imported remote assistants");
    Ok(added)
}

fn register(
    db_path: &Path,
    assistant_id: &str,
    config: &AssistantConfig,
) -> Result<(), ConfigError> {
    KvTable::prompts(db_path).add_used_by(&config.prompt_id, assistant_id)?;
    let functions = KvTable::functions(db_path);
    for function_id in &config.function_ids {
        functions.add_used_by(function_id, assistant_id)?;
    }
    Ok(())
}

/// Remove `assistant_id` from whatever `previous` referenced and `keep` does not.
fn deregister(
    db_path: &Path,
    assistant_id: &str,
    previous: &AssistantConfig,
    keep: Option<&AssistantConfig>,
) -> Result<(), ConfigError> {
    if keep.map_or(true, |k| k.prompt_id != previous.prompt_id) {
        KvTable::prompts(db_path).remove_used_by(&previous.prompt_id, assistant_id)?;
    }
    let functions = KvTable::functions(db_path);
    for function_id in &previous.function_ids {
        if keep.map_or(true, |k| !k.function_ids.contains(function_id)) {
            functions.remove_used_by(function_id, assistant_id)?;
        }
    }
    Ok(())
}
