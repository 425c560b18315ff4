use std::path::Path;

use crate::configurations::assistants;
use crate::error::{check_not_empty, ConfigError, ValidationError};
use crate::llm::AssistantApi;
use crate::models::Record;
use crate::schema::{FunctionDisplay, FunctionSchema};
use crate::store::KvTable;

/// Every stored function as an editable display. Rows whose schema no
/// longer parses are skipped with a warning.
pub fn load_functions(db_path: &Path) -> Result<Vec<FunctionDisplay>, ConfigError> {
    let mut out = vec![];
    for record in KvTable::functions(db_path).scan()? {
        match FunctionDisplay::from_record(&record) {
            Ok(display) => out.push(display),
            Err(e) => tracing::warn!(
                function_id = %record.id,
                error = %e,
                "skipping unreadable function schema"
            ),
        }
    }
    Ok(out)
}

pub fn load_function(db_path: &Path, id: &str) -> Result<FunctionDisplay, ConfigError> {
    let record = KvTable::functions(db_path).require(id)?;
    Ok(FunctionDisplay::from_record(&record)?)
}

pub fn new_function() -> FunctionDisplay {
    FunctionDisplay::blank()
}

/// Schemas for `ids`, in order. Used when building an assistant's tools.
pub fn function_schemas(
    db_path: &Path,
    ids: &[String],
) -> Result<Vec<FunctionSchema>, ConfigError> {
    let table = KvTable::functions(db_path);
    ids.iter()
        .map(|id| {
            let record = table.require(id)?;
            Ok(FunctionSchema::parse(&record.value)?)
        })
        .collect()
}

/// Store the function. The stored `used_by` list wins over the display's, and
/// every assistant using the function is re-synced.
pub async fn save_function(
    db_path: &Path,
    api: &dyn AssistantApi,
    function: &FunctionDisplay,
) -> Result<Record, ConfigError> {
    check_not_empty("function name", &function.function_name)?;
    check_not_empty("schema name", &function.schema_name)?;

    let table = KvTable::functions(db_path);
    let mut record = function.to_record();
    if let Some(existing) = table.get(&record.id)? {
        record.used_by = existing.used_by;
    }
    let saved = table.put(&record)?;
    tracing::info!(
        function_id = %saved.id,
        name = %function.function_name,
        "saved function schema"
    );

    for assistant_id in &saved.used_by {
        if assistants::stored_config(db_path, assistant_id)?.is_some() {
            assistants::resync_assistant(db_path, api, assistant_id).await?;
        } else {
            tracing::warn!(
                assistant_id = %assistant_id,
                "assistant not stored locally; cannot re-sync tools"
            );
        }
    }
    Ok(saved)
}

/// Refuses while any assistant still uses the function.
pub fn delete_function(db_path: &Path, id: &str) -> Result<bool, ConfigError> {
    let table = KvTable::functions(db_path);
    if let Some(record) = table.get(id)? {
        if !record.used_by.is_empty() {
            return Err(ValidationError::InUse {
                kind: "function",
                id: id.to_string(),
                used_by: record.used_by,
            }
            .into());
        }
    }
    let deleted = table.delete(id)?;
    if deleted {
        tracing::info!(function_id = id, "deleted function schema");
    }
    Ok(deleted)
}
