use std::path::Path;

use serde_json::Value;

use crate::db::{self, DbError};
use crate::models::*;

const MAX_RESULT_CHARS: usize = 200_000;

fn truncate_result(result: &Value) -> String {
    let result_str = result.to_string();
    if result_str.len() <= MAX_RESULT_CHARS {
        return result_str;
    }

    let mut cut = MAX_RESULT_CHARS;
    while !result_str.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated_content = &result_str[..cut];
    // A cut JSON document rarely parses; wrap it when it doesn't.
    match serde_json::from_str::<Value>(truncated_content) {
        Ok(mut val) => {
            if let Some(obj) = val.as_object_mut() {
                obj.insert("_truncated".to_string(), Value::Bool(true));
                let size = Value::Number((result_str.len() as i64).into());
                obj.insert("_original_size".to_string(), size);
            }
            val.to_string()
        }
        Err(_) => serde_json::json!({
            "_truncated": true,
            "_original_size": result_str.len(),
            "_content": truncated_content
        })
        .to_string(),
    }
}

pub fn log_tool_call(
    db_path: &Path,
    session_id: &str,
    name: &str,
    args: &Value,
    result: &Value,
) -> Result<ToolCallRow, DbError> {
    let conn = db::connect(db_path)?;
    let row = ToolCallRow {
        id: new_id(),
        session_id: session_id.to_string(),
        name: name.to_string(),
        args_json: args.to_string(),
        result_json: truncate_result(result),
        created_at: now_iso(),
    };

    conn.execute(
        "INSERT INTO tool_calls (id, session_id, name, args_json, result_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (&row.id, &row.session_id, &row.name, &row.args_json, &row.result_json, &row.created_at),
    )?;

    Ok(row)
}

pub fn list_tool_calls(db_path: &Path, session_id: &str) -> Result<Vec<ToolCallRow>, DbError> {
    let conn = db::connect(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT id, session_id, name, args_json, result_json, created_at
         FROM tool_calls WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map([session_id], |r| {
        Ok(ToolCallRow {
            id: r.get(0)?,
            session_id: r.get(1)?,
            name: r.get(2)?,
            args_json: r.get(3)?,
            result_json: r.get(4)?,
            created_at: r.get(5)?,
        })
    })?;

    let mut out = vec![];
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
