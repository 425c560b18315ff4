use serde_json::{json, Value};

use crate::schema::{FunctionDisplay, FunctionSchema, SchemaParseError};
use crate::widgets::{WidgetKind, WIDGETS};

/// Function declarations offered to the LLM, one per widget kind.
pub fn ui_tool_schemas() -> Vec<Value> {
    WIDGETS
        .iter()
        .map(|w| {
            json!({
                "type": "function",
                "function": {
                    "name": w.key,
                    "description": w.description,
                    "parameters": widget_parameters(w.kind),
                }
            })
        })
        .collect()
}

/// Editable views of the built-in UI tools, for the function tool builder.
pub fn ui_tool_displays() -> Result<Vec<FunctionDisplay>, SchemaParseError> {
    ui_tool_schemas()
        .iter()
        .map(|decl| {
            let schema = FunctionSchema::from_value(decl)?;
            let name = schema.name.clone();
            Ok(FunctionDisplay::from_schema(format!("ui_{name}"), name, &schema, false))
        })
        .collect()
}

fn label_property() -> Value {
    json!({
        "type": "string",
        "description": "Question or instruction shown above the widget."
    })
}

fn widget_parameters(kind: WidgetKind) -> Value {
    match kind {
        WidgetKind::TextInput
        | WidgetKind::TextArea
        | WidgetKind::Checkbox
        | WidgetKind::DateInput
        | WidgetKind::TimeInput => json!({
            "type": "object",
            "properties": { "label": label_property() },
            "required": ["label"]
        }),
        WidgetKind::Selectbox => json!({
            "type": "object",
            "properties": {
                "label": label_property(),
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Options the user can choose from"
                }
            },
            "required": ["label", "options"]
        }),
        WidgetKind::Slider | WidgetKind::NumberInput => json!({
            "type": "object",
            "properties": {
                "label": label_property(),
                "min_value": { "type": "number", "description": "Smallest allowed value" },
                "max_value": { "type": "number", "description": "Largest allowed value" },
                "default": {
                    "type": "number",
                    "description": "Initial value (defaults to min_value)"
                }
            },
            "required": ["label", "min_value", "max_value"]
        }),
        WidgetKind::FileUploader => json!({
            "type": "object",
            "properties": {
                "label": label_property(),
                "type": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Allowed file extensions, e.g. [\"csv\"]; empty allows any file"
                },
                "accept_multiple_files": {
                    "type": "boolean",
                    "description": "Whether the user may upload several files at once"
                },
                "help": { "type": "string", "description": "Tooltip shown next to the uploader" }
            },
            "required": ["label"]
        }),
        WidgetKind::LineChart | WidgetKind::BarChart => json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "array",
                    "items": { "type": "array", "items": { "type": "number" } },
                    "description": "Rows of numbers; each column is one series"
                }
            },
            "required": ["data"]
        }),
        WidgetKind::Image => json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Image URL" },
                "caption": { "type": "string", "description": "Optional caption" }
            },
            "required": ["url"]
        }),
        WidgetKind::Table => json!({
            "type": "object",
            "properties": {
                "data": { "type": "object", "description": "Column name to list of cell values" }
            },
            "required": ["data"]
        }),
        WidgetKind::Markdown => json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Markdown text to display" }
            },
            "required": ["content"]
        }),
    }
}
