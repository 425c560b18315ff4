//! Chat history entries and the widget kinds an assistant can render.
//!
//! Every widget kind is registered under a stable key in [`WIDGETS`]; the
//! same keys name the UI tools offered to the LLM.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::macros::format_description;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WidgetError {
    #[error("invalid {kind} config: {reason}")]
    InvalidConfig { kind: &'static str, reason: String },
    #[error("invalid answer for {key}: {reason}")]
    InvalidAnswer { key: String, reason: String },
    #[error("widget {0} is locked")]
    Locked(String),
    #[error("no input widget with key {0}")]
    UnknownKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    TextInput,
    Selectbox,
    Slider,
    Checkbox,
    DateInput,
    TimeInput,
    NumberInput,
    TextArea,
    FileUploader,
    LineChart,
    BarChart,
    Image,
    Table,
    Markdown,
}

/// Registration entry for a widget kind.
#[derive(Debug)]
pub struct WidgetSpec {
    pub key: &'static str,
    pub kind: WidgetKind,
    pub is_input: bool,
    /// Open-ended text entry; bounded choices leave this false.
    pub blocks_next_input: bool,
    pub description: &'static str,
}

pub static WIDGETS: [WidgetSpec; 14] = [
    WidgetSpec {
        key: "TextInput",
        kind: WidgetKind::TextInput,
        is_input: true,
        blocks_next_input: true,
        description: "Ask the user for a single line of free text.",
    },
    WidgetSpec {
        key: "Selectbox",
        kind: WidgetKind::Selectbox,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user to choose one option from a list.",
    },
    WidgetSpec {
        key: "Slider",
        kind: WidgetKind::Slider,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user to pick a number on a bounded slider.",
    },
    WidgetSpec {
        key: "Checkbox",
        kind: WidgetKind::Checkbox,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user a yes/no question with a checkbox.",
    },
    WidgetSpec {
        key: "DateInput",
        kind: WidgetKind::DateInput,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user for a calendar date.",
    },
    WidgetSpec {
        key: "TimeInput",
        kind: WidgetKind::TimeInput,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user for a time of day.",
    },
    WidgetSpec {
        key: "NumberInput",
        kind: WidgetKind::NumberInput,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user for a number within a range.",
    },
    WidgetSpec {
        key: "TextArea",
        kind: WidgetKind::TextArea,
        is_input: true,
        blocks_next_input: true,
        description: "Ask the user for multi-line free text.",
    },
    WidgetSpec {
        key: "FileUploader",
        kind: WidgetKind::FileUploader,
        is_input: true,
        blocks_next_input: false,
        description: "Ask the user to upload files for the assistant to analyse with code.",
    },
    WidgetSpec {
        key: "LineChart",
        kind: WidgetKind::LineChart,
        is_input: false,
        blocks_next_input: false,
        description: "Display series of numbers as a line chart.",
    },
    WidgetSpec {
        key: "BarChart",
        kind: WidgetKind::BarChart,
        is_input: false,
        blocks_next_input: false,
        description: "Display series of numbers as a bar chart.",
    },
    WidgetSpec {
        key: "Image",
        kind: WidgetKind::Image,
        is_input: false,
        blocks_next_input: false,
        description: "Display an image from a URL.",
    },
    WidgetSpec {
        key: "Table",
        kind: WidgetKind::Table,
        is_input: false,
        blocks_next_input: false,
        description: "Display tabular data.",
    },
    WidgetSpec {
        key: "Markdown",
        kind: WidgetKind::Markdown,
        is_input: false,
        blocks_next_input: false,
        description: "Display formatted markdown text.",
    },
];

pub fn lookup(key: &str) -> Option<&'static WidgetSpec> {
    WIDGETS.iter().find(|w| w.key == key)
}

impl WidgetKind {
    pub fn spec(self) -> &'static WidgetSpec {
        // every variant has exactly one row in WIDGETS
        WIDGETS.iter().find(|w| w.kind == self).unwrap_or(&WIDGETS[0])
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn is_input(self) -> bool {
        self.spec().is_input
    }

    pub fn blocks_next_input(self) -> bool {
        self.spec().blocks_next_input
    }

    fn heading(self) -> &'static str {
        match self {
            WidgetKind::LineChart => "Here's a line chart based on data:",
            WidgetKind::BarChart => "Here's a bar chart based on data:",
            WidgetKind::Image => "Here's an image:",
            WidgetKind::Table => "Here's a table of data:",
            WidgetKind::Markdown => "Here's some formatted text:",
            _ => "",
        }
    }
}

/// Build the entry for a registered widget from tool arguments.
pub fn build_entry(
    spec: &WidgetSpec,
    args: Map<String, Value>,
    key: String,
) -> Result<Entry, WidgetError> {
    if spec.is_input {
        InputWidget::new(spec.kind, args, key).map(Entry::Input)
    } else {
        OutputWidget::new(spec.kind, Value::Object(args)).map(Entry::Output)
    }
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// `None`, null, blank strings and empty collections count as unanswered.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    User { content: String },
    Assistant { content: String },
    Input(InputWidget),
    Output(OutputWidget),
}

impl Entry {
    pub fn user(content: impl Into<String>) -> Self {
        Entry::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Entry::Assistant { content: content.into() }
    }

    pub fn role(&self) -> Role {
        match self {
            Entry::User { .. } => Role::User,
            _ => Role::Assistant,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Entry::User { content } | Entry::Assistant { content } => Some(content),
            Entry::Input(w) => w.content.as_deref(),
            Entry::Output(w) => w.content.as_deref(),
        }
    }

    pub fn as_input(&self) -> Option<&InputWidget> {
        match self {
            Entry::Input(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_input_mut(&mut self) -> Option<&mut InputWidget> {
        match self {
            Entry::Input(w) => Some(w),
            _ => None,
        }
    }

    /// Attach trailing assistant text (e.g. the reply after a tool call).
    pub fn append_content(&mut self, text: &str) {
        let slot = match self {
            Entry::User { content } | Entry::Assistant { content } => {
                if !content.is_empty() {
                    content.push_str("\n\n");
                }
                content.push_str(text);
                return;
            }
            Entry::Input(w) => &mut w.content,
            Entry::Output(w) => &mut w.content,
        };
        match slot {
            Some(existing) if !existing.is_empty() => {
                existing.push_str("\n\n");
                existing.push_str(text);
            }
            _ => *slot = Some(text.to_string()),
        }
    }

    pub fn render(&self) -> Render {
        match self {
            Entry::User { content } => Render::Text { role: Role::User, text: content.clone() },
            Entry::Assistant { content } => Render::Text {
                role: Role::Assistant,
                text: content.clone(),
            },
            Entry::Input(w) => w.render(),
            Entry::Output(w) => w.render(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputWidget {
    pub kind: WidgetKind,
    pub config: Map<String, Value>,
    pub key: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub content: Option<String>,
}

impl InputWidget {
    pub fn new(
        kind: WidgetKind,
        config: Map<String, Value>,
        key: impl Into<String>,
    ) -> Result<Self, WidgetError> {
        validate_input_config(kind, &config)?;
        Ok(Self {
            kind,
            config,
            key: key.into(),
            value: None,
            disabled: false,
            content: None,
        })
    }

    pub fn blocks_next_input(&self) -> bool {
        self.kind.blocks_next_input()
    }

    pub fn label(&self) -> &str {
        self.config.get("label").and_then(Value::as_str).unwrap_or("")
    }

    pub fn is_answered(&self) -> bool {
        !is_empty_value(self.value.as_ref())
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// Record the user's answer after checking it fits the widget.
    pub fn answer(&mut self, value: Value) -> Result<(), WidgetError> {
        if self.disabled {
            return Err(WidgetError::Locked(self.key.clone()));
        }
        self.check_answer(&value)?;
        self.value = Some(value);
        Ok(())
    }

    fn check_answer(&self, value: &Value) -> Result<(), WidgetError> {
        let invalid = |reason: &str| WidgetError::InvalidAnswer {
            key: self.key.clone(),
            reason: reason.to_string(),
        };
        match self.kind {
            WidgetKind::TextInput | WidgetKind::TextArea => {
                value.as_str().ok_or_else(|| invalid("expected text"))?;
            }
            WidgetKind::Selectbox => {
                if !self.options().contains(value) {
                    return Err(invalid("not one of the options"));
                }
            }
            WidgetKind::Slider | WidgetKind::NumberInput => {
                let n = value.as_f64().ok_or_else(|| invalid("expected a number"))?;
                let (min, max) = self.range();
                if n < min || n > max {
                    return Err(invalid(&format!("{n} is outside {min}..={max}")));
                }
            }
            WidgetKind::Checkbox => {
                value.as_bool().ok_or_else(|| invalid("expected true or false"))?;
            }
            WidgetKind::DateInput => {
                let s = value.as_str().ok_or_else(|| invalid("expected a YYYY-MM-DD date"))?;
                time::Date::parse(s, format_description!("[year]-[month]-[day]"))
                    .map_err(|_| invalid("expected a YYYY-MM-DD date"))?;
            }
            WidgetKind::FileUploader => {
                let files = value
                    .as_array()
                    .ok_or_else(|| invalid("expected a list of file paths"))?;
                if files.is_empty() {
                    return Err(invalid("no file selected"));
                }
                if files.len() > 1 && !self.accepts_multiple_files() {
                    return Err(invalid("only one file may be uploaded"));
                }
                let allowed = self.allowed_extensions();
                for file in files {
                    let path = file.as_str().filter(|p| !p.trim().is_empty());
                    let path = path.ok_or_else(|| invalid("file paths must be non-empty text"))?;
                    if !allowed.is_empty() && !allowed.contains(&extension_of(path)) {
                        let reason = format!("{path} is not one of {}", allowed.join(", "));
                        return Err(invalid(&reason));
                    }
                }
            }
            WidgetKind::TimeInput => {
                let s = value.as_str().ok_or_else(|| invalid("expected an HH:MM time"))?;
                let short = time::Time::parse(s, format_description!("[hour]:[minute]"));
                let long = time::Time::parse(s, format_description!("[hour]:[minute]:[second]"));
                if short.is_err() && long.is_err() {
                    return Err(invalid("expected an HH:MM time"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn options(&self) -> &[Value] {
        self.config.get("options").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }

    fn accepts_multiple_files(&self) -> bool {
        self.config.get("accept_multiple_files").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Lowercase extensions without the dot; empty means any file.
    fn allowed_extensions(&self) -> Vec<String> {
        self.config
            .get("type")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|t| t.trim_start_matches('.').to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Paths the user uploaded through a file uploader.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        if self.kind != WidgetKind::FileUploader {
            return vec![];
        }
        self.value
            .as_ref()
            .and_then(Value::as_array)
            .map(|files| files.iter().filter_map(Value::as_str).map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    fn range(&self) -> (f64, f64) {
        let min = self.config.get("min_value").and_then(Value::as_f64).unwrap_or(0.0);
        let max = self.config.get("max_value").and_then(Value::as_f64).unwrap_or(f64::MAX);
        (min, max)
    }

    /// Value the control shows: the answer, else the kind's default.
    pub fn shown_value(&self) -> Value {
        if let Some(v) = self.value.as_ref().filter(|v| !v.is_null()) {
            if self.kind != WidgetKind::Selectbox || self.options().contains(v) {
                return v.clone();
            }
        }
        match self.kind {
            WidgetKind::TextInput | WidgetKind::TextArea => Value::from(""),
            WidgetKind::Selectbox => self.options().first().cloned().unwrap_or(Value::Null),
            WidgetKind::Slider | WidgetKind::NumberInput => self
                .config
                .get("default")
                .or_else(|| self.config.get("min_value"))
                .cloned()
                .unwrap_or(Value::Null),
            WidgetKind::Checkbox => Value::Bool(false),
            WidgetKind::FileUploader => Value::Array(vec![]),
            _ => Value::Null,
        }
    }

    pub fn render(&self) -> Render {
        let mut props = self.config.clone();
        props.remove("label");
        Render::Input {
            role: Role::Assistant,
            kind: self.kind,
            key: self.key.clone(),
            label: self.label().to_string(),
            props,
            value: self.shown_value(),
            disabled: self.disabled,
            note: self.content.clone(),
        }
    }
}

fn validate_input_config(kind: WidgetKind, config: &Map<String, Value>) -> Result<(), WidgetError> {
    let invalid = |reason: &str| WidgetError::InvalidConfig {
        kind: kind.key(),
        reason: reason.to_string(),
    };
    if let Some(label) = config.get("label") {
        if !label.is_string() {
            return Err(invalid("label must be text"));
        }
    }
    match kind {
        WidgetKind::Selectbox => {
            let options = config
                .get("options")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("options must be a list"))?;
            if options.is_empty() {
                return Err(invalid("options must not be empty"));
            }
        }
        WidgetKind::Slider | WidgetKind::NumberInput => {
            let number = |field: &str| config.get(field).and_then(Value::as_f64);
            let min = number("min_value").ok_or_else(|| invalid("min_value must be a number"))?;
            let max = number("max_value").ok_or_else(|| invalid("max_value must be a number"))?;
            if min > max {
                return Err(invalid("min_value is greater than max_value"));
            }
            if let Some(default) = config.get("default") {
                let d = default.as_f64().ok_or_else(|| invalid("default must be a number"))?;
                if d < min || d > max {
                    return Err(invalid("default is outside the range"));
                }
            }
        }
        WidgetKind::FileUploader => {
            if let Some(types) = config.get("type") {
                let all_text = types.as_array().is_some_and(|t| t.iter().all(Value::is_string));
                if !all_text {
                    return Err(invalid("type must be a list of file extensions"));
                }
            }
            if config.get("accept_multiple_files").is_some_and(|v| !v.is_boolean()) {
                return Err(invalid("accept_multiple_files must be true or false"));
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputWidget {
    pub kind: WidgetKind,
    pub data: Value,
    #[serde(default)]
    pub content: Option<String>,
}

impl OutputWidget {
    pub fn new(kind: WidgetKind, data: Value) -> Result<Self, WidgetError> {
        let invalid = |reason: &str| WidgetError::InvalidConfig {
            kind: kind.key(),
            reason: reason.to_string(),
        };
        match kind {
            WidgetKind::LineChart | WidgetKind::BarChart => {
                if !data.get("data").is_some_and(Value::is_array) {
                    return Err(invalid("data must be a list of rows"));
                }
            }
            WidgetKind::Image => {
                if !data.get("url").and_then(Value::as_str).is_some_and(|u| !u.is_empty()) {
                    return Err(invalid("url is required"));
                }
            }
            WidgetKind::Table => {
                if !data.get("data").is_some_and(|d| d.is_object() || d.is_array()) {
                    return Err(invalid("data must be columns or rows"));
                }
            }
            WidgetKind::Markdown => {
                if !data.get("content").is_some_and(Value::is_string) {
                    return Err(invalid("content is required"));
                }
            }
            other => return Err(invalid(&format!("{} is an input widget", other.key()))),
        }
        Ok(Self { kind, data, content: None })
    }

    pub fn render(&self) -> Render {
        Render::Output {
            role: Role::Assistant,
            kind: self.kind,
            heading: self.kind.heading().to_string(),
            data: self.data.clone(),
            note: self.content.clone(),
        }
    }
}

/// What the frontend should draw for one history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Render {
    Text {
        role: Role,
        text: String,
    },
    Input {
        role: Role,
        kind: WidgetKind,
        key: String,
        label: String,
        props: Map<String, Value>,
        value: Value,
        disabled: bool,
        note: Option<String>,
    },
    Output {
        role: Role,
        kind: WidgetKind,
        heading: String,
        data: Value,
        note: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn slider() -> InputWidget {
        InputWidget::new(
            WidgetKind::Slider,
            config(json!({"label": "Rate", "min_value": 1, "max_value": 10, "default": 5})),
            "Slider_1",
        )
        .unwrap()
    }

    #[test]
    fn test_registry_keys_are_unique_and_cover_all_kinds() {
        for spec in WIDGETS.iter() {
            assert_eq!(lookup(spec.key).unwrap().kind, spec.kind);
            assert_eq!(spec.kind.key(), spec.key);
        }
        let keys: std::collections::HashSet<_> = WIDGETS.iter().map(|w| w.key).collect();
        assert_eq!(keys.len(), WIDGETS.len());
        assert!(lookup("Unknown").is_none());
    }

    #[test]
    fn test_blocking_flags() {
        assert!(WidgetKind::TextInput.blocks_next_input());
        assert!(WidgetKind::TextArea.blocks_next_input());
        assert!(!WidgetKind::Slider.blocks_next_input());
        assert!(!WidgetKind::Selectbox.blocks_next_input());
        assert!(!WidgetKind::Checkbox.blocks_next_input());
        assert!(!WidgetKind::Table.is_input());
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut w = slider();
        w.answer(json!(7)).unwrap();
        w.disable();
        w.disable();
        assert!(w.disabled);
        assert_eq!(w.value, Some(json!(7)));
    }

    #[test]
    fn test_disabled_widget_still_shows_value_but_rejects_answers() {
        let mut w = slider();
        w.answer(json!(3)).unwrap();
        w.disable();
        assert_eq!(w.answer(json!(4)), Err(WidgetError::Locked("Slider_1".into())));
        match w.render() {
            Render::Input { value, disabled, .. } => {
                assert_eq!(value, json!(3));
                assert!(disabled);
            }
            other => panic!("unexpected render {other:?}"),
        }
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&Value::Null)));
        assert!(is_empty_value(Some(&json!("  "))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(false))));
        assert!(!is_empty_value(Some(&json!("x"))));
    }

    #[test]
    fn test_answer_validation() {
        let mut s = slider();
        assert!(s.answer(json!(11)).is_err());
        assert!(s.answer(json!("7")).is_err());
        assert!(s.answer(json!(10)).is_ok());

        let options = config(json!({"options": ["Red", "Blue"]}));
        let mut select = InputWidget::new(WidgetKind::Selectbox, options, "k").unwrap();
        assert!(select.answer(json!("Green")).is_err());
        assert!(select.answer(json!("Blue")).is_ok());

        let mut date = InputWidget::new(WidgetKind::DateInput, Map::new(), "d").unwrap();
        assert!(date.answer(json!("2024-02-30")).is_err());
        assert!(date.answer(json!("2024-02-29")).is_ok());

        let mut time_w = InputWidget::new(WidgetKind::TimeInput, Map::new(), "t").unwrap();
        assert!(time_w.answer(json!("25:00")).is_err());
        assert!(time_w.answer(json!("09:30")).is_ok());
        assert!(time_w.answer(json!("09:30:15")).is_ok());

        let mut check = InputWidget::new(WidgetKind::Checkbox, Map::new(), "c").unwrap();
        assert!(check.answer(json!("yes")).is_err());
        assert!(check.answer(json!(true)).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let no_options = config(json!({"options": []}));
        assert!(InputWidget::new(WidgetKind::Selectbox, no_options, "k").is_err());
        assert!(InputWidget::new(WidgetKind::Selectbox, Map::new(), "k").is_err());
        let inverted = config(json!({"min_value": 5, "max_value": 1}));
        assert!(InputWidget::new(WidgetKind::Slider, inverted, "k").is_err());
        let outside = config(json!({"min_value": 0, "max_value": 10, "default": 50}));
        assert!(InputWidget::new(WidgetKind::NumberInput, outside, "k").is_err());
        assert!(InputWidget::new(WidgetKind::TextInput, config(json!({"label": 3})), "k").is_err());
        assert!(OutputWidget::new(WidgetKind::Image, json!({"caption": "x"})).is_err());
        assert!(OutputWidget::new(WidgetKind::Markdown, json!({"content": "# hi"})).is_ok());
        assert!(OutputWidget::new(WidgetKind::Slider, json!({})).is_err());
    }

    #[test]
    fn test_shown_defaults() {
        assert_eq!(slider().shown_value(), json!(5));
        let options = config(json!({"options": ["Red", "Blue"]}));
        let select = InputWidget::new(WidgetKind::Selectbox, options, "k").unwrap();
        assert_eq!(select.shown_value(), json!("Red"));
        let text = InputWidget::new(WidgetKind::TextInput, Map::new(), "k").unwrap();
        assert_eq!(text.shown_value(), json!(""));
        assert!(!text.is_answered());
    }

    fn uploader(multiple: bool) -> InputWidget {
        let uploader_config = config(json!({
            "label": "Upload your data",
            "type": ["csv", ".XLSX"],
            "accept_multiple_files": multiple
        }));
        InputWidget::new(WidgetKind::FileUploader, uploader_config, "FileUploader_1").unwrap()
    }

    #[test]
    fn test_file_uploader_answers() {
        let mut single = uploader(false);
        assert!(!single.is_answered());
        assert_eq!(single.shown_value(), json!([]));
        assert!(single.answer(json!([])).is_err());
        assert!(single.answer(json!("/tmp/a.csv")).is_err());
        assert!(single.answer(json!(["/tmp/a.csv", "/tmp/b.csv"])).is_err());
        assert!(single.answer(json!(["/tmp/notes.txt"])).is_err());
        assert!(single.answer(json!(["/tmp/report.xlsx"])).is_ok());
        assert!(single.is_answered());
        assert_eq!(single.file_paths(), vec![PathBuf::from("/tmp/report.xlsx")]);

        let mut many = uploader(true);
        assert!(many.answer(json!(["/tmp/a.CSV", "/tmp/b.csv"])).is_ok());
        assert_eq!(many.file_paths().len(), 2);
        assert!(!WidgetKind::FileUploader.blocks_next_input());
    }

    #[test]
    fn test_file_uploader_config_and_paths() {
        let bad_types = config(json!({"type": "csv"}));
        assert!(InputWidget::new(WidgetKind::FileUploader, bad_types, "k").is_err());
        let bad_flag = config(json!({"accept_multiple_files": "yes"}));
        assert!(InputWidget::new(WidgetKind::FileUploader, bad_flag, "k").is_err());

        let mut any = InputWidget::new(WidgetKind::FileUploader, Map::new(), "k").unwrap();
        assert!(any.answer(json!(["/tmp/whatever.bin"])).is_ok());
        // only uploaders carry files
        let mut text = InputWidget::new(WidgetKind::TextInput, Map::new(), "t").unwrap();
        text.answer(json!("/tmp/a.csv")).unwrap();
        assert!(text.file_paths().is_empty());
    }

    #[test]
    fn test_build_entry_from_registry() {
        let spec = lookup("Markdown").unwrap();
        let args = config(json!({"content": "**bold**"}));
        let entry = build_entry(spec, args, "ignored".into()).unwrap();
        match entry.render() {
            Render::Output { heading, data, .. } => {
                assert_eq!(heading, "Here's some formatted text:");
                assert_eq!(data["content"], "**bold**");
            }
            other => panic!("unexpected render {other:?}"),
        }

        let spec = lookup("TextArea").unwrap();
        let args = config(json!({"label": "Describe"}));
        let entry = build_entry(spec, args, "TextArea_2".into()).unwrap();
        assert_eq!(entry.as_input().unwrap().key, "TextArea_2");
        assert_eq!(entry.role(), Role::Assistant);
    }

    #[test]
    fn test_append_content() {
        let mut entry = Entry::Input(slider());
        assert_eq!(entry.content(), None);
        entry.append_content("Pick one.");
        entry.append_content("Thanks.");
        assert_eq!(entry.content(), Some("Pick one.\n\nThanks."));

        let mut text = Entry::assistant("");
        text.append_content("hello");
        assert_eq!(text.content(), Some("hello"));
    }

    #[test]
    fn test_entry_serde_tagging() {
        let value = serde_json::to_value(Entry::user("hi")).unwrap();
        assert_eq!(value, json!({"type": "user", "content": "hi"}));
        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, Entry::user("hi"));
    }
}
