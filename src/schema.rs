//! Conversion between OpenAI-style function schemas and the editable
//! parameter model used by the function tool builder.
//!
//! The wire shape is
//! `{name, description, parameters: {type: "object", properties, required}}`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{new_id, Record, ID};

pub const PARAM_TYPES: [&str; 6] = ["string", "number", "integer", "boolean", "array", "object"];

#[derive(Debug, thiserror::Error)]
pub enum SchemaParseError {
    #[error("invalid function schema: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid function schema: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub const ALL: [ParamType; 6] = [
        ParamType::String,
        ParamType::Number,
        ParamType::Integer,
        ParamType::Boolean,
        ParamType::Array,
        ParamType::Object,
    ];

    pub fn as_str(self) -> &'static str {
        PARAM_TYPES[self.index()]
    }

    /// Position in [`PARAM_TYPES`].
    pub fn index(self) -> usize {
        match self {
            ParamType::String => 0,
            ParamType::Number => 1,
            ParamType::Integer => 2,
            ParamType::Boolean => 3,
            ParamType::Array => 4,
            ParamType::Object => 5,
        }
    }

    pub fn parse(s: &str) -> Option<ParamType> {
        PARAM_TYPES.iter().position(|t| *t == s).map(|i| ParamType::ALL[i])
    }

    /// Types for which an `enum` list is emitted.
    pub fn accepts_enum(self) -> bool {
        matches!(self, ParamType::String | ParamType::Number | ParamType::Integer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(rename = "enum")]
    pub enum_values: Vec<String>,
    /// Enum values as they appeared in the parsed schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_json: Vec<Value>,
    pub items_type: ParamType,
}

impl Default for FunctionParameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            param_type: ParamType::String,
            required: true,
            enum_values: vec![],
            enum_json: vec![],
            items_type: ParamType::String,
        }
    }
}

impl FunctionParameter {
    pub fn type_index(&self) -> usize {
        self.param_type.index()
    }

    pub fn items_type_index(&self) -> usize {
        self.items_type.index()
    }

    /// Change the type, dropping fields the new type cannot carry.
    pub fn set_type(&mut self, param_type: ParamType) {
        self.param_type = param_type;
        if !param_type.accepts_enum() {
            self.enum_values.clear();
            self.enum_json.clear();
        }
        if param_type != ParamType::Array {
            self.items_type = ParamType::String;
        }
    }
}

/// Split the comma separated enum input of the builder form.
pub fn parse_enum_input(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return vec![];
    }
    input.split(',').map(|e| e.trim().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: ParametersSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

fn object_type() -> String {
    "object".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsSchema {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
}

impl FunctionSchema {
    /// Accepts a bare function schema or a `{"type": "function", "function": ...}`
    /// tool declaration.
    pub fn from_value(value: &Value) -> Result<Self, SchemaParseError> {
        let Some(obj) = value.as_object() else {
            return Err(SchemaParseError::Shape("expected a JSON object".into()));
        };
        let inner = match obj.get("function") {
            Some(f @ Value::Object(_)) if !obj.contains_key("parameters") => f,
            _ => value,
        };
        let schema: FunctionSchema = serde_json::from_value(inner.clone())?;
        if schema.name.trim().is_empty() {
            return Err(SchemaParseError::Shape("function name is empty".into()));
        }
        Ok(schema)
    }

    pub fn parse(text: &str) -> Result<Self, SchemaParseError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Shape expected in a chat-completions `tools` array.
    pub fn to_tool_declaration(&self) -> Value {
        serde_json::json!({ "type": "function", "function": self.to_value() })
    }
}

/// Editable view of a stored function schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDisplay {
    pub schema_id: ID,
    pub schema_name: String,
    pub function_name: String,
    pub description: String,
    pub parameters: BTreeMap<ID, FunctionParameter>,
    #[serde(default)]
    pub used_by: BTreeSet<ID>,
    #[serde(default)]
    pub is_new: bool,
}

impl FunctionDisplay {
    pub fn blank() -> Self {
        Self {
            schema_id: new_id(),
            schema_name: "New Function".to_string(),
            function_name: "new_function".to_string(),
            description: String::new(),
            parameters: BTreeMap::new(),
            used_by: BTreeSet::new(),
            is_new: true,
        }
    }

    pub fn from_schema(
        schema_id: impl Into<ID>,
        schema_name: impl Into<String>,
        schema: &FunctionSchema,
        is_new: bool,
    ) -> Self {
        let required: BTreeSet<&str> = schema
            .parameters
            .required
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let parameters = schema
            .parameters
            .properties
            .iter()
            .map(|(name, prop)| {
                let param = FunctionParameter {
                    name: name.clone(),
                    description: prop.description.clone(),
                    param_type: prop.param_type,
                    required: required.contains(name.as_str()),
                    enum_values: prop
                        .enum_values
                        .iter()
                        .flatten()
                        .map(enum_value_to_string)
                        .collect(),
                    enum_json: prop.enum_values.clone().unwrap_or_default(),
                    items_type: prop.items.as_ref().map(|i| i.param_type).unwrap_or_default(),
                };
                (new_id(), param)
            })
            .collect();

        Self {
            schema_id: schema_id.into(),
            schema_name: schema_name.into(),
            function_name: schema.name.clone(),
            description: schema.description.clone(),
            parameters,
            used_by: BTreeSet::new(),
            is_new,
        }
    }

    pub fn from_record(record: &Record) -> Result<Self, SchemaParseError> {
        let schema = FunctionSchema::parse(&record.value)?;
        let mut display = Self::from_schema(record.id.clone(), record.name.clone(), &schema, false);
        display.used_by = record.used_by.iter().cloned().collect();
        Ok(display)
    }

    pub fn to_record(&self) -> Record {
        let value = self.to_schema().to_pretty_json();
        let mut record = Record::new(self.schema_id.clone(), self.schema_name.clone(), value);
        record.used_by = self.used_by.iter().cloned().collect();
        record
    }

    pub fn to_schema(&self) -> FunctionSchema {
        to_schema(self)
    }

    /// Replace name, description and parameters from edited JSON. On error
    /// `self` is left as it was.
    pub fn reload_from_json(&mut self, text: &str) -> Result<(), SchemaParseError> {
        let schema = FunctionSchema::parse(text)?;
        let reloaded = Self::from_schema(
            self.schema_id.clone(),
            self.schema_name.clone(),
            &schema,
            self.is_new,
        );
        self.function_name = reloaded.function_name;
        self.description = reloaded.description;
        self.parameters = reloaded.parameters;
        Ok(())
    }

    pub fn add_parameter(&mut self) -> ID {
        let id = new_id();
        self.parameters.insert(id.clone(), FunctionParameter::default());
        id
    }

    pub fn remove_parameter(&mut self, param_id: &str) -> Option<FunctionParameter> {
        self.parameters.remove(param_id)
    }

    pub fn parameter_mut(&mut self, param_id: &str) -> Option<&mut FunctionParameter> {
        self.parameters.get_mut(param_id)
    }
}

/// Parse a stored or hand-written schema into a fresh editable function.
pub fn to_editable(schema: &Value) -> Result<FunctionDisplay, SchemaParseError> {
    let schema = FunctionSchema::from_value(schema)?;
    let name = schema.name.clone();
    Ok(FunctionDisplay::from_schema(new_id(), name, &schema, false))
}

pub fn to_schema(display: &FunctionDisplay) -> FunctionSchema {
    let named = || display.parameters.values().filter(|p| !p.name.is_empty());

    let required: Vec<String> = named().filter(|p| p.required).map(|p| p.name.clone()).collect();

    let mut properties = BTreeMap::new();
    for param in named() {
        let enum_values = if param.param_type.accepts_enum() && !param.enum_values.is_empty() {
            Some(param.enum_values.iter().map(|e| enum_value_to_json(param, e)).collect())
        } else {
            None
        };
        // branch on the current type only; items_type may be stale
        let items = (param.param_type == ParamType::Array).then(|| ItemsSchema {
            param_type: param.items_type,
        });
        properties.insert(
            param.name.clone(),
            PropertySchema {
                param_type: param.param_type,
                description: param.description.clone(),
                enum_values,
                items,
            },
        );
    }

    FunctionSchema {
        name: display.function_name.clone(),
        description: display.description.clone(),
        parameters: ParametersSchema {
            schema_type: object_type(),
            properties,
            required: (!required.is_empty()).then_some(required),
        },
    }
}

fn enum_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// An entry still matching a parsed value keeps that value's JSON type.
fn enum_value_to_json(param: &FunctionParameter, value: &str) -> Value {
    if let Some(original) = param.enum_json.iter().find(|v| enum_value_to_string(v) == value) {
        return original.clone();
    }
    match param.param_type {
        ParamType::Integer => value
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(value)),
        ParamType::Number => value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(value)),
        _ => Value::from(value),
    }
}

/// Required names as a set, for order-insensitive comparison.
pub fn required_set(schema: &FunctionSchema) -> BTreeSet<String> {
    schema.parameters.required.iter().flatten().cloned().collect()
}

/// Drop everything but what the converter round-trips.
pub fn normalized(schema: &FunctionSchema) -> Value {
    let mut props = Map::new();
    for (name, prop) in &schema.parameters.properties {
        props.insert(name.clone(), serde_json::to_value(prop).unwrap_or(Value::Null));
    }
    serde_json::json!({
        "name": schema.name,
        "description": schema.description,
        "required": required_set(schema),
        "properties": props,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example() -> Value {
        json!({
            "name": "f",
            "description": "d",
            "parameters": {
                "type": "object",
                "properties": {"x": {"type": "string", "description": "p"}},
                "required": ["x"]
            }
        })
    }

    #[test]
    fn test_to_editable_single_required_string() {
        let display = to_editable(&example()).unwrap();
        assert_eq!(display.function_name, "f");
        assert_eq!(display.description, "d");
        assert_eq!(display.parameters.len(), 1);
        let param = display.parameters.values().next().unwrap();
        assert_eq!(param.name, "x");
        assert!(param.required);
        assert_eq!(param.param_type, ParamType::String);
        assert!(param.enum_values.is_empty());
        assert_eq!(param.items_type, ParamType::String);
    }

    #[test]
    fn test_example_round_trip() {
        let display = to_editable(&example()).unwrap();
        let schema = to_schema(&display);
        assert_eq!(schema.parameters.required, Some(vec!["x".to_string()]));
        assert_eq!(schema.to_value(), example());
    }

    #[test]
    fn test_round_trip_with_enum_array_and_optional() {
        let original = json!({
            "name": "book",
            "description": "Book a table",
            "parameters": {
                "type": "object",
                "properties": {
                    "size": {"type": "integer", "description": "guests", "enum": [2, 4, 6]},
                    "area": {"type": "string", "description": "where", "enum": ["inside", "terrace"]},
                    "tags": {"type": "array", "description": "extras", "items": {"type": "number"}},
                    "vip": {"type": "boolean", "description": "vip guest"},
                    "meta": {"type": "object", "description": "anything"}
                },
                "required": ["area", "size"]
            }
        });
        let parsed = FunctionSchema::from_value(&original).unwrap();
        let back = to_schema(&to_editable(&original).unwrap());
        assert_eq!(normalized(&back), normalized(&parsed));
        assert_eq!(back.parameters.properties["size"].enum_values, Some(vec![json!(2), json!(4), json!(6)]));
    }

    #[test]
    fn test_string_enum_of_integer_keeps_json_type() {
        let original = json!({
            "name": "pick",
            "parameters": {
                "type": "object",
                "properties": {"level": {"type": "integer", "description": "", "enum": ["1", "2"]}}
            }
        });
        let mut display = to_editable(&original).unwrap();
        let back = to_schema(&display);
        assert_eq!(back.parameters.properties["level"].enum_values, Some(vec![json!("1"), json!("2")]));

        // entries typed into the builder follow the parameter type
        let param = display.parameters.values_mut().next().unwrap();
        param.enum_values.push("3".into());
        let back = to_schema(&display);
        assert_eq!(
            back.parameters.properties["level"].enum_values,
            Some(vec![json!("1"), json!("2"), json!(3)])
        );
    }

    #[test]
    fn test_blank_names_are_dropped() {
        let mut display = to_editable(&example()).unwrap();
        let id = display.add_parameter();
        display.parameter_mut(&id).unwrap().description = "unnamed".into();

        let schema = to_schema(&display);
        assert_eq!(schema.parameters.properties.len(), 1);
        assert_eq!(schema.parameters.required, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_required_omitted_when_empty() {
        let mut display = to_editable(&example()).unwrap();
        for p in display.parameters.values_mut() {
            p.required = false;
        }
        let value = to_schema(&display).to_value();
        assert!(value["parameters"].get("required").is_none());
        assert_eq!(value["parameters"]["type"], "object");
    }

    #[test]
    fn test_array_to_scalar_drops_items() {
        let mut display = FunctionDisplay::blank();
        let id = display.add_parameter();
        {
            let p = display.parameter_mut(&id).unwrap();
            p.name = "list".into();
            p.param_type = ParamType::Array;
            p.items_type = ParamType::Integer;
        }
        assert!(to_schema(&display).parameters.properties["list"].items.is_some());

        // stale items_type without going through set_type
        display.parameter_mut(&id).unwrap().param_type = ParamType::String;
        let prop = &to_schema(&display).parameters.properties["list"];
        assert!(prop.items.is_none());
    }

    #[test]
    fn test_enum_only_for_scalar_types() {
        let mut display = FunctionDisplay::blank();
        let id = display.add_parameter();
        {
            let p = display.parameter_mut(&id).unwrap();
            p.name = "flag".into();
            p.param_type = ParamType::Boolean;
            p.enum_values = vec!["yes".into()];
        }
        assert!(to_schema(&display).parameters.properties["flag"].enum_values.is_none());
    }

    #[test]
    fn test_set_type_resets_dependent_fields() {
        let mut param = FunctionParameter {
            name: "x".into(),
            param_type: ParamType::Array,
            items_type: ParamType::Object,
            ..Default::default()
        };
        param.set_type(ParamType::String);
        assert_eq!(param.items_type, ParamType::String);
        param.enum_values = vec!["a".into()];
        param.set_type(ParamType::Boolean);
        assert!(param.enum_values.is_empty());
    }

    #[test]
    fn test_indices_follow_types() {
        for (i, name) in PARAM_TYPES.iter().enumerate() {
            let t = ParamType::parse(name).unwrap();
            let param = FunctionParameter { param_type: t, items_type: t, ..Default::default() };
            assert_eq!(param.type_index(), i);
            assert_eq!(param.items_type_index(), i);
            assert_eq!(t.as_str(), *name);
        }
        assert!(ParamType::parse("date").is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(FunctionSchema::parse("{not json").is_err());
        assert!(FunctionSchema::parse("[]").is_err());
        let nameless = r#"{"description": "no name", "parameters": {"properties": {}}}"#;
        assert!(FunctionSchema::parse(nameless).is_err());
        assert!(FunctionSchema::parse(r#"{"name": "f"}"#).is_err());
        let bad_type = r#"{"name": "f", "parameters": {"properties": {"x": {"type": "date"}}}}"#;
        assert!(FunctionSchema::parse(bad_type).is_err());
    }

    #[test]
    fn test_reload_keeps_previous_state_on_error() {
        let mut display = to_editable(&example()).unwrap();
        let before = display.clone();
        assert!(display.reload_from_json("{ broken").is_err());
        assert_eq!(display, before);

        display
            .reload_from_json(r#"{"name": "g", "parameters": {"properties": {"y": {"type": "number"}}}}"#)
            .unwrap();
        assert_eq!(display.function_name, "g");
        assert_eq!(display.schema_id, before.schema_id);
        assert_eq!(display.parameters.values().next().unwrap().name, "y");
    }

    #[test]
    fn test_accepts_tool_declaration_wrapper() {
        let wrapped = json!({"type": "function", "function": example()});
        let display = to_editable(&wrapped).unwrap();
        assert_eq!(display.function_name, "f");
        assert_eq!(to_schema(&display).to_tool_declaration(), wrapped);
    }

    #[test]
    fn test_record_round_trip_keeps_identity() {
        let mut display = to_editable(&example()).unwrap();
        display.schema_name = "My f".into();
        display.used_by.insert("asst_1".into());
        let record = display.to_record();
        let loaded = FunctionDisplay::from_record(&record).unwrap();
        assert_eq!(loaded.schema_id, display.schema_id);
        assert_eq!(loaded.schema_name, "My f");
        assert!(loaded.used_by.contains("asst_1"));
        assert!(!loaded.is_new);
        assert_eq!(loaded.to_schema(), display.to_schema());
    }

    #[test]
    fn test_parse_enum_input() {
        assert_eq!(parse_enum_input("a, b ,c"), vec!["a", "b", "c"]);
        assert!(parse_enum_input("  ").is_empty());
    }
}
