//! Page data validation against a JSON-Schema subset
//!
//! Supported keywords: `type`, `enum`, `const`, `properties`, `required`,
//! `additionalProperties`, `items`, `minLength`, `maxLength`, `minimum`,
//! `maximum`, `minItems`, `maxItems`. Unknown keywords are ignored.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Anything that can check page data and itemize what is wrong with it
pub trait Validator: Send + Sync {
    fn validate(&self, data: &Value) -> Result<(), Vec<ValidationIssue>>;
}

#[derive(Debug, Clone)]
pub struct JsonSchema {
    root: Value,
}

impl JsonSchema {
    pub fn new(root: Value) -> Result<Self, String> {
        if root.is_object() || root.is_boolean() {
            Ok(Self { root })
        } else {
            Err("schema must be a JSON object or boolean".to_string())
        }
    }

    fn check(&self, schema: &Value, value: &Value, path: &mut Vec<String>, issues: &mut Vec<ValidationIssue>) {
        let rules = match schema {
            Value::Object(rules) => rules,
            Value::Bool(false) => {
                issues.push(issue(path, "Value is not allowed"));
                return;
            }
            _ => return,
        };

        if let Some(expected) = rules.get("type") {
            let types: Vec<&str> = match expected {
                Value::String(name) => vec![name.as_str()],
                Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !types.is_empty() && !types.iter().any(|name| type_matches(name, value)) {
                issues.push(issue(
                    path,
                    format!("Expected {}, received {}", types.join(" | "), type_name(value)),
                ));
                return;
            }
        }

        if let Some(Value::Array(options)) = rules.get("enum") {
            if !options.contains(value) {
                let expected: Vec<String> = options.iter().map(Value::to_string).collect();
                issues.push(issue(
                    path,
                    format!("Invalid enum value. Expected {}, received {}", expected.join(" | "), value),
                ));
            }
        }

        if let Some(constant) = rules.get("const") {
            if constant != value {
                issues.push(issue(path, format!("Invalid literal value, expected {constant}")));
            }
        }

        match value {
            Value::String(text) => {
                let length = text.chars().count() as u64;
                if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
                    if length < min {
                        issues.push(issue(path, format!("String must contain at least {min} character(s)")));
                    }
                }
                if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
                    if length > max {
                        issues.push(issue(path, format!("String must contain at most {max} character(s)")));
                    }
                }
            }
            Value::Number(number) => {
                let number = number.as_f64().unwrap_or(f64::NAN);
                if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
                    if number < min {
                        issues.push(issue(path, format!("Number must be greater than or equal to {min}")));
                    }
                }
                if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
                    if number > max {
                        issues.push(issue(path, format!("Number must be less than or equal to {max}")));
                    }
                }
            }
            Value::Array(items) => {
                let count = items.len() as u64;
                if let Some(min) = rules.get("minItems").and_then(Value::as_u64) {
                    if count < min {
                        issues.push(issue(path, format!("Array must contain at least {min} element(s)")));
                    }
                }
                if let Some(max) = rules.get("maxItems").and_then(Value::as_u64) {
                    if count > max {
                        issues.push(issue(path, format!("Array must contain at most {max} element(s)")));
                    }
                }
                if let Some(item_schema) = rules.get("items") {
                    for (index, item) in items.iter().enumerate() {
                        path.push(index.to_string());
                        self.check(item_schema, item, path, issues);
                        path.pop();
                    }
                }
            }
            Value::Object(fields) => self.check_object(rules, fields, path, issues),
            _ => {}
        }
    }

    fn check_object(
        &self,
        rules: &Map<String, Value>,
        fields: &Map<String, Value>,
        path: &mut Vec<String>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if let Some(Value::Array(required)) = rules.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(key) {
                    path.push(key.to_string());
                    issues.push(issue(path, "Required"));
                    path.pop();
                }
            }
        }

        let properties = rules.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (key, property_schema) in properties {
                if let Some(field) = fields.get(key) {
                    path.push(key.clone());
                    self.check(property_schema, field, path, issues);
                    path.pop();
                }
            }
        }

        let Some(additional) = rules.get("additionalProperties") else {
            return;
        };
        let declared = |key: &str| properties.map_or(false, |p| p.contains_key(key));
        for (key, field) in fields.iter().filter(|(key, _)| !declared(key.as_str())) {
            path.push(key.clone());
            match additional {
                Value::Bool(false) => issues.push(issue(path, "Unrecognized key")),
                Value::Object(_) => self.check(additional, field, path, issues),
                _ => {}
            }
            path.pop();
        }
    }
}

impl Validator for JsonSchema {
    fn validate(&self, data: &Value) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        self.check(&self.root, data, &mut Vec::new(), &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn issue(path: &[String], message: impl Into<String>) -> ValidationIssue {
    let path = if path.is_empty() {
        "(root)".to_string()
    } else {
        path.join(".")
    };
    ValidationIssue::new(path, message)
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().map_or(false, |n| n.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_schema() -> JsonSchema {
        JsonSchema::new(json!({
            "type": "object",
            "required": ["post"],
            "properties": {
                "post": {
                    "type": "object",
                    "required": ["slug", "title"],
                    "properties": {
                        "slug": { "type": "string", "minLength": 1 },
                        "title": { "type": "string" },
                        "tags": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_data_passes() {
        let data = json!({ "post": { "slug": "hello", "title": "Hello", "tags": ["a"] }, "extra": 1 });
        assert!(post_schema().validate(&data).is_ok());
    }

    #[test]
    fn test_issues_are_itemized_with_paths() {
        let data = json!({ "post": { "slug": 7, "tags": ["ok", 3] } });
        let issues = post_schema().validate(&data).unwrap_err();

        assert_eq!(
            issues,
            vec![
                ValidationIssue::new("post.title", "Required"),
                ValidationIssue::new("post.slug", "Expected string, received number"),
                ValidationIssue::new("post.tags.1", "Expected string, received number"),
            ]
        );
    }

    #[test]
    fn test_missing_root_field() {
        let issues = post_schema().validate(&json!({})).unwrap_err();
        assert_eq!(issues, vec![ValidationIssue::new("post", "Required")]);
    }

    #[test]
    fn test_root_type_mismatch() {
        let issues = post_schema().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(issues[0].path, "(root)");
        assert_eq!(issues[0].message, "Expected object, received array");
    }

    #[test]
    fn test_additional_properties_and_enum() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": { "status": { "enum": ["draft", "published"] } },
            "additionalProperties": false
        }))
        .unwrap();

        let issues = schema.validate(&json!({ "status": "archived", "rogue": true })).unwrap_err();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].path, "status");
        assert!(issues[0].message.starts_with("Invalid enum value"));
        assert_eq!(issues[1], ValidationIssue::new("rogue", "Unrecognized key"));
    }

    #[test]
    fn test_numeric_and_length_bounds() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer", "minimum": 1, "maximum": 10 },
                "items": { "type": "array", "maxItems": 1 }
            }
        }))
        .unwrap();

        let issues = schema.validate(&json!({ "count": 11, "items": [1, 2] })).unwrap_err();
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["count", "items"]);
        assert!(schema.validate(&json!({ "count": 1.5 })).is_err());
    }

    #[test]
    fn test_schema_must_be_object() {
        assert!(JsonSchema::new(json!("string")).is_err());
        assert!(JsonSchema::new(json!(true)).is_ok());
    }
}
