//! Template rendering
//!
//! The build only needs `render(template, data) -> String`; [`Renderer`] is
//! that contract. [`JinjaRenderer`] renders templates compiled for
//! [`Target::Jinja`].

use crate::dialect::Target;
use crate::error::{BuildError, Result};
use crate::types::MAX_DATA_SNAPSHOT_BYTES;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::{Map, Value};

pub trait Renderer {
    /// Dialect target the renderer expects its templates compiled for
    fn target(&self) -> Target;

    /// Render `template` with `data`; `name` is the template's path, used in errors
    fn render(&self, name: &str, template: &str, data: &Value) -> Result<String>;
}

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // `{{ }}` in the dialect is raw output
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for JinjaRenderer {
    fn target(&self) -> Target {
        Target::Jinja
    }

    fn render(&self, name: &str, template: &str, data: &Value) -> Result<String> {
        self.env
            .render_named_str(name, template, data)
            .map_err(|e| BuildError::Render {
                template: name.to_string(),
                message: e.to_string(),
                data: snapshot_data(data),
            })
    }
}

/// JSON view of render data for diagnostics.
///
/// `props` objects shrink to their key lists, `body` to its length, and the
/// whole snapshot is cut at a fixed size.
pub fn snapshot_data(data: &Value) -> String {
    let sanitized = match data {
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, value) in fields {
                let value = match (key.as_str(), value) {
                    ("props", Value::Object(props)) => {
                        Value::Array(props.keys().cloned().map(Value::String).collect())
                    }
                    ("body", Value::String(body)) => Value::String(format!("<{} bytes>", body.len())),
                    _ => value.clone(),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        other => other.clone(),
    };

    let mut text = serde_json::to_string_pretty(&sanitized).unwrap_or_else(|_| "<unserializable>".to_string());
    if text.len() > MAX_DATA_SNAPSHOT_BYTES {
        let mut cut = MAX_DATA_SNAPSHOT_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n  ... (truncated)");
    }
    text
}
