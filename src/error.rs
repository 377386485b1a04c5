//! Error types for the Shork build pipeline

use crate::schema::ValidationIssue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No layout found for route '{route}'. Create a +layout.html in the directory or any parent directory.")]
    NoLayout { route: String },

    #[error("Cyclic component reference: {}", .chain.join(" -> "))]
    ComponentCycle { chain: Vec<String> },

    #[error("Maximum limit exceeded: {limit_type} (limit: {limit})")]
    LimitExceeded { limit_type: String, limit: usize },

    #[error("Template syntax error in {file} at line {line}: {message}")]
    Dialect { file: String, line: usize, message: String },

    #[error("Module error in {path}: {message}")]
    Module { path: String, message: String },

    #[error("Schema validation failed for {route}:\n{}", format_issues(.issues))]
    Validation { route: String, issues: Vec<ValidationIssue> },

    #[error("Render error in {template}: {message}\n  Data available: {data}")]
    Render { template: String, message: String, data: String },

    #[error("CSS error: {message}")]
    Css { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, BuildError>;

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - Path: {} | Message: {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl BuildError {
    pub fn dialect(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Dialect {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn module(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Module {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for the errors an operator fixes by editing source data rather than templates
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
