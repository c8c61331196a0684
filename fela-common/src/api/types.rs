//! Shared response envelope types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// List responses come either paginated (`{"results": [...]}`) or as a bare array
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Paged { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Paged { results } => results,
            ListEnvelope::Bare(items) => items,
        }
    }
}

/// Error body returned by the backend
///
/// Either `{"detail": ...}`, `{"error": ...}`, or a map of field name to
/// messages for validation failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub detail: Option<String>,
    pub field_errors: Vec<(String, Vec<String>)>,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => {
                let trimmed = body.trim();
                return Self {
                    detail: (!trimmed.is_empty()).then(|| trimmed.to_string()),
                    field_errors: Vec::new(),
                };
            }
        };

        let Some(map) = value.as_object() else {
            return Self {
                detail: value.as_str().map(str::to_string),
                field_errors: Vec::new(),
            };
        };

        let detail = ["detail", "error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        let field_errors = map
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "detail" | "error" | "message"))
            .map(|(key, value)| {
                let messages = match value {
                    Value::Array(items) => items.iter().map(value_text).collect(),
                    other => vec![value_text(other)],
                };
                (key.clone(), messages)
            })
            .collect();

        Self {
            detail,
            field_errors,
        }
    }

    /// Human-readable message: detail if present, else `field: a, b` lines
    pub fn message(&self) -> Option<String> {
        if let Some(detail) = &self.detail {
            return Some(detail.clone());
        }
        if self.field_errors.is_empty() {
            return None;
        }
        Some(
            self.field_errors
                .iter()
                .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
