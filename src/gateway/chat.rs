//! Chat completion request schema.
//!
//! Requests are validated here, then re-serialized for the backend with
//! absent optional fields left out so the backend applies its own defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// `stop` may be one sequence or several.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

/// A rejected field and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_range(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) {
    if let Some(v) = value {
        if !(min..=max).contains(&v) {
            errors.push(FieldError::new(
                field,
                format!("must be between {min} and {max}, got {v}"),
            ));
        }
    }
}

impl ChatRequest {
    /// Check every field, collecting all problems.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.model.trim().is_empty() {
            errors.push(FieldError::new("model", "must not be empty"));
        }
        if self.messages.is_empty() {
            errors.push(FieldError::new("messages", "at least one message is required"));
        }
        check_range(&mut errors, "temperature", self.temperature, 0.0, 2.0);
        check_range(&mut errors, "top_p", self.top_p, 0.0, 1.0);
        check_range(&mut errors, "presence_penalty", self.presence_penalty, -2.0, 2.0);
        check_range(&mut errors, "frequency_penalty", self.frequency_penalty, -2.0, 2.0);
        if self.max_tokens == Some(0) {
            errors.push(FieldError::new("max_tokens", "must be at least 1"));
        }
        if self.n == Some(0) {
            errors.push(FieldError::new("n", "must be at least 1"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Body forwarded to `/chat/completions`.
    pub fn to_upstream_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_absent_fields_are_not_forwarded() {
        let request = parse(json!({
            "model": "org/model",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.7
        }));
        assert!(!request.stream);

        let body = request.to_upstream_body();
        assert_eq!(
            body,
            json!({
                "model": "org/model",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.7,
                "stream": false
            })
        );
    }

    #[test]
    fn test_stop_accepts_string_or_list() {
        let one = parse(json!({"model": "m", "messages": [], "stop": "\n"}));
        assert!(matches!(one.stop, Some(StopSequences::One(_))));
        let many = parse(json!({"model": "m", "messages": [], "stop": ["a", "b"]}));
        assert!(matches!(many.stop, Some(StopSequences::Many(ref v)) if v.len() == 2));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result: Result<ChatRequest, _> = serde_json::from_value(json!({
            "model": "m",
            "messages": [{"role": "tool", "content": "x"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let request = parse(json!({
            "model": "",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 2.5,
            "top_p": -0.1,
            "max_tokens": 0,
            "frequency_penalty": 3.0
        }));
        let fields: Vec<_> = request
            .validate()
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec!["model", "temperature", "top_p", "frequency_penalty", "max_tokens"]
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let request = parse(json!({
            "model": "m",
            "messages": [{"role": "system", "content": "be brief"}],
            "temperature": 2.0,
            "top_p": 0.0,
            "presence_penalty": -2.0
        }));
        assert_eq!(request.validate(), Ok(()));
    }
}
