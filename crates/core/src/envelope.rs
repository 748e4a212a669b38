//! The result envelope returned by every tool.
//!
//! A success carries payload fields next to `"status": "success"`; a failure
//! carries a non-empty `error_message` next to `"status": "error"`. The two
//! never mix: payload keys are only accepted on success and `error_message`
//! only exists on failure.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const STATUS: &str = "status";
const ERROR_MESSAGE: &str = "error_message";
const REPORT: &str = "report";

/// Envelope status literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success {
        payload: Map<String, Value>,
    },
    Error {
        error_message: String,
        /// Diagnostic fields such as a process exit code.
        details: Map<String, Value>,
    },
}

impl Envelope {
    /// An empty success; add payload with [`Envelope::with`].
    pub fn success() -> Self {
        Self::Success {
            payload: Map::new(),
        }
    }

    /// A success whose payload is a single `report` field.
    pub fn report(report: impl Into<Value>) -> Self {
        Self::success().with(REPORT, report)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut error_message = message.into();
        if error_message.trim().is_empty() {
            error_message = "unknown error".to_string();
        }
        Self::Error {
            error_message,
            details: Map::new(),
        }
    }

    /// Error envelope whose message is `"{prefix}: {error}"`.
    pub fn failure(prefix: &str, error: impl std::fmt::Display) -> Self {
        Self::error(format!("{}: {}", prefix, error))
    }

    /// Attach a field. Success fields go to the payload, error fields to the
    /// diagnostics. The reserved `status`/`error_message` keys are ignored,
    /// and so is `report` on an error.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == STATUS || key == ERROR_MESSAGE {
            tracing::warn!(key = %key, "Ignoring reserved envelope field");
            return self;
        }

        match &mut self {
            Self::Success { payload } => {
                payload.insert(key, value.into());
            }
            Self::Error { .. } if key == REPORT => {
                tracing::warn!(key = %key, "Ignoring payload field on error envelope");
            }
            Self::Error { details, .. } => {
                details.insert(key, value.into());
            }
        }
        self
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Error { .. } => Status::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error_message, .. } => Some(error_message),
            Self::Success { .. } => None,
        }
    }

    /// Look up a payload (or diagnostic) field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Success { payload } => payload.get(key),
            Self::Error { details, .. } => details.get(key),
        }
    }

    /// The `report` field of a success, if it is a string.
    pub fn report_text(&self) -> Option<&str> {
        match self {
            Self::Success { payload } => payload.get(REPORT).and_then(Value::as_str),
            Self::Error { .. } => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        match self {
            Self::Success { payload } => {
                object.insert(STATUS.to_string(), Value::from("success"));
                object.extend(payload.clone());
            }
            Self::Error {
                error_message,
                details,
            } => {
                object.insert(STATUS.to_string(), Value::from("error"));
                object.insert(ERROR_MESSAGE.to_string(), Value::from(error_message.clone()));
                object.extend(details.clone());
            }
        }
        Value::Object(object)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::Success { payload } => {
                map.serialize_entry(STATUS, &Status::Success)?;
                for (key, value) in payload {
                    map.serialize_entry(key, value)?;
                }
            }
            Self::Error {
                error_message,
                details,
            } => {
                map.serialize_entry(STATUS, &Status::Error)?;
                map.serialize_entry(ERROR_MESSAGE, error_message)?;
                for (key, value) in details {
                    map.serialize_entry(key, value)?;
                }
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut object = Map::<String, Value>::deserialize(deserializer)?;
        let status = object
            .remove(STATUS)
            .ok_or_else(|| de::Error::missing_field(STATUS))?;
        let status: Status = serde_json::from_value(status).map_err(de::Error::custom)?;

        match status {
            Status::Success => {
                if object.contains_key(ERROR_MESSAGE) {
                    return Err(de::Error::custom(
                        "success envelope must not carry error_message",
                    ));
                }
                Ok(Self::Success { payload: object })
            }
            Status::Error => {
                let error_message = match object.remove(ERROR_MESSAGE) {
                    Some(Value::String(message)) if !message.is_empty() => message,
                    Some(_) => return Err(de::Error::custom("error_message must be a non-empty string")),
                    None => return Err(de::Error::missing_field(ERROR_MESSAGE)),
                };
                if object.contains_key(REPORT) {
                    return Err(de::Error::custom("error envelope must not carry report"));
                }
                Ok(Self::Error {
                    error_message,
                    details: object,
                })
            }
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_shape() {
        let envelope = Envelope::report("sunny");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "success", "report": "sunny"})
        );
        assert_eq!(envelope.report_text(), Some("sunny"));
        assert!(envelope.error_message().is_none());
    }

    #[test]
    fn test_error_shape() {
        let envelope = Envelope::error("boom").with("exit_code", 2);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({"status": "error", "error_message": "boom", "exit_code": 2})
        );
        assert!(value.get("report").is_none());
        assert_eq!(envelope.status(), Status::Error);
    }

    #[test]
    fn test_error_message_never_empty() {
        let envelope = Envelope::error("   ");
        assert_eq!(envelope.error_message(), Some("unknown error"));
    }

    #[test]
    fn test_failure_prefix() {
        let envelope = Envelope::failure("Search failed", "connection refused");
        assert_eq!(
            envelope.error_message(),
            Some("Search failed: connection refused")
        );
    }

    #[test]
    fn test_reserved_keys_ignored() {
        let envelope = Envelope::report("ok")
            .with("status", "error")
            .with("error_message", "nope");

        let value = envelope.to_value();
        assert_eq!(value["status"], "success");
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn test_error_never_carries_report() {
        let envelope = Envelope::error("boom").with("report", "partial").with("exit_code", 1);

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({"status": "error", "error_message": "boom", "exit_code": 1})
        );
        assert!(envelope.get("report").is_none());
        assert!(envelope.report_text().is_none());
    }

    #[test]
    fn test_deserialize_rejects_report_on_error() {
        let result = serde_json::from_value::<Envelope>(json!({
            "status": "error",
            "error_message": "boom",
            "report": "partial"
        }));
        assert!(result.is_err());

        let envelope: Envelope = serde_json::from_value(json!({
            "status": "error",
            "error_message": "boom",
            "exit_code": 2
        }))
        .unwrap();
        assert_eq!(envelope.get("exit_code"), Some(&json!(2)));
    }

    #[test]
    fn test_to_value_matches_serialize() {
        let envelope = Envelope::success()
            .with("result", "Index 'docs' created successfully.")
            .with("response", json!({"acknowledged": true}));

        assert_eq!(envelope.to_value(), serde_json::to_value(&envelope).unwrap());
    }

    #[test]
    fn test_deserialize_success() {
        let envelope: Envelope =
            serde_json::from_value(json!({"status": "success", "total_hits": 3})).unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.get("total_hits"), Some(&json!(3)));
    }

    #[test]
    fn test_deserialize_rejects_mixed_shapes() {
        let mixed = json!({"status": "success", "report": "x", "error_message": "y"});
        assert!(serde_json::from_value::<Envelope>(mixed).is_err());

        let missing = json!({"status": "error"});
        assert!(serde_json::from_value::<Envelope>(missing).is_err());

        let bogus = json!({"status": "pending"});
        assert!(serde_json::from_value::<Envelope>(bogus).is_err());
    }
}
