//! Result envelope as stored by the Celery result backend.
//!
//! Workers write one JSON document per task under `celery-task-meta-<id>`:
//!
//! ```json
//! {"task_id": "...", "status": "SUCCESS", "traceback": null, "result": 5, "children": []}
//! ```
//!
//! `result` and `traceback` are opaque to this crate and kept as
//! `serde_json::Value`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::errors::{DecodeError, EncodeError};
use super::ids::TaskId;
use super::message::null_as_default;

/// Task state as reported by the worker.
///
/// Serialized as SCREAMING_SNAKE_CASE (`SUCCESS`, `FAILURE`, ...), parsed
/// case-insensitively. Unrecognised states are kept verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Received,
    Started,
    Success,
    Failure,
    Retry,
    Revoked,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Received => "RECEIVED",
            TaskStatus::Started => "STARTED",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Revoked => "REVOKED",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    /// Terminal states: no further transitions are expected.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked
        )
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

impl FromStr for TaskStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.to_ascii_uppercase().as_str() {
            "PENDING" => TaskStatus::Pending,
            "RECEIVED" => TaskStatus::Received,
            "STARTED" => TaskStatus::Started,
            "SUCCESS" => TaskStatus::Success,
            "FAILURE" => TaskStatus::Failure,
            "RETRY" => TaskStatus::Retry,
            "REVOKED" => TaskStatus::Revoked,
            _ => TaskStatus::Unknown(s.to_string()),
        };
        Ok(status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(status) = raw.parse::<TaskStatus>();
        Ok(status)
    }
}

/// Outcome record for one task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub task_id: TaskId,

    pub status: TaskStatus,

    /// Formatted traceback on failure, `null` otherwise.
    #[serde(default)]
    pub traceback: Value,

    /// Return value on success; exception info on failure.
    #[serde(default)]
    pub result: Value,

    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Value>,
}

impl ResultMessage {
    pub fn new(task_id: TaskId, status: TaskStatus, result: Value) -> Self {
        Self {
            task_id,
            status,
            traceback: Value::Null,
            result,
            children: Vec::new(),
        }
    }

    pub fn success(task_id: TaskId, result: Value) -> Self {
        Self::new(task_id, TaskStatus::Success, result)
    }

    pub fn failure(task_id: TaskId, result: Value, traceback: Value) -> Self {
        Self {
            traceback,
            ..Self::new(task_id, TaskStatus::Failure, result)
        }
    }

    pub fn to_json(&self) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::upper("SUCCESS", TaskStatus::Success)]
    #[case::lower("success", TaskStatus::Success)]
    #[case::failure("FAILURE", TaskStatus::Failure)]
    #[case::pending("PENDING", TaskStatus::Pending)]
    #[case::revoked("revoked", TaskStatus::Revoked)]
    fn status_parses_case_insensitively(#[case] raw: &str, #[case] expected: TaskStatus) {
        let parsed: TaskStatus = serde_json::from_value(json!(raw)).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let parsed: TaskStatus = serde_json::from_value(json!("PROGRESS")).unwrap();
        assert_eq!(parsed, TaskStatus::Unknown("PROGRESS".to_string()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"PROGRESS\"");
        assert!(!parsed.is_ready());
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&TaskStatus::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Retry).unwrap(), "\"RETRY\"");
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Success.is_ready());
        assert!(TaskStatus::Failure.is_ready());
        assert!(!TaskStatus::Started.is_ready());
        assert!(!TaskStatus::Retry.is_ready());
    }

    #[test]
    fn result_message_uses_backend_field_names() {
        let message = ResultMessage::success(TaskId::from("t-1"), json!(5));
        let v: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(
            v,
            json!({
                "task_id": "t-1",
                "status": "SUCCESS",
                "traceback": null,
                "result": 5,
                "children": []
            })
        );
    }

    #[test]
    fn decodes_with_null_and_missing_fields() {
        let message =
            ResultMessage::from_json(r#"{"task_id":"t-2","status":"PENDING","children":null}"#)
                .unwrap();

        assert_eq!(message.task_id.as_str(), "t-2");
        assert_eq!(message.status, TaskStatus::Pending);
        assert_eq!(message.result, Value::Null);
        assert!(message.children.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ResultMessage::from_json("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));

        let err = ResultMessage::from_json(r#"{"status":"SUCCESS"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
}
