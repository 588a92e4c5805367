//! TaskMessage - Celery message protocol v1 の task body
//!
//! Broker に載る dispatch envelope の `body` には、この構造体の JSON を
//! base64 したものが入ります。
//!
//! ```json
//! {"id": "...", "task": "tasks.add", "args": [2, 3], "kwargs": {}, "retries": 0, "eta": null, "expires": null}
//! ```
//!
//! # 不変条件
//! - `args` は常に配列（`null` や欠落はエンコードしない）
//! - `kwargs` はキー順で保持するため、同じ値なら同じバイト列になる

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::errors::{DecodeError, EncodeError};
use super::ids::TaskId;

/// Positional arguments of a task.
pub type Args = Vec<Value>;

/// Keyword arguments of a task.
pub type Kwargs = Map<String, Value>;

/// Task invocation record before wire encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: TaskId,

    /// Registered task name on the worker side (e.g. `tasks.add`).
    pub task: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Args,

    #[serde(default, deserialize_with = "null_as_default")]
    pub kwargs: Kwargs,

    #[serde(default)]
    pub retries: u32,

    /// Earliest time the worker may execute the task.
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,

    /// Time after which the worker discards the task.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl TaskMessage {
    /// Fresh id, empty args/kwargs, no eta/expiry.
    pub fn new(task: impl Into<String>) -> Self {
        Self::with_id(TaskId::new_v4(), task)
    }

    pub fn with_id(id: TaskId, task: impl Into<String>) -> Self {
        Self {
            id,
            task: task.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            retries: 0,
            eta: None,
            expires: None,
        }
    }

    /// JSON -> base64 (standard alphabet, padded).
    ///
    /// Refuses messages `decode` would reject, so every encoded body reads back.
    pub fn encode(&self) -> Result<String, EncodeError> {
        if self.task.is_empty() {
            return Err(EncodeError::Invalid("task name is empty".to_string()));
        }
        if self.id.as_str().is_empty() {
            return Err(EncodeError::Invalid("task id is empty".to_string()));
        }
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let json = STANDARD.decode(body.trim())?;
        let message: TaskMessage = serde_json::from_slice(&json)?;
        if message.task.is_empty() {
            return Err(DecodeError::Invalid("task name is empty".to_string()));
        }
        if message.id.as_str().is_empty() {
            return Err(DecodeError::Invalid("task id is empty".to_string()));
        }
        Ok(message)
    }
}

/// `null` を型のデフォルト値として読む（`args: null` -> `[]` など）
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
