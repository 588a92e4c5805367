//! Domain identifiers.
//!
//! # TaskId
//! Celery の task id はワイヤ上ではただの文字列です（慣例として UUID v4）。
//! worker 側は id を解釈せず、結果キー `celery-task-meta-<id>` の組み立てに
//! そのまま使うだけなので、ここでも文字列の newtype として扱います。
//!
//! - UUID v4 を既定とする（`TaskId::new_v4`）
//! - ULID など別形式の id も受け付ける（`IdGenerator` 経由）
//! - Display / Serialize は素の文字列（プレフィックスなし）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;
use uuid::Uuid;

/// Identifier of a submitted task.
///
/// 同じ id が task body の `id`、dispatch envelope の `correlation_id`、
/// そして結果キーの末尾に現れます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// ランダムな UUID v4 から TaskId を作成
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// ULID から TaskId を作成（時刻でソート可能な id が欲しい場合）
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
