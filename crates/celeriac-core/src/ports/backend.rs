//! Backend port - 結果の取得と待機
//!
//! 結果は `celery-task-meta-<task_id>` に保存され、同じ名前のチャンネルに
//! 通知されます（Celery の Redis result backend と同じ規約）。
//!
//! # 設計原則
//! - `get_result` は 1 回だけ見に行く（None は「まだ無い」でありエラーではない）
//! - `wait_for_result` はタイムアウトが唯一のキャンセル手段

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{BackendError, ResultMessage, TaskId};

pub const RESULT_KEY_PREFIX: &str = "celery-task-meta-";

/// Lookup key and notification channel for a task's result.
pub fn result_key(task_id: &TaskId) -> String {
    format!("{RESULT_KEY_PREFIX}{task_id}")
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Single non-blocking lookup. Key absent and "not ready yet" are both `Ok(None)`.
    async fn get_result(&self, task_id: &TaskId) -> Result<Option<ResultMessage>, BackendError>;

    /// Wait until a result is published or `timeout` elapses
    /// (`BackendError::Timeout`).
    async fn wait_for_result(
        &self,
        task_id: &TaskId,
        timeout: Duration,
    ) -> Result<ResultMessage, BackendError>;
}
