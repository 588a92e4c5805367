//! AsyncResult - 送信済みタスクの結果ハンドル
//!
//! # 状態
//! - 未解決: backend に問い合わせる
//! - 解決済み: status が SUCCESS の結果をキャッシュし、以後は backend を見ない
//! - 失敗: SUCCESS 以外の終端結果は毎回エラーとして返す（キャッシュしない）
//!
//! 「まだ結果が無い」（`Ok(None)`）と「タスクが失敗した」（`Err(TaskFailed)`）は
//! 呼び出し側で区別できるようにしています。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::DEFAULT_RESULT_TIMEOUT;
use crate::domain::{BackendError, CeleriacError, ResultMessage, Result, TaskId};
use crate::ports::Backend;

#[derive(Clone)]
pub struct AsyncResult {
    task_id: TaskId,
    backend: Arc<dyn Backend>,
    result: Option<ResultMessage>,
    default_timeout: Duration,
}

impl AsyncResult {
    pub fn new(task_id: TaskId, backend: Arc<dyn Backend>) -> Self {
        Self {
            task_id,
            backend,
            result: None,
            default_timeout: DEFAULT_RESULT_TIMEOUT,
        }
    }

    /// Timeout used by `wait`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Successful result envelope, once resolved.
    pub fn cached(&self) -> Option<&ResultMessage> {
        self.result.as_ref()
    }

    /// Wait up to `timeout` for the task's result payload.
    pub async fn get(&mut self, timeout: Duration) -> Result<Value> {
        if let Some(result) = &self.result {
            return Ok(result.result.clone());
        }
        let message = self
            .backend
            .wait_for_result(&self.task_id, timeout)
            .await
            .inspect_err(|err| {
                if matches!(err, BackendError::Timeout(_)) {
                    warn!(task_id = %self.task_id, ?timeout, "timed out waiting for result");
                }
            })?;
        self.settle(message)
    }

    /// `get` with the handle's default timeout.
    pub async fn wait(&mut self) -> Result<Value> {
        self.get(self.default_timeout).await
    }

    /// One backend lookup. `Ok(None)` means no result yet.
    pub async fn poll(&mut self) -> Result<Option<Value>> {
        if let Some(result) = &self.result {
            return Ok(Some(result.result.clone()));
        }
        match self.backend.get_result(&self.task_id).await? {
            Some(message) => self.settle(message).map(Some),
            None => Ok(None),
        }
    }

    /// Whether a successful result is available. Fails like `poll`.
    pub async fn ready(&mut self) -> Result<bool> {
        Ok(self.poll().await?.is_some())
    }

    fn settle(&mut self, message: ResultMessage) -> Result<Value> {
        if !message.status.is_successful() {
            warn!(task_id = %self.task_id, status = %message.status, "task did not succeed");
            return Err(CeleriacError::TaskFailed(Box::new(message)));
        }
        info!(task_id = %self.task_id, "task result resolved");
        let value = message.result.clone();
        self.result = Some(message);
        Ok(value)
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("task_id", &self.task_id)
            .field("result", &self.result)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
