//! InMemoryBackend - 開発・テスト用の result backend
//!
//! Redis result backend の動きを模倣します：
//! - worker は `celery-task-meta-<id>` に結果 JSON を SET し、同名チャンネルに PUBLISH
//! - client は GET で 1 回だけ見るか、SUBSCRIBE して通知を待つ
//!
//! # 学習ポイント
//! - broadcast チャンネルによる pub/sub
//! - `tokio::time::timeout_at` で通知とデッドラインを競合させる
//! - subscribe してから GET することで、待機開始前に保存された結果も拾う
//! - 購読は guard の Drop で解除（待機中の future が drop されても残らない）

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::{BackendError, EncodeError, ResultMessage, TaskId};
use crate::ports::{Backend, result_key};

const CHANNEL_CAPACITY: usize = 16;

pub struct InMemoryBackend {
    /// key -> 結果 JSON
    store: Mutex<HashMap<String, String>>,
    /// channel 名 -> publisher
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// What a worker does on completion: SET then PUBLISH.
    pub fn store_result(&self, result: &ResultMessage) -> Result<(), EncodeError> {
        let raw = result.to_json()?;
        self.store_raw(&result.task_id, raw);
        Ok(())
    }

    /// Store an arbitrary payload under the task's key (no validation).
    pub fn store_raw(&self, task_id: &TaskId, raw: impl Into<String>) {
        let key = result_key(task_id);
        let raw = raw.into();
        lock(&self.store).insert(key.clone(), raw.clone());

        if let Some(sender) = lock(&self.channels).get(&key) {
            // receiver がいなければ送信は失敗するが、SET 済みなので問題ない
            let _ = sender.send(raw);
        }
        debug!(key = %key, "stored result");
    }

    /// DEL the stored result. Returns whether a result was present.
    pub fn forget(&self, task_id: &TaskId) -> bool {
        lock(&self.store).remove(&result_key(task_id)).is_some()
    }

    /// Number of channels with at least one live subscription.
    pub fn subscriptions(&self) -> usize {
        lock(&self.channels).len()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        lock(&self.store).get(key).cloned()
    }

    fn subscribe(&self, key: &str) -> Subscription<'_> {
        let receiver = lock(&self.channels)
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        Subscription {
            backend: self,
            key: key.to_string(),
            receiver: Some(receiver),
        }
    }

    async fn wait_on(
        &self,
        subscription: &mut Subscription<'_>,
        timeout: Duration,
    ) -> Result<ResultMessage, BackendError> {
        let key = subscription.key.as_str();
        if let Some(raw) = self.lookup(key) {
            return Ok(ResultMessage::from_json(&raw)?);
        }
        let Some(receiver) = subscription.receiver.as_mut() else {
            return Err(BackendError::Transport(format!("channel {key} closed")));
        };

        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Ok(raw)) => return Ok(ResultMessage::from_json(&raw)?),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(key = %key, skipped, "result subscriber lagged");
                    if let Some(raw) = self.lookup(key) {
                        return Ok(ResultMessage::from_json(&raw)?);
                    }
                }
                Ok(Err(RecvError::Closed)) => {
                    return Err(BackendError::Transport(format!(
                        "channel {key} closed"
                    )));
                }
                Err(_elapsed) => return Err(BackendError::Timeout(timeout)),
            }
        }
    }
}

/// Live SUBSCRIBE on one result channel.
///
/// Dropping it (also when the waiting future is cancelled) removes the
/// channel once nobody else listens on it.
struct Subscription<'a> {
    backend: &'a InMemoryBackend,
    key: String,
    receiver: Option<broadcast::Receiver<String>>,
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        // receiver を先に手放してから数える
        drop(self.receiver.take());
        let mut channels = lock(&self.backend.channels);
        if channels
            .get(&self.key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.key);
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn get_result(&self, task_id: &TaskId) -> Result<Option<ResultMessage>, BackendError> {
        let key = result_key(task_id);
        debug!(key = %key, "get result");
        match self.lookup(&key) {
            Some(raw) => Ok(Some(ResultMessage::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    async fn wait_for_result(
        &self,
        task_id: &TaskId,
        timeout: Duration,
    ) -> Result<ResultMessage, BackendError> {
        let mut subscription = self.subscribe(&result_key(task_id));
        self.wait_on(&mut subscription, timeout).await
    }
}
