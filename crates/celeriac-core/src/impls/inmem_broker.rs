//! InMemoryBroker - 開発・テスト用の broker
//!
//! Redis transport と同じく、routing key ごとの list に envelope の JSON を
//! 積みます（LPUSH / BRPOP 相当で FIFO）。
//!
//! # 学習ポイント
//! - tokio::sync::Mutex + Notify による timeout 付き pop
//! - 文字列で保持することで「ワイヤに載る形」をそのまま検証できる

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{BrokerError, DecodeError, DispatchEnvelope};
use crate::ports::Broker;

pub struct InMemoryBroker {
    /// queue 名ごとの list（先頭が最新）
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    notify: Notify,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }

    /// Number of messages waiting on `queue`.
    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Raw JSON payloads on `queue`, oldest first, without consuming them.
    pub async fn peek_raw(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Take the oldest message, waiting up to `timeout` for one to arrive.
    pub async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<DispatchEnvelope>, DecodeError> {
        let deadline = Instant::now() + timeout;
        loop {
            // notified() を先に作っておくと、lock 解放後の send を取りこぼさない
            let notified = self.notify.notified();
            {
                let mut queues = self.queues.lock().await;
                if let Some(raw) = queues.get_mut(queue).and_then(VecDeque::pop_back) {
                    return DispatchEnvelope::from_json(&raw).map(Some);
                }
            }

            tokio::select! {
                _ = notified => {},
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn send(&self, message: &DispatchEnvelope) -> Result<(), BrokerError> {
        let queue = message.routing_key().to_string();
        if queue.is_empty() {
            return Err(BrokerError::Rejected {
                queue,
                reason: "empty routing key".to_string(),
            });
        }
        let raw = message.to_json()?;

        {
            let mut queues = self.queues.lock().await;
            queues.entry(queue.clone()).or_default().push_front(raw);
        }
        // 複数の consumer が別々の queue を待っている可能性があるので全員起こす
        self.notify.notify_waiters();
        debug!(queue = %queue, correlation_id = %message.properties.correlation_id, "pushed message");
        Ok(())
    }
}
