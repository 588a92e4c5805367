//! ClientBuilder - Client の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: broker / backend の指定漏れと不正な設定は build() で弾く

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::pool::EnvelopePool;
use crate::ports::{Backend, Broker, Clock, IdGenerator, SystemClock, UuidGenerator};

use super::client::Client;

/// ClientBuilder は Client を構築
///
/// # 使用例
/// ```ignore
/// let client = Client::builder()
///     .broker(broker)
///     .backend(backend)
///     .config(ClientConfig::from_env()?)
///     .build()?;
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    broker: Option<Arc<dyn Broker>>,
    backend: Option<Arc<dyn Backend>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: ClientConfig,
}

/// BuildError は Client 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing broker. Call .broker() before .build().")]
    MissingBroker,

    #[error("Missing result backend. Call .backend() before .build().")]
    MissingBackend,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 省略時は SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 省略時は UuidGenerator
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - broker / backend が指定されているか
    /// - `ClientConfig::validate` が通るか
    pub fn build(self) -> Result<Client, BuildError> {
        let broker = self.broker.ok_or(BuildError::MissingBroker)?;
        let backend = self.backend.ok_or(BuildError::MissingBackend)?;
        self.config
            .validate()
            .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;

        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidGenerator));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let pool = EnvelopePool::new(
            self.config.envelope_defaults(),
            ids,
            self.config.pool_max_idle,
        );

        Ok(Client::from_parts(
            broker,
            backend,
            Arc::new(pool),
            clock,
            self.config.result_timeout(),
        ))
    }
}
