//! Broker port - dispatch envelope の送信先
//!
//! Redis transport なら routing key 名の list への LPUSH、
//! AMQP なら exchange への publish に相当します。
//! リトライはこの port の実装か呼び出し側の責務です。

use async_trait::async_trait;

use crate::domain::{BrokerError, DispatchEnvelope};

#[async_trait]
pub trait Broker: Send + Sync {
    /// `message.routing_key()` のキューに 1 件送信
    async fn send(&self, message: &DispatchEnvelope) -> Result<(), BrokerError>;
}
