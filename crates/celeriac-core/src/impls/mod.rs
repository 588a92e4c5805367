//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBroker**: routing key ごとの list に envelope を積む
//! - **InMemoryBackend**: key-value + pub/sub で結果を保持・通知する
//!
//! # 本番用実装
//! Redis / RabbitMQ などネットワーク越しの実装はこのクレートの範囲外です。
//! `Broker` / `Backend` trait を実装した別クレートとして用意してください。

pub mod inmem_broker;
pub mod inmem_backend;

pub use self::inmem_broker::InMemoryBroker;
pub use self::inmem_backend::InMemoryBackend;
