//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! Broker / Backend は外部システム（Redis, RabbitMQ など）への
//! インターフェースで、このクレートは実装の詳細を知りません。

pub mod broker;
pub mod backend;
pub mod clock;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::broker::Broker;
pub use self::backend::{Backend, RESULT_KEY_PREFIX, result_key};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator, UuidGenerator};
