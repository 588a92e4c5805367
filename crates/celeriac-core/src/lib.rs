//! celeriac-core
//!
//! Celery 互換のタスク送信クライアント。
//! Python の Celery worker が受け取れる形でタスクを broker に積み、
//! result backend から結果を取り出します。
//!
//! # モジュール構成
//! - **domain**: ワイヤ互換のメッセージ型（task body, dispatch envelope, result）とエラー
//! - **ports**: 抽象化レイヤー（Broker, Backend, Clock, IdGenerator）
//! - **pool**: envelope の再利用
//! - **app**: Client, ClientBuilder, AsyncResult
//! - **impls**: 実装（InMemoryBroker / InMemoryBackend など開発用）
//! - **config**: 環境変数からの設定読み込み

pub mod domain;
pub mod ports;
pub mod pool;
pub mod app;
pub mod impls;
pub mod config;

pub use self::app::{AsyncResult, BuildError, Client, ClientBuilder};
pub use self::config::ClientConfig;
pub use self::domain::{CeleriacError, ResultMessage, TaskId, TaskOption, TaskStatus};
