//! App - アプリケーション層
//!
//! ports を組み合わせて、送信と結果取得の流れを実装します。
//!
//! # 主要コンポーネント
//! - **Client**: タスクの送信（pool から envelope を借りて broker へ）
//! - **ClientBuilder**: Client の構築とワイヤリング
//! - **AsyncResult**: backend から結果を取り出すハンドル

pub mod builder;
pub mod client;
pub mod result;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ClientBuilder};
pub use self::client::Client;
pub use self::result::AsyncResult;
