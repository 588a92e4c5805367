//! Domain model - ワイヤ互換のメッセージ型とエラー
//!
//! - ids: TaskId
//! - message: task body（base64 JSON）
//! - envelope: broker に載る dispatch envelope
//! - outcome: result backend に保存される結果
//! - options: 送信時オプション
//! - errors: エラー型と分類

pub mod ids;
pub mod message;
pub mod envelope;
pub mod outcome;
pub mod options;
pub mod errors;

pub use self::ids::TaskId;
pub use self::message::{Args, Kwargs, TaskMessage};
pub use self::envelope::{DeliveryInfo, DispatchEnvelope, EnvelopeDefaults, Properties};
pub use self::outcome::{ResultMessage, TaskStatus};
pub use self::options::TaskOption;
pub use self::errors::{
    BackendError, BrokerError, CeleriacError, DecodeError, EncodeError, ErrorKind, Result,
};
