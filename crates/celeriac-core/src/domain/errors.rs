//! Errors - エラー型と分類
//!
//! 下位レイヤーはそれぞれ専用のエラー型を持ちます：
//! - `EncodeError` / `DecodeError`: ローカルな変換失敗（リトライしない）
//! - `BrokerError`: Broker port の送信失敗
//! - `BackendError`: Backend port の取得失敗・タイムアウト
//!
//! `Client` と `AsyncResult` の表面では `CeleriacError` にまとめて返します。

use std::time::Duration;

use thiserror::Error;

use super::outcome::ResultMessage;

/// ErrorKind は呼び出し側がリトライ判断に使う分類
///
/// - Transient: 待ち直せば解決しうる（タイムアウト）
/// - Permanent: 同じ入力では何度やっても失敗する
/// - Infrastructure: Broker / Backend の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Message could not be serialized.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode message: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoding would produce a body that `TaskMessage::decode` rejects.
    #[error("refusing to encode invalid message: {0}")]
    Invalid(String),
}

/// Body or stored result could not be parsed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("body is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker transport failed: {0}")]
    Transport(String),

    #[error("broker rejected message for queue={queue}: {reason}")]
    Rejected { queue: String, reason: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no result within {0:?}")]
    Timeout(Duration),

    #[error("backend transport failed: {0}")]
    Transport(String),

    #[error("stored result is malformed: {0}")]
    Decode(#[from] DecodeError),
}

/// Top-level error returned by `Client` and `AsyncResult`.
#[derive(Debug, Error)]
pub enum CeleriacError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Only transport failures land here; see `From<BackendError>`.
    #[error(transparent)]
    Backend(BackendError),

    #[error("timed out after {0:?} waiting for result")]
    Timeout(Duration),

    #[error("task {} finished with status {}", .0.task_id, .0.status)]
    TaskFailed(Box<ResultMessage>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<BackendError> for CeleriacError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout(timeout) => CeleriacError::Timeout(timeout),
            BackendError::Decode(decode) => CeleriacError::Decode(decode),
            transport @ BackendError::Transport(_) => CeleriacError::Backend(transport),
        }
    }
}

impl CeleriacError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CeleriacError::Timeout(_) => ErrorKind::Transient,
            CeleriacError::Broker(_) | CeleriacError::Backend(_) => ErrorKind::Infrastructure,
            CeleriacError::Encode(_)
            | CeleriacError::Decode(_)
            | CeleriacError::TaskFailed(_)
            | CeleriacError::Config(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CeleriacError::Timeout(_))
    }

    /// The stored result envelope of a failed task (result/traceback/children).
    pub fn result_message(&self) -> Option<&ResultMessage> {
        match self {
            CeleriacError::TaskFailed(message) => Some(message),
            _ => None,
        }
    }
}

pub type Result<T, E = CeleriacError> = std::result::Result<T, E>;
