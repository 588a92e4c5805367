//! IdGenerator port - ID 生成の抽象化
//!
//! Envelope pool は acquire のたびにこの trait で ID を払い出します。
//!
//! # 実装
//! - **UuidGenerator**: UUID v4（Celery の慣例、既定）
//! - **UlidGenerator**: ULID ベース（時刻でソートしたい場合）

use crate::domain::TaskId;
use crate::ports::Clock;
use ulid::Ulid;
use uuid::Uuid;

/// IdGenerator は task id とメッセージ用 ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（pool を複数タスクから共有するため）
pub trait IdGenerator: Send + Sync {
    /// Task ID を生成
    fn generate_task_id(&self) -> TaskId;

    /// correlation_id / reply_to / delivery_tag 用の ID を生成
    fn generate_message_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_task_id(&self) -> TaskId {
        TaskId::new_v4()
    }

    fn generate_message_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// UlidGenerator は Clock の時刻を timestamp 部に使う
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::from_ulid(self.next())
    }

    fn generate_message_id(&self) -> String {
        self.next().to_string()
    }
}
