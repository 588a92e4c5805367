//! EnvelopePool - envelope の再利用
//!
//! 送信ごとに `TaskMessage` と `DispatchEnvelope` を確保し直さないよう、
//! 使い終わったインスタンスを free list に戻して使い回します。
//!
//! # 契約
//! - acquire: 既定値にリセット済みのインスタンスを返し、ID は毎回払い出し直す
//! - release: `Pooled` の drop で行う。args / kwargs / eta / expires / body などを
//!   必ずリセットしてから free list に戻す（エラー経路でも同じ）
//! - 生きている `Pooled` はインスタンスを排他的に所有する
//!
//! # 学習ポイント
//! - RAII ガードによる「スコープを抜けたら必ず返却」
//! - 関連関数で型ごとの free list を選ぶ（`Recycle::free_list`）

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{DispatchEnvelope, EnvelopeDefaults, TaskMessage};
use crate::ports::{IdGenerator, UuidGenerator};

pub const DEFAULT_MAX_IDLE: usize = 64;

/// Envelope types the pool knows how to recycle.
pub trait Recycle: Sized + Send {
    fn fresh(pool: &EnvelopePool) -> Self;

    /// Clear every per-task field back to pool defaults.
    fn reset(&mut self, defaults: &EnvelopeDefaults);

    /// Mint new identities for the next borrower.
    fn rekey(&mut self, ids: &dyn IdGenerator);

    fn free_list(pool: &EnvelopePool) -> &Mutex<Vec<Self>>;
}

impl Recycle for TaskMessage {
    fn fresh(pool: &EnvelopePool) -> Self {
        TaskMessage::with_id(pool.ids.generate_task_id(), String::new())
    }

    fn reset(&mut self, _defaults: &EnvelopeDefaults) {
        self.task.clear();
        self.args.clear();
        self.kwargs.clear();
        self.retries = 0;
        self.eta = None;
        self.expires = None;
    }

    fn rekey(&mut self, ids: &dyn IdGenerator) {
        self.id = ids.generate_task_id();
    }

    fn free_list(pool: &EnvelopePool) -> &Mutex<Vec<Self>> {
        &pool.tasks
    }
}

impl Recycle for DispatchEnvelope {
    fn fresh(pool: &EnvelopePool) -> Self {
        let mut envelope = DispatchEnvelope::new(&pool.defaults);
        envelope.rekey(pool.ids.as_ref());
        envelope
    }

    fn reset(&mut self, defaults: &EnvelopeDefaults) {
        DispatchEnvelope::reset(self, defaults);
    }

    fn rekey(&mut self, ids: &dyn IdGenerator) {
        let props = &mut self.properties;
        props.correlation_id = ids.generate_message_id();
        props.reply_to = ids.generate_message_id();
        props.delivery_tag = ids.generate_message_id();
    }

    fn free_list(pool: &EnvelopePool) -> &Mutex<Vec<Self>> {
        &pool.dispatches
    }
}

/// Free lists for task and dispatch envelopes.
pub struct EnvelopePool {
    tasks: Mutex<Vec<TaskMessage>>,
    dispatches: Mutex<Vec<DispatchEnvelope>>,
    defaults: EnvelopeDefaults,
    ids: Arc<dyn IdGenerator>,
    max_idle: usize,
}

impl EnvelopePool {
    pub fn new(defaults: EnvelopeDefaults, ids: Arc<dyn IdGenerator>, max_idle: usize) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            dispatches: Mutex::new(Vec::new()),
            defaults,
            ids,
            max_idle,
        }
    }

    pub fn defaults(&self) -> &EnvelopeDefaults {
        &self.defaults
    }

    pub fn acquire<T: Recycle>(&self) -> Pooled<'_, T> {
        let recycled = lock(T::free_list(self)).pop();
        let item = match recycled {
            Some(mut item) => {
                item.rekey(self.ids.as_ref());
                item
            }
            None => T::fresh(self),
        };
        Pooled::new(item, self)
    }

    pub fn acquire_task(&self, name: &str) -> Pooled<'_, TaskMessage> {
        let mut task = self.acquire::<TaskMessage>();
        task.task.push_str(name);
        task
    }

    pub fn acquire_dispatch(&self) -> Pooled<'_, DispatchEnvelope> {
        self.acquire()
    }

    pub fn idle_tasks(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn idle_dispatches(&self) -> usize {
        lock(&self.dispatches).len()
    }

    fn release<T: Recycle>(&self, mut item: T) {
        item.reset(&self.defaults);
        let mut free = lock(T::free_list(self));
        if free.len() < self.max_idle {
            free.push(item);
        }
    }
}

impl Default for EnvelopePool {
    fn default() -> Self {
        Self::new(
            EnvelopeDefaults::default(),
            Arc::new(UuidGenerator),
            DEFAULT_MAX_IDLE,
        )
    }
}

// A panic while holding the lock cannot leave a Vec half-pushed.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Borrowed envelope; returned to the pool (after reset) when dropped.
pub struct Pooled<'a, T: Recycle> {
    // Taken exactly once: in `Drop`, or in `into_inner` which skips `Drop`.
    item: ManuallyDrop<T>,
    pool: &'a EnvelopePool,
}

impl<'a, T: Recycle> Pooled<'a, T> {
    fn new(item: T, pool: &'a EnvelopePool) -> Self {
        Self {
            item: ManuallyDrop::new(item),
            pool,
        }
    }

    /// Keep the instance instead of returning it to the pool.
    pub fn into_inner(self) -> T {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `item` is taken only here.
        unsafe { ManuallyDrop::take(&mut this.item) }
    }
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        // SAFETY: `item` is not touched again after this point.
        let item = unsafe { ManuallyDrop::take(&mut self.item) };
        self.pool.release(item);
    }
}

impl<T: Recycle + std::fmt::Debug> std::fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&*self.item).finish()
    }
}
