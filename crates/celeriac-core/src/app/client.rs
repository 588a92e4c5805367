//! Client - タスクの送信
//!
//! # フロー（submit）
//! 1. pool から TaskMessage と DispatchEnvelope を借りる
//! 2. args / kwargs を入れ、options を指定順に適用（後勝ち）
//! 3. TaskMessage を base64(JSON) にして body へ
//! 4. Broker::send
//! 5. 借りた 2 つは成功・失敗に関わらず drop で pool に戻る
//!
//! # 学習ポイント
//! - `Arc<dyn Trait>` による依存注入（broker / backend / clock / id）
//! - RAII ガードでエラー経路でも返却漏れが起きない

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::DEFAULT_RESULT_TIMEOUT;
use crate::domain::{Args, Kwargs, Result, TaskOption};
use crate::pool::EnvelopePool;
use crate::ports::{Backend, Broker, Clock, SystemClock};

use super::builder::ClientBuilder;
use super::result::AsyncResult;

/// Client は broker と backend を束ねてタスクを送る
#[derive(Clone)]
pub struct Client {
    broker: Arc<dyn Broker>,
    backend: Arc<dyn Backend>,
    pool: Arc<EnvelopePool>,
    clock: Arc<dyn Clock>,
    result_timeout: Duration,
}

impl Client {
    /// Default pool, system clock and UUID task ids.
    pub fn new(broker: Arc<dyn Broker>, backend: Arc<dyn Backend>) -> Self {
        Self::from_parts(
            broker,
            backend,
            Arc::new(EnvelopePool::default()),
            Arc::new(SystemClock),
            DEFAULT_RESULT_TIMEOUT,
        )
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        broker: Arc<dyn Broker>,
        backend: Arc<dyn Backend>,
        pool: Arc<EnvelopePool>,
        clock: Arc<dyn Clock>,
        result_timeout: Duration,
    ) -> Self {
        Self {
            broker,
            backend,
            pool,
            clock,
            result_timeout,
        }
    }

    pub fn pool(&self) -> &EnvelopePool {
        &self.pool
    }

    /// Enqueue `task_name` and return a handle to its result.
    ///
    /// Nothing reaches the broker if encoding fails (including an empty
    /// `task_name`).
    pub async fn submit(
        &self,
        task_name: &str,
        args: Args,
        kwargs: Kwargs,
        options: Vec<TaskOption>,
    ) -> Result<AsyncResult> {
        let mut task = self.pool.acquire_task(task_name);
        let mut dispatch = self.pool.acquire_dispatch();

        task.args = args;
        task.kwargs = kwargs;

        let now = self.clock.now();
        for option in options {
            option.apply(&mut task, &mut dispatch, now);
        }

        dispatch.properties.correlation_id = task.id.as_str().to_string();
        dispatch.body = task.encode()?;

        debug!(
            task_id = %task.id,
            task = %task.task,
            queue = %dispatch.routing_key(),
            "submitting task"
        );
        self.broker.send(&dispatch).await?;

        Ok(AsyncResult::new(task.id.clone(), Arc::clone(&self.backend))
            .with_default_timeout(self.result_timeout))
    }

    /// Positional arguments only.
    pub async fn delay(&self, task_name: &str, args: Vec<Value>) -> Result<AsyncResult> {
        self.submit(task_name, args, Kwargs::new(), Vec::new()).await
    }

    /// Keyword arguments only.
    pub async fn delay_kwargs(&self, task_name: &str, kwargs: Kwargs) -> Result<AsyncResult> {
        self.submit(task_name, Args::new(), kwargs, Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BrokerError, CeleriacError, DispatchEnvelope, EncodeError, ErrorKind};
    use crate::impls::{InMemoryBackend, InMemoryBroker};
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct DownBroker;

    #[async_trait]
    impl Broker for DownBroker {
        async fn send(&self, _message: &DispatchEnvelope) -> std::result::Result<(), BrokerError> {
            Err(BrokerError::Transport("connection reset".to_string()))
        }
    }

    fn client_with(broker: Arc<InMemoryBroker>) -> Client {
        Client::new(broker, Arc::new(InMemoryBackend::new()))
    }

    async fn only_message(broker: &InMemoryBroker, queue: &str) -> DispatchEnvelope {
        broker
            .pop(queue, Duration::from_millis(100))
            .await
            .unwrap()
            .expect("a message on the queue")
    }

    #[tokio::test]
    async fn delay_enqueues_on_default_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        let handle = client.delay("tasks.add", vec![json!(2), json!(3)]).await.unwrap();

        let dispatch = only_message(&broker, "celery").await;
        let task = dispatch.decode_task().unwrap();
        assert_eq!(task.task, "tasks.add");
        assert_eq!(task.args, vec![json!(2), json!(3)]);
        assert!(task.kwargs.is_empty());
        assert_eq!(&task.id, handle.task_id());
        assert_eq!(dispatch.properties.correlation_id, task.id.as_str());
    }

    #[tokio::test]
    async fn delay_kwargs_sends_keyword_arguments() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));
        let mut kwargs = Kwargs::new();
        kwargs.insert("a".to_string(), json!(2));
        kwargs.insert("b".to_string(), json!(3));

        client.delay_kwargs("tasks.add_kw", kwargs.clone()).await.unwrap();

        let task = only_message(&broker, "celery").await.decode_task().unwrap();
        assert!(task.args.is_empty());
        assert_eq!(task.kwargs, kwargs);
    }

    #[tokio::test]
    async fn queue_option_routes_message() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        client
            .submit(
                "tasks.add",
                vec![json!(1)],
                Kwargs::new(),
                vec![TaskOption::queue("q1")],
            )
            .await
            .unwrap();

        assert!(broker.is_empty("celery").await);
        let dispatch = only_message(&broker, "q1").await;
        assert_eq!(dispatch.properties.delivery_info.exchange, "q1");
    }

    #[tokio::test]
    async fn later_options_win() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        client
            .submit(
                "tasks.add",
                vec![json!(1)],
                Kwargs::new(),
                vec![
                    TaskOption::queue("q1"),
                    TaskOption::Args(vec![json!(9)]),
                    TaskOption::queue("q2"),
                ],
            )
            .await
            .unwrap();

        assert!(broker.is_empty("q1").await);
        let task = only_message(&broker, "q2").await.decode_task().unwrap();
        assert_eq!(task.args, vec![json!(9)]);
    }

    #[tokio::test]
    async fn expires_is_resolved_against_the_clock() {
        let broker = Arc::new(InMemoryBroker::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let client = Client::builder()
            .broker(Arc::clone(&broker) as Arc<dyn Broker>)
            .backend(Arc::new(InMemoryBackend::new()))
            .clock(Arc::new(FixedClock::new(now)))
            .build()
            .unwrap();

        client
            .submit(
                "tasks.add",
                Args::new(),
                Kwargs::new(),
                vec![
                    TaskOption::Expires(Duration::from_secs(60)),
                    TaskOption::Countdown(Duration::from_secs(5)),
                ],
            )
            .await
            .unwrap();

        let dispatch = only_message(&broker, "celery").await;
        assert_eq!(dispatch.properties.expiration.as_deref(), Some("60000"));
        let task = dispatch.decode_task().unwrap();
        assert_eq!(task.expires, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap()));
        assert_eq!(task.eta, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap()));
    }

    #[tokio::test]
    async fn broker_failure_is_returned_and_envelopes_are_released() {
        let client = Client::new(Arc::new(DownBroker), Arc::new(InMemoryBackend::new()));

        let err = client
            .delay("tasks.add", vec![json!(1)])
            .await
            .unwrap_err();

        assert!(matches!(err, CeleriacError::Broker(BrokerError::Transport(_))));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(client.pool().idle_tasks(), 1);
        assert_eq!(client.pool().idle_dispatches(), 1);
    }

    #[tokio::test]
    async fn empty_task_name_never_reaches_the_broker() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        let err = client
            .submit("", vec![json!(1)], Kwargs::new(), Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CeleriacError::Encode(EncodeError::Invalid(_))));
        assert!(broker.is_empty("celery").await);
        assert_eq!(client.pool().idle_tasks(), 1);
        assert_eq!(client.pool().idle_dispatches(), 1);
    }

    #[tokio::test]
    async fn envelopes_are_reused_without_leaking_arguments() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        client
            .submit(
                "tasks.first",
                vec![json!("secret")],
                Kwargs::new(),
                vec![TaskOption::queue("q1"), TaskOption::Retries(3)],
            )
            .await
            .unwrap();
        client.delay("tasks.second", Vec::new()).await.unwrap();

        let dispatch = only_message(&broker, "celery").await;
        assert!(dispatch.properties.expiration.is_none());
        let task = dispatch.decode_task().unwrap();
        assert_eq!(task.task, "tasks.second");
        assert!(task.args.is_empty());
        assert_eq!(task.retries, 0);
        assert_eq!(client.pool().idle_tasks(), 1);
    }

    #[tokio::test]
    async fn each_submission_gets_a_fresh_task_id() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = client_with(Arc::clone(&broker));

        let a = client.delay("tasks.add", Vec::new()).await.unwrap();
        let b = client.delay("tasks.add", Vec::new()).await.unwrap();

        assert_ne!(a.task_id(), b.task_id());
    }
}
