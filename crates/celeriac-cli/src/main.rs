use std::sync::Arc;
use std::time::Duration;

use celeriac_core::config::ClientConfig;
use celeriac_core::domain::{Kwargs, TaskMessage};
use celeriac_core::impls::{InMemoryBackend, InMemoryBroker};
use celeriac_core::{CeleriacError, Client, ResultMessage, TaskOption};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// 実行するタスク本体（Python 側の worker の代わり）
fn run_task(task: &TaskMessage) -> Result<Value, String> {
    match task.task.as_str() {
        "tasks.add" => {
            let mut sum = 0i64;
            for arg in &task.args {
                let n = arg.as_i64().ok_or_else(|| format!("TypeError: not an integer: {arg}"))?;
                sum = sum
                    .checked_add(n)
                    .ok_or_else(|| "OverflowError: sum does not fit in i64".to_string())?;
            }
            Ok(json!(sum))
        }
        "tasks.greet" => {
            let name = task
                .kwargs
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("world");
            Ok(json!(format!("Hello, {name}!")))
        }
        other => Err(format!("NotRegistered: {other}")),
    }
}

/// worker：Broker から取り出して実行し、結果を Backend に書く
async fn worker_loop(broker: Arc<InMemoryBroker>, backend: Arc<InMemoryBackend>, queue: String) {
    loop {
        // 1) envelope を 1 件取る
        let dispatch = match broker.pop(&queue, Duration::from_secs(1)).await {
            Ok(Some(dispatch)) => dispatch,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "dropping undecodable envelope");
                continue;
            }
        };

        // 2) body を decode して実行
        let task = match dispatch.decode_task() {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "dropping undecodable task body");
                continue;
            }
        };
        info!(task_id = %task.id, task = %task.task, "received task");

        // 3) 結果を SET + PUBLISH
        let result = match run_task(&task) {
            Ok(value) => ResultMessage::success(task.id.clone(), value),
            Err(reason) => ResultMessage::failure(
                task.id.clone(),
                json!({"exc_type": "TaskError", "exc_message": reason}),
                json!(format!("Traceback (most recent call last):\n  {reason}")),
            ),
        };
        if let Err(e) = backend.store_result(&result) {
            warn!(task_id = %task.id, error = %e, "failed to store result");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = FmtSubscriber::builder().with_env_filter(env_filter).try_init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default config");
        ClientConfig::default()
    });

    // (A) Broker と Backend を用意
    let broker = Arc::new(InMemoryBroker::new());
    let backend = Arc::new(InMemoryBackend::new());

    // (B) worker を起動（今回は 1 本）
    let worker = tokio::spawn(worker_loop(
        broker.clone(),
        backend.clone(),
        config.default_queue.clone(),
    ));

    let client = Client::builder()
        .broker(broker.clone())
        .backend(backend.clone())
        .config(config)
        .build()?;

    // (C) 位置引数で送って待つ
    let mut sum = client.delay("tasks.add", vec![json!(2), json!(3)]).await?;
    let value = sum.wait().await?;
    info!(task_id = %sum.task_id(), %value, "tasks.add finished");

    // (D) キーワード引数 + オプション
    let mut kwargs = Kwargs::new();
    kwargs.insert("name".to_string(), json!("celeriac"));
    let mut greeting = client
        .submit(
            "tasks.greet",
            Vec::new(),
            kwargs,
            vec![TaskOption::Expires(Duration::from_secs(60)), TaskOption::Priority(5)],
        )
        .await?;
    while !greeting.ready().await? {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let value = greeting.wait().await?;
    info!(%value, "tasks.greet finished");

    // (E) 未登録タスクは失敗として返る
    let mut missing = client.delay("tasks.missing", Vec::new()).await?;
    match missing.wait().await {
        Err(CeleriacError::TaskFailed(result)) => {
            info!(
                status = %result.status,
                traceback = %result.traceback,
                "tasks.missing failed as expected"
            );
        }
        other => warn!(?other, "unexpected outcome for tasks.missing"),
    }

    worker.abort();
    Ok(())
}
