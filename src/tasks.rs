//! Deferred-task bridge (§4.G): serializes `{interpreter spec, engine
//! options, document reference}` onto a durable queue instead of
//! translating in-process, and drains it on the worker side.
//!
//! Grounded on `es_translator/tasks.py`'s Celery app (`task_default_queue =
//! 'es_translator:default'`, `translate_document_task` rehydration flow).
//! The transport is `fred`, the pack's async Redis client
//! (`adk-session`/`adk-memory`'s `redis = ["fred"]` feature), rather than a
//! Celery-wire-compatible broker — the spec's own durable-queue contract
//! only requires at-least-once delivery on a single named queue.

use fred::prelude::*;
use serde::{Deserialize, Serialize};

use crate::interpreter::InterpreterSpec;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocRef {
    pub index: String,
    pub id: String,
    pub routing: Option<String>,
}

/// Everything a task needs to reconstruct the engine and apply one
/// document's translation, independent of the process that enqueued it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeferredTask {
    pub interpreter: InterpreterSpec,
    pub cluster_url: String,
    pub source_field: String,
    pub target_field: String,
    pub dry_run: bool,
    pub force: bool,
    pub max_content_length: i64,
    pub doc_ref: DocRef,
}

pub struct TaskBridge {
    client: RedisClient,
    queue_name: String,
}

impl TaskBridge {
    /// Connects to `broker_url` and binds to the `"<app>:default"` queue.
    pub async fn connect(broker_url: &str, app_name: &str) -> anyhow::Result<Self> {
        let config = RedisConfig::from_url(broker_url)?;
        let client = RedisClient::new(config, None, None, None);
        let _connection = client.connect();
        client.wait_for_connect().await?;
        Ok(Self {
            client,
            queue_name: format!("{app_name}:default"),
        })
    }

    pub async fn enqueue(&self, task: &DeferredTask) -> anyhow::Result<()> {
        let payload = serde_json::to_string(task)?;
        let _: i64 = self.client.rpush(&self.queue_name, payload).await?;
        Ok(())
    }

    /// Blocks up to `timeout_secs` for the next task; `None` on timeout.
    pub async fn dequeue(&self, timeout_secs: f64) -> anyhow::Result<Option<DeferredTask>> {
        let popped: Option<(String, String)> =
            self.client.blpop(&self.queue_name, timeout_secs).await?;
        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn backlog_len(&self) -> anyhow::Result<i64> {
        Ok(self.client.llen(&self.queue_name).await?)
    }
}
