//! Translation engine (§4.F): bounded worker pool, back-pressured queue,
//! shared fatal cell, per-document lifecycle.
//!
//! The pool/queue shape follows `automations::server`'s worker loop pattern
//! (a bounded channel feeding a fixed set of `tokio::spawn`ed workers,
//! structured `tracing` events at each state change); the error taxonomy and
//! fatal-cell semantics follow `es_translator/worker.py`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cluster::{ClusterClient, Hit};
use crate::document::TranslatedHit;
use crate::error::CoreError;
use crate::interpreter::Interpreter;
use crate::search::SearchStream;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub pool_size: usize,
    pub pool_timeout: Duration,
    pub throttle: Duration,
    pub dry_run: bool,
    pub force: bool,
    pub max_content_length: i64,
    pub source_field: String,
    pub target_field: String,
    pub cluster_url: String,
}

/// Single-writer cell signaling that the run must stop accepting new work.
/// Cheap to check (no lock held across an await point).
#[derive(Clone)]
struct FatalCell(Arc<Mutex<Option<String>>>);

impl FatalCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    fn set(&self, message: String) {
        let mut guard = self.0.lock().expect("fatal cell mutex poisoned");
        if guard.is_none() {
            *guard = Some(message);
        }
    }

    fn get(&self) -> Option<String> {
        self.0.lock().expect("fatal cell mutex poisoned").clone()
    }
}

/// Runs the engine to completion: streams hits, fans them out to
/// `cfg.pool_size` workers, and joins before returning.
pub async fn run(
    mut stream: SearchStream,
    interpreter: Arc<Interpreter>,
    cfg: EngineConfig,
) -> Result<(), CoreError> {
    tracing::info!(pool_size = cfg.pool_size, "engine initialising");
    let (tx, rx) = tokio::sync::mpsc::channel::<Hit>(cfg.pool_size.max(1));
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let fatal = FatalCell::new();

    let mut workers = Vec::with_capacity(cfg.pool_size);
    for worker_id in 0..cfg.pool_size.max(1) {
        let rx = rx.clone();
        let interpreter = interpreter.clone();
        let fatal = fatal.clone();
        let cfg = cfg.clone();
        workers.push(tokio::spawn(async move {
            worker_loop(worker_id, rx, interpreter, fatal, cfg).await;
        }));
    }

    tracing::info!("engine streaming");
    loop {
        if fatal.get().is_some() {
            tracing::warn!("fatal cell observed by producer; stopping stream");
            break;
        }
        let hit = stream
            .next()
            .await
            .map_err(|e| CoreError::Repository(e.to_string()))?;
        let Some(hit) = hit else { break };

        loop {
            if fatal.get().is_some() {
                break;
            }
            match tokio::time::timeout(cfg.pool_timeout, tx.send(hit.clone())).await {
                Ok(Ok(())) => break,
                Ok(Err(_)) => break, // all workers gone
                Err(_) => {
                    let err = CoreError::QueueFull {
                        waited_secs: cfg.pool_timeout.as_secs_f64(),
                    };
                    tracing::warn!(doc_id = %hit.id, %err, "retrying");
                    continue;
                }
            }
        }
    }
    drop(tx);

    tracing::info!(
        state = if fatal.get().is_some() { "fatal_draining" } else { "draining" },
        "waiting for workers to finish in-flight work"
    );
    for worker in workers {
        let _ = worker.await;
    }

    match fatal.get() {
        Some(message) => {
            tracing::error!(%message, "engine terminated with a fatal error");
            Err(CoreError::FatalTranslation(message))
        }
        None => {
            tracing::info!("engine done");
            Ok(())
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<tokio::sync::mpsc::Receiver<Hit>>>,
    interpreter: Arc<Interpreter>,
    fatal: FatalCell,
    cfg: EngineConfig,
) {
    loop {
        if fatal.get().is_some() {
            break;
        }
        let hit = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(hit) = hit else { break };
        process_one(worker_id, hit, &interpreter, &fatal, &cfg).await;
        if !cfg.throttle.is_zero() {
            tokio::time::sleep(cfg.throttle).await;
        }
    }
}

async fn process_one(
    worker_id: usize,
    hit: Hit,
    interpreter: &Interpreter,
    fatal: &FatalCell,
    cfg: &EngineConfig,
) {
    let id = hit.id.clone();
    tracing::info!(worker_id, doc_id = %id, "translating");

    let mut wrapped = TranslatedHit::new(hit, &cfg.source_field, &cfg.target_field);
    if let Err(err) = wrapped
        .add_translation(interpreter, cfg.max_content_length, cfg.force)
        .await
    {
        tracing::warn!(worker_id, doc_id = %id, %err, "translation failed; skipping document");
        return;
    }

    if cfg.dry_run {
        tracing::info!(worker_id, doc_id = %id, "dry run; skipping save");
        return;
    }

    let client = match ClusterClient::new(&cfg.cluster_url) {
        Ok(client) => client,
        Err(err) => {
            fatal.set(format!("failed to build cluster client: {err}"));
            tracing::error!(worker_id, doc_id = %id, %err, "cluster client build failed");
            return;
        }
    };
    match wrapped.save(&client).await {
        Ok(()) => {
            tracing::info!(worker_id, doc_id = %id, "saved translation");
        }
        Err(err) => {
            let typed = CoreError::SaveFailure {
                id: id.clone(),
                source: err,
            };
            tracing::error!(worker_id, doc_id = %id, %typed, "save failed; setting fatal cell");
            fatal.set(typed.to_string());
        }
    }
}
