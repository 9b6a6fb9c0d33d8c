use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use es_translator::cli::{Cli, Command, MonitorArgs, TasksArgs, TranslateArgs};
use es_translator::cluster::ClusterClient;
use es_translator::config::{self, CliOverrides, ResolvedSettings};
use es_translator::document::TranslatedHit;
use es_translator::engine::{self, EngineConfig};
use es_translator::interpreter::{build_interpreter, InterpreterSpec};
use es_translator::monitor::FleetMonitor;
use es_translator::search::SearchStream;
use es_translator::tasks::{DeferredTask, DocRef, TaskBridge};
use es_translator::{apertium_repository::ApertiumRepository, logging};

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("build tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = match cli.config.clone().or_else(|| {
        config::find_default_config(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }) {
        Some(path) => Some(config::load_config(&path).with_context(|| format!("load config {}", path.display()))?),
        None => None,
    };

    match cli.command {
        Command::Translate(args) => translate(args, file_config).await,
        Command::Pairs { local, remote, data_dir } => pairs(local, remote, data_dir).await,
        Command::Tasks(args) => tasks(args, file_config).await,
        Command::Monitor(args) => monitor(args, file_config).await,
    }
}

fn overrides_from_translate_args(args: &TranslateArgs) -> CliOverrides {
    CliOverrides {
        url: args.url.clone(),
        index: args.index.clone(),
        source_language: args.source_language.clone(),
        target_language: args.target_language.clone(),
        intermediary_language: args.intermediary_language.clone(),
        source_field: args.source_field.clone(),
        target_field: args.target_field.clone(),
        query_string: args.query_string.clone(),
        data_dir: args.data_dir.clone(),
        scan_scroll: args.scan_scroll.clone(),
        dry_run: if args.dry_run { Some(true) } else { None },
        force: if args.force { Some(true) } else { None },
        pool_size: args.pool_size,
        pool_timeout_secs: args.pool_timeout,
        throttle_ms: args.throttle_ms,
        interpreter: args.interpreter.clone(),
        max_content_length: args.max_content_length.clone(),
        plan: if args.plan { Some(true) } else { None },
        broker_url: args.broker_url.clone(),
        argos_base_url: args.argos_url.clone(),
        device: args.device.clone(),
    }
}

async fn translate(args: TranslateArgs, file_config: Option<config::AppConfig>) -> Result<()> {
    let overrides = overrides_from_translate_args(&args);
    let settings = config::resolve_settings(overrides, file_config)?;

    if settings.plan {
        return run_plan_mode(&settings).await;
    }

    let interpreter_spec = InterpreterSpec {
        name: settings.interpreter.clone(),
        source_language: settings.source_language.clone(),
        target_language: settings.target_language.clone(),
        intermediary_language: settings.intermediary_language.clone(),
        data_dir: settings.data_dir.clone(),
        argos_base_url: settings.argos_base_url.clone(),
        device: Some(settings.device.clone()),
    };
    let interpreter = Arc::new(
        build_interpreter(&interpreter_spec)
            .await
            .context("initialize interpreter")?,
    );
    if !interpreter.has_pair() {
        anyhow::bail!("interpreter has no source/target pair configured");
    }
    if !interpreter.is_pair_available().await? {
        tracing::warn!(
            interpreter = interpreter.name(),
            "pair resolved at startup but is no longer available locally"
        );
    }

    let client = ClusterClient::new(&settings.url)?;
    let total = client.count(&settings.index, settings.query_string.as_deref()).await?;
    tracing::info!(total, index = %settings.index, "translating documents");

    let stream = SearchStream::open(
        client,
        &settings.index,
        settings.query_string.as_deref(),
        &[&settings.source_field, &settings.target_field, "_routing"],
        settings.pool_size,
        &settings.scan_scroll,
    )
    .await
    .context("open search stream")?;

    let engine_cfg = EngineConfig {
        pool_size: settings.pool_size,
        pool_timeout: Duration::from_secs_f64(settings.pool_timeout_secs),
        throttle: Duration::from_millis(settings.throttle_ms),
        dry_run: settings.dry_run,
        force: settings.force,
        max_content_length: settings.max_content_length,
        source_field: settings.source_field.clone(),
        target_field: settings.target_field.clone(),
        cluster_url: settings.url.clone(),
    };

    engine::run(stream, interpreter, engine_cfg).await?;
    tracing::info!("done");
    Ok(())
}

/// Plan mode (§4.G): stream document references only, push one deferred
/// task per hit instead of translating locally.
async fn run_plan_mode(settings: &ResolvedSettings) -> Result<()> {
    let bridge = TaskBridge::connect(&settings.broker_url, &settings.app_name).await?;
    let client = ClusterClient::new(&settings.url)?;
    let mut stream = SearchStream::open(
        client,
        &settings.index,
        settings.query_string.as_deref(),
        &["_routing"],
        settings.pool_size,
        &settings.scan_scroll,
    )
    .await
    .context("open search stream")?;

    let mut emitted = 0u64;
    while let Some(hit) = stream.next().await? {
        let task = DeferredTask {
            interpreter: InterpreterSpec {
                name: settings.interpreter.clone(),
                source_language: settings.source_language.clone(),
                target_language: settings.target_language.clone(),
                intermediary_language: settings.intermediary_language.clone(),
                data_dir: settings.data_dir.clone(),
                argos_base_url: settings.argos_base_url.clone(),
                device: Some(settings.device.clone()),
            },
            cluster_url: settings.url.clone(),
            source_field: settings.source_field.clone(),
            target_field: settings.target_field.clone(),
            dry_run: settings.dry_run,
            force: settings.force,
            max_content_length: settings.max_content_length,
            doc_ref: DocRef {
                index: hit.index.clone(),
                id: hit.id.clone(),
                routing: hit.routing.clone(),
            },
        };
        bridge.enqueue(&task).await?;
        emitted += 1;
    }
    tracing::info!(emitted, "enqueued deferred translation tasks");
    Ok(())
}

async fn pairs(local: bool, remote: bool, data_dir: Option<PathBuf>) -> Result<()> {
    let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(".es-translator"));
    let repo = ApertiumRepository::new(data_dir.join("packs").join("apertium"));

    if remote || !local {
        let pairs = repo.pair_packages().await.context("fetch remote pairs")?;
        for pkg in pairs {
            if let Some(name) = pkg.package() {
                println!("{name}");
            }
        }
    }
    if local {
        let modes_dir = data_dir.join("packs").join("apertium").join("modes");
        if modes_dir.is_dir() {
            for entry in std::fs::read_dir(&modes_dir)? {
                let entry = entry?;
                if entry.path().extension().and_then(|e| e.to_str()) == Some("mode") {
                    if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                        println!("{stem}");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn tasks(args: TasksArgs, file_config: Option<config::AppConfig>) -> Result<()> {
    let broker_url = args
        .broker_url
        .or_else(|| file_config.as_ref().and_then(|c| c.broker.url.clone()))
        .unwrap_or_else(|| "redis://localhost:6379/0".to_string());
    let app_name = file_config
        .as_ref()
        .and_then(|c| c.broker.app_name.clone())
        .unwrap_or_else(|| "es_translator".to_string());
    let bridge = TaskBridge::connect(&broker_url, &app_name).await?;
    let timeout = args.pool_timeout.unwrap_or(1.0);

    tracing::info!(queue = %app_name, "tasks worker started, draining durable queue");
    loop {
        let Some(task) = bridge.dequeue(timeout).await? else {
            continue;
        };
        if let Err(err) = run_deferred_task(task).await {
            tracing::warn!(%err, "deferred task failed");
        }
    }
}

async fn run_deferred_task(task: DeferredTask) -> Result<()> {
    let interpreter = build_interpreter(&task.interpreter).await?;
    let client = ClusterClient::new(&task.cluster_url)?;
    let hit = client
        .get_document(
            &task.doc_ref.index,
            &task.doc_ref.id,
            task.doc_ref.routing.as_deref(),
        )
        .await
        .context("fetch document for deferred task")?;

    let mut wrapped = TranslatedHit::new(hit, &task.source_field, &task.target_field);
    wrapped
        .add_translation(&interpreter, task.max_content_length, task.force)
        .await?;
    if !task.dry_run {
        wrapped.save(&client).await?;
    }
    tracing::info!(doc_id = %task.doc_ref.id, "deferred task completed");
    Ok(())
}

async fn monitor(args: MonitorArgs, file_config: Option<config::AppConfig>) -> Result<()> {
    let broker_url = args
        .broker_url
        .or_else(|| file_config.as_ref().and_then(|c| c.broker.url.clone()))
        .unwrap_or_else(|| "redis://localhost:6379/0".to_string());
    let app_name = file_config
        .as_ref()
        .and_then(|c| c.broker.app_name.clone())
        .unwrap_or_else(|| "es_translator".to_string());
    let bridge = TaskBridge::connect(&broker_url, &app_name).await?;

    let monitor = FleetMonitor::new(
        Duration::from_secs(args.refresh_interval_secs),
        Duration::from_secs(args.history_duration_secs),
    );
    es_translator::monitor::run_loop(monitor, &bridge, || false).await
}
