//! CLI surface (§10.1). An external collaborator per the core spec, but a
//! complete binary still needs one; shaped like the pack's other
//! subcommand-based tools (`bioconda2rpm`'s `Cli { command: Command }`)
//! rather than the teacher's single flattened `Args` struct, since `pairs`/
//! `tasks`/`monitor` are genuinely different modes of operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "es-translator")]
#[command(about = "Stream document fields through a translation back end and write results back to a search cluster.")]
pub struct Cli {
    /// Config file path (default: search for es-translator.toml upwards)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the translation engine over a search index.
    Translate(TranslateArgs),
    /// List language pairs.
    Pairs {
        /// List pairs installed under the local data directory.
        #[arg(long)]
        local: bool,
        /// List pairs available from the Apertium repository.
        #[arg(long)]
        remote: bool,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Drain the durable task queue, translating one document per task.
    Tasks(TasksArgs),
    /// Run the fleet monitor against the durable task queue.
    Monitor(MonitorArgs),
}

#[derive(Parser, Debug, Default)]
pub struct TranslateArgs {
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub index: Option<String>,
    #[arg(long)]
    pub source_language: Option<String>,
    #[arg(long)]
    pub target_language: Option<String>,
    #[arg(long)]
    pub intermediary_language: Option<String>,
    #[arg(long)]
    pub source_field: Option<String>,
    #[arg(long)]
    pub target_field: Option<String>,
    #[arg(long)]
    pub query_string: Option<String>,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub scan_scroll: Option<String>,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub pool_size: Option<usize>,
    #[arg(long)]
    pub pool_timeout: Option<f64>,
    #[arg(long)]
    pub throttle_ms: Option<u64>,
    #[arg(long)]
    pub interpreter: Option<String>,
    #[arg(long)]
    pub max_content_length: Option<String>,
    /// Emit to the durable queue instead of translating in-process.
    #[arg(long)]
    pub plan: bool,
    #[arg(long)]
    pub broker_url: Option<String>,
    #[arg(long)]
    pub argos_url: Option<String>,
    #[arg(long)]
    pub device: Option<String>,
}

#[derive(Parser, Debug)]
pub struct TasksArgs {
    #[arg(long)]
    pub broker_url: Option<String>,
    #[arg(long)]
    pub pool_timeout: Option<f64>,
}

#[derive(Parser, Debug)]
pub struct MonitorArgs {
    #[arg(long)]
    pub broker_url: Option<String>,
    #[arg(long, default_value = "2")]
    pub refresh_interval_secs: u64,
    #[arg(long, default_value = "60")]
    pub history_duration_secs: u64,
}
