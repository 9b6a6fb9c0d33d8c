//! Layered configuration (§10.3): CLI flag > `ES_TRANSLATOR_*` environment
//! variable > TOML file > built-in default. The TOML shape and the
//! `find_default_config`/`load_config` helpers follow the teacher's own
//! `config.rs`; the env-var names and defaults follow
//! `es_translator/config.py`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, "es-translator.toml", 8) {
            return Some(p);
        }
    }
    find_file_upwards(workdir, "es-translator.toml", 8)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub elasticsearch: ElasticsearchSection,
    #[serde(default)]
    pub translation: TranslationSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub broker: BrokerSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ElasticsearchSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub query_string: Option<String>,
    #[serde(default)]
    pub scan_scroll: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TranslationSection {
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub intermediary_language: Option<String>,
    #[serde(default)]
    pub source_field: Option<String>,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_content_length: Option<String>,
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub argos_base_url: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PoolSection {
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub throttle_ms: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BrokerSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub plan: Option<bool>,
    #[serde(default)]
    pub app_name: Option<String>,
}

/// Every option from the §6 configuration table, fully resolved.
#[derive(Clone, Debug)]
pub struct ResolvedSettings {
    pub url: String,
    pub index: String,
    pub source_language: String,
    pub target_language: String,
    pub intermediary_language: Option<String>,
    pub source_field: String,
    pub target_field: String,
    pub query_string: Option<String>,
    pub data_dir: PathBuf,
    pub scan_scroll: String,
    pub dry_run: bool,
    pub force: bool,
    pub pool_size: usize,
    pub pool_timeout_secs: f64,
    pub throttle_ms: u64,
    pub interpreter: String,
    pub max_content_length: i64,
    pub plan: bool,
    pub broker_url: String,
    pub argos_base_url: Option<String>,
    pub device: String,
    pub app_name: String,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// `-1` means unlimited; accepts an integer or a suffixed size (`19G`,
/// `512K`, `8M`). Mirrors the original's `DEFAULT_MAX_CONTENT_LENGTH =
/// "19G"` convention, treated as "effectively unlimited".
pub fn parse_max_content_length(raw: &str) -> anyhow::Result<i64> {
    let raw = raw.trim();
    if raw == "-1" {
        return Ok(-1);
    }
    let (digits, multiplier) = match raw.chars().last() {
        Some('K') | Some('k') => (&raw[..raw.len() - 1], 1024i64),
        Some('M') | Some('m') => (&raw[..raw.len() - 1], 1024 * 1024),
        Some('G') | Some('g') => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    let value: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid max_content_length: {raw}"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("max_content_length overflow: {raw}"))
}

/// CLI overrides, one `Option` per §6 setting; `None` falls through to the
/// next layer.
#[derive(Default)]
pub struct CliOverrides {
    pub url: Option<String>,
    pub index: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub intermediary_language: Option<String>,
    pub source_field: Option<String>,
    pub target_field: Option<String>,
    pub query_string: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub scan_scroll: Option<String>,
    pub dry_run: Option<bool>,
    pub force: Option<bool>,
    pub pool_size: Option<usize>,
    pub pool_timeout_secs: Option<f64>,
    pub throttle_ms: Option<u64>,
    pub interpreter: Option<String>,
    pub max_content_length: Option<String>,
    pub plan: Option<bool>,
    pub broker_url: Option<String>,
    pub argos_base_url: Option<String>,
    pub device: Option<String>,
}

pub fn resolve_settings(
    cli: CliOverrides,
    file: Option<AppConfig>,
) -> anyhow::Result<ResolvedSettings> {
    let file = file.unwrap_or_default();

    macro_rules! layered {
        ($cli:expr, $env:expr, $file:expr, $default:expr) => {
            $cli.or_else(|| env_var($env)).or($file).unwrap_or_else(|| $default.to_string())
        };
    }

    let url = layered!(
        cli.url,
        "ES_TRANSLATOR_URL",
        file.elasticsearch.url.clone(),
        "http://localhost:9200"
    );
    let index = cli
        .index
        .or_else(|| env_var("ES_TRANSLATOR_INDEX"))
        .or(file.elasticsearch.index.clone())
        .ok_or_else(|| anyhow!("missing required setting: index"))?;
    let source_language = cli
        .source_language
        .or_else(|| env_var("ES_TRANSLATOR_SOURCE_LANGUAGE"))
        .or(file.translation.source_language.clone())
        .ok_or_else(|| anyhow!("missing required setting: source_language"))?;
    let target_language = cli
        .target_language
        .or_else(|| env_var("ES_TRANSLATOR_TARGET_LANGUAGE"))
        .or(file.translation.target_language.clone())
        .ok_or_else(|| anyhow!("missing required setting: target_language"))?;
    let intermediary_language = cli
        .intermediary_language
        .or_else(|| env_var("ES_TRANSLATOR_INTERMEDIARY_LANGUAGE"))
        .or(file.translation.intermediary_language.clone());
    let source_field = layered!(
        cli.source_field,
        "ES_TRANSLATOR_SOURCE_FIELD",
        file.translation.source_field.clone(),
        "content"
    );
    let target_field = layered!(
        cli.target_field,
        "ES_TRANSLATOR_TARGET_FIELD",
        file.translation.target_field.clone(),
        "content_translated"
    );
    let query_string = cli
        .query_string
        .or_else(|| env_var("ES_TRANSLATOR_QUERY_STRING"))
        .or(file.elasticsearch.query_string.clone());
    let data_dir = cli
        .data_dir
        .or_else(|| env_var("ES_TRANSLATOR_DATA_DIR").map(PathBuf::from))
        .or(file.translation.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(".es-translator"));
    let scan_scroll = layered!(
        cli.scan_scroll,
        "ES_TRANSLATOR_SCAN_SCROLL",
        file.elasticsearch.scan_scroll.clone(),
        "5m"
    );
    let dry_run = cli.dry_run.unwrap_or(file.translation.dry_run.unwrap_or(false));
    let force = cli.force.unwrap_or(file.translation.force.unwrap_or(false));
    let pool_size = cli
        .pool_size
        .or(file.pool.size)
        .unwrap_or(1)
        .max(1);
    let pool_timeout_secs = cli.pool_timeout_secs.or(file.pool.timeout_secs).unwrap_or(1800.0);
    let throttle_ms = cli.throttle_ms.or(file.pool.throttle_ms).unwrap_or(0);
    let interpreter = layered!(
        cli.interpreter,
        "ES_TRANSLATOR_DEFAULT_INTERPRETER",
        file.translation.interpreter.clone(),
        "ARGOS"
    );
    let max_content_length_raw = layered!(
        cli.max_content_length,
        "ES_TRANSLATOR_MAX_CONTENT_LENGTH",
        file.translation.max_content_length.clone(),
        "19G"
    );
    let max_content_length = parse_max_content_length(&max_content_length_raw)?;
    let plan = cli.plan.unwrap_or(file.broker.plan.unwrap_or(false));
    let broker_url = layered!(
        cli.broker_url,
        "ES_TRANSLATOR_BROKER_URL",
        file.broker.url.clone(),
        "redis://localhost:6379/0"
    );
    let argos_base_url = cli
        .argos_base_url
        .or_else(|| env_var("ES_TRANSLATOR_ARGOS_URL"))
        .or(file.translation.argos_base_url.clone());
    let device = layered!(
        cli.device,
        "ES_TRANSLATOR_DEVICE",
        file.translation.device.clone(),
        "auto"
    );
    let app_name = file.broker.app_name.clone().unwrap_or_else(|| "es_translator".to_string());

    Ok(ResolvedSettings {
        url,
        index,
        source_language,
        target_language,
        intermediary_language,
        source_field,
        target_field,
        query_string,
        data_dir,
        scan_scroll,
        dry_run,
        force,
        pool_size,
        pool_timeout_secs,
        throttle_ms,
        interpreter,
        max_content_length,
        plan,
        broker_url,
        argos_base_url,
        device,
        app_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(parse_max_content_length("-1").unwrap(), -1);
        assert_eq!(parse_max_content_length("8").unwrap(), 8);
        assert_eq!(parse_max_content_length("1K").unwrap(), 1024);
        assert_eq!(parse_max_content_length("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_max_content_length("19G").unwrap(), 19 * 1024 * 1024 * 1024);
    }

    #[test]
    fn resolve_fills_defaults_when_index_present() {
        let cli = CliOverrides {
            index: Some("docs".to_string()),
            source_language: Some("en".to_string()),
            target_language: Some("es".to_string()),
            ..Default::default()
        };
        let settings = resolve_settings(cli, None).unwrap();
        assert_eq!(settings.pool_size, 1);
        assert_eq!(settings.interpreter, "ARGOS");
        assert_eq!(settings.max_content_length, 19 * 1024 * 1024 * 1024);
    }

    #[test]
    fn resolve_requires_index() {
        let cli = CliOverrides {
            source_language: Some("en".to_string()),
            target_language: Some("es".to_string()),
            ..Default::default()
        };
        assert!(resolve_settings(cli, None).is_err());
    }
}
