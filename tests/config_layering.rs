//! CLI flag > `ES_TRANSLATOR_*` env var > TOML file > built-in default
//! (§10.3). Uses a process-wide env var, so runs serially via a mutex to
//! avoid cross-test interference.

use std::sync::Mutex;

use es_translator::config::{resolve_settings, AppConfig, CliOverrides};

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn cli_overrides_beat_every_other_layer() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("ES_TRANSLATOR_SOURCE_FIELD", "from_env");

    let toml = r#"
        [translation]
        source_field = "from_file"
    "#;
    let file: AppConfig = toml::from_str(toml).unwrap();

    let cli = CliOverrides {
        index: Some("docs".to_string()),
        source_language: Some("en".to_string()),
        target_language: Some("es".to_string()),
        source_field: Some("from_cli".to_string()),
        ..Default::default()
    };

    let settings = resolve_settings(cli, Some(file)).unwrap();
    assert_eq!(settings.source_field, "from_cli");

    std::env::remove_var("ES_TRANSLATOR_SOURCE_FIELD");
}

#[test]
fn env_var_beats_file_and_default() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("ES_TRANSLATOR_SOURCE_FIELD", "from_env");

    let toml = r#"
        [translation]
        source_field = "from_file"
    "#;
    let file: AppConfig = toml::from_str(toml).unwrap();

    let cli = CliOverrides {
        index: Some("docs".to_string()),
        source_language: Some("en".to_string()),
        target_language: Some("es".to_string()),
        ..Default::default()
    };

    let settings = resolve_settings(cli, Some(file)).unwrap();
    assert_eq!(settings.source_field, "from_env");

    std::env::remove_var("ES_TRANSLATOR_SOURCE_FIELD");
}

#[test]
fn file_beats_builtin_default() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("ES_TRANSLATOR_SOURCE_FIELD");

    let toml = r#"
        [translation]
        source_field = "from_file"
    "#;
    let file: AppConfig = toml::from_str(toml).unwrap();

    let cli = CliOverrides {
        index: Some("docs".to_string()),
        source_language: Some("en".to_string()),
        target_language: Some("es".to_string()),
        ..Default::default()
    };

    let settings = resolve_settings(cli, Some(file)).unwrap();
    assert_eq!(settings.source_field, "from_file");
}

#[test]
fn builtin_default_when_nothing_else_set() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("ES_TRANSLATOR_SOURCE_FIELD");

    let cli = CliOverrides {
        index: Some("docs".to_string()),
        source_language: Some("en".to_string()),
        target_language: Some("es".to_string()),
        ..Default::default()
    };

    let settings = resolve_settings(cli, None).unwrap();
    assert_eq!(settings.source_field, "content");
    assert_eq!(settings.target_field, "content_translated");
    assert_eq!(settings.interpreter, "ARGOS");
}
