//! Neural interpreter variant (§4.B "Neural-Argos").
//!
//! No native Rust binding for Argos Translate exists in the reference corpus
//! or on crates.io, so this models the back end the way the project's own
//! deployments commonly expose it: a small local HTTP service (LibreTranslate
//! speaks this exact `/languages` + `/translate` surface). That keeps the
//! "lazy back-end import" constraint meaningful — the device preference is
//! applied before the service is ever contacted — while staying within
//! idiomatic Rust (a `reqwest` client) rather than binding into a Python
//! runtime. See DESIGN.md for this decision.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs4::tokio::AsyncFileExt;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::CoreError;
use crate::lang::{to_alpha_2, to_name};

const DOWNLOAD_LOCK_TIMEOUT: Duration = Duration::from_secs(600);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Applies the device preference ("cpu" | "cuda" | "auto") before any
/// backend resource is touched. A neural backend that reads device
/// configuration at process-start must see this before its first call.
pub fn configure_device(device: &str) {
    std::env::set_var("ARGOS_DEVICE_TYPE", device);
}

pub struct ArgosInterpreter {
    http: reqwest::Client,
    base_url: String,
    source_alpha_2: String,
    target_alpha_2: String,
    source_name: String,
    target_name: String,
}

#[derive(Deserialize)]
struct LanguagesResponse {
    #[serde(default)]
    languages: Vec<LanguageEntry>,
}

#[derive(Deserialize)]
struct LanguageEntry {
    code: String,
    #[serde(default)]
    targets: Vec<String>,
}

impl ArgosInterpreter {
    pub async fn new(
        source: &str,
        target: &str,
        intermediary: Option<&str>,
        pack_dir: Option<&Path>,
        base_url: &str,
        device: &str,
    ) -> Result<Self, CoreError> {
        if intermediary.is_some() {
            tracing::warn!("ARGOS interpreter doesn't support an intermediary language; ignoring");
        }
        if pack_dir.is_some() {
            tracing::warn!("ARGOS interpreter doesn't support a custom pack directory; ignoring");
        }
        configure_device(device);

        let source_alpha_2 = to_alpha_2(source)?;
        let target_alpha_2 = to_alpha_2(target)?;
        let source_name = to_name(&source_alpha_2)?.to_uppercase();
        let target_name = to_name(&target_alpha_2)?.to_uppercase();

        let interpreter = Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            source_alpha_2,
            target_alpha_2,
            source_name,
            target_name,
        };

        if interpreter.is_pair_available().await? {
            tracing::info!(pair = %interpreter.pair(), "existing Argos package(s) found for pair");
        } else {
            interpreter.download_necessary_languages().await?;
        }
        Ok(interpreter)
    }

    pub fn name(&self) -> &'static str {
        "ARGOS"
    }

    pub fn pair(&self) -> String {
        format!("{}-{}", self.source_alpha_2, self.target_alpha_2)
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn has_pair(&self) -> bool {
        !self.source_alpha_2.is_empty() && !self.target_alpha_2.is_empty()
    }

    pub async fn is_pair_available(&self) -> Result<bool, CoreError> {
        let resp = self
            .http
            .get(format!("{}/languages", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::Repository(format!("fetch argos languages: {e}")))?;
        let body: LanguagesResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Repository(format!("decode argos languages: {e}")))?;
        Ok(body.languages.iter().any(|lang| {
            lang.code == self.source_alpha_2 && lang.targets.contains(&self.target_alpha_2)
        }))
    }

    fn lock_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}_{}.lock",
            self.source_alpha_2, self.target_alpha_2
        ))
    }

    async fn download_necessary_languages(&self) -> Result<(), CoreError> {
        let lock_path = self.lock_path();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .await
            .map_err(|e| CoreError::Repository(format!("open lock file: {e}")))?;

        let deadline = Instant::now() + DOWNLOAD_LOCK_TIMEOUT;
        loop {
            if file.try_lock_exclusive().is_ok() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(CoreError::DownloadLockTimeout { path: lock_path });
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }

        let result = self.request_package_download().await;
        let _ = file.unlock_async().await;
        result
    }

    async fn request_package_download(&self) -> Result<(), CoreError> {
        if self.is_pair_available().await? {
            return Ok(());
        }
        tracing::info!(pair = %self.pair(), "installing Argos package");
        self.http
            .post(format!("{}/download_package", self.base_url))
            .json(&serde_json::json!({
                "from_code": self.source_alpha_2,
                "to_code": self.target_alpha_2,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::Repository(format!("install argos package: {e}")))?;
        Ok(())
    }

    pub async fn translate(&self, text: &str) -> Result<String, CoreError> {
        #[derive(Deserialize)]
        struct TranslateResponse {
            #[serde(rename = "translatedText")]
            translated_text: String,
        }
        let resp = self
            .http
            .post(format!("{}/translate", self.base_url))
            .json(&serde_json::json!({
                "q": text,
                "source": self.source_alpha_2,
                "target": self.target_alpha_2,
                "format": "text",
            }))
            .send()
            .await
            .map_err(|e| CoreError::TranslationFailure {
                id: String::new(),
                source: e.into(),
            })?
            .error_for_status()
            .map_err(|e| CoreError::TranslationFailure {
                id: String::new(),
                source: e.into(),
            })?
            .json::<TranslateResponse>()
            .await
            .map_err(|e| CoreError::TranslationFailure {
                id: String::new(),
                source: e.into(),
            })?;
        Ok(resp.translated_text)
    }
}
