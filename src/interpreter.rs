//! Interpreter contract (§4.B) and factory (§4.H).
//!
//! A tagged variant rather than a trait object: the Design Notes call for
//! avoiding dynamic dispatch here, and the set of interpreters is closed and
//! small. The factory switches on `interpreter_name` the way the original
//! `Interpreter.by_name` classmethod does.

use std::path::PathBuf;
use std::sync::Arc;

use crate::apertium_interpreter::ApertiumInterpreter;
use crate::apertium_repository::ApertiumRepository;
use crate::argos::ArgosInterpreter;
use crate::error::CoreError;

pub enum Interpreter {
    Apertium(ApertiumInterpreter),
    Argos(ArgosInterpreter),
}

impl Interpreter {
    pub fn name(&self) -> &'static str {
        match self {
            Interpreter::Apertium(i) => i.name(),
            Interpreter::Argos(i) => i.name(),
        }
    }

    pub fn source_name(&self) -> &str {
        match self {
            Interpreter::Apertium(i) => i.source_name(),
            Interpreter::Argos(i) => i.source_name(),
        }
    }

    pub fn target_name(&self) -> &str {
        match self {
            Interpreter::Apertium(i) => i.target_name(),
            Interpreter::Argos(i) => i.target_name(),
        }
    }

    pub async fn translate(&self, text: &str) -> Result<String, CoreError> {
        match self {
            Interpreter::Apertium(i) => i.translate(text).await,
            Interpreter::Argos(i) => i.translate(text).await,
        }
    }

    pub fn has_pair(&self) -> bool {
        match self {
            Interpreter::Apertium(i) => i.has_pair(),
            Interpreter::Argos(i) => i.has_pair(),
        }
    }

    pub async fn is_pair_available(&self) -> Result<bool, CoreError> {
        match self {
            Interpreter::Apertium(i) => i.is_pair_available().await,
            Interpreter::Argos(i) => i.is_pair_available().await,
        }
    }
}

/// Configuration needed to build any interpreter variant. A deferred task
/// (§4.G) carries this verbatim so a remote worker can rebuild the same
/// interpreter deterministically.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct InterpreterSpec {
    pub name: String,
    pub source_language: String,
    pub target_language: String,
    pub intermediary_language: Option<String>,
    pub data_dir: PathBuf,
    pub argos_base_url: Option<String>,
    pub device: Option<String>,
}

impl InterpreterSpec {
    fn pack_dir(&self) -> PathBuf {
        self.data_dir.join("packs").join(self.name.to_lowercase())
    }
}

/// Builds the interpreter named by `spec.name`; unknown names are a
/// configuration error rather than a runtime one.
pub async fn build_interpreter(spec: &InterpreterSpec) -> Result<Interpreter, CoreError> {
    match spec.name.to_uppercase().as_str() {
        "APERTIUM" => {
            let repo = Arc::new(ApertiumRepository::new(spec.pack_dir()));
            let interpreter = ApertiumInterpreter::new(
                &spec.source_language,
                &spec.target_language,
                spec.intermediary_language.as_deref(),
                repo,
            )
            .await?;
            Ok(Interpreter::Apertium(interpreter))
        }
        "ARGOS" => {
            let base_url = spec
                .argos_base_url
                .clone()
                .ok_or_else(|| CoreError::Configuration("ARGOS interpreter requires argos_base_url".into()))?;
            let device = spec.device.clone().unwrap_or_else(|| "auto".to_string());
            let interpreter = ArgosInterpreter::new(
                &spec.source_language,
                &spec.target_language,
                spec.intermediary_language.as_deref(),
                None,
                &base_url,
                &device,
            )
            .await?;
            Ok(Interpreter::Argos(interpreter))
        }
        other => Err(CoreError::Configuration(format!(
            "unknown interpreter: {other}"
        ))),
    }
}
