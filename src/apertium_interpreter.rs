//! Direct and pipelined Apertium interpreter variants (§4.B), plus the
//! depth-2 intermediary discovery (`lang_tree` / `first_pairs_path`) from
//! `es_translator/interpreters/apertium/apertium.py`.
//!
//! Per the Design Notes, the intermediary is discovered eagerly at
//! construction time rather than memoized lazily on first translate, so the
//! interpreter is read-only once workers start using it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::apertium_repository::ApertiumRepository;
use crate::error::CoreError;
use crate::lang::{to_alpha_2, to_name};

pub struct ApertiumInterpreter {
    cache_dir: PathBuf,
    source_alpha_2: String,
    target_alpha_2: String,
    intermediary_alpha_2: Option<String>,
    source_name: String,
    target_name: String,
}

impl ApertiumInterpreter {
    pub async fn new(
        source: &str,
        target: &str,
        intermediary: Option<&str>,
        repo: Arc<ApertiumRepository>,
    ) -> Result<Self, CoreError> {
        let source_alpha_2 = to_alpha_2(source)?;
        let target_alpha_2 = to_alpha_2(target)?;
        let source_name = to_name(&source_alpha_2)?.to_uppercase();
        let target_name = to_name(&target_alpha_2)?.to_uppercase();

        let direct_pair = format!("{source_alpha_2}-{target_alpha_2}");
        let has_direct = repo
            .find_pair_package(&direct_pair)
            .await
            .map_err(|e| CoreError::Repository(e.to_string()))?
            .is_some();

        let intermediary_alpha_2 = match intermediary {
            Some(i) => Some(to_alpha_2(i)?),
            None if has_direct => None,
            None => Some(
                discover_intermediary(&repo, &source_alpha_2, &target_alpha_2)
                    .await
                    .ok_or_else(|| CoreError::PairUnavailable {
                        interpreter: "APERTIUM".to_string(),
                        source: source_alpha_2.clone(),
                        target: target_alpha_2.clone(),
                    })?,
            ),
        };

        match &intermediary_alpha_2 {
            None => {
                repo.install_pair_package(&direct_pair)
                    .await
                    .map_err(|e| CoreError::Repository(e.to_string()))?;
            }
            Some(mid) => {
                repo.install_pair_package(&format!("{source_alpha_2}-{mid}"))
                    .await
                    .map_err(|e| CoreError::Repository(e.to_string()))?;
                repo.install_pair_package(&format!("{mid}-{target_alpha_2}"))
                    .await
                    .map_err(|e| CoreError::Repository(e.to_string()))?;
            }
        }

        Ok(Self {
            cache_dir: repo.cache_dir().to_path_buf(),
            source_alpha_2,
            target_alpha_2,
            intermediary_alpha_2,
            source_name,
            target_name,
        })
    }

    pub fn name(&self) -> &'static str {
        "APERTIUM"
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn is_pipelined(&self) -> bool {
        self.intermediary_alpha_2.is_some()
    }

    pub fn has_pair(&self) -> bool {
        !self.source_alpha_2.is_empty() && !self.target_alpha_2.is_empty()
    }

    /// Checks the local modes directory for every leg this pair needs, with
    /// no network access. `new` already installs these at construction time,
    /// so `false` here means the on-disk package was removed out of band.
    pub async fn is_pair_available(&self) -> Result<bool, CoreError> {
        let modes_dir = self.cache_dir.join("modes");
        let legs: Vec<String> = match &self.intermediary_alpha_2 {
            None => vec![format!("{}-{}", self.source_alpha_2, self.target_alpha_2)],
            Some(mid) => vec![
                format!("{}-{}", self.source_alpha_2, mid),
                format!("{}-{}", mid, self.target_alpha_2),
            ],
        };
        for mode in legs {
            if !modes_dir.join(format!("{mode}.mode")).is_file() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn translate(&self, text: &str) -> Result<String, CoreError> {
        match &self.intermediary_alpha_2 {
            None => {
                let mode = format!("{}-{}", self.source_alpha_2, self.target_alpha_2);
                translate_with_mode(&self.cache_dir, &mode, text).await
            }
            Some(mid) => {
                let first_mode = format!("{}-{}", self.source_alpha_2, mid);
                let second_mode = format!("{}-{}", mid, self.target_alpha_2);
                let intermediate = translate_with_mode(&self.cache_dir, &first_mode, text).await?;
                translate_with_mode(&self.cache_dir, &second_mode, &intermediate).await
            }
        }
    }
}

/// Depth-2 expansion over the repository's pair packages: a language is a
/// usable intermediary iff it is one hop from `source` and one hop from
/// `target`. Ties are broken by the order packages were declared in the
/// repository's own index (the iteration order of `pair_packages`).
async fn discover_intermediary(
    repo: &ApertiumRepository,
    source: &str,
    target: &str,
) -> Option<String> {
    let pairs = repo.pair_packages().await.ok()?;
    let mut neighbors: HashMap<String, Vec<String>> = HashMap::new();
    for pkg in &pairs {
        let Some(name) = pkg.package() else { continue };
        let parts: Vec<&str> = name.split('-').collect();
        if parts.len() != 3 {
            continue;
        }
        let (a, b) = (parts[1].to_string(), parts[2].to_string());
        neighbors.entry(a.clone()).or_default().push(b.clone());
        neighbors.entry(b).or_default().push(a);
    }
    let direct = neighbors.get(source)?;
    for mid in direct {
        if mid == target {
            continue;
        }
        if neighbors.get(mid).is_some_and(|v| v.contains(&target.to_string())) {
            return Some(mid.clone());
        }
    }
    None
}

async fn translate_with_mode(cache_dir: &Path, mode: &str, text: &str) -> Result<String, CoreError> {
    let modes_dir = cache_dir.join("modes");
    let mut child = Command::new("apertium")
        .arg("-d")
        .arg(&modes_dir)
        .arg(mode)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::TranslationFailure {
            id: String::new(),
            source: e.into(),
        })?;

    let mut stdin = child.stdin.take().expect("apertium stdin was piped");
    let input = text.to_string();
    let write = async move {
        stdin.write_all(input.as_bytes()).await?;
        drop(stdin);
        Ok::<(), std::io::Error>(())
    };
    let (write_result, output) = tokio::join!(write, child.wait_with_output());
    write_result.map_err(|e| CoreError::TranslationFailure {
        id: String::new(),
        source: e.into(),
    })?;
    let output = output.map_err(|e| CoreError::TranslationFailure {
        id: String::new(),
        source: e.into(),
    })?;
    if !output.status.success() {
        return Err(CoreError::TranslationFailure {
            id: String::new(),
            source: anyhow::anyhow!(
                "apertium mode {mode} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apertium_repository::PackageDescriptor;

    fn pkg(name: &str) -> PackageDescriptor {
        let mut fields = HashMap::new();
        fields.insert("Package".to_string(), name.to_string());
        PackageDescriptor { fields }
    }

    #[test]
    fn neighbor_graph_finds_shared_intermediary() {
        let pairs = vec![pkg("apertium-por-cat"), pkg("apertium-cat-eng")];
        let mut neighbors: HashMap<String, Vec<String>> = HashMap::new();
        for p in &pairs {
            let name = p.package().unwrap();
            let parts: Vec<&str> = name.split('-').collect();
            let (a, b) = (parts[1].to_string(), parts[2].to_string());
            neighbors.entry(a.clone()).or_default().push(b.clone());
            neighbors.entry(b).or_default().push(a);
        }
        let direct = neighbors.get("por").unwrap();
        assert!(direct.contains(&"cat".to_string()));
        assert!(neighbors.get("cat").unwrap().contains(&"eng".to_string()));
    }
}
