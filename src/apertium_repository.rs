//! Apertium package manager (§4.C): fetch the package index, resolve a pair,
//! download, extract, alias, register mode files.
//!
//! Grounded directly on `es_translator/interpreters/apertium/repository.py`.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;
use regex::Regex;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::lang::to_alpha_3_pair;

const REPOSITORY_URL: &str = "https://apertium.projectjj.com/apt/nightly";
const SUITE: &str = "nightly";

/// One entry from a Debian-style `Packages` control file.
#[derive(Clone, Debug, Default)]
pub struct PackageDescriptor {
    pub fields: HashMap<String, String>,
}

impl PackageDescriptor {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn package(&self) -> Option<&str> {
        self.get("Package")
    }

    pub fn filename(&self) -> Option<&str> {
        self.get("Filename")
    }
}

/// `true` iff `Package` has the shape `apertium-XX-YY`.
pub fn is_apertium_pair(descriptor: &PackageDescriptor) -> bool {
    match descriptor.package() {
        Some(name) => {
            let parts: Vec<&str> = name.split('-').collect();
            parts.len() == 3 && parts[0] == "apertium"
        }
        None => false,
    }
}

fn detect_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        _ => "amd64",
    }
}

pub struct ApertiumRepository {
    cache_dir: PathBuf,
    architecture: String,
    http: reqwest::Client,
    packages: OnceCell<Vec<PackageDescriptor>>,
    download_lock: Mutex<()>,
}

impl ApertiumRepository {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            architecture: detect_architecture().to_string(),
            http: reqwest::Client::new(),
            packages: OnceCell::new(),
            download_lock: Mutex::new(()),
        }
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetches (and memoizes) the full package index for this architecture.
    pub async fn packages(&self) -> anyhow::Result<&[PackageDescriptor]> {
        if let Some(pkgs) = self.packages.get() {
            return Ok(pkgs);
        }
        let url = format!(
            "{}/dists/{}/main/binary-{}/Packages",
            REPOSITORY_URL, SUITE, self.architecture
        );
        let text = self
            .http
            .get(&url)
            .send()
            .await
            .context("fetch apertium package index")?
            .error_for_status()
            .context("apertium package index status")?
            .text()
            .await
            .context("read apertium package index body")?;
        let parsed = parse_packages_file(&text);
        let _ = self.packages.set(parsed);
        Ok(self.packages.get().expect("just set"))
    }

    pub async fn pair_packages(&self) -> anyhow::Result<Vec<PackageDescriptor>> {
        Ok(self
            .packages()
            .await?
            .iter()
            .filter(|d| is_apertium_pair(d))
            .cloned()
            .collect())
    }

    pub async fn find_package(&self, name: &str) -> anyhow::Result<Option<PackageDescriptor>> {
        Ok(self
            .packages()
            .await?
            .iter()
            .find(|d| d.package() == Some(name) || d.get("Provides") == Some(name))
            .cloned())
    }

    /// Resolves a `"src-tgt"` pair (in any ISO 639 form) to its package,
    /// trying the reversed direction too.
    pub async fn find_pair_package(&self, pair: &str) -> anyhow::Result<Option<PackageDescriptor>> {
        let alpha3 = to_alpha_3_pair(pair).unwrap_or_else(|_| pair.to_string());
        let (src, tgt) = alpha3
            .split_once('-')
            .ok_or_else(|| anyhow!("malformed pair: {pair}"))?;
        if let Some(pkg) = self.find_package(&format!("apertium-{src}-{tgt}")).await? {
            return Ok(Some(pkg));
        }
        if let Some(pkg) = self.find_package(&format!("apertium-{tgt}-{src}")).await? {
            return Ok(Some(pkg));
        }
        Ok(None)
    }

    /// Ensures `cache_dir/<name>/package.deb` exists, downloading it if
    /// necessary. Falls back to a pool-directory HTML listing, picking the
    /// lexicographically last `.deb` match, when the index's `Filename`
    /// itself 404s (nightly builds rotate filenames under the same name).
    pub async fn download_package(&self, name: &str, force: bool) -> anyhow::Result<PathBuf> {
        let _guard = self.download_lock.lock().await;
        let dir = self.package_dir(name);
        let dest = dir.join("package.deb");
        if dest.exists() && !force {
            return Ok(dest);
        }
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

        let descriptor = self
            .find_package(name)
            .await?
            .ok_or_else(|| anyhow!("package not found: {name}"))?;
        let filename = descriptor
            .filename()
            .ok_or_else(|| anyhow!("package {name} has no Filename"))?;
        let primary_url = format!("{}/{}", REPOSITORY_URL, filename);

        match self.fetch_to(&primary_url, &dest).await {
            Ok(()) => Ok(dest),
            Err(_) => {
                let pool_dir = Path::new(filename)
                    .parent()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default();
                let pool_url = format!("{}/{}/", REPOSITORY_URL, pool_dir);
                let listing = self
                    .http
                    .get(&pool_url)
                    .send()
                    .await
                    .context("fetch apertium pool listing")?
                    .error_for_status()
                    .context("apertium pool listing status")?
                    .text()
                    .await
                    .context("read apertium pool listing body")?;
                let href_re = Regex::new(&format!(r#"href="({}[^"]+\.deb)""#, regex::escape(name)))
                    .expect("valid regex");
                let mut matches: Vec<&str> = href_re
                    .captures_iter(&listing)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                matches.sort_unstable();
                let last = matches
                    .last()
                    .ok_or_else(|| anyhow!("no .deb found in pool listing for {name}"))?;
                let url = format!("{}{}", pool_url, last);
                self.fetch_to(&url, &dest).await?;
                Ok(dest)
            }
        }
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("download {url}"))?
            .error_for_status()
            .with_context(|| format!("download status {url}"))?
            .bytes()
            .await
            .with_context(|| format!("read download body {url}"))?;
        fs::write(dest, &bytes).with_context(|| format!("write {}", dest.display()))?;
        Ok(())
    }

    pub async fn download_pair_package(&self, pair: &str) -> anyhow::Result<PathBuf> {
        let descriptor = self
            .find_pair_package(pair)
            .await?
            .ok_or_else(|| anyhow!("no apertium package available for pair {pair}"))?;
        let name = descriptor
            .package()
            .ok_or_else(|| anyhow!("package descriptor missing Package field"))?
            .to_string();
        self.download_package(&name, false).await
    }

    /// Extracts a `.deb` (ar archive of `control.tar.*` + `data.tar.*`) and
    /// copies `usr/share/apertium/*` into the package directory, rewriting
    /// absolute mode-file paths to the local working directory.
    pub fn extract_pair_package(&self, deb_path: &Path) -> anyhow::Result<PathBuf> {
        let package_dir = deb_path
            .parent()
            .ok_or_else(|| anyhow!("deb path has no parent: {}", deb_path.display()))?
            .to_path_buf();
        let extract_root = package_dir.join("extracted");
        fs::create_dir_all(&extract_root)?;

        let data_tar = read_data_tar(deb_path)?;
        let mut archive = tar::Archive::new(std::io::Cursor::new(data_tar));
        archive
            .unpack(&extract_root)
            .with_context(|| format!("unpack data.tar from {}", deb_path.display()))?;

        let share_apertium = extract_root.join("usr/share/apertium");
        if share_apertium.is_dir() {
            copy_dir_recursive(&share_apertium, &package_dir)?;
        }
        let usr_dir = extract_root.join("usr");
        if usr_dir.is_dir() {
            let _ = fs::remove_dir_all(&usr_dir);
        }

        rewrite_mode_file_paths(&package_dir, &package_dir)?;
        Ok(package_dir)
    }

    /// Creates symlink aliases between the alpha-2 and alpha-3 forms of an
    /// installed pair package, both for its directory and its mode file.
    pub fn create_pair_package_alias(&self, package_dir: &Path) -> anyhow::Result<()> {
        let name = package_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("package dir has no name: {}", package_dir.display()))?;
        let Some(rest) = name.strip_prefix("apertium-") else {
            return Ok(());
        };
        let Some((src, tgt)) = rest.split_once('-') else {
            return Ok(());
        };
        let (alt_src, alt_tgt) = if src.len() == 2 {
            (crate::lang::to_alpha_3(src), crate::lang::to_alpha_3(tgt))
        } else {
            (crate::lang::to_alpha_2(src), crate::lang::to_alpha_2(tgt))
        };
        let (Ok(alt_src), Ok(alt_tgt)) = (alt_src, alt_tgt) else {
            return Ok(());
        };
        let alt_name = format!("apertium-{alt_src}-{alt_tgt}");
        if alt_name != name {
            let alt_dir = self.cache_dir.join(&alt_name);
            create_symlink(package_dir, &alt_dir)?;
        }

        let mode_name = format!("{src}-{tgt}.mode");
        let alt_mode_name = format!("{alt_src}-{alt_tgt}.mode");
        let modes_dir = package_dir.join("modes");
        let mode_file = modes_dir.join(&mode_name);
        if mode_file.is_file() && mode_name != alt_mode_name {
            create_symlink(&mode_file, &modes_dir.join(&alt_mode_name))?;
        }
        Ok(())
    }

    pub fn clear_modes(&self) -> anyhow::Result<()> {
        let modes_dir = self.cache_dir.join("modes");
        if modes_dir.is_dir() {
            fs::remove_dir_all(&modes_dir)?;
        }
        Ok(())
    }

    /// Collects every `*/modes/*.mode` under `cache_dir` into a single
    /// top-level `modes/` directory.
    pub fn import_modes(&self, clear: bool) -> anyhow::Result<()> {
        if clear {
            self.clear_modes()?;
        }
        let modes_dir = self.cache_dir.join("modes");
        fs::create_dir_all(&modes_dir)?;
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let pkg_modes = entry.path().join("modes");
            if !pkg_modes.is_dir() {
                continue;
            }
            for mode_file in fs::read_dir(&pkg_modes)? {
                let mode_file = mode_file?;
                let path = mode_file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("mode") {
                    continue;
                }
                let dest = modes_dir.join(path.file_name().unwrap());
                if dest.exists() || dest.is_symlink() {
                    continue;
                }
                fs::copy(&path, &dest)
                    .with_context(|| format!("copy mode file {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// `download -> extract -> alias -> import_modes(clear=false)`.
    pub async fn install_pair_package(&self, pair: &str) -> anyhow::Result<()> {
        let deb_path = self.download_pair_package(pair).await?;
        let package_dir = self.extract_pair_package(&deb_path)?;
        self.create_pair_package_alias(&package_dir)?;
        self.import_modes(false)?;
        Ok(())
    }
}

fn parse_packages_file(text: &str) -> Vec<PackageDescriptor> {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut fields = HashMap::new();
            let mut current_key: Option<String> = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix(' ') {
                    if let Some(key) = &current_key {
                        if let Some(existing) = fields.get_mut::<str>(key) {
                            let existing: &mut String = existing;
                            existing.push('\n');
                            existing.push_str(rest);
                        }
                    }
                    continue;
                }
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim().to_string();
                    let value = value.trim().to_string();
                    current_key = Some(key.clone());
                    fields.insert(key, value);
                }
            }
            PackageDescriptor { fields }
        })
        .collect()
}

fn read_data_tar(deb_path: &Path) -> anyhow::Result<Vec<u8>> {
    let file = fs::File::open(deb_path).with_context(|| format!("open {}", deb_path.display()))?;
    let mut archive = ar::Archive::new(file);
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.with_context(|| format!("read ar entry in {}", deb_path.display()))?;
        let name = String::from_utf8_lossy(entry.header().identifier()).to_string();
        if !name.starts_with("data.tar") {
            continue;
        }
        let mut compressed = Vec::new();
        entry.read_to_end(&mut compressed)?;
        if name.ends_with(".gz") {
            let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            return Ok(out);
        }
        if name.ends_with(".xz") || name.ends_with(".zst") {
            return Err(anyhow!("unsupported data.tar compression in {}", name));
        }
        // uncompressed data.tar
        return Ok(compressed);
    }
    Err(anyhow!("no data.tar member found in {}", deb_path.display()))
}

fn copy_dir_recursive(src: &Path, dest_root: &Path) -> anyhow::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let rel = entry.file_name();
        let dest = dest_root.join(&rel);
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&dest)?;
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn rewrite_mode_file_paths(dir: &Path, local_root: &Path) -> anyhow::Result<()> {
    let modes_dir = dir.join("modes");
    if !modes_dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(&modes_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("mode") {
            continue;
        }
        let text = fs::read_to_string(&path)?;
        let rewritten = text.replace("/usr/share/apertium", &local_root.to_string_lossy());
        if rewritten != text {
            fs::write(&path, rewritten)?;
        }
    }
    Ok(())
}

fn create_symlink(source: &Path, target: &Path) -> anyhow::Result<()> {
    if !source.exists() {
        return Ok(());
    }
    if target.is_symlink() || target.exists() {
        fs::remove_file(target).or_else(|_| fs::remove_dir_all(target))?;
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(source, target)
        .with_context(|| format!("symlink {} -> {}", target.display(), source.display()))?;
    #[cfg(not(unix))]
    {
        if source.is_dir() {
            copy_dir_recursive(source, target)?;
        } else {
            fs::copy(source, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(package: &str) -> PackageDescriptor {
        let mut fields = HashMap::new();
        fields.insert("Package".to_string(), package.to_string());
        PackageDescriptor { fields }
    }

    #[test]
    fn recognizes_pair_packages() {
        assert!(is_apertium_pair(&descriptor("apertium-en-es")));
        assert!(is_apertium_pair(&descriptor("apertium-spa-cat")));
        assert!(!is_apertium_pair(&descriptor("nop-en-es")));
        assert!(!is_apertium_pair(&descriptor("en-es")));
        assert!(!is_apertium_pair(&descriptor("apertium")));
    }

    #[test]
    fn parses_packages_file_blocks() {
        let text = "Package: apertium-en-es\nVersion: 1.0\n\nPackage: apertium-es-ca\nVersion: 2.0\n";
        let parsed = parse_packages_file(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].package(), Some("apertium-en-es"));
        assert_eq!(parsed[1].get("Version"), Some("2.0"));
    }
}
