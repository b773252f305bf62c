//! Local model weights
//!
//! Each variant lives in `<models_dir>/<local_dir>`. A directory counts as
//! installed once the marker file exists inside it, so interrupted downloads
//! are fetched again and completed ones are never re-fetched.

use crate::catalog::ModelVariant;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Something that can materialise a model repository into a directory
pub trait ArtifactFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}

/// Downloads with `huggingface-cli download <repo> --local-dir <dir>`
#[derive(Debug, Clone)]
pub struct HuggingFaceCli {
    binary: String,
}

impl HuggingFaceCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn args(source: &str, dest: &Path) -> Vec<String> {
        vec![
            "download".to_string(),
            source.to_string(),
            "--local-dir".to_string(),
            dest.display().to_string(),
        ]
    }
}

impl ArtifactFetcher for HuggingFaceCli {
    fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        let status = Command::new(&self.binary)
            .args(Self::args(source, dest))
            .status()
            .with_context(|| {
                format!(
                    "Failed to run {}. Install it with: pip install -U \"huggingface_hub[cli]\"",
                    self.binary
                )
            })?;

        if !status.success() {
            bail!("{} download of {} failed ({})", self.binary, source, status);
        }
        Ok(())
    }
}

/// Whether [`ArtifactStore::ensure_installed`] had to download anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Fetched,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
    marker_file: String,
}

impl ArtifactStore {
    pub fn new(models_dir: impl Into<PathBuf>, marker_file: impl Into<String>) -> Self {
        Self {
            models_dir: models_dir.into(),
            marker_file: marker_file.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.models_dir(), config.fetch.marker_file.clone())
    }

    pub fn model_path(&self, variant: &ModelVariant) -> PathBuf {
        self.models_dir.join(&variant.local_dir)
    }

    pub fn is_installed(&self, variant: &ModelVariant) -> bool {
        self.model_path(variant).join(&self.marker_file).is_file()
    }

    /// Download the variant unless its marker file is already present
    pub fn ensure_installed(
        &self,
        variant: &ModelVariant,
        fetcher: &dyn ArtifactFetcher,
    ) -> Result<InstallOutcome> {
        let dest = self.model_path(variant);
        if self.is_installed(variant) {
            info!("{} already installed at {}", variant.id, dest.display());
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        fs::create_dir_all(&self.models_dir).with_context(|| {
            format!(
                "Failed to create models directory {}",
                self.models_dir.display()
            )
        })?;

        info!(
            "Downloading {} ({}) to {}",
            variant.source,
            variant.approx_download,
            dest.display()
        );
        fetcher.fetch(&variant.source, &dest)?;

        if !self.is_installed(variant) {
            bail!(
                "Download of {} finished but {} is missing from {}",
                variant.source,
                self.marker_file,
                dest.display()
            );
        }
        Ok(InstallOutcome::Fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_args() {
        let args = HuggingFaceCli::args("Qwen/Qwen2.5-Coder-14B-Instruct-AWQ", Path::new("/m/q"));
        assert_eq!(
            args,
            vec![
                "download",
                "Qwen/Qwen2.5-Coder-14B-Instruct-AWQ",
                "--local-dir",
                "/m/q"
            ]
        );
    }
}
