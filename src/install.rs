use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use tokio::process::Command;

use crate::defer::CleanupRegistry;
use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::extract::extract_binary;
use crate::platform::{normalize_version, Platform};

/// Installs the tool into temporary locations and runs it.
///
/// One `Installer` is one session: it memoizes the latest version, caches
/// the installed binary path, and owns (or shares) the cleanup registry
/// that removes every temporary artefact when the session ends.
pub struct Installer {
    /// Downloader used for HTTP operations.
    pub downloader: Downloader,
    os: String,
    arch: String,
    cleanup: Arc<CleanupRegistry>,
    binary: Mutex<Option<PathBuf>>,
}

impl Installer {
    /// Create an installer for the given raw OS/arch tags. Tags are validated
    /// on each install so the error surfaces from the operation itself.
    pub fn new(
        downloader: Downloader,
        os: &str,
        arch: &str,
        cleanup: Arc<CleanupRegistry>,
    ) -> Self {
        Self {
            downloader,
            os: os.to_owned(),
            arch: arch.to_owned(),
            cleanup,
            binary: Mutex::new(None),
        }
    }

    /// Registry holding this installer's pending cleanup actions.
    pub fn cleanup(&self) -> &Arc<CleanupRegistry> {
        &self.cleanup
    }

    /// Validate the configured OS/arch tags.
    pub fn platform(&self) -> Result<Platform> {
        Platform::from_tags(&self.os, &self.arch)
    }

    /// Download and extract `version` (empty or `"latest"` for the newest
    /// release) and return the path of the executable. Never cached.
    pub async fn install_temp(&self, version: Option<&str>) -> Result<PathBuf> {
        let platform = self.platform()?;

        let version = match version {
            None | Some("") | Some("latest") => self.downloader.latest_version().await?,
            Some(v) => normalize_version(v).to_owned(),
        };
        info!("installing yab {version} for {platform}");

        let archive = self
            .downloader
            .download_archive(&version, &platform, &self.cleanup)
            .await?;
        let binary = extract_binary(&archive, platform.executable_name(), &self.cleanup).await?;

        info!("yab installed at {}", binary.display());
        Ok(binary)
    }

    /// Install `version` and remember the result for [`Installer::get_path`].
    pub async fn install(&self, version: &str) -> Result<()> {
        let binary = self.install_temp(Some(version)).await?;
        *self.slot() = Some(binary);
        Ok(())
    }

    /// Path of the installed binary, installing the latest release on first
    /// use.
    pub async fn get_path(&self) -> Result<PathBuf> {
        let cached = self.slot().clone();
        if let Some(path) = cached {
            return Ok(path);
        }
        let binary = self.install_temp(None).await?;
        *self.slot() = Some(binary.clone());
        Ok(binary)
    }

    /// Run the binary with `args`, inheriting stdio, and return its exit
    /// code. A non-zero exit is not an error; termination by a signal is
    /// reported as `-1`.
    pub async fn execute<I, S>(&self, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let path = self.get_path().await?;
        debug!("running {}", path.display());
        let status = Command::new(&path)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                path: path.clone(),
                source,
            })?;
        Ok(status.code().unwrap_or(-1))
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        self.binary.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
