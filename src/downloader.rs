use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, info};
use reqwest::{Client, NoProxy, Proxy};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use crate::defer::CleanupRegistry;
use crate::error::{Error, Result};
use crate::platform::{normalize_version, Platform};

/// Callback type for reporting download progress.
/// Arguments: source URL, bytes downloaded, total bytes, MiB/s, is_complete
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64, f64, bool) + Send + Sync>;

/// Resolves release versions and downloads release archives.
pub struct Downloader {
    /// GitHub API URL for the latest release (pre-built from `repo`).
    pub api_url: String,
    /// Base for asset download URLs, e.g. `https://github.com`.
    pub download_base: String,
    /// GitHub repository in `owner/repo` format.
    pub repo: String,
    /// Optional HTTP proxy URL.
    pub proxy: Option<String>,
    /// Optional request timeout. `None` waits for the transport.
    pub timeout: Option<Duration>,
    /// Optional progress callback.
    pub progress: Option<ProgressFn>,
    latest: OnceCell<String>,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    tag_name: String,
}

impl Downloader {
    /// Create a downloader against the public GitHub endpoints.
    pub fn new(repo: &str) -> Self {
        Self::with_bases(repo, "https://api.github.com", "https://github.com")
    }

    /// Create a downloader against explicit API and download hosts.
    pub fn with_bases(repo: &str, api_base: &str, download_base: &str) -> Self {
        let api_base = api_base.trim_end_matches('/');
        Self {
            api_url: format!("{api_base}/repos/{repo}/releases/latest"),
            download_base: download_base.trim_end_matches('/').to_owned(),
            repo: repo.to_owned(),
            proxy: None,
            timeout: None,
            progress: None,
            latest: OnceCell::new(),
        }
    }

    /// Build an HTTP client, optionally with proxy support.
    fn build_client(&self) -> Result<Client> {
        let mut builder =
            Client::builder().user_agent(concat!("yab-installer/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy_url) = &self.proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::request(proxy_url, e))?
                .no_proxy(NoProxy::from_env());
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| Error::request(&self.api_url, e))
    }

    /// Latest released version without its `v` prefix.
    ///
    /// Only the first successful call touches the network; the answer is
    /// reused for the lifetime of this downloader. Failures are not cached.
    pub async fn latest_version(&self) -> Result<String> {
        self.latest
            .get_or_try_init(|| self.fetch_latest_version())
            .await
            .cloned()
    }

    async fn fetch_latest_version(&self) -> Result<String> {
        let url = self.api_url.as_str();
        debug!("fetching latest release from {url}");
        let client = self.build_client()?;
        let resp = client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| Error::request(url, e))?;

        if !resp.status().is_success() {
            return Err(Error::Status {
                url: url.to_owned(),
                status: resp.status(),
            });
        }

        let body = resp.text().await.map_err(|e| Error::request(url, e))?;
        let release: ReleaseResponse =
            serde_json::from_str(&body).map_err(|e| Error::ReleaseMetadata {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let version = normalize_version(&release.tag_name).to_owned();
        info!("latest {} release is {version}", self.repo);
        Ok(version)
    }

    /// Return the download URL for a named asset of a specific release version.
    pub fn asset_url(&self, version: &str, asset_name: &str) -> String {
        format!(
            "{}/{}/releases/download/v{}/{}",
            self.download_base, self.repo, version, asset_name
        )
    }

    /// Download the release archive for `version` on `platform` into a new
    /// temporary file and return its path.
    ///
    /// The file is registered with `cleanup` as soon as it is created, before
    /// any byte is written.
    pub async fn download_archive(
        &self,
        version: &str,
        platform: &Platform,
        cleanup: &CleanupRegistry,
    ) -> Result<PathBuf> {
        let url = self.asset_url(version, &platform.asset_filename(version));
        debug!("downloading {url}");

        let client = self.build_client()?;
        let resp = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::request(&url, e))?;
        if !resp.status().is_success() {
            return Err(Error::Status {
                url,
                status: resp.status(),
            });
        }

        let (file, path) = tempfile::Builder::new()
            .prefix("yab-")
            .suffix(".tar.gz")
            .tempfile()?
            .keep()
            .map_err(|e| e.error)?;
        cleanup.register_path_deletion(&path);
        let mut file = tokio::fs::File::from_std(file);

        let total = resp.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut stream = resp.bytes_stream();
        let start = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::request(&url, e))?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).await?;
            self.report(&url, downloaded, total, start, false);
        }
        file.flush().await?;
        self.report(&url, downloaded, total, start, true);

        debug!("saved {downloaded} bytes to {}", path.display());
        Ok(path)
    }

    fn report(&self, src: &str, downloaded: u64, total: u64, start: Instant, complete: bool) {
        if let Some(progress) = &self.progress {
            let elapsed = start.elapsed().as_secs_f64();
            let mib_per_sec = if elapsed > 0.0 {
                (downloaded as f64) / (1024.0 * 1024.0) / elapsed
            } else {
                0.0
            };
            progress(src, downloaded, total, mib_per_sec, complete);
        }
    }
}
