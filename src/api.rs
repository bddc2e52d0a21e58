use std::sync::Arc;
use std::time::Duration;

use crate::defer::CleanupRegistry;
use crate::downloader::{Downloader, ProgressFn};
use crate::install::Installer;
use crate::progress::default_progress_fn;

/// Repository the tool is released from.
pub const DEFAULT_REPO: &str = "tsukinoko-kun/yab";

/// Top-level entry-point with a chainable builder API.
///
/// # Example
/// ```rust,no_run
/// use yab_installer::Api;
///
/// #[tokio::main]
/// async fn main() {
///     let installer = Api::new().no_progress().build();
///     let code = installer.execute(["--version"]).await.unwrap();
///     println!("yab exited with {code}");
/// }
/// ```
pub struct Api {
    repo: String,
    api_base: String,
    download_base: String,
    proxy: Option<String>,
    timeout: Option<Duration>,
    progress: Option<ProgressFn>,
    os: String,
    arch: String,
    cleanup: Option<Arc<CleanupRegistry>>,
}

impl Api {
    /// Create a new `Api` with sensible defaults.
    ///
    /// Proxy is read from `HTTP_PROXY` / `HTTPS_PROXY` environment variables.
    pub fn new() -> Self {
        let proxy = std::env::var("HTTP_PROXY")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HTTPS_PROXY").ok().filter(|s| !s.is_empty()));

        Self {
            repo: DEFAULT_REPO.to_owned(),
            api_base: "https://api.github.com".to_owned(),
            download_base: "https://github.com".to_owned(),
            proxy,
            timeout: None,
            progress: Some(default_progress_fn()),
            os: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            cleanup: None,
        }
    }

    /// Select the GitHub repository in `owner/repo` form (builder).
    pub fn repo(mut self, repo: &str) -> Self {
        self.repo = repo.to_owned();
        self
    }

    /// Override the GitHub API host (builder).
    pub fn set_api_base(mut self, url: &str) -> Self {
        self.api_base = url.to_owned();
        self
    }

    /// Override the release download host (builder).
    pub fn set_download_base(mut self, url: &str) -> Self {
        self.download_base = url.to_owned();
        self
    }

    /// Override the progress callback (builder).
    pub fn set_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Disable progress output (builder).
    pub fn no_progress(mut self) -> Self {
        self.progress = None;
        self
    }

    /// Set an explicit HTTP/HTTPS proxy URL (builder).
    pub fn set_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_owned());
        self
    }

    /// Abort requests that take longer than `timeout` (builder).
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Install for another OS/arch than the running one (builder).
    pub fn set_target(mut self, os: &str, arch: &str) -> Self {
        self.os = os.to_owned();
        self.arch = arch.to_owned();
        self
    }

    /// Register temporary artefacts in an existing registry (builder).
    pub fn set_cleanup(mut self, cleanup: Arc<CleanupRegistry>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Installer {
        let mut downloader = Downloader::with_bases(&self.repo, &self.api_base, &self.download_base);
        downloader.proxy = self.proxy;
        downloader.timeout = self.timeout;
        downloader.progress = self.progress;

        let cleanup = self.cleanup.unwrap_or_default();
        Installer::new(downloader, &self.os, &self.arch, cleanup)
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}
