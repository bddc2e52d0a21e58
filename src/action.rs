//! GitHub Actions integration: inputs, log lines and `PATH` publishing.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::Result;
use crate::install::Installer;

/// What the action entrypoint needs from the CI runner.
pub trait ActionContext {
    /// Value of the named input, empty when unset.
    fn input(&self, name: &str) -> String;
    /// Emit an informational line to the job log.
    fn info(&self, message: &str);
    /// Prepend `dir` to `PATH` for subsequent steps.
    fn add_path(&self, dir: &Path) -> io::Result<()>;
    /// Mark the step as failed with `message`.
    fn fail(&self, message: &str);
}

/// The GitHub Actions runner, driven by its environment variables.
pub struct GithubActions {
    path_file: Option<PathBuf>,
}

impl GithubActions {
    pub fn from_env() -> Self {
        Self {
            path_file: std::env::var_os("GITHUB_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Use `path_file` in place of `$GITHUB_PATH`.
    pub fn with_path_file(path_file: impl Into<PathBuf>) -> Self {
        Self {
            path_file: Some(path_file.into()),
        }
    }
}

impl ActionContext for GithubActions {
    fn input(&self, name: &str) -> String {
        let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
        std::env::var(key).unwrap_or_default().trim().to_owned()
    }

    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn add_path(&self, dir: &Path) -> io::Result<()> {
        let Some(path_file) = &self.path_file else {
            warn!("GITHUB_PATH is not set; not publishing {}", dir.display());
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path_file)?;
        writeln!(file, "{}", dir.display())
    }

    fn fail(&self, message: &str) {
        println!("::error::{}", escape_command_data(message));
    }
}

/// Escape a workflow command payload the way the runner expects.
fn escape_command_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Install `requested` (empty or `"latest"` for the newest release) and
/// publish its directory on `PATH`.
///
/// Only the extraction directory holding the binary outlives the session;
/// the downloaded archive is still cleaned up.
pub async fn run_action(
    ctx: &impl ActionContext,
    installer: &Installer,
    requested: &str,
) -> Result<PathBuf> {
    installer.platform()?;
    let version = if requested.is_empty() || requested == "latest" {
        installer.downloader.latest_version().await?
    } else {
        requested.to_owned()
    };
    ctx.info(&format!("Installing yab version {version}"));

    let binary = installer.install_temp(Some(&version)).await?;
    if let Some(dir) = binary.parent() {
        ctx.add_path(dir)?;
    }
    installer.cleanup().retain(&binary);
    Ok(binary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_inputs_from_environment() {
        std::env::set_var("INPUT_SETUP_YAB_FLAVOUR", "  nightly ");
        let ctx = GithubActions::from_env();
        assert_eq!(ctx.input("setup yab flavour"), "nightly");
        assert_eq!(ctx.input("setup-yab-missing"), "");
    }

    #[test]
    fn add_path_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file = tmp.path().join("github_path");
        let ctx = GithubActions::with_path_file(&path_file);

        ctx.add_path(Path::new("/opt/first")).unwrap();
        ctx.add_path(Path::new("/opt/second")).unwrap();

        let written = std::fs::read_to_string(&path_file).unwrap();
        assert_eq!(written, "/opt/first\n/opt/second\n");
    }

    #[test]
    fn escapes_error_messages() {
        assert_eq!(
            escape_command_data("100% broken\r\nagain"),
            "100%25 broken%0D%0Aagain"
        );
    }
}
