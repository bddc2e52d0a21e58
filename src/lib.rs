//! # yab-installer
//!
//! Installs a prebuilt `yab` binary from GitHub Releases into a temporary
//! location, optionally runs it, and removes every temporary artefact when
//! the session ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use yab_installer::Api;
//!
//! #[tokio::main]
//! async fn main() {
//!     let installer = Api::new().build();
//!     installer.install("v0.3.0").await.unwrap();
//!     let code = installer.execute(["--help"]).await.unwrap();
//!     assert_eq!(code, 0);
//! }
//! ```

pub mod action;
pub mod api;
pub mod defer;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod install;
pub mod platform;
pub mod progress;

pub use api::Api;
pub use defer::{CleanupRegistry, DeferredId};
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use install::Installer;
pub use platform::{build_asset_filename, Platform};
