use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while resolving, downloading, extracting or
/// running the tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operating system tag has no release asset.
    #[error("unsupported platform {0}")]
    UnsupportedPlatform(String),

    /// The CPU architecture tag has no release asset.
    #[error("unsupported architecture {0}")]
    UnsupportedArchitecture(String),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// The release listing did not contain a usable `tag_name`.
    #[error("malformed release metadata from {url}: {reason}")]
    ReleaseMetadata { url: String, reason: String },

    /// Decompression or tar extraction failed part-way through.
    #[error("failed to extract {}: {source}", archive.display())]
    Extract {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive was readable but held no entry named like the executable.
    #[error("{} does not contain {name}", archive.display())]
    BinaryNotFound { archive: PathBuf, name: String },

    /// The installed binary could not be started.
    #[error("failed to run {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn request(url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_owned(),
            source,
        }
    }
}
