//! Mapping from the running platform to release asset names.

use std::fmt;

use crate::error::{Error, Result};

/// Name of the tool as it appears in asset and executable names.
pub const TOOL_NAME: &str = "yab";

/// Operating systems with published release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    Linux,
    Darwin,
}

impl Os {
    /// Parse an OS tag. Accepts the asset spelling as well as the common
    /// aliases reported by Rust (`macos`) and Node (`win32`).
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "windows" | "win32" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            other => Err(Error::UnsupportedPlatform(other.to_owned())),
        }
    }

    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }
}

/// CPU architectures with published release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "amd64" | "x64" | "x86_64" => Ok(Self::Amd64),
            "arm" | "arm64" | "aarch64" => Ok(Self::Arm64),
            other => Err(Error::UnsupportedArchitecture(other.to_owned())),
        }
    }

    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

/// A supported (OS, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Validate a pair of raw tags.
    pub fn from_tags(os: &str, arch: &str) -> Result<Self> {
        Ok(Self {
            os: Os::from_tag(os)?,
            arch: Arch::from_tag(arch)?,
        })
    }

    /// The platform this process is running on.
    pub fn current() -> Result<Self> {
        Self::from_tags(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Asset filename for `version` on this platform.
    pub fn asset_filename(&self, version: &str) -> String {
        format!(
            "{TOOL_NAME}_{version}_{}_{}.tar.gz",
            self.os.asset_name(),
            self.arch.asset_name()
        )
    }

    /// Name of the executable inside the archive.
    pub fn executable_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "yab.exe",
            Os::Linux | Os::Darwin => TOOL_NAME,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.asset_name(), self.arch.asset_name())
    }
}

/// Build `yab_<version>_<os>_<arch>.tar.gz` from raw tags.
///
/// Fails before doing anything else if either tag is unsupported.
pub fn build_asset_filename(version: &str, os: &str, arch: &str) -> Result<String> {
    Ok(Platform::from_tags(os, arch)?.asset_filename(version))
}

/// Strip exactly one leading `v` from a version string.
pub fn normalize_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
