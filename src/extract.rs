//! Pulls the executable out of a downloaded `.tar.gz` release archive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::debug;
use tokio::task::JoinError;

use crate::defer::CleanupRegistry;
use crate::error::{Error, Result};

/// Extract the entry whose base name is `binary_name` from `archive_path`
/// into a fresh temporary directory and return the extracted file's path.
///
/// The directory is registered with `cleanup` before any extraction I/O, so
/// it is removed even if decoding fails half-way.
pub async fn extract_binary(
    archive_path: &Path,
    binary_name: &str,
    cleanup: &CleanupRegistry,
) -> Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix("yab-").tempdir()?.keep();
    cleanup.register_path_deletion(&dir);

    let archive = archive_path.to_path_buf();
    let name = binary_name.to_owned();
    let dest = dir.clone();
    let joined = tokio::task::spawn_blocking(move || unpack_matching(&archive, &name, &dest)).await;
    let found = unpack_result(archive_path, joined)?;

    if !found {
        return Err(Error::BinaryNotFound {
            archive: archive_path.to_path_buf(),
            name: binary_name.to_owned(),
        });
    }

    let binary = dir.join(binary_name);
    debug!("extracted {}", binary.display());
    Ok(binary)
}

/// Flatten the blocking task's outcome; a panicked or cancelled task is an
/// extraction failure of `archive` like any decode error.
fn unpack_result(
    archive: &Path,
    joined: std::result::Result<io::Result<bool>, JoinError>,
) -> Result<bool> {
    joined
        .map_err(io::Error::other)
        .and_then(|unpacked| unpacked)
        .map_err(|source| Error::Extract {
            archive: archive.to_path_buf(),
            source,
        })
}

/// File → gzip → tar, writing only entries named `name` (flattened) into
/// `dest`. Returns whether any entry matched.
fn unpack_matching(archive: &Path, name: &str, dest: &Path) -> io::Result<bool> {
    let gz = GzDecoder::new(File::open(archive)?);
    let mut archive = tar::Archive::new(gz);
    let mut found = false;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let matches = entry.path()?.file_name().is_some_and(|n| n == name);
        if !matches {
            continue;
        }
        entry.unpack(dest.join(name))?;
        found = true;
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, data.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_only_the_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("yab.tar.gz");
        write_archive(
            &archive,
            &[("other/file.txt", "ignore me"), ("bin/yab", "#!/bin/sh\necho yab\n")],
        );
        let cleanup = CleanupRegistry::new();

        let binary = extract_binary(&archive, "yab", &cleanup).await.unwrap();

        assert_eq!(binary.file_name().unwrap(), "yab");
        assert_eq!(std::fs::read(&binary).unwrap(), b"#!/bin/sh\necho yab\n");
        let dir = binary.parent().unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(!dir.join("other").exists());
        assert_eq!(cleanup.pending_paths(), vec![dir.to_path_buf()]);

        cleanup.run();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("yab.tar.gz");
        write_archive(&archive, &[("README.md", "docs")]);
        let cleanup = CleanupRegistry::new();

        let err = extract_binary(&archive, "yab.exe", &cleanup).await.unwrap_err();

        assert!(matches!(err, Error::BinaryNotFound { ref name, .. } if name == "yab.exe"));
        assert_eq!(cleanup.pending(), 1);
    }

    #[tokio::test]
    async fn panicked_extraction_keeps_archive_context() {
        let joined = tokio::task::spawn_blocking(|| -> io::Result<bool> { panic!("decoder blew up") })
            .await;

        let err = unpack_result(Path::new("/tmp/yab.tar.gz"), joined).unwrap_err();

        assert!(
            matches!(err, Error::Extract { ref archive, .. } if archive == Path::new("/tmp/yab.tar.gz")),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn corrupt_archive_still_schedules_directory_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();
        let cleanup = CleanupRegistry::new();

        let err = extract_binary(&archive, "yab", &cleanup).await.unwrap_err();

        assert!(matches!(err, Error::Extract { .. }));
        let pending = cleanup.pending_paths();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_dir());

        cleanup.run();
        assert!(!pending[0].exists());
    }
}
