//! Filesystem media store with content-addressed file names

use async_trait::async_trait;
use circlefeed_domain::{MediaError, MediaPayload, MediaRef, MediaStore};
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

/// Limits applied before anything is written
#[derive(Debug, Clone)]
pub struct MediaLimits {
    pub max_upload_bytes: usize,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Stores images under `<dir>/<sha256>.<ext>`
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    dir: PathBuf,
    limits: MediaLimits,
}

impl FsMediaStore {
    pub fn new(dir: impl Into<PathBuf>, limits: MediaLimits) -> Self {
        Self {
            dir: dir.into(),
            limits,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn check(&self, payload: &MediaPayload) -> Result<String, MediaError> {
        if payload.bytes.is_empty() {
            return Err(MediaError::Rejected("empty upload".to_string()));
        }
        if payload.bytes.len() > self.limits.max_upload_bytes {
            return Err(MediaError::Rejected(format!(
                "upload of {} bytes exceeds limit of {}",
                payload.bytes.len(),
                self.limits.max_upload_bytes
            )));
        }
        let extension = payload.extension().ok_or_else(|| {
            MediaError::Rejected(format!("'{}' has no file extension", payload.file_name))
        })?;
        if !self.limits.allowed_extensions.contains(&extension) {
            return Err(MediaError::Rejected(format!(
                "extension '{}' is not allowed",
                extension
            )));
        }
        Ok(extension)
    }
}

/// Write `bytes` to `target` through a temp file in the same directory.
///
/// Returns `false` when a file with this content-addressed name already exists.
/// Concurrent writers of the same content each persist a complete file; the
/// last rename wins and readers never see a partial file.
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<bool> {
    if target.is_file() {
        return Ok(false);
    }

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;

    Ok(true)
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn upload_image(&self, payload: &MediaPayload) -> Result<MediaRef, MediaError> {
        let extension = self.check(payload)?;

        let digest = format!("{:x}", Sha256::digest(&payload.bytes));
        let path = self.dir.join(format!("{}.{}", digest, extension));

        fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let target = path.clone();
        let bytes = payload.bytes.clone();
        let written = tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(io::Error::other)??;

        if written {
            tracing::info!(path = %path.display(), bytes = payload.bytes.len(), "Stored media");
        } else {
            tracing::debug!(path = %path.display(), "Media already stored");
        }

        Ok(MediaRef(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    fn payload(name: &str, bytes: &[u8]) -> MediaPayload {
        MediaPayload {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_upload_writes_content_addressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path().join("media"), MediaLimits::default());

        let first = store.upload_image(&payload("a.PNG", b"pixels")).await.unwrap();
        let second = store.upload_image(&payload("b.png", b"pixels")).await.unwrap();

        assert_eq!(first, second);
        assert!(first.as_str().ends_with(".png"));
        let written = std::fs::read(first.as_str()).unwrap();
        assert_eq!(written, b"pixels");
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(
            dir.path(),
            MediaLimits {
                max_upload_bytes: 4,
                ..Default::default()
            },
        );

        for bad in [
            payload("a.png", b""),
            payload("a.png", b"too big"),
            payload("a.exe", b"ok"),
            payload("noext", b"ok"),
        ] {
            assert!(matches!(
                store.upload_image(&bad).await,
                Err(MediaError::Rejected(_))
            ));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_of_same_content_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsMediaStore::new(dir.path(), MediaLimits::default()));
        let bytes: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

        for _ in 0..20 {
            let mut uploads = JoinSet::new();
            for _ in 0..8 {
                let store = Arc::clone(&store);
                let upload = payload("a.png", &bytes);
                uploads.spawn(async move { store.upload_image(&upload).await });
            }

            let mut refs = vec![];
            while let Some(result) = uploads.join_next().await {
                refs.push(result.unwrap().unwrap());
            }
            assert!(refs.windows(2).all(|w| w[0] == w[1]));
            assert_eq!(std::fs::read(refs[0].as_str()).unwrap(), bytes);
            std::fs::remove_file(refs[0].as_str()).unwrap();
        }

        // No temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path(), MediaLimits::default());
        let digest = format!("{:x}", Sha256::digest(b"pixels"));

        // A directory squatting on the target name makes the final rename fail
        std::fs::create_dir(dir.path().join(format!("{}.png", digest))).unwrap();

        let result = store.upload_image(&payload("a.png", b"pixels")).await;
        assert!(matches!(result, Err(MediaError::Io(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
