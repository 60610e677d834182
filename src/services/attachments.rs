use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::core::config::Settings;

const MAX_NAME_ATTEMPTS: i128 = 5;

#[derive(Debug, Error)]
pub(crate) enum AttachmentError {
    #[error("File size exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: u64 },
    #[error("attachment io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Absence attachments on local disk, served back verbatim from `root`.
#[derive(Debug, Clone)]
pub(crate) struct AttachmentStore {
    root: PathBuf,
    max_bytes: u64,
    max_upload_size_mb: u64,
}

impl AttachmentStore {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.uploads().upload_dir.clone(),
            settings.uploads().max_upload_size_mb,
        )
    }

    pub(crate) fn new(root: PathBuf, max_upload_size_mb: u64) -> Self {
        Self { root, max_bytes: max_upload_size_mb * 1024 * 1024, max_upload_size_mb }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub(crate) async fn ensure_root(&self) -> Result<(), AttachmentError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub(crate) fn check_size(&self, size: u64) -> Result<(), AttachmentError> {
        if size > self.max_bytes {
            return Err(AttachmentError::TooLarge { limit_mb: self.max_upload_size_mb });
        }
        Ok(())
    }

    /// Writes `bytes` under a name derived from the upload time and the
    /// original filename and returns that name.
    pub(crate) async fn save(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, AttachmentError> {
        self.check_size(bytes.len() as u64)?;
        self.ensure_root().await?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let mut attempt = 0;
        loop {
            let filename = derived_filename(millis + attempt, original_name);
            let path = self.root.join(&filename);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    tracing::info!(filename = %filename, size = bytes.len(), "Stored attachment");
                    return Ok(filename);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Deletes a stored attachment. A file that is already gone counts as removed.
    pub(crate) async fn remove(&self, filename: &str) -> Result<(), AttachmentError> {
        match fs::remove_file(self.root.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub(crate) fn derived_filename(unix_millis: i128, original_name: &str) -> String {
    format!("{unix_millis}-{}", sanitized_filename(original_name))
}

pub(crate) fn sanitized_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store(limit_mb: u64) -> AttachmentStore {
        let root = std::env::temp_dir().join(format!("attendease-test-{}", Uuid::new_v4()));
        AttachmentStore::new(root, limit_mb)
    }

    #[test]
    fn sanitized_filename_filters_disallowed_chars() {
        assert_eq!(sanitized_filename("doctor note (final)!.pdf"), "doctornotefinal.pdf");
    }

    #[test]
    fn sanitized_filename_strips_directories_and_dots() {
        assert_eq!(sanitized_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitized_filename("C:\\Users\\me\\scan.png"), "scan.png");
        assert_eq!(sanitized_filename("..."), "upload");
    }

    #[test]
    fn derived_filename_prefixes_timestamp() {
        assert_eq!(derived_filename(1721779200000, "note.pdf"), "1721779200000-note.pdf");
    }

    #[test]
    fn check_size_enforces_ceiling() {
        let store = temp_store(5);
        assert!(store.check_size(5 * 1024 * 1024).is_ok());
        let err = store.check_size(5 * 1024 * 1024 + 1).unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds 5MB limit");
    }

    #[tokio::test]
    async fn save_writes_file_under_derived_name() {
        let store = temp_store(1);
        let name = store.save("sick note.txt", b"fever").await.expect("save");

        assert!(name.ends_with("-sicknote.txt"), "unexpected name {name}");
        let contents = tokio::fs::read(store.root().join(&name)).await.expect("read back");
        assert_eq!(contents, b"fever");

        let second = store.save("sick note.txt", b"again").await.expect("save again");
        assert_ne!(name, second);

        tokio::fs::remove_dir_all(store.root()).await.ok();
    }

    #[tokio::test]
    async fn remove_deletes_stored_file_and_tolerates_missing() {
        let store = temp_store(1);
        let name = store.save("note.txt", b"cough").await.expect("save");

        store.remove(&name).await.expect("remove");
        assert!(!store.root().join(&name).exists());
        store.remove(&name).await.expect("remove again");

        tokio::fs::remove_dir_all(store.root()).await.ok();
    }

    #[tokio::test]
    async fn save_rejects_oversized_payload() {
        let store = temp_store(1);
        let bytes = vec![0u8; 1024 * 1024 + 1];
        let err = store.save("big.bin", &bytes).await.unwrap_err();
        assert!(matches!(err, AttachmentError::TooLarge { limit_mb: 1 }));
    }
}
