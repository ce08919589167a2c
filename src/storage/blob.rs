//! Filesystem object storage with public URLs
//!
//! Objects live at `{root}/{bucket}/{key}` and are served by the HTTP server
//! under `/storage/{bucket}/{key}`.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Public URL prefix the router serves objects from
pub const STORAGE_ROUTE: &str = "/storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Documents,
    Audio,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Audio => "audio",
        }
    }
}

/// Object key for an uploaded PDF: `{user_id}/{millis}-{file_name}`
pub fn document_key(user_id: &str, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        user_id,
        Utc::now().timestamp_millis(),
        sanitize_segment(file_name)
    )
}

/// Object key for a document's narration: `{user_id}/{document_id}-audio.mp3`
pub fn audio_key(user_id: &str, document_id: &str) -> String {
    format!("{}/{}-audio.mp3", user_id, document_id)
}

/// Replace characters that are unsafe in a path segment
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '?' | '#' | '%' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Local object store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf> {
        let mut path = self.root.join(bucket.name());
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(Error::storage(format!("invalid object key: {}", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Write a new object; existing keys are never overwritten
    pub async fn upload(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(format!("create {}: {}", parent.display(), e)))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| Error::storage(format!("open {}: {}", path.display(), e)))?;
        file.write_all(bytes)
            .await
            .map_err(|e| Error::storage(format!("write {}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| Error::storage(format!("flush {}: {}", path.display(), e)))?;

        tracing::debug!(bucket = bucket.name(), key, size = bytes.len(), "stored object");
        Ok(self.public_url(bucket, key))
    }

    pub fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}{}/{}/{}", self.public_base_url, STORAGE_ROUTE, bucket.name(), key)
    }

    pub async fn exists(&self, bucket: Bucket, key: &str) -> bool {
        match self.object_path(bucket, key) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
