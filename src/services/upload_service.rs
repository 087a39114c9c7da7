use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("Unknown upload category '{0}'")]
    UnknownCategory(String),
    #[error("Files with extension '{extension}' are not allowed in '{category}'")]
    ExtensionNotAllowed { extension: String, category: String },
    #[error("Multipart body must contain a 'file' field")]
    MissingFile,
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadCategory {
    Images,
    Videos,
    Documents,
    Thumbnails,
    Assignments,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 5] = [
        UploadCategory::Images,
        UploadCategory::Videos,
        UploadCategory::Documents,
        UploadCategory::Thumbnails,
        UploadCategory::Assignments,
    ];

    pub fn parse(value: &str) -> Result<Self, UploadError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value.trim().to_lowercase())
            .ok_or_else(|| UploadError::UnknownCategory(value.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCategory::Images => "images",
            UploadCategory::Videos => "videos",
            UploadCategory::Documents => "documents",
            UploadCategory::Thumbnails => "thumbnails",
            UploadCategory::Assignments => "assignments",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadCategory::Images | UploadCategory::Thumbnails => &["jpg", "jpeg", "png", "gif", "webp"],
            UploadCategory::Videos => &["mp4", "webm", "mov", "mkv"],
            UploadCategory::Documents => &["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt"],
            UploadCategory::Assignments => &["pdf", "doc", "docx", "txt", "zip", "jpg", "jpeg", "png"],
        }
    }

    pub fn check_extension(&self, extension: &str) -> Result<(), UploadError> {
        if self.allowed_extensions().contains(&extension) {
            Ok(())
        } else {
            Err(UploadError::ExtensionNotAllowed {
                extension: extension.to_string(),
                category: self.as_str().to_string(),
            })
        }
    }
}

/// Keep the basename only, replacing anything outside `[A-Za-z0-9._-]`
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(255).collect()
    }
}

/// Lowercased extension without the dot
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Metadata recorded for a stored file
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub category: UploadCategory,
    pub original_name: String,
    pub stored_name: String,
    pub path: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub sha256: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, category: UploadCategory, stored_name: &str, bytes: &[u8]) -> Result<(), UploadError>;
    async fn remove(&self, category: UploadCategory, stored_name: &str) -> Result<(), UploadError>;
}

/// Files under `<root>/<category>/<stored_name>`
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

}

#[async_trait]
impl FileStorage for LocalDiskStorage {
    async fn put(&self, category: UploadCategory, stored_name: &str, bytes: &[u8]) -> Result<(), UploadError> {
        let dir = self.root.join(category.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(stored_name), bytes).await?;
        Ok(())
    }

    async fn remove(&self, category: UploadCategory, stored_name: &str) -> Result<(), UploadError> {
        match tokio::fs::remove_file(self.root.join(category.as_str()).join(stored_name)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

pub struct UploadService<S: FileStorage> {
    storage: S,
    max_file_size: u64,
    public_path: String,
}

impl UploadService<LocalDiskStorage> {
    pub fn from_config() -> Self {
        let uploads = &config::config().uploads;
        Self::new(
            LocalDiskStorage::new(&uploads.dir),
            uploads.max_file_size_bytes as u64,
            uploads.public_path.clone(),
        )
    }
}

impl<S: FileStorage> UploadService<S> {
    pub fn new(storage: S, max_file_size: u64, public_path: String) -> Self {
        Self {
            storage,
            max_file_size,
            public_path: public_path.trim_end_matches('/').to_string(),
        }
    }

    /// Fails fast when a streamed body passes the limit
    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_file_size {
            return Err(UploadError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate and store one file under a generated name
    pub async fn store(
        &self,
        category: UploadCategory,
        original_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        self.check_size(bytes.len() as u64)?;

        let original_name = sanitize_filename(original_name);
        let extension = extension_of(&original_name).ok_or_else(|| UploadError::ExtensionNotAllowed {
            extension: String::new(),
            category: category.as_str().to_string(),
        })?;
        category.check_extension(&extension)?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        self.storage.put(category, &stored_name, bytes).await?;
        tracing::info!(
            "Stored upload {}/{} ({} bytes)",
            category.as_str(),
            stored_name,
            bytes.len()
        );

        Ok(StoredFile {
            category,
            path: format!("uploads/{}/{}", category.as_str(), stored_name),
            url: format!("{}/{}/{}", self.public_path, category.as_str(), stored_name),
            original_name,
            stored_name,
            content_type,
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        })
    }

    /// Remove a stored file whose metadata could not be recorded
    pub async fn discard(&self, stored: &StoredFile) {
        if let Err(e) = self.storage.remove(stored.category, &stored.stored_name).await {
            tracing::warn!(
                "Failed to remove orphaned upload {}/{}: {}",
                stored.category.as_str(),
                stored.stored_name,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(root: &Path, limit: u64) -> UploadService<LocalDiskStorage> {
        UploadService::new(LocalDiskStorage::new(root), limit, "/uploads/".to_string())
    }

    #[test]
    fn sanitizes_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\My Essay (final).docx"), "My_Essay__final_.docx");
        assert_eq!(sanitize_filename("..."), "file");
        assert_eq!(extension_of("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("README"), None);
    }

    #[test]
    fn categories_and_allow_lists() {
        assert_eq!(UploadCategory::parse("Videos").unwrap(), UploadCategory::Videos);
        assert!(matches!(UploadCategory::parse("music"), Err(UploadError::UnknownCategory(_))));
        assert!(UploadCategory::Images.check_extension("png").is_ok());
        assert!(UploadCategory::Images.check_extension("exe").is_err());
        assert!(UploadCategory::Assignments.check_extension("zip").is_ok());
    }

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn stores_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path(), 1024);

        let stored = uploads
            .store(UploadCategory::Documents, "../notes v2.PDF", Some("application/pdf".into()), b"%PDF-1.4")
            .await
            .unwrap();

        assert_eq!(stored.original_name, "notes_v2.PDF");
        assert!(stored.stored_name.ends_with(".pdf"));
        assert_ne!(stored.stored_name, stored.original_name);
        assert_eq!(stored.path, format!("uploads/documents/{}", stored.stored_name));
        assert_eq!(stored.url, format!("/uploads/documents/{}", stored.stored_name));
        assert_eq!(stored.size, 8);

        let on_disk = std::fs::read(dir.path().join("documents").join(&stored.stored_name)).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn discard_removes_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path(), 1024);

        let stored = uploads
            .store(UploadCategory::Images, "avatar.png", None, b"\x89PNG")
            .await
            .unwrap();
        let on_disk = dir.path().join("images").join(&stored.stored_name);
        assert!(on_disk.exists());

        uploads.discard(&stored).await;
        assert!(!on_disk.exists());

        // A second discard finds nothing and stays quiet
        uploads.discard(&stored).await;
    }

    #[tokio::test]
    async fn rejects_oversized_empty_and_disallowed_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path(), 4);

        let err = uploads.store(UploadCategory::Images, "a.png", None, b"too big").await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { size: 7, limit: 4 }));

        let err = uploads.store(UploadCategory::Images, "a.png", None, b"").await.unwrap_err();
        assert!(matches!(err, UploadError::Empty));

        let err = uploads.store(UploadCategory::Images, "a.exe", None, b"MZ").await.unwrap_err();
        assert!(matches!(err, UploadError::ExtensionNotAllowed { .. }));

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
