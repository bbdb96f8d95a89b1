//! Upload storage.
//!
//! Uploaded files are written flat under the uploads directory as
//! `file-<millis>-<random><ext>` and referenced from the message that
//! carried them. The store also reads them back for context assembly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parley_context::{DecodeError, FileDecoder, FileDescriptor};
use rand::Rng;
use tracing::{debug, warn};

use crate::models::now_millis;
use crate::{Error, Result};

/// Media types accepted for upload.
pub const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "text/plain",
    "text/csv",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// A file written to the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Name as uploaded by the client.
    pub original_name: String,
    pub stored_name: String,
    pub media_type: String,
    pub size: u64,
    pub path: PathBuf,
}

impl StoredUpload {
    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.original_name.clone(),
            size: self.size,
            media_type: self.media_type.clone(),
            storage_path: self.path.to_string_lossy().into_owned(),
        }
    }
}

/// Outcome of removing stored files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub deleted: usize,
    pub failed: usize,
}

impl RemovalReport {
    /// ` (N files could not be deleted)` when something failed.
    pub fn failure_note(&self) -> String {
        if self.failed > 0 {
            format!(" ({} files could not be deleted)", self.failed)
        } else {
            String::new()
        }
    }
}

/// Flat directory of uploaded files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Resolve the media type of an upload, guessing from the file name when
    /// the client sent none.
    pub fn media_type_for(original_name: &str, declared: Option<&str>) -> String {
        match declared {
            Some(declared) if !declared.is_empty() && declared != "application/octet-stream" => {
                declared.to_string()
            }
            _ => mime_guess::from_path(original_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        }
    }

    /// Validate and write an upload.
    pub async fn save(&self, original_name: &str, media_type: &str, data: &[u8]) -> Result<StoredUpload> {
        if data.len() > self.max_size {
            return Err(Error::FileTooLarge {
                max_size: self.max_size,
            });
        }

        if !ALLOWED_TYPES.contains(&media_type) {
            return Err(Error::InvalidFileType(format!(
                "{}. Only images, text files, PDFs and Word documents are allowed.",
                media_type
            )));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let stored_name = stored_file_name(original_name);
        let path = self.root.join(&stored_name);
        tokio::fs::write(&path, data).await?;

        debug!(stored_name = %stored_name, size = data.len(), "Upload stored");

        Ok(StoredUpload {
            original_name: original_name.to_string(),
            stored_name,
            media_type: media_type.to_string(),
            size: data.len() as u64,
            path,
        })
    }

    /// Path of a stored file, rejecting names that escape the directory.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf> {
        if stored_name.is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name.contains("..")
        {
            return Err(Error::InvalidInput("Invalid file name".to_string()));
        }
        Ok(self.root.join(stored_name))
    }

    /// Remove stored files, counting successes and failures.
    pub async fn remove_all<I, P>(&self, paths: I) -> RemovalReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = RemovalReport::default();

        for path in paths {
            let path = path.as_ref();
            match tokio::fs::remove_file(path).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete upload");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[async_trait]
impl FileDecoder for UploadStore {
    async fn read_bytes(&self, file: &FileDescriptor) -> std::result::Result<Vec<u8>, DecodeError> {
        tokio::fs::read(&file.storage_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                let stored = Path::new(&file.storage_path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.name.clone());
                DecodeError::NotFound(stored)
            } else {
                DecodeError::Io(e)
            }
        })
    }

    async fn read_text(&self, file: &FileDescriptor) -> std::result::Result<String, DecodeError> {
        let bytes = self.read_bytes(file).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// `file-<millis>-<random><ext>`, keeping the original extension.
fn stored_file_name(original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    format!("file-{}-{}{}", now_millis(), suffix, extension)
}
