//! Uploaded file descriptors and the decoding seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// How an uploaded file is presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    /// Sent inline as an encoded image next to the prompt.
    Image,
    /// Decoded and inlined verbatim into the prompt.
    PlainText,
    /// Described by name, type and size only.
    Other,
}

/// An uploaded file as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original file name as uploaded.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub media_type: String,
    pub storage_path: String,
}

impl FileDescriptor {
    pub fn category(&self) -> MediaCategory {
        if self.media_type.starts_with("image/") {
            MediaCategory::Image
        } else if self.media_type == "text/plain" || self.name.ends_with(".txt") {
            MediaCategory::PlainText
        } else {
            MediaCategory::Other
        }
    }

    /// Size in mebibytes with two decimals, e.g. `3.50`.
    pub fn size_mib(&self) -> String {
        format!("{:.2}", self.size as f64 / 1024.0 / 1024.0)
    }
}

/// Reads stored upload content for the assembler.
#[async_trait]
pub trait FileDecoder: Send + Sync {
    /// Raw bytes, used for inline images.
    async fn read_bytes(&self, file: &FileDescriptor) -> Result<Vec<u8>, DecodeError>;

    /// Decoded text, used for plain-text files.
    async fn read_text(&self, file: &FileDescriptor) -> Result<String, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn file(name: &str, media_type: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            size,
            media_type: media_type.to_string(),
            storage_path: format!("uploads/{}", name),
        }
    }

    #[rstest]
    #[case("photo.png", "image/png", MediaCategory::Image)]
    #[case("scan.webp", "image/webp", MediaCategory::Image)]
    #[case("notes.txt", "text/plain", MediaCategory::PlainText)]
    #[case("notes.txt", "application/octet-stream", MediaCategory::PlainText)]
    #[case("data.csv", "text/csv", MediaCategory::Other)]
    #[case("report.pdf", "application/pdf", MediaCategory::Other)]
    fn test_category(#[case] name: &str, #[case] media_type: &str, #[case] expected: MediaCategory) {
        assert_eq!(file(name, media_type, 1).category(), expected);
    }

    #[test]
    fn test_size_mib_rounding() {
        assert_eq!(file("a.pdf", "application/pdf", 3_670_016).size_mib(), "3.50");
        assert_eq!(file("a.pdf", "application/pdf", 0).size_mib(), "0.00");
        assert_eq!(file("a.pdf", "application/pdf", 1_048_576).size_mib(), "1.00");
    }
}
