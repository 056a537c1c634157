//! Fallback metadata extraction
//!
//! Used when no format engine is available to read embedded metadata
//! (for example from the command line). Mirrors what the reader shows for
//! books without metadata: the file name as title and an unknown author.

use async_trait::async_trait;

use super::traits::MetadataExtractor;
use super::types::{DocumentFormat, DocumentMetadata};
use crate::error::Result;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Derives metadata from the file name alone
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackMetadata;

#[async_trait]
impl MetadataExtractor for FallbackMetadata {
    async fn describe(
        &self,
        _format: DocumentFormat,
        file_name: &str,
        _bytes: &[u8],
    ) -> Result<DocumentMetadata> {
        Ok(DocumentMetadata {
            title: title_from_file_name(file_name),
            author: UNKNOWN_AUTHOR.to_string(),
            cover_image: None,
        })
    }
}

/// Strip directories and a trailing `.epub` / `.pdf` extension
pub fn title_from_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let lower = base.to_lowercase();
    let stem = if lower.ends_with(".epub") {
        &base[..base.len() - 5]
    } else if lower.ends_with(".pdf") {
        &base[..base.len() - 4]
    } else {
        base
    };

    let stem = stem.trim();
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// Fill blank fields of engine-provided metadata with fallbacks
pub fn with_fallbacks(mut metadata: DocumentMetadata, file_name: &str) -> DocumentMetadata {
    if metadata.title.trim().is_empty() {
        metadata.title = title_from_file_name(file_name);
    }
    if metadata.author.trim().is_empty() {
        metadata.author = UNKNOWN_AUTHOR.to_string();
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("Moby Dick.epub"), "Moby Dick");
        assert_eq!(title_from_file_name("/books/Report.PDF"), "Report");
        assert_eq!(title_from_file_name("notes.txt"), "notes.txt");
        assert_eq!(title_from_file_name(".pdf"), "Untitled");
    }

    #[test]
    fn test_with_fallbacks_keeps_engine_values() {
        let metadata = DocumentMetadata {
            title: "Real Title".into(),
            author: String::new(),
            cover_image: None,
        };
        let filled = with_fallbacks(metadata, "file.epub");
        assert_eq!(filled.title, "Real Title");
        assert_eq!(filled.author, UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn test_fallback_extractor() {
        let metadata = FallbackMetadata
            .describe(DocumentFormat::Fixed, "Annual Report.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(metadata.title, "Annual Report");
        assert_eq!(metadata.author, UNKNOWN_AUTHOR);
        assert!(metadata.cover_image.is_none());
    }
}
