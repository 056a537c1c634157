//! Core document types
//!
//! Format-agnostic types shared by the engines, the store and the renderer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::position::Location;

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Reflowable text document (EPUB-like)
    Flow,
    /// Fixed-page document (PDF-like)
    Fixed,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "flow" => Some(Self::Flow),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }

    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Fixed),
            "epub" => Some(Self::Flow),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        if bytes.starts_with(b"%PDF") {
            return Some(Self::Fixed);
        }

        // EPUB containers are ZIPs whose first entry is the `mimetype` file,
        // so "epub" shows up within the first 58 bytes. Other ZIP-based
        // formats (.docx, .jar) do not.
        if bytes.starts_with(b"PK") && bytes.len() > 30 {
            let head = &bytes[..bytes.len().min(58)];
            if head.windows(4).any(|w| w == b"epub") {
                return Some(Self::Flow);
            }
        }

        None
    }

    /// Detect format from content first, then from the file name
    pub fn detect(bytes: &[u8], file_name: &str) -> Option<Self> {
        Self::from_magic_bytes(bytes).or_else(|| {
            Path::new(file_name)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Self::from_extension)
        })
    }
}

/// Descriptive metadata extracted once at save time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub cover_image: Option<CoverImage>,
}

/// Cover image bytes with their MIME type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Table of contents entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    pub label: String,
    /// Navigation target; `None` when the engine could not resolve it
    pub target: Option<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    pub fn new(label: impl Into<String>, target: Option<Location>) -> Self {
        Self {
            label: label.into(),
            target,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineEntry>) -> Self {
        self.children = children;
        self
    }
}

/// Flatten an outline tree in reading order (depth-first)
pub fn flatten_outline(entries: &[OutlineEntry]) -> Vec<&OutlineEntry> {
    let mut flat = Vec::new();
    let mut stack: Vec<&OutlineEntry> = entries.iter().rev().collect();
    while let Some(entry) = stack.pop() {
        flat.push(entry);
        stack.extend(entry.children.iter().rev());
    }
    flat
}

/// Outline entry covering `page`: the nearest entry starting at or before it
pub fn active_entry_for_page(entries: &[OutlineEntry], page: u32) -> Option<&OutlineEntry> {
    let mut best: Option<(&OutlineEntry, u32)> = None;
    for entry in flatten_outline(entries) {
        let Some(start) = entry.target.as_ref().and_then(Location::page) else {
            continue;
        };
        if start > page {
            continue;
        }
        let distance = page - start;
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((entry, distance));
        }
    }
    best.map(|(entry, _)| entry)
}

/// Where a flow engine currently is
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLocation {
    /// Content-position reference
    pub token: String,
    /// Fractional offset through the whole document, `[0, 1]`
    pub fraction: f64,
}

impl FlowLocation {
    pub fn new(token: impl Into<String>, fraction: f64) -> Self {
        Self {
            token: token.into(),
            fraction,
        }
    }
}

/// Intrinsic page size at scale 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A rasterized page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_magic() {
        assert_eq!(
            DocumentFormat::from_magic_bytes(b"%PDF-1.7\n..."),
            Some(DocumentFormat::Fixed)
        );
    }

    #[test]
    fn test_detect_epub_magic() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(&[0u8; 26]);
        bytes.extend_from_slice(b"mimetypeapplication/epub+zip");
        assert_eq!(
            DocumentFormat::from_magic_bytes(&bytes),
            Some(DocumentFormat::Flow)
        );
    }

    #[test]
    fn test_plain_zip_is_not_epub() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(&[0u8; 40]);
        assert_eq!(DocumentFormat::from_magic_bytes(&bytes), None);
        assert_eq!(
            DocumentFormat::detect(&bytes, "novel.EPUB"),
            Some(DocumentFormat::Flow)
        );
        assert_eq!(DocumentFormat::detect(&bytes, "sheet.xlsx"), None);
    }

    #[test]
    fn test_format_round_trips_through_str() {
        for format in [DocumentFormat::Flow, DocumentFormat::Fixed] {
            assert_eq!(DocumentFormat::parse(format.as_str()), Some(format));
        }
        assert_eq!(DocumentFormat::parse("pdf"), None);
    }

    fn sample_outline() -> Vec<OutlineEntry> {
        vec![
            OutlineEntry::new("Part I", Some(Location::Page(1))).with_children(vec![
                OutlineEntry::new("Chapter 1", Some(Location::Page(3))),
                OutlineEntry::new("Chapter 2", Some(Location::Page(20))),
            ]),
            OutlineEntry::new("Unresolved", None),
            OutlineEntry::new("Part II", Some(Location::Page(40))),
        ]
    }

    #[test]
    fn test_flatten_outline_reading_order() {
        let outline = sample_outline();
        let labels: Vec<_> = flatten_outline(&outline)
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec!["Part I", "Chapter 1", "Chapter 2", "Unresolved", "Part II"]
        );
    }

    #[test]
    fn test_active_entry_never_ahead_of_page() {
        let outline = sample_outline();
        assert_eq!(active_entry_for_page(&outline, 25).unwrap().label, "Chapter 2");
        assert_eq!(active_entry_for_page(&outline, 3).unwrap().label, "Chapter 1");
        assert_eq!(active_entry_for_page(&outline, 2).unwrap().label, "Part I");
        assert_eq!(active_entry_for_page(&outline, 99).unwrap().label, "Part II");
        assert!(active_entry_for_page(&[], 5).is_none());
    }
}
