// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the FormatFlex manuscript pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FormatFlexError, Result};

/// Unique identifier for one export/preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Input --------------------------------------------------------------------

/// Trim whitespace and byte-order marks from both ends.
pub fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

/// The caller's manuscript: freeform text plus a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawManuscript {
    pub text: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
}

impl RawManuscript {
    /// Title used when the caller supplies none.
    pub const DEFAULT_TITLE: &'static str = "Formatted Manuscript";

    pub fn new(text: impl Into<String>, title: Option<String>) -> Self {
        Self {
            text: text.into(),
            title: title.unwrap_or_else(|| Self::DEFAULT_TITLE.to_string()),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Reject manuscripts with no printable content.
    pub fn validate(&self) -> Result<()> {
        if trim_text(&self.text).is_empty() {
            return Err(FormatFlexError::Validation(
                "content is required and cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

// -- Classified content -------------------------------------------------------

/// Semantic role of one line of manuscript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    ChapterHeading,
    SectionHeading,
    Body,
}

/// One classified unit of content, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

// -- Page geometry ------------------------------------------------------------

/// Millimetres per inch.
const MM_PER_INCH: f32 = 25.4;

/// Unit of a page length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    In,
    Mm,
}

/// A physical length on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f32,
    pub unit: Unit,
}

impl Length {
    pub const fn inches(value: f32) -> Self {
        Self {
            value,
            unit: Unit::In,
        }
    }

    pub const fn mm(value: f32) -> Self {
        Self {
            value,
            unit: Unit::Mm,
        }
    }

    pub fn to_mm(&self) -> f32 {
        match self.unit {
            Unit::In => self.value * MM_PER_INCH,
            Unit::Mm => self.value,
        }
    }

    /// CSS length literal, e.g. `0.75in`.
    pub fn css(&self) -> String {
        let suffix = match self.unit {
            Unit::In => "in",
            Unit::Mm => "mm",
        };
        format!("{}{}", self.value, suffix)
    }
}

/// Standard named paper sizes understood by print engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A5,
    Letter,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::Letter => (215.9, 279.4),
        }
    }

    /// CSS `@page size` keyword.
    pub fn css_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "letter",
        }
    }
}

/// Either a named format or explicit trade dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageFormat {
    Named(PaperSize),
    Custom { width: Length, height: Length },
}

impl PageFormat {
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::Named(size) => size.dimensions_mm(),
            Self::Custom { width, height } => (width.to_mm(), height.to_mm()),
        }
    }

    /// Value for a CSS `@page { size: ... }` declaration.
    pub fn css_size(&self) -> String {
        match self {
            Self::Named(size) => size.css_keyword().to_string(),
            Self::Custom { width, height } => format!("{} {}", width.css(), height.css()),
        }
    }
}

/// Four-sided page margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Margin {
    pub const fn uniform(length: Length) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }

    pub const fn symmetric(vertical: Length, horizontal: Length) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    /// CSS shorthand in top/right/bottom/left order.
    pub fn css(&self) -> String {
        format!(
            "{} {} {} {}",
            self.top.css(),
            self.right.css(),
            self.bottom.css(),
            self.left.css()
        )
    }
}

/// Concrete page geometry handed to the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub format: PageFormat,
    pub margin: Margin,
}

// -- Composed output ----------------------------------------------------------

/// Render-ready markup with its document title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    pub markup: String,
    pub title: String,
}

/// The two rendering strategies, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Headless browser engine.
    Browser,
    /// Non-browser HTML to PDF converter.
    Lightweight,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Lightweight => "lightweight",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// -- Outbound artifact --------------------------------------------------------

/// How the caller wants the PDF presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum Disposition {
    /// Download with a suggested filename.
    Attachment { filename: String },
    /// Display in place (preview).
    Inline,
}

impl Disposition {
    pub fn attachment_for(title: &str) -> Self {
        Self::Attachment {
            filename: filename_from_title(title),
        }
    }

    /// `Content-Disposition` header value.
    pub fn header_value(&self) -> String {
        match self {
            Self::Attachment { filename } => format!("attachment; filename=\"{filename}\""),
            Self::Inline => "inline".to_string(),
        }
    }
}

/// A finished PDF plus the metadata a transport layer needs to send it.
#[derive(Debug, Clone)]
pub struct PdfResponse {
    pub request_id: RequestId,
    pub bytes: Vec<u8>,
    pub backend: BackendKind,
    pub disposition: Disposition,
    /// SHA-256 of `bytes`, hex encoded.
    pub digest: String,
}

impl PdfResponse {
    pub const CONTENT_TYPE: &'static str = "application/pdf";

    pub fn content_length(&self) -> usize {
        self.bytes.len()
    }
}

/// Derive a download filename: every non-alphanumeric character becomes `_`.
pub fn filename_from_title(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_title_applies() {
        let manuscript = RawManuscript::new("text", None);
        assert_eq!(manuscript.title, "Formatted Manuscript");
    }

    #[test]
    fn whitespace_only_content_is_rejected() {
        let manuscript = RawManuscript::new("  \n\t \n", None);
        let err = manuscript.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn byte_order_mark_alone_is_empty() {
        assert!(RawManuscript::new("\u{FEFF}\n \u{FEFF}", None).validate().is_err());
        assert_eq!(trim_text("\u{FEFF}Chapter 1 \r"), "Chapter 1");
    }

    #[test]
    fn filename_replaces_punctuation_and_spaces() {
        assert_eq!(filename_from_title("My Book: Vol. 2"), "My_Book__Vol__2.pdf");
        assert_eq!(filename_from_title("Café"), "Caf_.pdf");
    }

    #[test]
    fn trade_size_converts_to_mm() {
        let format = PageFormat::Custom {
            width: Length::inches(6.0),
            height: Length::inches(9.0),
        };
        let (w, h) = format.dimensions_mm();
        assert!((w - 152.4).abs() < 0.01);
        assert!((h - 228.6).abs() < 0.01);
        assert_eq!(format.css_size(), "6in 9in");
    }

    #[test]
    fn margin_css_order() {
        let margin = Margin::symmetric(Length::inches(1.0), Length::inches(0.75));
        assert_eq!(margin.css(), "1in 0.75in 1in 0.75in");
    }

    #[test]
    fn attachment_header() {
        let disposition = Disposition::attachment_for("Draft 1");
        assert_eq!(
            disposition.header_value(),
            "attachment; filename=\"Draft_1.pdf\""
        );
        assert_eq!(Disposition::Inline.header_value(), "inline");
    }
}
