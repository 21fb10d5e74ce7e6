// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagewerk.

use thiserror::Error;

/// Top-level error type for all Pagewerk operations.
///
/// Every variant names the offending input (expression, file, image, page)
/// so the caller can report it verbatim.
#[derive(Debug, Error)]
pub enum PagewerkError {
    // -- Input validation --
    #[error("invalid page selection {expression:?}: {reason}")]
    Parse { expression: String, reason: String },

    #[error("invalid split {name:?}: pages {start}-{end} outside 1-{total}")]
    InvalidSplit {
        name: String,
        start: u32,
        end: u32,
        total: u32,
    },

    #[error("{0}")]
    Usage(String),

    #[error("unknown item id: {0}")]
    UnknownItem(String),

    #[error("{file}: {reason}")]
    Intake { file: String, reason: String },

    // -- Document / image errors --
    #[error("{file}: corrupt or unsupported document ({detail})")]
    Decode { file: String, detail: String },

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("{item}: {detail}")]
    Convert { item: String, detail: String },

    #[error("assembling from {file} failed: {detail}")]
    Assemble { file: String, detail: String },

    #[error("rendering page {page} failed: {detail}")]
    Render { page: u32, detail: String },

    #[error("encoding page {page} failed: {detail}")]
    Encode { page: u32, detail: String },

    // -- Job control --
    #[error("operation cancelled")]
    Cancelled,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`PagewerkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or empty page selection, user-correctable.
    Parse,
    /// Bounds, usage or intake violations caught before any output exists.
    Validation,
    /// Input bytes are not a valid or supported document/image.
    Decode,
    /// Degenerate geometry; indicates a bug or pathological input.
    Layout,
    /// Image-to-document conversion failure.
    Convert,
    /// Page copy or serialisation failure.
    Assemble,
    /// Rasterization or raster encoding failure.
    Render,
    Cancelled,
    Io,
}

impl PagewerkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::InvalidSplit { .. }
            | Self::Usage(_)
            | Self::UnknownItem(_)
            | Self::Intake { .. } => ErrorKind::Validation,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Layout(_) => ErrorKind::Layout,
            Self::Convert { .. } => ErrorKind::Convert,
            Self::Assemble { .. } => ErrorKind::Assemble,
            Self::Render { .. } | Self::Encode { .. } => ErrorKind::Render,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Shorthand for a decode failure on the named source.
    pub fn decode(file: impl Into<String>, detail: impl ToString) -> Self {
        Self::Decode {
            file: file.into(),
            detail: detail.to_string(),
        }
    }

    /// Shorthand for an assemble failure on the named source.
    pub fn assemble(file: impl Into<String>, detail: impl ToString) -> Self {
        Self::Assemble {
            file: file.into(),
            detail: detail.to_string(),
        }
    }

    /// The "unsupported image encoding" conversion failure for `item`.
    pub fn unsupported_image(item: impl Into<String>) -> Self {
        Self::Convert {
            item: item.into(),
            detail: "unsupported image encoding".into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagewerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_message_names_the_source() {
        let err = PagewerkError::decode("report.pdf", "bad xref");
        assert_eq!(
            err.to_string(),
            "report.pdf: corrupt or unsupported document (bad xref)"
        );
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn unsupported_image_message() {
        let err = PagewerkError::unsupported_image("scan.heic");
        assert_eq!(err.to_string(), "scan.heic: unsupported image encoding");
        assert_eq!(err.kind(), ErrorKind::Convert);
    }

    #[test]
    fn validation_kinds() {
        let split = PagewerkError::InvalidSplit {
            name: "Pages 4-12".into(),
            start: 4,
            end: 12,
            total: 10,
        };
        assert_eq!(split.kind(), ErrorKind::Validation);
        assert_eq!(
            PagewerkError::Usage("need two".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(PagewerkError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
