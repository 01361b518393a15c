// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for FormatFlex.

use thiserror::Error;

use crate::types::BackendKind;

/// Top-level error type for all FormatFlex operations.
#[derive(Debug, Error)]
pub enum FormatFlexError {
    // -- Request errors --
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Rendering errors --
    #[error("{backend} backend failed: {reason}")]
    Backend { backend: BackendKind, reason: String },

    #[error("PDF generation failed: primary: {primary}; fallback: {fallback}")]
    RenderFailed { primary: String, fallback: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FormatFlexError {
    /// Shorthand for a failure attributed to one rendering backend.
    pub fn backend(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            reason: reason.into(),
        }
    }

    /// Whether this error was caused by the caller's input rather than the
    /// service.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FormatFlexError>;
