// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing error messages.
//
// Every failure surfaces as one plain message plus optional detail. In
// production mode the detail (backend diagnostics, I/O errors) is withheld.

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::FormatFlexError;

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Renderer hiccup; trying again may succeed.
    Transient,
    /// The caller must change the request.
    ActionRequired,
    /// Service misconfiguration; retrying will not help.
    Permanent,
}

/// A user-visible error: a single message plus optional detail.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Summary shown to the user.
    pub message: String,
    /// Diagnostic detail; `None` in production mode.
    pub detail: Option<String>,
    /// Whether resubmitting the same request may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    /// JSON error payload: `{error, details?, timestamp}`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(detail) = &self.detail {
            body["details"] = Value::String(detail.clone());
        }
        body
    }
}

/// Convert a `FormatFlexError` into a `HumanError`.
pub fn humanize_error(err: &FormatFlexError, production: bool) -> HumanError {
    let detail = (!production).then(|| err.to_string());

    match err {
        FormatFlexError::Validation(reason) => HumanError {
            message: capitalise(reason),
            // Validation messages are the caller's own problem; never secret.
            detail: None,
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FormatFlexError::Config(_) => HumanError {
            message: "The configuration is invalid.".into(),
            detail,
            retriable: false,
            severity: Severity::Permanent,
        },

        FormatFlexError::Backend { .. } | FormatFlexError::RenderFailed { .. } => HumanError {
            message: "Failed to generate PDF".into(),
            detail,
            retriable: true,
            severity: Severity::Transient,
        },

        FormatFlexError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
            HumanError {
                message: "The file couldn't be found.".into(),
                detail,
                retriable: false,
                severity: Severity::ActionRequired,
            }
        }

        FormatFlexError::Io(_) => HumanError {
            message: "There was a problem reading or writing a file.".into(),
            detail,
            retriable: true,
            severity: Severity::Transient,
        },

        FormatFlexError::Serialization(_) => HumanError {
            message: "The request could not be read.".into(),
            detail,
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
