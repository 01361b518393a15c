// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// formatflex-document — the pure half of the manuscript pipeline.
//
// Classifies raw text into headings and paragraphs, resolves a partial format
// configuration into concrete style and page geometry, and composes the
// result into a single render-ready HTML document.

pub mod classify;
pub mod compose;
pub mod layout;
pub mod style;
pub mod templates;

// Re-export the primary entry points so callers can use
// `formatflex_document::classify` etc.
pub use classify::{ClassifierThresholds, classify, classify_with};
pub use compose::DocumentComposer;
pub use layout::resolve_page;
pub use style::{ResolvedStyleSpec, Substitution, resolve_style};
pub use templates::{BuiltinTemplates, DirectoryTemplates, TemplateSource};
