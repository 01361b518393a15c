// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Renderer interface shared by the browser engine and the lightweight writer.

use std::future::Future;

use formatflex_core::error::Result;
use formatflex_core::types::{BackendKind, PageSpec};
use formatflex_document::style::{FontClass, ResolvedStyleSpec};

/// Per-request settings a backend needs beyond the markup and page geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Running header text; `None` when the header is disabled.
    pub header: Option<String>,
    /// Running footer text; `None` when the footer is disabled.
    pub footer: Option<String>,
    /// Base body size in points.
    pub base_font_pt: u32,
    pub line_spacing: f32,
    /// Whether the chosen face degrades to a serif family.
    pub serif: bool,
}

impl RenderOptions {
    pub fn from_style(style: &ResolvedStyleSpec) -> Self {
        Self {
            header: style.header.as_ref().map(|h| h.text.clone()),
            footer: style.footer.as_ref().map(|f| f.text.clone()),
            base_font_pt: style.sizes.base,
            line_spacing: style.line_spacing,
            serif: style.font.class == FontClass::Serif,
        }
    }

    pub fn has_running_text(&self) -> bool {
        self.header.is_some() || self.footer.is_some()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            header: None,
            footer: None,
            base_font_pt: 12,
            line_spacing: 1.6,
            serif: true,
        }
    }
}

/// Turns composed markup into PDF bytes.
///
/// Implementations must not retry internally: the orchestrator owns the
/// primary/fallback decision.
pub trait Renderer: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn render(
        &self,
        markup: &str,
        page: &PageSpec,
        options: &RenderOptions,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl<R: Renderer> Renderer for &R {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn render(
        &self,
        markup: &str,
        page: &PageSpec,
        options: &RenderOptions,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).render(markup, page, options)
    }
}
