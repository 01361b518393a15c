// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manuscript pipeline — validate, classify, resolve, compose, render.
//
// The pipeline holds no per-request state; concurrent exports share it
// through `&self`.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::instrument;

use formatflex_core::config::{FormatConfig, PartialFormatConfig, ServiceConfig};
use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::{
    BlockKind, Disposition, PageSpec, PdfResponse, RawManuscript, RequestId,
};
use formatflex_document::compose::Composition;
use formatflex_document::{
    BuiltinTemplates, ClassifierThresholds, DirectoryTemplates, DocumentComposer, ResolvedStyleSpec,
    Substitution, TemplateSource, classify_with, resolve_page, resolve_style,
};

use crate::backend::{RenderOptions, Renderer};
use crate::browser::BrowserRenderer;
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::lightweight::LightweightRenderer;
use crate::orchestrator::{RenderOrchestrator, RenderOutcome};
use crate::session::ChromiumLauncher;

/// Name reported by the status query.
pub const SERVICE_NAME: &str = "FormatFlex PDF Generator";

/// One export or preview request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub manuscript: RawManuscript,
    /// Caller overrides; absent fields take defaults.
    pub format: PartialFormatConfig,
}

impl ExportRequest {
    pub fn new(manuscript: RawManuscript, format: PartialFormatConfig) -> Self {
        Self { manuscript, format }
    }
}

/// How the finished PDF is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Attachment named after the title.
    Download,
    /// Inline, for display in place.
    Preview,
}

/// Everything the renderers need, produced before any backend runs.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub config: FormatConfig,
    pub style: ResolvedStyleSpec,
    pub page: PageSpec,
    pub composition: Composition,
    pub options: RenderOptions,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

pub fn status() -> ServiceStatus {
    ServiceStatus {
        status: "active",
        service: SERVICE_NAME,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Template source chosen at runtime.
pub type DynTemplates = Box<dyn TemplateSource + Send + Sync>;

/// The production wiring: Chromium primary, lightweight fallback.
pub type DefaultPipeline =
    ManuscriptPipeline<DynTemplates, BrowserRenderer<ChromiumLauncher>, LightweightRenderer>;

impl DefaultPipeline {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let templates: DynTemplates = match &config.template_dir {
            Some(dir) => Box::new(DirectoryTemplates::new(dir)),
            None => Box::new(BuiltinTemplates),
        };
        ManuscriptPipeline::new(
            templates,
            BrowserRenderer::from_config(config),
            LightweightRenderer::new(),
        )
    }
}

pub struct ManuscriptPipeline<S, P, F> {
    composer: DocumentComposer<S>,
    orchestrator: RenderOrchestrator<P, F>,
    thresholds: ClassifierThresholds,
    events: Arc<dyn EventSink>,
}

impl<S, P, F> ManuscriptPipeline<S, P, F>
where
    S: TemplateSource + Send + Sync,
    P: Renderer,
    F: Renderer,
{
    pub fn new(templates: S, primary: P, fallback: F) -> Self {
        let events: Arc<dyn EventSink> = Arc::new(TracingSink);
        Self {
            composer: DocumentComposer::new(templates),
            orchestrator: RenderOrchestrator::new(primary, fallback).with_events(Arc::clone(&events)),
            thresholds: ClassifierThresholds::default(),
            events,
        }
    }

    /// Route every pipeline event to `events`.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.orchestrator = self.orchestrator.with_events(Arc::clone(&events));
        self.events = events;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Run everything up to, but not including, rendering. Infallible:
    /// unknown configuration values and missing templates degrade to defaults.
    pub fn prepare(&self, request_id: RequestId, request: &ExportRequest) -> PreparedDocument {
        let manuscript = &request.manuscript;
        let blocks = classify_with(&manuscript.text, &self.thresholds);
        let count = |kind: BlockKind| blocks.iter().filter(|b| b.kind == kind).count();
        self.events.emit(&PipelineEvent::Classified {
            request_id,
            blocks: blocks.len(),
            chapters: count(BlockKind::ChapterHeading),
            sections: count(BlockKind::SectionHeading),
        });

        let config = FormatConfig::from_partial(&request.format);
        let (style, style_fallbacks) = resolve_style(&config);
        let (page, page_fallbacks) = resolve_page(&config.page_size, Some(config.margins.as_str()));
        for substitution in style_fallbacks.into_iter().chain(page_fallbacks) {
            self.report_fallback(request_id, substitution);
        }

        let composition = self.composer.compose(
            &blocks,
            &style,
            &page,
            &manuscript.title,
            manuscript.author.as_deref(),
        );
        if composition.used_base_skeleton {
            self.events.emit(&PipelineEvent::TemplateFallback {
                request_id,
                template: composition.template,
            });
        }

        let options = RenderOptions::from_style(&style);
        PreparedDocument {
            config,
            style,
            page,
            composition,
            options,
        }
    }

    fn report_fallback(&self, request_id: RequestId, substitution: Substitution) {
        self.events.emit(&PipelineEvent::ConfigFallback {
            request_id,
            field: substitution.field,
            rejected: substitution.rejected,
            fallback: substitution.fallback,
        });
    }

    /// Produce a PDF for `request`.
    ///
    /// Empty content is rejected before any renderer is invoked.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub async fn export(&self, request: &ExportRequest, mode: ExportMode) -> Result<PdfResponse> {
        let request_id = RequestId::new();
        let manuscript = &request.manuscript;
        self.events.emit(&PipelineEvent::RequestReceived {
            request_id,
            content_len: manuscript.text.len(),
            title: manuscript.title.clone(),
        });

        if let Err(e) = manuscript.validate() {
            self.events.emit(&PipelineEvent::ValidationFailed {
                request_id,
                reason: e.to_string(),
            });
            return Err(e);
        }

        let prepared = self.prepare(request_id, request);
        let outcome = self
            .orchestrator
            .render(
                request_id,
                &prepared.composition.document.markup,
                &prepared.page,
                &prepared.options,
            )
            .await;

        match outcome {
            RenderOutcome::Rendered { bytes, backend, .. } => {
                let digest = digest(&bytes);
                self.events.emit(&PipelineEvent::Rendered {
                    request_id,
                    backend,
                    bytes: bytes.len(),
                    digest: digest.clone(),
                });
                let disposition = match mode {
                    ExportMode::Download => Disposition::attachment_for(&manuscript.title),
                    ExportMode::Preview => Disposition::Inline,
                };
                Ok(PdfResponse {
                    request_id,
                    bytes,
                    backend,
                    disposition,
                    digest,
                })
            }
            RenderOutcome::Failed { primary, fallback } => {
                self.events.emit(&PipelineEvent::RenderFailed {
                    request_id,
                    primary: primary.clone(),
                    fallback: fallback.clone(),
                });
                Err(FormatFlexError::RenderFailed { primary, fallback })
            }
        }
    }

    pub async fn download(&self, request: &ExportRequest) -> Result<PdfResponse> {
        self.export(request, ExportMode::Download).await
    }

    pub async fn preview(&self, request: &ExportRequest) -> Result<PdfResponse> {
        self.export(request, ExportMode::Preview).await
    }
}
