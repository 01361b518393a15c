// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline events — an injected sink instead of ad hoc logging.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use formatflex_core::types::{BackendKind, RequestId};

/// Something observable that happened while serving one request.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RequestReceived {
        request_id: RequestId,
        content_len: usize,
        title: String,
    },
    ValidationFailed {
        request_id: RequestId,
        reason: String,
    },
    Classified {
        request_id: RequestId,
        blocks: usize,
        chapters: usize,
        sections: usize,
    },
    /// An unrecognised configuration value was replaced.
    ConfigFallback {
        request_id: RequestId,
        field: &'static str,
        rejected: String,
        fallback: &'static str,
    },
    /// The requested template was unavailable; the base skeleton was used.
    TemplateFallback {
        request_id: RequestId,
        template: &'static str,
    },
    BackendFailed {
        request_id: RequestId,
        backend: BackendKind,
        reason: String,
    },
    Rendered {
        request_id: RequestId,
        backend: BackendKind,
        bytes: usize,
        digest: String,
    },
    RenderFailed {
        request_id: RequestId,
        primary: String,
        fallback: String,
    },
}

/// Receives pipeline events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &PipelineEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to `tracing`. Config fallbacks stay at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RequestReceived {
                request_id,
                content_len,
                title,
            } => info!(%request_id, content_len, title = %title, "export requested"),
            PipelineEvent::ValidationFailed { request_id, reason } => {
                info!(%request_id, reason = %reason, "request rejected")
            }
            PipelineEvent::Classified {
                request_id,
                blocks,
                chapters,
                sections,
            } => debug!(%request_id, blocks, chapters, sections, "manuscript classified"),
            PipelineEvent::ConfigFallback {
                request_id,
                field,
                rejected,
                fallback,
            } => debug!(%request_id, field, rejected = %rejected, fallback, "unknown config value replaced"),
            PipelineEvent::TemplateFallback {
                request_id,
                template,
            } => warn!(%request_id, template, "template unavailable, using base skeleton"),
            PipelineEvent::BackendFailed {
                request_id,
                backend,
                reason,
            } => warn!(%request_id, %backend, reason = %reason, "backend failed"),
            PipelineEvent::Rendered {
                request_id,
                backend,
                bytes,
                digest,
            } => info!(%request_id, %backend, bytes, digest = %digest, "PDF rendered"),
            PipelineEvent::RenderFailed {
                request_id,
                primary,
                fallback,
            } => warn!(%request_id, primary = %primary, fallback = %fallback, "all backends failed"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
