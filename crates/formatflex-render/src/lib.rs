// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// formatflex-render — PDF backends and the export pipeline.
//
// The browser backend drives a headless engine session per request; the
// lightweight backend writes PDFs directly. The orchestrator tries them in
// that order, and the pipeline wires classification, style, layout and
// composition in front of it.

pub mod backend;
pub mod browser;
pub mod events;
pub mod lightweight;
pub mod orchestrator;
pub mod pipeline;
pub mod session;

pub use backend::{RenderOptions, Renderer};
pub use browser::{BrowserRenderer, BrowserTimeouts};
pub use events::{EventSink, PipelineEvent, RecordingSink, TracingSink};
pub use lightweight::LightweightRenderer;
pub use orchestrator::{RenderOrchestrator, RenderOutcome};
pub use pipeline::{
    DefaultPipeline, ExportMode, ExportRequest, ManuscriptPipeline, ServiceStatus, status,
};
pub use session::{BrowserSession, ChromiumLauncher, ChromiumSession, SessionLauncher};
