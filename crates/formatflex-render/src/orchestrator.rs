// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render orchestrator — primary backend first, lightweight fallback second.
//
// Exactly one primary attempt per request. The fallback runs only when the
// primary failed, and neither backend is retried against itself.

use std::sync::Arc;

use tracing::{debug, instrument};

use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::{BackendKind, PageSpec, RequestId};

use crate::backend::{RenderOptions, Renderer};
use crate::events::{EventSink, PipelineEvent, TracingSink};

/// Result of one backend attempt: PDF bytes or the failure message.
pub type Attempt = std::result::Result<Vec<u8>, String>;

/// Combined result of the primary and (possibly) fallback attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered {
        bytes: Vec<u8>,
        backend: BackendKind,
        /// Why the primary failed, when the fallback produced the bytes.
        primary_failure: Option<String>,
    },
    Failed {
        primary: String,
        fallback: String,
    },
}

impl RenderOutcome {
    /// Combine attempt results, each tagged with the backend that made it.
    /// `fallback` is `None` when no fallback ran.
    pub fn decide(
        primary: (BackendKind, Attempt),
        fallback: Option<(BackendKind, Attempt)>,
    ) -> Self {
        match (primary, fallback) {
            ((backend, Ok(bytes)), _) => Self::Rendered {
                bytes,
                backend,
                primary_failure: None,
            },
            ((_, Err(primary)), Some((backend, Ok(bytes)))) => Self::Rendered {
                bytes,
                backend,
                primary_failure: Some(primary),
            },
            ((_, Err(primary)), Some((_, Err(fallback)))) => Self::Failed { primary, fallback },
            ((_, Err(primary)), None) => Self::Failed {
                primary,
                fallback: "not attempted".to_string(),
            },
        }
    }

    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            Self::Rendered { backend, .. } => Some(*backend),
            Self::Failed { .. } => None,
        }
    }

    /// PDF bytes and the backend that produced them, or a failure carrying
    /// both backends' messages.
    pub fn into_result(self) -> Result<(Vec<u8>, BackendKind)> {
        match self {
            Self::Rendered { bytes, backend, .. } => Ok((bytes, backend)),
            Self::Failed { primary, fallback } => {
                Err(FormatFlexError::RenderFailed { primary, fallback })
            }
        }
    }
}

/// Runs the primary renderer, and the fallback only if the primary fails.
pub struct RenderOrchestrator<P, F> {
    primary: P,
    fallback: F,
    events: Arc<dyn EventSink>,
}

impl<P: Renderer, F: Renderer> RenderOrchestrator<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[instrument(skip_all, fields(%request_id))]
    pub async fn render(
        &self,
        request_id: RequestId,
        markup: &str,
        page: &PageSpec,
        options: &RenderOptions,
    ) -> RenderOutcome {
        let primary = self.attempt(&self.primary, request_id, markup, page, options).await;
        let fallback = match &primary {
            Ok(_) => None,
            Err(_) => Some((
                self.fallback.kind(),
                self.attempt(&self.fallback, request_id, markup, page, options).await,
            )),
        };
        RenderOutcome::decide((self.primary.kind(), primary), fallback)
    }

    async fn attempt<R: Renderer>(
        &self,
        renderer: &R,
        request_id: RequestId,
        markup: &str,
        page: &PageSpec,
        options: &RenderOptions,
    ) -> Attempt {
        let backend = renderer.kind();
        debug!(%backend, "attempting render");
        renderer.render(markup, page, options).await.map_err(|e| {
            let reason = e.to_string();
            self.events.emit(&PipelineEvent::BackendFailed {
                request_id,
                backend,
                reason: reason.clone(),
            });
            reason
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use formatflex_core::types::{Length, Margin, PageFormat, PaperSize};

    use crate::events::RecordingSink;

    struct Scripted {
        kind: BackendKind,
        result: std::result::Result<&'static [u8], &'static str>,
        calls: AtomicUsize,
        pages: Mutex<Vec<PageSpec>>,
    }

    impl Scripted {
        fn new(kind: BackendKind, result: std::result::Result<&'static [u8], &'static str>) -> Self {
            Self {
                kind,
                result,
                calls: AtomicUsize::new(0),
                pages: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Renderer for Scripted {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn render(&self, _markup: &str, page: &PageSpec, _options: &RenderOptions) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.lock().unwrap().push(*page);
            self.result
                .map(<[u8]>::to_vec)
                .map_err(|reason| FormatFlexError::backend(self.kind, reason))
        }
    }

    fn page() -> PageSpec {
        PageSpec {
            format: PageFormat::Named(PaperSize::A5),
            margin: Margin::uniform(Length::inches(0.5)),
        }
    }

    #[test]
    fn decide_is_total() {
        use BackendKind::{Browser, Lightweight};
        let ok = |kind| (kind, Ok(b"pdf".to_vec()));
        let err = |kind, m: &str| (kind, Err(m.to_string()));

        assert_eq!(RenderOutcome::decide(ok(Browser), None).backend(), Some(Browser));
        assert_eq!(
            RenderOutcome::decide(err(Browser, "p"), Some(ok(Lightweight))).backend(),
            Some(Lightweight)
        );
        assert_eq!(
            RenderOutcome::decide(err(Browser, "p"), Some(err(Lightweight, "f"))),
            RenderOutcome::Failed {
                primary: "p".into(),
                fallback: "f".into(),
            }
        );
        assert!(RenderOutcome::decide(err(Browser, "p"), None).into_result().is_err());
    }

    #[tokio::test]
    async fn outcome_names_the_backends_actually_wired() {
        let primary = Scripted::new(BackendKind::Lightweight, Err("disk full"));
        let fallback = Scripted::new(BackendKind::Browser, Ok(b"%PDF-browser"));
        let orchestrator = RenderOrchestrator::new(&primary, &fallback);

        let outcome = orchestrator
            .render(RequestId::new(), "<p>x</p>", &page(), &RenderOptions::default())
            .await;
        assert_eq!(outcome.backend(), Some(BackendKind::Browser));

        let winner = Scripted::new(BackendKind::Lightweight, Ok(b"%PDF-light"));
        let unused = Scripted::new(BackendKind::Browser, Ok(b"%PDF-browser"));
        let outcome = RenderOrchestrator::new(&winner, &unused)
            .render(RequestId::new(), "<p>x</p>", &page(), &RenderOptions::default())
            .await;
        assert_eq!(outcome.backend(), Some(BackendKind::Lightweight));
    }

    #[tokio::test]
    async fn primary_success_never_touches_fallback() {
        let primary = Scripted::new(BackendKind::Browser, Ok(b"%PDF-primary"));
        let fallback = Scripted::new(BackendKind::Lightweight, Ok(b"%PDF-fallback"));
        let orchestrator = RenderOrchestrator::new(&primary, &fallback);

        let outcome = orchestrator
            .render(RequestId::new(), "<p>x</p>", &page(), &RenderOptions::default())
            .await;
        let (bytes, backend) = outcome.into_result().unwrap();
        assert_eq!(bytes, b"%PDF-primary");
        assert_eq!(backend, BackendKind::Browser);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn fallback_gets_same_geometry() {
        let primary = Scripted::new(BackendKind::Browser, Err("engine missing"));
        let fallback = Scripted::new(BackendKind::Lightweight, Ok(b"%PDF-fallback"));
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = RenderOrchestrator::new(&primary, &fallback).with_events(sink.clone());

        let outcome = orchestrator
            .render(RequestId::new(), "<p>x</p>", &page(), &RenderOptions::default())
            .await;

        match &outcome {
            RenderOutcome::Rendered {
                backend,
                primary_failure,
                ..
            } => {
                assert_eq!(*backend, BackendKind::Lightweight);
                assert!(primary_failure.as_deref().unwrap().contains("engine missing"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(*primary.pages.lock().unwrap(), *fallback.pages.lock().unwrap());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            PipelineEvent::BackendFailed {
                backend: BackendKind::Browser,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn both_failing_reports_both_messages() {
        let primary = Scripted::new(BackendKind::Browser, Err("navigation timed out"));
        let fallback = Scripted::new(BackendKind::Lightweight, Err("no printable area"));
        let orchestrator = RenderOrchestrator::new(&primary, &fallback);

        let err = orchestrator
            .render(RequestId::new(), "<p>x</p>", &page(), &RenderOptions::default())
            .await
            .into_result()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("navigation timed out"), "{msg}");
        assert!(msg.contains("no printable area"), "{msg}");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }
}
