// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Browser renderer — the primary backend.
//
// Each render acquires a fresh session, loads the document with a print
// stylesheet injected, paginates that loaded document, and releases the
// session on every exit path. Content load and pagination are bounded by
// independent timeouts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use formatflex_core::config::ServiceConfig;
use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::{BackendKind, PageSpec};
use formatflex_document::style::css_string;

use crate::backend::{RenderOptions, Renderer};
use crate::session::{BrowserSession, ChromiumLauncher, SessionLauncher};

/// Default bound for both the load and paginate steps.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Independent upper bounds for the two engine steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserTimeouts {
    pub load: Duration,
    pub paginate: Duration,
}

impl Default for BrowserTimeouts {
    fn default() -> Self {
        Self {
            load: DEFAULT_STEP_TIMEOUT,
            paginate: DEFAULT_STEP_TIMEOUT,
        }
    }
}

impl BrowserTimeouts {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            load: config.load_timeout(),
            paginate: config.paginate_timeout(),
        }
    }
}

/// Renders through a headless browser engine obtained from `L`.
pub struct BrowserRenderer<L> {
    launcher: L,
    timeouts: BrowserTimeouts,
    sessions: Option<Arc<Semaphore>>,
}

impl BrowserRenderer<ChromiumLauncher> {
    /// Chromium renderer with timeouts and session cap from `config`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let renderer = Self::new(
            ChromiumLauncher::from_config(config),
            BrowserTimeouts::from_config(config),
        );
        match config.max_concurrent_sessions {
            Some(limit) => renderer.with_session_limit(limit),
            None => renderer,
        }
    }
}

impl<L: SessionLauncher> BrowserRenderer<L> {
    pub fn new(launcher: L, timeouts: BrowserTimeouts) -> Self {
        Self {
            launcher,
            timeouts,
            sessions: None,
        }
    }

    /// Allow at most `limit` sessions at once; extra renders wait for a slot.
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.sessions = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    pub fn timeouts(&self) -> BrowserTimeouts {
        self.timeouts
    }

    /// Load then paginate. Never closes the session; the caller does.
    async fn drive(&self, session: &mut L::Session, document: &str) -> Result<Vec<u8>> {
        let load = self.timeouts.load;
        timeout(load, session.set_content(document))
            .await
            .map_err(|_| {
                FormatFlexError::backend(
                    BackendKind::Browser,
                    format!("content load timed out after {}ms", load.as_millis()),
                )
            })??;
        debug!("content loaded, paginating");

        let paginate = self.timeouts.paginate;
        let bytes = timeout(paginate, session.print_pdf())
            .await
            .map_err(|_| {
                FormatFlexError::backend(
                    BackendKind::Browser,
                    format!("pagination timed out after {}ms", paginate.as_millis()),
                )
            })??;
        Ok(bytes)
    }
}

impl<L: SessionLauncher> Renderer for BrowserRenderer<L> {
    fn kind(&self) -> BackendKind {
        BackendKind::Browser
    }

    #[instrument(skip_all, fields(markup_len = markup.len()))]
    async fn render(&self, markup: &str, page: &PageSpec, options: &RenderOptions) -> Result<Vec<u8>> {
        let _slot = match &self.sessions {
            Some(sessions) => Some(sessions.acquire().await.map_err(|_| {
                FormatFlexError::backend(BackendKind::Browser, "session pool closed")
            })?),
            None => None,
        };

        let document = with_print_stylesheet(markup, page, options);

        let load = self.timeouts.load;
        let mut session = timeout(load, self.launcher.launch())
            .await
            .map_err(|_| {
                FormatFlexError::backend(
                    BackendKind::Browser,
                    format!("engine launch timed out after {}ms", load.as_millis()),
                )
            })??;

        let outcome = self.drive(&mut session, &document).await;

        // Release regardless of outcome; a close failure never masks the result.
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser session close failed");
        }

        if let Ok(bytes) = &outcome {
            info!(bytes = bytes.len(), "browser rendered PDF");
        }
        outcome
    }
}

/// Print rules for `page`, plus running header/footer margin boxes when
/// enabled and not already present in `markup`.
pub fn print_stylesheet(markup: &str, page: &PageSpec, options: &RenderOptions) -> String {
    let mut page_rule = format!(
        "size: {}; margin: {};",
        page.format.css_size(),
        page.margin.css()
    );
    let boxes = [
        ("top-center", options.header.as_deref()),
        ("bottom-center", options.footer.as_deref()),
    ];
    for (position, text) in boxes {
        if let Some(text) = text {
            if !markup.contains(&format!("@{position}")) {
                page_rule.push_str(&format!(
                    " @{position} {{ content: \"{}\"; font-size: 9pt; }}",
                    css_string(text)
                ));
            }
        }
    }

    format!(
        "<style data-formatflex=\"print\">\n\
         @page {{ {page_rule} }}\n\
         html, body {{ -webkit-print-color-adjust: exact; print-color-adjust: exact; }}\n\
         </style>\n"
    )
}

/// Insert [`print_stylesheet`] into `markup`.
pub fn with_print_stylesheet(markup: &str, page: &PageSpec, options: &RenderOptions) -> String {
    insert_into_head(markup, &print_stylesheet(markup, page, options))
}

/// Insert `fragment` at the end of `<head>`, or at the start when there is
/// no head.
pub(crate) fn insert_into_head(markup: &str, fragment: &str) -> String {
    // ASCII lowercasing keeps byte offsets intact.
    match markup.to_ascii_lowercase().find("</head>") {
        Some(at) => {
            let mut out = String::with_capacity(markup.len() + fragment.len());
            out.push_str(&markup[..at]);
            out.push_str(fragment);
            out.push_str(&markup[at..]);
            out
        }
        None => format!("{fragment}{markup}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use formatflex_core::types::{Length, Margin, PageFormat, PaperSize};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Script {
        Succeed,
        FailLaunch,
        FailLoad,
        FailPrint,
        HangLoad,
        HangPrint,
    }

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        closes: AtomicUsize,
        live: AtomicUsize,
        peak: AtomicUsize,
        prints: AtomicUsize,
        loaded: Mutex<Vec<String>>,
    }

    struct MockLauncher {
        script: Script,
        counters: Arc<Counters>,
    }

    struct MockSession {
        script: Script,
        counters: Arc<Counters>,
        has_document: bool,
        closed: bool,
    }

    impl SessionLauncher for MockLauncher {
        type Session = MockSession;

        async fn launch(&self) -> Result<MockSession> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            if self.script == Script::FailLaunch {
                return Err(FormatFlexError::backend(BackendKind::Browser, "no engine"));
            }
            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(live, Ordering::SeqCst);
            Ok(MockSession {
                script: self.script,
                counters: Arc::clone(&self.counters),
                has_document: false,
                closed: false,
            })
        }
    }

    impl BrowserSession for MockSession {
        async fn set_content(&mut self, markup: &str) -> Result<()> {
            self.counters.loaded.lock().unwrap().push(markup.to_string());
            self.has_document = true;
            match self.script {
                Script::FailLoad => Err(FormatFlexError::backend(BackendKind::Browser, "bad markup")),
                Script::HangLoad => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        async fn print_pdf(&mut self) -> Result<Vec<u8>> {
            assert!(self.has_document, "printed a session with no document");
            self.counters.prints.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent renders overlap.
            tokio::time::sleep(Duration::from_millis(10)).await;
            match self.script {
                Script::FailPrint => Err(FormatFlexError::backend(BackendKind::Browser, "crashed")),
                Script::HangPrint => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                _ => Ok(b"%PDF-1.7 mock".to_vec()),
            }
        }

        async fn close(&mut self) -> Result<()> {
            if !self.closed {
                self.closed = true;
                self.counters.closes.fetch_add(1, Ordering::SeqCst);
                self.counters.live.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn renderer(script: Script) -> (BrowserRenderer<MockLauncher>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let launcher = MockLauncher {
            script,
            counters: Arc::clone(&counters),
        };
        (BrowserRenderer::new(launcher, BrowserTimeouts::default()), counters)
    }

    fn six_by_nine() -> PageSpec {
        PageSpec {
            format: PageFormat::Custom {
                width: Length::inches(6.0),
                height: Length::inches(9.0),
            },
            margin: Margin::uniform(Length::inches(1.0)),
        }
    }

    const MARKUP: &str = "<html><head><title>T</title></head><body><p>x</p></body></html>";

    #[tokio::test]
    async fn success_releases_session_once() {
        let (renderer, counters) = renderer(Script::Succeed);
        let bytes = renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn document_is_loaded_once_and_paginated_in_same_session() {
        let (renderer, counters) = renderer(Script::Succeed);
        renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(counters.loaded.lock().unwrap().len(), 1);
        assert_eq!(counters.prints.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_never_paginates() {
        let (renderer, counters) = renderer(Script::FailLoad);
        let _ = renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await;
        assert_eq!(counters.prints.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_release_session_once() {
        for script in [Script::FailLoad, Script::FailPrint] {
            let (renderer, counters) = renderer(script);
            let result = renderer
                .render(MARKUP, &six_by_nine(), &RenderOptions::default())
                .await;
            assert!(result.is_err(), "{script:?}");
            assert_eq!(counters.closes.load(Ordering::SeqCst), 1, "{script:?}");
        }
    }

    #[tokio::test]
    async fn launch_failure_has_nothing_to_release() {
        let (renderer, counters) = renderer(Script::FailLaunch);
        let err = renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no engine"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn load_timeout_is_a_failure_and_releases() {
        let (renderer, counters) = renderer(Script::HangLoad);
        let err = renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content load timed out after 30000ms"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paginate_timeout_is_independent() {
        let counters = Arc::new(Counters::default());
        let launcher = MockLauncher {
            script: Script::HangPrint,
            counters: Arc::clone(&counters),
        };
        let timeouts = BrowserTimeouts {
            load: Duration::from_secs(30),
            paginate: Duration::from_secs(5),
        };
        let renderer = BrowserRenderer::new(launcher, timeouts);
        let err = renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pagination timed out after 5000ms"));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loaded_document_carries_page_rules() {
        let (renderer, counters) = renderer(Script::Succeed);
        renderer
            .render(MARKUP, &six_by_nine(), &RenderOptions::default())
            .await
            .unwrap();
        let loaded = counters.loaded.lock().unwrap();
        let document = &loaded[0];
        assert!(document.contains("size: 6in 9in; margin: 1in 1in 1in 1in;"));
        assert!(document.contains("print-color-adjust: exact"));
        assert!(document.find("data-formatflex").unwrap() < document.find("</head>").unwrap());
    }

    #[tokio::test]
    async fn session_limit_bounds_concurrency() {
        let counters = Arc::new(Counters::default());
        let launcher = MockLauncher {
            script: Script::Succeed,
            counters: Arc::clone(&counters),
        };
        let renderer =
            Arc::new(BrowserRenderer::new(launcher, BrowserTimeouts::default()).with_session_limit(2));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let renderer = Arc::clone(&renderer);
            handles.push(tokio::spawn(async move {
                renderer
                    .render(MARKUP, &six_by_nine(), &RenderOptions::default())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(counters.launches.load(Ordering::SeqCst), 6);
        assert!(counters.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn margin_boxes_only_when_enabled_and_missing() {
        let page = six_by_nine();
        let none = print_stylesheet(MARKUP, &page, &RenderOptions::default());
        assert!(!none.contains("@top-center"));

        let options = RenderOptions {
            header: Some("Head \"1\"".into()),
            footer: Some("Foot".into()),
            ..RenderOptions::default()
        };
        let added = print_stylesheet(MARKUP, &page, &options);
        assert!(added.contains(r#"@top-center { content: "Head \"1\""; font-size: 9pt; }"#));
        assert!(added.contains("@bottom-center"));

        let existing = "<style>@page { @top-center { content: \"x\" } }</style>";
        let skipped = print_stylesheet(existing, &page, &options);
        assert!(!skipped.contains("@top-center"));
        assert!(skipped.contains("@bottom-center"));
    }

    #[test]
    fn stylesheet_prepended_without_head() {
        let out = with_print_stylesheet("<p>bare</p>", &six_by_nine(), &RenderOptions::default());
        assert!(out.starts_with("<style data-formatflex"));
        assert!(out.ends_with("<p>bare</p>"));
    }

    #[test]
    fn config_timeouts_are_independent() {
        let config = ServiceConfig {
            load_timeout_ms: 1_500,
            paginate_timeout_ms: 45_000,
            max_concurrent_sessions: Some(3),
            ..ServiceConfig::default()
        };
        let renderer = BrowserRenderer::from_config(&config);
        assert_eq!(renderer.timeouts().load, Duration::from_millis(1_500));
        assert_eq!(renderer.timeouts().paginate, Duration::from_secs(45));
        assert_eq!(renderer.sessions.as_ref().map(|s| s.available_permits()), Some(3));
    }

    #[test]
    fn paper_size_keyword_is_used_for_named_formats() {
        let page = PageSpec {
            format: PageFormat::Named(PaperSize::Letter),
            margin: Margin::uniform(Length::inches(0.5)),
        };
        let css = print_stylesheet("", &page, &RenderOptions::default());
        assert!(css.contains("size: letter; margin: 0.5in 0.5in 0.5in 0.5in;"));
    }
}
