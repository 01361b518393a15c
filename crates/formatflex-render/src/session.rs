// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Browser sessions — one isolated headless engine instance per request.
//
// A session owns a private profile and work directory. `close` releases it;
// dropping an unclosed session still kills any running engine process
// (`kill_on_drop`) and removes the directory.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use formatflex_core::config::ServiceConfig;
use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::BackendKind;

use crate::browser::insert_into_head;

const DOCUMENT_FILE: &str = "document.html";
const OUTPUT_FILE: &str = "document.pdf";
/// Engine log lines kept for error messages.
const LOG_TAIL_LINES: usize = 8;

/// Console line the staged document writes once its content has loaded.
pub const READY_MARKER: &str = "formatflex:content-loaded";

/// One live engine instance.
pub trait BrowserSession: Send {
    /// Load `markup` and wait until the document reports its content loaded.
    /// Callers bound the wait.
    fn set_content(&mut self, markup: &str) -> impl Future<Output = Result<()>> + Send;

    /// Paginate the loaded document to PDF. Page size, margins and margin
    /// boxes come from the document's own `@page` rules.
    fn print_pdf(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Release the session. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Hands out fresh sessions.
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    fn launch(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

fn browser_error(reason: impl Into<String>) -> FormatFlexError {
    FormatFlexError::backend(BackendKind::Browser, reason)
}

/// Script that announces content-loaded on the engine's console log.
fn readiness_beacon() -> String {
    format!(
        "<script data-formatflex=\"ready\">\
         document.addEventListener('DOMContentLoaded', () => console.log('{READY_MARKER}'));\
         </script>\n"
    )
}

// -- Chromium -----------------------------------------------------------------

/// Launches headless Chromium sessions.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: PathBuf,
    args: Vec<String>,
}

impl ChromiumLauncher {
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.chromium_path, config.browser_args.clone())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl SessionLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession> {
        let workdir = tempfile::Builder::new()
            .prefix("formatflex-session-")
            .tempdir()
            .map_err(|e| browser_error(format!("cannot create session directory: {e}")))?;
        debug!(path = %workdir.path().display(), "browser session prepared");

        Ok(ChromiumSession {
            executable: self.executable.clone(),
            args: self.args.clone(),
            workdir: Some(workdir),
            engine: None,
        })
    }
}

/// The engine process serving one session, with its log stream.
struct Engine {
    child: Child,
    log: Lines<BufReader<ChildStderr>>,
    tail: VecDeque<String>,
    loaded: bool,
}

impl Engine {
    async fn next_line(&mut self) -> Result<Option<String>> {
        let line = self
            .log
            .next_line()
            .await
            .map_err(|e| browser_error(format!("cannot read engine log: {e}")))?;
        if let Some(line) = &line {
            if self.tail.len() == LOG_TAIL_LINES {
                self.tail.pop_front();
            }
            self.tail.push_back(line.clone());
        }
        Ok(line)
    }

    fn tail(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    async fn shutdown(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill().await {
                warn!(error = %e, "failed to stop browser engine");
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pid", &self.child.id())
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

/// A headless Chromium session: a private temporary directory and at most
/// one engine process, which loads the staged document once and paginates
/// that same document.
#[derive(Debug)]
pub struct ChromiumSession {
    executable: PathBuf,
    args: Vec<String>,
    workdir: Option<TempDir>,
    engine: Option<Engine>,
}

impl ChromiumSession {
    fn workdir(&self) -> Result<&Path> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| browser_error("session already closed"))
    }

    fn engine_args(&self) -> Result<Vec<String>> {
        let dir = self.workdir()?;
        Ok(vec![
            "--headless".to_string(),
            format!("--user-data-dir={}", dir.join("profile").display()),
            "--enable-logging=stderr".to_string(),
            "--log-level=0".to_string(),
            format!("--print-to-pdf={}", dir.join(OUTPUT_FILE).display()),
            "--no-pdf-header-footer".to_string(),
            "--print-to-pdf-no-header".to_string(),
            "--run-all-compositor-stages-before-draw".to_string(),
            format!("file://{}", dir.join(DOCUMENT_FILE).display()),
        ])
    }

    fn spawn(&self) -> Result<Engine> {
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .args(self.engine_args()?)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| browser_error(format!("failed to start {}: {e}", self.executable.display())))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| browser_error("engine log stream unavailable"))?;
        info!(pid = child.id(), "browser engine started");
        Ok(Engine {
            child,
            log: BufReader::new(stderr).lines(),
            tail: VecDeque::with_capacity(LOG_TAIL_LINES),
            loaded: false,
        })
    }
}

impl BrowserSession for ChromiumSession {
    async fn set_content(&mut self, markup: &str) -> Result<()> {
        if self.engine.is_some() {
            return Err(browser_error("session already holds a document"));
        }
        let path = self.workdir()?.join(DOCUMENT_FILE);
        tokio::fs::write(&path, insert_into_head(markup, &readiness_beacon())).await?;

        let engine = self.spawn()?;
        let engine = self.engine.insert(engine);
        while let Some(line) = engine.next_line().await? {
            if line.contains(READY_MARKER) {
                engine.loaded = true;
                debug!("document reached content-loaded");
                return Ok(());
            }
        }

        let status = engine.child.wait().await?;
        Err(browser_error(format!(
            "engine exited with {status} before content-loaded: {}",
            engine.tail()
        )))
    }

    async fn print_pdf(&mut self) -> Result<Vec<u8>> {
        let output_path = self.workdir()?.join(OUTPUT_FILE);
        let engine = match self.engine.as_mut() {
            Some(engine) if engine.loaded => engine,
            _ => return Err(browser_error("print requested before a document was loaded")),
        };

        // Drain the log so the engine never blocks on a full pipe.
        while engine.next_line().await?.is_some() {}
        let status = engine.child.wait().await?;
        if !status.success() {
            return Err(browser_error(format!(
                "pagination exited with {status}: {}",
                engine.tail()
            )));
        }

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|e| browser_error(format!("no PDF produced: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(browser_error("engine output is not a PDF"));
        }
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut engine) = self.engine.take() {
            engine.shutdown().await;
        }
        let Some(dir) = self.workdir.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| browser_error(format!("session cleanup task failed: {e}")))??;
        debug!("browser session closed");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // `kill_on_drop` stops a still-running engine.
        if let Some(dir) = self.workdir.take() {
            warn!(path = %dir.path().display(), "browser session dropped without close, cleaning up");
            if let Err(e) = dir.close() {
                warn!(error = %e, "session directory cleanup failed");
            }
        }
    }
}
