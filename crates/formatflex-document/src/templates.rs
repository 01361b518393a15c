// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template skeletons — where document markup comes from.
//
// A template is an HTML skeleton containing `{{TOKEN}}` placeholders. Sources
// may not have every template; the composer substitutes the base skeleton
// when a lookup misses.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Skeleton used whenever the requested template cannot be loaded.
pub const BASE_SKELETON: &str = include_str!("../templates/base.html");

const EBOOK_SKELETON: &str = include_str!("../templates/ebook.html");
const PAPERBACK_SKELETON: &str = include_str!("../templates/paperback.html");

/// The templates the editor offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Screen-oriented: themed background, chapters on new pages.
    Ebook,
    /// Print-oriented: trade sizes, print font sizes, recto chapter starts.
    Paperback,
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ebook" => Some(Self::Ebook),
            "paperback" => Some(Self::Paperback),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ebook => "ebook",
            Self::Paperback => "paperback",
        }
    }
}

/// Anything that can hand out template skeletons by name.
pub trait TemplateSource {
    /// Return the skeleton for `name`, or `None` when not available.
    fn load_template(&self, name: &str) -> Option<String>;
}

/// Skeletons compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateSource for BuiltinTemplates {
    fn load_template(&self, name: &str) -> Option<String> {
        match TemplateKind::from_name(name)? {
            TemplateKind::Ebook => Some(EBOOK_SKELETON.to_string()),
            TemplateKind::Paperback => Some(PAPERBACK_SKELETON.to_string()),
        }
    }
}

/// Skeletons read from `<dir>/<name>.html` on every lookup.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load_template(&self, name: &str) -> Option<String> {
        // Plain names only: no separators, no dots.
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            debug!(name, "rejecting template name");
            return None;
        }
        let path = self.dir.join(format!("{name}.html"));
        match fs::read_to_string(&path) {
            Ok(skeleton) => Some(skeleton),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "template not readable");
                None
            }
        }
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for &T {
    fn load_template(&self, name: &str) -> Option<String> {
        (**self).load_template(name)
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for Box<T> {
    fn load_template(&self, name: &str) -> Option<String> {
        (**self).load_template(name)
    }
}
