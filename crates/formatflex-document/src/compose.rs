// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document composer — classified blocks + resolved style + page geometry +
// template skeleton → one self-contained HTML document.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, instrument};

use formatflex_core::types::{Block, BlockKind, ComposedDocument, PageSpec};

use crate::style::ResolvedStyleSpec;
use crate::templates::{BASE_SKELETON, TemplateSource};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}")
        .unwrap_or_else(|e| panic!("invalid placeholder regex: {e}"))
});

/// What went into a composed document.
#[derive(Debug, Clone)]
pub struct Composition {
    pub document: ComposedDocument,
    /// Template that was asked for.
    pub template: &'static str,
    /// True when the requested template was unavailable and the base
    /// skeleton was used instead.
    pub used_base_skeleton: bool,
}

/// Builds documents from skeletons supplied by a [`TemplateSource`].
pub struct DocumentComposer<S> {
    source: S,
}

impl<S: TemplateSource> DocumentComposer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Compose a document. Never fails: a missing template degrades to the
    /// base skeleton and unknown placeholders stay as literal text.
    #[instrument(skip_all, fields(blocks = blocks.len(), template = style.template.name()))]
    pub fn compose(
        &self,
        blocks: &[Block],
        style: &ResolvedStyleSpec,
        page: &PageSpec,
        title: &str,
        author: Option<&str>,
    ) -> Composition {
        let template = style.template.name();
        let (skeleton, used_base_skeleton) = match self.source.load_template(template) {
            Some(skeleton) => (Cow::Owned(skeleton), false),
            None => (Cow::Borrowed(BASE_SKELETON), true),
        };

        let mut values: HashMap<&'static str, String> = style.placeholders().into_iter().collect();
        values.insert("TITLE", escape_html(title));
        values.insert("AUTHOR", escape_html(author.unwrap_or_default()));
        values.insert("CONTENT", render_blocks(blocks));
        values.insert("PAGE_SIZE", page.format.css_size());
        values.insert("PAGE_MARGIN", page.margin.css());

        let markup = substitute(&skeleton, &values);
        debug!(bytes = markup.len(), used_base_skeleton, "document composed");

        Composition {
            document: ComposedDocument {
                markup,
                title: title.to_string(),
            },
            template,
            used_base_skeleton,
        }
    }
}

/// Replace every `{{TOKEN}}` whose upper-cased name has a value. One pass:
/// inserted values are never scanned for further placeholders.
pub fn substitute(skeleton: &str, values: &HashMap<&'static str, String>) -> String {
    PLACEHOLDER
        .replace_all(skeleton, |caps: &Captures<'_>| {
            let name = caps[1].to_ascii_uppercase();
            match values.get(name.as_str()) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Serialise blocks in order: chapters as `h1`, sections as `h2`, body as `p`.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut html = String::new();
    for block in blocks {
        let text = escape_html(&block.text);
        let element = match block.kind {
            BlockKind::ChapterHeading => format!("<h1 class=\"chapter-heading\">{text}</h1>\n"),
            BlockKind::SectionHeading => format!("<h2 class=\"section-heading\">{text}</h2>\n"),
            BlockKind::Body => format!("<p class=\"body-text\">{text}</p>\n"),
        };
        html.push_str(&element);
    }
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
