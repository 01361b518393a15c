// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lightweight renderer — a non-browser HTML to PDF path built on `printpdf` 0.8.
//
// Only the structure the composer emits is understood: the title and author
// lines, chapter and section headings, and body paragraphs. Colours, web fonts
// and backgrounds are not reproduced; page size, margins, type sizes, line
// spacing and running header/footer text are.

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, info, instrument};

use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::{BackendKind, PageSpec, RawManuscript};
use formatflex_document::style::FontScale;

use crate::backend::{RenderOptions, Renderer};

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.50;
/// Millimetres per point.
const MM_PER_PT: f32 = 0.3528;
/// Smallest printable width or height, in millimetres, before giving up.
const MIN_PRINTABLE_MM: f32 = 10.0;
/// Running header/footer size in points.
const RUNNING_TEXT_PT: f32 = 9.0;

// -- Markup extraction --------------------------------------------------------

/// What a piece of extracted text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Title,
    Author,
    Chapter,
    Section,
    Body,
}

/// One printable element pulled out of the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub role: Role,
    pub text: String,
}

/// Printable content of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub title: Option<String>,
    pub elements: Vec<Element>,
}

/// Parse `markup` and collect the title plus headings and paragraphs in
/// document order. Comments, scripts and stylesheets contribute nothing, and
/// character references are decoded by the parser.
///
/// Empty elements are dropped, so an absent author line leaves no gap.
pub fn extract(markup: &str) -> Extracted {
    let dom = parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .one(markup.as_bytes());
    let mut extracted = Extracted::default();
    walk(&dom.document, &mut extracted);
    extracted
}

/// Headings and paragraphs of `markup`, in document order.
pub fn extract_elements(markup: &str) -> Vec<Element> {
    extract(markup).elements
}

/// Document title from `<title>`, if present and non-empty.
pub fn extract_title(markup: &str) -> Option<String> {
    extract(markup).title
}

fn walk(handle: &Handle, out: &mut Extracted) {
    if let NodeData::Element {
        ref name, ref attrs, ..
    } = handle.data
    {
        let tag = &*name.local;
        let has_class = |wanted: &str| {
            attrs.borrow().iter().any(|attr| {
                &*attr.name.local == "class"
                    && attr.value.split_whitespace().any(|c| c == wanted)
            })
        };

        let role = match tag {
            "script" | "style" | "noscript" | "template" => return,
            "title" => {
                if out.title.is_none() {
                    out.title = Some(text_content(handle)).filter(|t| !t.is_empty());
                }
                return;
            }
            "h1" if has_class("title") => Some(Role::Title),
            "h1" => Some(Role::Chapter),
            "h2" => Some(Role::Section),
            "p" if has_class("author") => Some(Role::Author),
            "p" => Some(Role::Body),
            _ => None,
        };
        if let Some(role) = role {
            let text = text_content(handle);
            if !text.is_empty() {
                out.elements.push(Element { role, text });
            }
            return;
        }
    }

    for child in handle.children.borrow().iter() {
        walk(child, out);
    }
}

/// Concatenated descendant text with whitespace collapsed.
fn text_content(handle: &Handle) -> String {
    let mut raw = String::new();
    collect_text(handle, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(handle: &Handle, out: &mut String) {
    match handle.data {
        NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
        NodeData::Element { ref name, .. }
            if matches!(&*name.local, "script" | "style") => {}
        NodeData::Element { ref name, .. } if &*name.local == "br" => out.push(' '),
        _ => {
            for child in handle.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

// -- Page geometry ------------------------------------------------------------

/// Page size and printable box, in points from the bottom-left corner.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    page_w: Mm,
    page_h: Mm,
    left: f32,
    usable_w: f32,
    top: f32,
    bottom: f32,
    page_h_pt: f32,
}

impl Geometry {
    fn from_page(page: &PageSpec) -> Result<Self> {
        let (w_mm, h_mm) = page.format.dimensions_mm();
        let margin = &page.margin;
        let (top, right, bottom, left) = (
            margin.top.to_mm(),
            margin.right.to_mm(),
            margin.bottom.to_mm(),
            margin.left.to_mm(),
        );
        let usable_w_mm = w_mm - left - right;
        let usable_h_mm = h_mm - top - bottom;
        if !(usable_w_mm.is_finite() && usable_h_mm.is_finite())
            || usable_w_mm < MIN_PRINTABLE_MM
            || usable_h_mm < MIN_PRINTABLE_MM
        {
            return Err(FormatFlexError::backend(
                BackendKind::Lightweight,
                format!("margins leave no printable area on a {w_mm}x{h_mm}mm page"),
            ));
        }

        let page_h_pt = Mm(h_mm).into_pt().0;
        Ok(Self {
            page_w: Mm(w_mm),
            page_h: Mm(h_mm),
            left: Mm(left).into_pt().0,
            usable_w: Mm(usable_w_mm).into_pt().0,
            top: page_h_pt - Mm(top).into_pt().0,
            bottom: Mm(bottom).into_pt().0,
            page_h_pt,
        })
    }

    /// Approximate characters that fit on one line at `size` points.
    fn chars_per_line(&self, size: f32) -> usize {
        let glyph_mm = AVG_GLYPH_WIDTH * size * MM_PER_PT;
        let usable_mm = self.usable_w * MM_PER_PT;
        ((usable_mm / glyph_mm) as usize).max(1)
    }

    /// X position that roughly centres `text` in the printable box.
    fn centred_x(&self, text: &str, size: f32) -> f32 {
        let width = text.chars().count() as f32 * AVG_GLYPH_WIDTH * size;
        self.left + ((self.usable_w - width) / 2.0).max(0.0)
    }
}

// -- Typesetting --------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: BuiltinFont,
    size: f32,
    space_before: f32,
    space_after: f32,
    centred: bool,
    new_page: bool,
}

#[derive(Debug, Clone, Copy)]
struct Fonts {
    regular: BuiltinFont,
    bold: BuiltinFont,
}

impl Fonts {
    fn for_options(options: &RenderOptions) -> Self {
        if options.serif {
            Self {
                regular: BuiltinFont::TimesRoman,
                bold: BuiltinFont::TimesBold,
            }
        } else {
            Self {
                regular: BuiltinFont::Helvetica,
                bold: BuiltinFont::HelveticaBold,
            }
        }
    }
}

fn text_style(role: Role, scale: &FontScale, fonts: Fonts, geometry: &Geometry) -> TextStyle {
    let pt = |size: u32| size as f32;
    match role {
        Role::Title => TextStyle {
            font: fonts.bold,
            size: pt(scale.title),
            // Drop the title a quarter of the way down the first page.
            space_before: (geometry.top - geometry.bottom) * 0.25,
            space_after: pt(scale.title) * 0.5,
            centred: true,
            new_page: false,
        },
        Role::Author => TextStyle {
            font: fonts.regular,
            size: pt(scale.author),
            space_before: pt(scale.author) * 0.5,
            space_after: 0.0,
            centred: true,
            new_page: false,
        },
        Role::Chapter => TextStyle {
            font: fonts.bold,
            size: pt(scale.chapter),
            space_before: 0.0,
            space_after: pt(scale.chapter),
            centred: true,
            new_page: true,
        },
        Role::Section => TextStyle {
            font: fonts.bold,
            size: pt(scale.section),
            space_before: pt(scale.section) * 0.8,
            space_after: pt(scale.section) * 0.4,
            centred: false,
            new_page: false,
        },
        Role::Body => TextStyle {
            font: fonts.regular,
            size: pt(scale.base),
            space_before: 0.0,
            space_after: pt(scale.base) * 0.4,
            centred: false,
            new_page: false,
        },
    }
}

fn push_text(ops: &mut Vec<Op>, x: f32, y: f32, font: BuiltinFont, size: f32, text: String) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text)],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Flows elements onto pages, top to bottom.
struct PageFlow<'a> {
    geometry: Geometry,
    options: &'a RenderOptions,
    fonts: Fonts,
    pages: Vec<Vec<Op>>,
    ops: Vec<Op>,
    /// Baseline of the last placed line, in points from the bottom edge.
    cursor: f32,
    has_content: bool,
}

impl<'a> PageFlow<'a> {
    fn new(geometry: Geometry, options: &'a RenderOptions) -> Self {
        Self {
            geometry,
            options,
            fonts: Fonts::for_options(options),
            pages: Vec::new(),
            ops: Vec::new(),
            cursor: geometry.top,
            has_content: false,
        }
    }

    fn break_page(&mut self) {
        let mut ops = std::mem::take(&mut self.ops);
        self.draw_running_text(&mut ops);
        self.pages.push(ops);
        self.cursor = self.geometry.top;
        self.has_content = false;
    }

    fn draw_running_text(&self, ops: &mut Vec<Op>) {
        let g = &self.geometry;
        let font = self.fonts.regular;
        if let Some(header) = self.options.header.as_deref().filter(|t| !t.is_empty()) {
            let y = g.top + (g.page_h_pt - g.top) / 2.0;
            push_text(ops, g.centred_x(header, RUNNING_TEXT_PT), y, font, RUNNING_TEXT_PT, header.to_string());
        }
        if let Some(footer) = self.options.footer.as_deref().filter(|t| !t.is_empty()) {
            let y = g.bottom / 2.0;
            push_text(ops, g.centred_x(footer, RUNNING_TEXT_PT), y, font, RUNNING_TEXT_PT, footer.to_string());
        }
    }

    fn place(&mut self, element: &Element, style: TextStyle) {
        if style.new_page && self.has_content {
            self.break_page();
        }
        let line_height = style.size * self.options.line_spacing.max(1.0);
        self.cursor -= style.space_before;

        let width = self.geometry.chars_per_line(style.size);
        for line in wrap_text(&element.text, width) {
            if self.cursor - line_height < self.geometry.bottom && self.has_content {
                self.break_page();
            }
            self.cursor -= line_height;
            let x = if style.centred {
                self.geometry.centred_x(&line, style.size)
            } else {
                self.geometry.left
            };
            push_text(&mut self.ops, x, self.cursor, style.font, style.size, line);
            self.has_content = true;
        }
        self.cursor -= style.space_after;
    }

    fn finish(mut self) -> Vec<Vec<Op>> {
        if self.has_content || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }
}

// -- Renderer -----------------------------------------------------------------

/// Fallback renderer that writes PDFs directly with built-in PDF fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightweightRenderer;

impl LightweightRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous conversion; [`Renderer::render`] runs this on the blocking pool.
    #[instrument(skip_all, fields(markup_len = markup.len()))]
    pub fn convert(&self, markup: &str, page: &PageSpec, options: &RenderOptions) -> Result<Vec<u8>> {
        let geometry = Geometry::from_page(page)?;
        let Extracted { title, elements } = extract(markup);
        let title = title.unwrap_or_else(|| RawManuscript::DEFAULT_TITLE.to_string());

        info!(title = %title, elements = elements.len(), "converting markup without a browser");

        let pages = layout_pages(&elements, geometry, options);
        let page_count = pages.len();

        let mut doc = PdfDocument::new(&title);
        doc.with_pages(
            pages
                .into_iter()
                .map(|ops| PdfPage::new(geometry.page_w, geometry.page_h, ops))
                .collect(),
        );

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(pages = page_count, bytes = output.len(), warnings = warnings.len(), "lightweight PDF written");

        Ok(output)
    }
}

fn layout_pages(elements: &[Element], geometry: Geometry, options: &RenderOptions) -> Vec<Vec<Op>> {
    let scale = FontScale::from_base(options.base_font_pt);
    let mut flow = PageFlow::new(geometry, options);
    for element in elements {
        let style = text_style(element.role, &scale, flow.fonts, &geometry);
        flow.place(element, style);
    }
    flow.finish()
}

impl Renderer for LightweightRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Lightweight
    }

    async fn render(&self, markup: &str, page: &PageSpec, options: &RenderOptions) -> Result<Vec<u8>> {
        let renderer = *self;
        let markup = markup.to_owned();
        let page = *page;
        let options = options.clone();
        tokio::task::spawn_blocking(move || renderer.convert(&markup, &page, &options))
            .await
            .map_err(|e| {
                FormatFlexError::backend(BackendKind::Lightweight, format!("converter task failed: {e}"))
            })?
    }
}

// -- Text wrapping helper -----------------------------------------------------

/// Word-wrap `text` so no line exceeds `max_width` characters.
///
/// Words longer than `max_width` are force-broken on character boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_width {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_width).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    result.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            result.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}
