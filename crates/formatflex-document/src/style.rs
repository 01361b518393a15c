// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Style resolver — turns a format configuration into concrete CSS values.
//
// Unknown choices never fail: each falls back to a named default and the
// replacement is reported as a `Substitution` so the caller can log it.

use serde::Serialize;

use formatflex_core::config::{FormatConfig, PartialFormatConfig};

use crate::compose::escape_html;
use crate::templates::TemplateKind;

/// Colour scheme for page background and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Sepia,
}

impl Theme {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "sepia" => Some(Self::Sepia),
            _ => None,
        }
    }

    /// (background, text, headings)
    pub fn colors(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Light => ("#ffffff", "#2c2c2c", "#1a1a1a"),
            Self::Dark => ("#1a1a1a", "#e0e0e0", "#ffffff"),
            Self::Sepia => ("#f4f3e8", "#5c4b37", "#3d2f1f"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Sepia => "sepia",
        }
    }
}

/// Accent colour family used for rules and ornaments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Classic,
    Modern,
    Warm,
}

impl Palette {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "classic" => Some(Self::Classic),
            "modern" => Some(Self::Modern),
            "warm" => Some(Self::Warm),
            _ => None,
        }
    }

    pub fn accent(&self) -> &'static str {
        match self {
            Self::Classic => "#000000",
            Self::Modern => "#667eea",
            Self::Warm => "#d97706",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            "justify" => Some(Self::Justify),
            _ => None,
        }
    }

    pub fn css(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

/// Generic family a face degrades to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontClass {
    Serif,
    SansSerif,
}

/// A typeface choice and how to load it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontFace {
    pub family: String,
    pub class: FontClass,
    /// Stylesheet URL for web-hosted faces; `None` for unknown families.
    pub import_url: Option<String>,
}

/// Family used when the requested one cannot be named safely in CSS.
pub const DEFAULT_FONT: &str = "Crimson Text";

const KNOWN_FONTS: &[(&str, FontClass)] = &[
    ("Crimson Text", FontClass::Serif),
    ("Libre Baskerville", FontClass::Serif),
    ("Merriweather", FontClass::Serif),
    ("Open Sans", FontClass::SansSerif),
    ("Source Sans Pro", FontClass::SansSerif),
];

impl FontFace {
    /// Letters, digits, spaces and hyphens only, with at least one letter or
    /// digit.
    pub fn is_plain_family(family: &str) -> bool {
        family.chars().any(char::is_alphanumeric)
            && family.chars().all(|c| c.is_alphanumeric() || c == ' ' || c == '-')
    }

    pub fn lookup(family: &str) -> Self {
        match KNOWN_FONTS.iter().find(|(name, _)| *name == family) {
            Some((name, class)) => Self {
                family: (*name).to_string(),
                class: *class,
                import_url: Some(format!(
                    "https://fonts.googleapis.com/css2?family={}:wght@400;600;700&display=swap",
                    name.replace(' ', "+")
                )),
            },
            None => Self {
                family: family.to_string(),
                class: FontClass::Serif,
                import_url: None,
            },
        }
    }

    /// CSS `font-family` value with generic fallbacks.
    pub fn stack(&self) -> String {
        let family = css_string(&self.family);
        match self.class {
            FontClass::Serif => format!("\"{family}\", Georgia, 'Times New Roman', serif"),
            FontClass::SansSerif => format!("\"{family}\", 'Helvetica Neue', Arial, sans-serif"),
        }
    }
}

/// Point sizes for every semantic level, derived from the base size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontScale {
    pub base: u32,
    pub title: u32,
    pub chapter: u32,
    pub section: u32,
    pub author: u32,
    pub print_body: u32,
    pub print_chapter: u32,
    pub print_section: u32,
}

impl FontScale {
    /// Integer multiples of `base`, rounded half up.
    pub fn from_base(base: u32) -> Self {
        let chapter = (3 * base + 1) / 2; // 1.5x
        let section = (12 * base + 5) / 10; // 1.2x
        let author = (11 * base + 5) / 10; // 1.1x
        Self {
            base,
            title: base * 2,
            chapter,
            section,
            author,
            print_body: base.saturating_sub(1),
            print_chapter: chapter.saturating_sub(2),
            print_section: section.saturating_sub(1),
        }
    }
}

/// Running header or footer text, rendered as a CSS page-margin box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningText {
    pub text: String,
}

impl RunningText {
    /// `@top-center { ... }` / `@bottom-center { ... }` rule.
    fn margin_box(&self, position: &str, font_stack: &str, color: &str) -> String {
        format!(
            "@{position} {{ content: \"{}\"; font-family: {font_stack}; font-size: 9pt; color: {color}; }}",
            css_string(&self.text)
        )
    }
}

/// One fallback the resolver applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub field: &'static str,
    pub rejected: String,
    pub fallback: &'static str,
}

/// Fully resolved style: every value a template can reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStyleSpec {
    pub template: TemplateKind,
    pub theme: Theme,
    pub palette: Palette,
    pub font: FontFace,
    pub sizes: FontScale,
    pub line_spacing: f32,
    pub text_align: TextAlign,
    pub text_indent: &'static str,
    pub header: Option<RunningText>,
    pub footer: Option<RunningText>,
}

impl ResolvedStyleSpec {
    pub fn background_color(&self) -> &'static str {
        self.theme.colors().0
    }

    pub fn text_color(&self) -> &'static str {
        self.theme.colors().1
    }

    pub fn heading_color(&self) -> &'static str {
        self.theme.colors().2
    }

    /// Margin-box rule for the running header; empty when disabled.
    pub fn header_markup(&self) -> String {
        self.header
            .as_ref()
            .map(|h| h.margin_box("top-center", &self.font.stack(), self.text_color()))
            .unwrap_or_default()
    }

    /// Margin-box rule for the running footer; empty when disabled.
    pub fn footer_markup(&self) -> String {
        self.footer
            .as_ref()
            .map(|f| f.margin_box("bottom-center", &self.font.stack(), self.text_color()))
            .unwrap_or_default()
    }

    /// `@import` rule for web fonts; empty for unknown families.
    pub fn font_import(&self) -> String {
        self.font
            .import_url
            .as_ref()
            .map(|url| format!("@import url('{url}');"))
            .unwrap_or_default()
    }

    /// Placeholder name → value for every field a template may reference.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let pt = |size: u32| format!("{size}pt");
        vec![
            ("TEMPLATE", self.template.name().to_string()),
            ("THEME", self.theme.name().to_string()),
            ("FONT_FAMILY", escape_html(&self.font.family)),
            ("FONT_STACK", self.font.stack()),
            ("FONT_IMPORT", self.font_import()),
            ("FONT_SIZE", pt(self.sizes.base)),
            ("TITLE_SIZE", pt(self.sizes.title)),
            ("CHAPTER_SIZE", pt(self.sizes.chapter)),
            ("SECTION_SIZE", pt(self.sizes.section)),
            ("AUTHOR_SIZE", pt(self.sizes.author)),
            ("PRINT_FONT_SIZE", pt(self.sizes.print_body)),
            ("PRINT_CHAPTER_SIZE", pt(self.sizes.print_chapter)),
            ("PRINT_SECTION_SIZE", pt(self.sizes.print_section)),
            ("LINE_SPACING", self.line_spacing.to_string()),
            ("TEXT_ALIGN", self.text_align.css().to_string()),
            ("TEXT_INDENT", self.text_indent.to_string()),
            ("BACKGROUND_COLOR", self.background_color().to_string()),
            ("TEXT_COLOR", self.text_color().to_string()),
            ("HEADING_COLOR", self.heading_color().to_string()),
            ("ACCENT_COLOR", self.palette.accent().to_string()),
            ("HEADER_MARKUP", self.header_markup()),
            ("FOOTER_MARKUP", self.footer_markup()),
        ]
    }
}

/// Merge `partial` over the defaults and resolve it.
pub fn resolve_partial(partial: &PartialFormatConfig) -> (ResolvedStyleSpec, Vec<Substitution>) {
    resolve_style(&FormatConfig::from_partial(partial))
}

/// Resolve a total configuration into a style spec plus the fallbacks used.
pub fn resolve_style(config: &FormatConfig) -> (ResolvedStyleSpec, Vec<Substitution>) {
    let mut substitutions = Vec::new();
    let mut fallback = |field: &'static str, rejected: &str, default: &'static str| {
        substitutions.push(Substitution {
            field,
            rejected: rejected.to_string(),
            fallback: default,
        });
    };

    let theme = Theme::from_name(&config.theme).unwrap_or_else(|| {
        fallback("theme", &config.theme, "light");
        Theme::Light
    });
    let palette = Palette::from_name(&config.color_palette).unwrap_or_else(|| {
        fallback("colorPalette", &config.color_palette, "classic");
        Palette::Classic
    });
    let text_align = TextAlign::from_name(&config.text_align).unwrap_or_else(|| {
        fallback("textAlign", &config.text_align, "justify");
        TextAlign::Justify
    });
    let template = TemplateKind::from_name(&config.template).unwrap_or_else(|| {
        fallback("template", &config.template, "ebook");
        TemplateKind::Ebook
    });

    let font = if FontFace::is_plain_family(&config.font_family) {
        FontFace::lookup(&config.font_family)
    } else {
        fallback("fontFamily", &config.font_family, DEFAULT_FONT);
        FontFace::lookup(DEFAULT_FONT)
    };

    let running = |enabled: bool, text: &str| enabled.then(|| RunningText { text: text.to_string() });

    let spec = ResolvedStyleSpec {
        template,
        theme,
        palette,
        font,
        sizes: FontScale::from_base(config.font_size),
        line_spacing: config.line_spacing,
        text_align,
        text_indent: if text_align == TextAlign::Justify { "1.5em" } else { "0" },
        header: running(config.header_enabled, &config.header_text),
        footer: running(config.footer_enabled, &config.footer_text),
    };
    (spec, substitutions)
}

/// Escape text for a double-quoted CSS string.
pub fn css_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' => out.push_str("\\A "),
            '<' => out.push_str("\\3C "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolve(partial: PartialFormatConfig) -> (ResolvedStyleSpec, Vec<Substitution>) {
        resolve_partial(&partial)
    }

    #[test]
    fn defaults_resolve_cleanly() {
        let (spec, subs) = resolve(PartialFormatConfig::default());
        assert!(subs.is_empty());
        assert_eq!(spec.theme, Theme::Light);
        assert_eq!(spec.template, TemplateKind::Ebook);
        assert_eq!(spec.font.family, "Crimson Text");
        assert_eq!(spec.sizes.base, 12);
        assert_eq!(spec.text_indent, "1.5em");
        assert!(spec.header.is_none());
        assert!(spec.header_markup().is_empty());
    }

    #[test]
    fn unknown_theme_uses_light_colors() {
        let (spec, subs) = resolve(PartialFormatConfig {
            theme: Some("neon".into()),
            ..Default::default()
        });
        assert_eq!(spec.theme, Theme::Light);
        assert_eq!(spec.background_color(), "#ffffff");
        assert_eq!(spec.text_color(), "#2c2c2c");
        assert_eq!(
            subs,
            vec![Substitution {
                field: "theme",
                rejected: "neon".into(),
                fallback: "light",
            }]
        );
    }

    #[test]
    fn derived_sizes_for_eleven_point() {
        let scale = FontScale::from_base(11);
        assert_eq!(scale.title, 22);
        assert_eq!(scale.chapter, 17); // 16.5 rounds up
        assert_eq!(scale.section, 13); // 13.2
        assert_eq!(scale.author, 12); // 12.1
        assert_eq!(scale.print_body, 10);
        assert_eq!(scale.print_chapter, 15);
        assert_eq!(scale.print_section, 12);
    }

    #[test]
    fn indent_only_when_justified() {
        let (spec, _) = resolve(PartialFormatConfig {
            text_align: Some("left".into()),
            ..Default::default()
        });
        assert_eq!(spec.text_indent, "0");
        assert_eq!(spec.text_align, TextAlign::Left);
    }

    #[test]
    fn header_markup_only_when_enabled() {
        let (disabled, _) = resolve(PartialFormatConfig {
            header_text: Some("Ignored".into()),
            ..Default::default()
        });
        assert!(disabled.header_markup().is_empty());

        let (enabled, _) = resolve(PartialFormatConfig {
            header_enabled: Some(true),
            header_text: Some("The \"Draft\"".into()),
            footer_enabled: Some(true),
            ..Default::default()
        });
        let header = enabled.header_markup();
        assert!(header.starts_with("@top-center"));
        assert!(header.contains(r#"content: "The \"Draft\"""#));
        // Enabled without text: an empty running footer.
        assert!(enabled.footer_markup().contains(r#"content: """#));
    }

    #[test]
    fn markup_in_font_family_falls_back_to_default() {
        let hostile = "X</style><script>alert(1)</script>";
        let (spec, subs) = resolve(PartialFormatConfig {
            font_family: Some(hostile.into()),
            ..Default::default()
        });
        assert_eq!(spec.font.family, DEFAULT_FONT);
        assert_eq!(
            subs,
            vec![Substitution {
                field: "fontFamily",
                rejected: hostile.into(),
                fallback: DEFAULT_FONT,
            }]
        );
        let values: String = spec.placeholders().into_iter().map(|(_, v)| v).collect();
        assert!(!values.contains("<script"));
    }

    #[test]
    fn font_stack_escapes_family_text() {
        let face = FontFace::lookup("Evil\"</style>");
        let stack = face.stack();
        assert!(!stack.contains("</style>"), "{stack}");
        assert!(stack.starts_with("\"Evil\\\""), "{stack}");
    }

    #[test]
    fn plain_family_names() {
        assert!(FontFace::is_plain_family("Noto Serif-JP"));
        assert!(FontFace::is_plain_family("Garamond 3"));
        assert!(!FontFace::is_plain_family(""));
        assert!(!FontFace::is_plain_family("  "));
        assert!(!FontFace::is_plain_family("A;B"));
        assert!(!FontFace::is_plain_family("a<b"));
    }

    #[test]
    fn unknown_font_keeps_family_without_import() {
        let (spec, _) = resolve(PartialFormatConfig {
            font_family: Some("Comic Neue".into()),
            ..Default::default()
        });
        assert_eq!(spec.font.family, "Comic Neue");
        assert!(spec.font_import().is_empty());
        assert!(spec.font.stack().ends_with("serif"));
    }

    #[test]
    fn every_fallback_is_reported() {
        let (_, subs) = resolve(PartialFormatConfig {
            template: Some("hardcover".into()),
            color_palette: Some("pastel".into()),
            text_align: Some("diagonal".into()),
            ..Default::default()
        });
        let fields: Vec<_> = subs.iter().map(|s| s.field).collect();
        assert_eq!(fields, vec!["colorPalette", "textAlign", "template"]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let partial = PartialFormatConfig {
            theme: Some("sepia".into()),
            font_size: Some(15),
            ..Default::default()
        };
        let config = FormatConfig::from_partial(&partial);
        let again = FormatConfig::from_partial(&PartialFormatConfig::from(&config));
        assert_eq!(resolve_style(&config).0, resolve_style(&again).0);
    }

    proptest! {
        #[test]
        fn derived_sizes_are_monotone(a in 10u32..=18, b in 10u32..=18) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let (small, large) = (FontScale::from_base(lo), FontScale::from_base(hi));
            prop_assert!(small.title <= large.title);
            prop_assert!(small.chapter <= large.chapter);
            prop_assert!(small.section <= large.section);
            prop_assert!(small.author <= large.author);
        }
    }
}
