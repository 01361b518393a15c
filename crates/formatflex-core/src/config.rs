// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format configuration (per request) and service configuration (per process).
//
// Callers send a partial format configuration. It is merged over the canonical
// defaults so downstream stages only ever see a total `FormatConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Inclusive bounds for the base font size in points.
pub const FONT_SIZE_RANGE: (u32, u32) = (10, 18);

/// Fully-populated per-request formatting options.
///
/// Enumerated choices (theme, page size, ...) are kept as the caller's
/// strings; the resolvers map them onto known values and fall back to a named
/// default for anything they do not recognise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    pub font_family: String,
    pub font_size: u32,
    pub template: String,
    pub page_size: String,
    pub line_spacing: f32,
    pub margins: String,
    pub text_align: String,
    pub header_enabled: bool,
    pub footer_enabled: bool,
    pub header_text: String,
    pub footer_text: String,
    pub theme: String,
    pub color_palette: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            font_family: "Crimson Text".into(),
            font_size: 12,
            template: "ebook".into(),
            page_size: "A4".into(),
            line_spacing: 1.6,
            margins: "normal".into(),
            text_align: "justify".into(),
            header_enabled: false,
            footer_enabled: false,
            header_text: String::new(),
            footer_text: String::new(),
            theme: "light".into(),
            color_palette: "classic".into(),
        }
    }
}

impl FormatConfig {
    /// Resolve a partial configuration against the defaults.
    pub fn from_partial(partial: &PartialFormatConfig) -> Self {
        Self::default().merged(partial)
    }

    /// Key-wise merge: every field present in `overrides` wins.
    pub fn merged(mut self, overrides: &PartialFormatConfig) -> Self {
        if let Some(v) = &overrides.font_family {
            self.font_family = v.clone();
        }
        if let Some(v) = overrides.font_size {
            self.font_size = clamp_font_size(v);
        }
        if let Some(v) = &overrides.template {
            self.template = v.clone();
        }
        if let Some(v) = &overrides.page_size {
            self.page_size = v.clone();
        }
        if let Some(v) = overrides.line_spacing {
            if v.is_finite() && v > 0.0 {
                self.line_spacing = v;
            }
        }
        if let Some(v) = &overrides.margins {
            self.margins = v.clone();
        }
        if let Some(v) = &overrides.text_align {
            self.text_align = v.clone();
        }
        if let Some(v) = overrides.header_enabled {
            self.header_enabled = v;
        }
        if let Some(v) = overrides.footer_enabled {
            self.footer_enabled = v;
        }
        if let Some(v) = &overrides.header_text {
            self.header_text = v.clone();
        }
        if let Some(v) = &overrides.footer_text {
            self.footer_text = v.clone();
        }
        if let Some(v) = &overrides.theme {
            self.theme = v.clone();
        }
        if let Some(v) = &overrides.color_palette {
            self.color_palette = v.clone();
        }
        self
    }
}

fn clamp_font_size(size: i64) -> u32 {
    let (min, max) = FONT_SIZE_RANGE;
    size.clamp(i64::from(min), i64::from(max)) as u32
}

/// A caller-supplied subset of [`FormatConfig`]. Absent fields keep their
/// default.
///
/// Deserialization is lenient: unknown keys and values of the wrong JSON type
/// are ignored, so a malformed field costs the caller that field, never the
/// request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialFormatConfig {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_font_size")]
    pub font_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub page_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub line_spacing: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub margins: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub text_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub header_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub footer_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub header_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub footer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub color_palette: Option<String>,
}

/// Keep a field only if it has the expected JSON type.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Any JSON number, rounded to the nearest point.
fn lenient_font_size<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|n| n.is_finite()).map(|n| n.round() as i64))
}

impl PartialFormatConfig {
    /// Read a partial configuration from an arbitrary JSON value. Anything
    /// other than an object yields the empty configuration.
    pub fn from_json(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }

    /// Parse from JSON text. Only syntactically invalid JSON is an error.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_json(&value))
    }

    /// Layer `other` on top of `self`; fields set in `other` win.
    pub fn overlay(mut self, other: &PartialFormatConfig) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field.clone(); })*
            };
        }
        take!(
            font_family, font_size, template, page_size, line_spacing, margins, text_align,
            header_enabled, footer_enabled, header_text, footer_text, theme, color_palette
        );
        self
    }

    /// Preset options for a named template, as offered by the editor's
    /// template picker. Unknown names have no preset.
    pub fn preset(template: &str) -> Option<Self> {
        match template {
            "ebook" => Some(Self {
                template: Some("ebook".into()),
                page_size: Some("A4".into()),
                margins: Some("normal".into()),
                line_spacing: Some(1.6),
                font_size: Some(12),
                text_align: Some("justify".into()),
                font_family: Some("Crimson Text".into()),
                ..Self::default()
            }),
            "paperback" => Some(Self {
                template: Some("paperback".into()),
                page_size: Some("6x9".into()),
                margins: Some("wide".into()),
                line_spacing: Some(1.5),
                font_size: Some(11),
                text_align: Some("justify".into()),
                font_family: Some("Libre Baskerville".into()),
                ..Self::default()
            }),
            _ => None,
        }
    }
}

impl From<&FormatConfig> for PartialFormatConfig {
    fn from(config: &FormatConfig) -> Self {
        Self {
            font_family: Some(config.font_family.clone()),
            font_size: Some(i64::from(config.font_size)),
            template: Some(config.template.clone()),
            page_size: Some(config.page_size.clone()),
            line_spacing: Some(config.line_spacing),
            margins: Some(config.margins.clone()),
            text_align: Some(config.text_align.clone()),
            header_enabled: Some(config.header_enabled),
            footer_enabled: Some(config.footer_enabled),
            header_text: Some(config.header_text.clone()),
            footer_text: Some(config.footer_text.clone()),
            theme: Some(config.theme.clone()),
            color_palette: Some(config.color_palette.clone()),
        }
    }
}

// -- Service configuration ----------------------------------------------------

/// Process-wide settings for the rendering service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Headless browser executable used by the primary backend.
    pub chromium_path: PathBuf,
    /// Extra command-line switches for the browser.
    pub browser_args: Vec<String>,
    /// Upper bound for the document to reach content-loaded.
    pub load_timeout_ms: u64,
    /// Upper bound for pagination to PDF.
    pub paginate_timeout_ms: u64,
    /// Directory holding `<template>.html` skeletons; built-ins when unset.
    pub template_dir: Option<PathBuf>,
    /// Hide internal error detail from user-visible messages.
    pub production: bool,
    /// Cap on simultaneous browser sessions; unbounded when unset.
    pub max_concurrent_sessions: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            chromium_path: PathBuf::from("chromium"),
            browser_args: vec![
                "--no-sandbox".into(),
                "--disable-setuid-sandbox".into(),
                "--disable-dev-shm-usage".into(),
                "--disable-gpu".into(),
                "--no-first-run".into(),
                "--no-zygote".into(),
            ],
            load_timeout_ms: 30_000,
            paginate_timeout_ms: 30_000,
            template_dir: None,
            production: false,
            max_concurrent_sessions: None,
        }
    }
}

impl ServiceConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn paginate_timeout(&self) -> Duration {
        Duration::from_millis(self.paginate_timeout_ms)
    }
}
