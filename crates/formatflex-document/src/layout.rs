// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout resolver — page size and margin preset to concrete page geometry.

use formatflex_core::types::{Length, Margin, PageFormat, PageSpec, PaperSize};

use crate::style::Substitution;

/// Page size used when the requested one is unknown.
pub const DEFAULT_PAGE_SIZE: &str = "A4";

/// A page size entry: its format and its own default margin.
fn page_size(name: &str) -> Option<(PageFormat, Margin)> {
    let inches = Length::inches;
    let entry = match name {
        "A4" => (
            PageFormat::Named(PaperSize::A4),
            Margin::symmetric(inches(1.0), inches(0.75)),
        ),
        "Letter" => (
            PageFormat::Named(PaperSize::Letter),
            Margin::symmetric(inches(1.0), inches(0.75)),
        ),
        "A5" => (
            PageFormat::Named(PaperSize::A5),
            Margin::symmetric(inches(0.75), inches(0.6)),
        ),
        "6x9" => (
            PageFormat::Custom {
                width: inches(6.0),
                height: inches(9.0),
            },
            Margin::symmetric(inches(0.75), inches(0.625)),
        ),
        "5x8" => (
            PageFormat::Custom {
                width: inches(5.0),
                height: inches(8.0),
            },
            Margin::symmetric(inches(0.6), inches(0.5)),
        ),
        _ => return None,
    };
    Some(entry)
}

fn margin_preset(name: &str) -> Option<Margin> {
    match name {
        "narrow" => Some(Margin::uniform(Length::inches(0.5))),
        "normal" => Some(Margin::uniform(Length::inches(0.75))),
        "wide" => Some(Margin::uniform(Length::inches(1.0))),
        _ => None,
    }
}

/// Resolve page geometry.
///
/// A recognised margin preset overrides the page size's own margin; an
/// unknown or absent preset keeps it. Unknown page sizes become A4.
pub fn resolve_page(page: &str, margins: Option<&str>) -> (PageSpec, Vec<Substitution>) {
    let mut substitutions = Vec::new();

    let (format, size_margin) = page_size(page).unwrap_or_else(|| {
        substitutions.push(Substitution {
            field: "pageSize",
            rejected: page.to_string(),
            fallback: DEFAULT_PAGE_SIZE,
        });
        page_size(DEFAULT_PAGE_SIZE).unwrap_or((
            PageFormat::Named(PaperSize::A4),
            Margin::symmetric(Length::inches(1.0), Length::inches(0.75)),
        ))
    });

    let margin = match margins {
        Some(name) => margin_preset(name).unwrap_or_else(|| {
            substitutions.push(Substitution {
                field: "margins",
                rejected: name.to_string(),
                fallback: "page default",
            });
            size_margin
        }),
        None => size_margin,
    };

    (PageSpec { format, margin }, substitutions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_sizes_use_explicit_dimensions() {
        let (spec, _) = resolve_page("6x9", None);
        assert_eq!(
            spec.format,
            PageFormat::Custom {
                width: Length::inches(6.0),
                height: Length::inches(9.0),
            }
        );
        let (spec, _) = resolve_page("5x8", None);
        assert!(matches!(spec.format, PageFormat::Custom { .. }));
    }

    #[test]
    fn preset_overrides_size_default() {
        let (spec, subs) = resolve_page("A4", Some("wide"));
        assert!(subs.is_empty());
        assert_eq!(spec.margin, Margin::uniform(Length::inches(1.0)));
    }

    #[test]
    fn absent_preset_keeps_size_default() {
        let (spec, _) = resolve_page("A4", None);
        assert_eq!(
            spec.margin,
            Margin::symmetric(Length::inches(1.0), Length::inches(0.75))
        );
    }

    #[test]
    fn unknown_values_fall_back() {
        let (spec, subs) = resolve_page("B5", Some("enormous"));
        assert_eq!(spec.format, PageFormat::Named(PaperSize::A4));
        assert_eq!(
            spec.margin,
            Margin::symmetric(Length::inches(1.0), Length::inches(0.75))
        );
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].field, "pageSize");
        assert_eq!(subs[1].field, "margins");
    }
}
