// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and how they become service settings and requests.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use formatflex_core::config::{PartialFormatConfig, ServiceConfig};
use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::types::RawManuscript;
use formatflex_render::ExportRequest;

#[derive(Debug, Parser)]
#[command(name = "formatflex")]
#[command(about = "FormatFlex - turn a plain-text manuscript into a styled PDF", version)]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a manuscript and save it as a download
    Export(DocumentArgs),

    /// Render a manuscript for inline viewing (stdout unless --out)
    Preview(DocumentArgs),

    /// Print the service liveness report
    Status,
}

/// Service-wide settings. Flags and environment override the settings file.
#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// JSON settings file
    #[arg(long, env = "FORMATFLEX_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Headless browser executable
    #[arg(long, env = "FORMATFLEX_CHROMIUM")]
    pub chromium: Option<PathBuf>,

    /// Content-load timeout in milliseconds
    #[arg(long, env = "FORMATFLEX_LOAD_TIMEOUT_MS")]
    pub load_timeout_ms: Option<u64>,

    /// Pagination timeout in milliseconds
    #[arg(long, env = "FORMATFLEX_PAGINATE_TIMEOUT_MS")]
    pub paginate_timeout_ms: Option<u64>,

    /// Directory of <template>.html skeletons
    #[arg(long, env = "FORMATFLEX_TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Hide internal error detail
    #[arg(long, env = "FORMATFLEX_PRODUCTION")]
    pub production: bool,

    /// Maximum simultaneous browser sessions
    #[arg(long, env = "FORMATFLEX_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,
}

impl ServiceArgs {
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.settings {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(path) = &self.chromium {
            config.chromium_path = path.clone();
        }
        if let Some(ms) = self.load_timeout_ms {
            config.load_timeout_ms = ms;
        }
        if let Some(ms) = self.paginate_timeout_ms {
            config.paginate_timeout_ms = ms;
        }
        if let Some(dir) = &self.template_dir {
            config.template_dir = Some(dir.clone());
        }
        if self.production {
            config.production = true;
        }
        if let Some(limit) = self.max_sessions {
            config.max_concurrent_sessions = Some(limit);
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// Manuscript text file, or `-` for stdin
    pub input: PathBuf,

    /// Document title
    #[arg(long)]
    pub title: Option<String>,

    /// Author line on the title page
    #[arg(long)]
    pub author: Option<String>,

    /// JSON file with format overrides (camelCase keys)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Start from a template preset: ebook or paperback
    #[arg(long)]
    pub preset: Option<String>,

    /// Output path
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl DocumentArgs {
    /// Preset first, then the config file on top.
    pub fn format_overrides(&self) -> Result<PartialFormatConfig> {
        let base = match self.preset.as_deref() {
            Some(name) => PartialFormatConfig::preset(name)
                .ok_or_else(|| FormatFlexError::Config(format!("unknown preset '{name}'")))?,
            None => PartialFormatConfig::default(),
        };
        match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(base.overlay(&PartialFormatConfig::from_json_str(&text)?))
            }
            None => Ok(base),
        }
    }

    pub fn manuscript(&self) -> Result<RawManuscript> {
        let text = read_input(&self.input)?;
        let manuscript = RawManuscript::new(text, self.title.clone());
        Ok(match &self.author {
            Some(author) => manuscript.with_author(author.clone()),
            None => manuscript,
        })
    }

    pub fn request(&self) -> Result<ExportRequest> {
        Ok(ExportRequest::new(self.manuscript()?, self.format_overrides()?))
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_arguments_parse() {
        let cli = Cli::try_parse_from([
            "formatflex",
            "--chromium",
            "/usr/bin/chromium-browser",
            "export",
            "book.txt",
            "--title",
            "My Book",
            "--preset",
            "paperback",
            "-o",
            "out.pdf",
        ])
        .unwrap();

        let Command::Export(args) = &cli.command else {
            panic!("expected export, got {:?}", cli.command);
        };
        assert_eq!(args.input, PathBuf::from("book.txt"));
        assert_eq!(args.title.as_deref(), Some("My Book"));
        assert_eq!(args.out, Some(PathBuf::from("out.pdf")));

        let config = cli.service.service_config().unwrap();
        assert_eq!(config.chromium_path, PathBuf::from("/usr/bin/chromium-browser"));
        assert_eq!(config.load_timeout_ms, 30_000);
    }

    #[test]
    fn flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, r#"{"load_timeout_ms": 5000, "production": true}"#)
            .unwrap();

        let cli = Cli::try_parse_from([
            "formatflex",
            "--settings",
            settings.to_str().unwrap(),
            "--paginate-timeout-ms",
            "9000",
            "status",
        ])
        .unwrap();
        let config = cli.service.service_config().unwrap();
        assert_eq!(config.load_timeout_ms, 5000);
        assert_eq!(config.paginate_timeout_ms, 9000);
        assert!(config.production);
    }

    #[test]
    fn config_file_overrides_preset() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("format.json");
        std::fs::write(&config, r#"{"fontSize": 14, "theme": "sepia"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "formatflex",
            "preview",
            "book.txt",
            "--preset",
            "paperback",
            "--config",
            config.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Preview(args) = cli.command else {
            panic!("expected preview");
        };
        let overrides = args.format_overrides().unwrap();
        assert_eq!(overrides.font_size, Some(14));
        assert_eq!(overrides.theme.as_deref(), Some("sepia"));
        assert_eq!(overrides.page_size.as_deref(), Some("6x9"));
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        let cli = Cli::try_parse_from(["formatflex", "export", "x.txt", "--preset", "hardcover"]).unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        let err = args.format_overrides().unwrap_err();
        assert!(matches!(err, FormatFlexError::Config(_)));
    }

    #[test]
    fn manuscript_reads_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.txt");
        std::fs::write(&input, "Chapter 1\nHello.\n").unwrap();

        let cli = Cli::try_parse_from(["formatflex", "export", input.to_str().unwrap(), "--author", "Ann"])
            .unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        let manuscript = args.manuscript().unwrap();
        assert_eq!(manuscript.title, RawManuscript::DEFAULT_TITLE);
        assert_eq!(manuscript.author.as_deref(), Some("Ann"));
        assert_eq!(manuscript.text, "Chapter 1\nHello.\n");
    }
}
