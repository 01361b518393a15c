// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// FormatFlex — manuscript to PDF from the command line.
//
// Entry point. Initialises logging, resolves service settings, and runs one
// export, preview, or status query. Logs go to stderr so preview output can
// be piped.

mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use formatflex_core::config::ServiceConfig;
use formatflex_core::error::{FormatFlexError, Result};
use formatflex_core::human_errors::humanize_error;
use formatflex_core::types::{Disposition, PdfResponse, RawManuscript, filename_from_title};
use formatflex_render::{DefaultPipeline, status};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = match cli.service.service_config() {
        Ok(service) => service,
        Err(e) => return report(&e, false),
    };

    match run(cli.command, &service).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e, service.production),
    }
}

async fn run(command: Command, service: &ServiceConfig) -> Result<()> {
    match command {
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&status())?);
            Ok(())
        }

        Command::Export(args) => {
            let request = args.request()?;
            let response = DefaultPipeline::from_config(service).download(&request).await?;
            let path = args
                .out
                .clone()
                .unwrap_or_else(|| PathBuf::from(download_name(&response, &request.manuscript)));
            std::fs::write(&path, &response.bytes)?;
            tracing::info!(path = %path.display(), "PDF saved");
            println!("{}", serde_json::to_string_pretty(&summary(&response, Some(&path)))?);
            Ok(())
        }

        Command::Preview(args) => {
            let request = args.request()?;
            let response = DefaultPipeline::from_config(service).preview(&request).await?;
            match &args.out {
                Some(path) => {
                    std::fs::write(path, &response.bytes)?;
                    println!("{}", serde_json::to_string_pretty(&summary(&response, Some(path)))?);
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&response.bytes)?;
                    stdout.flush()?;
                }
            }
            Ok(())
        }
    }
}

fn download_name(response: &PdfResponse, manuscript: &RawManuscript) -> String {
    match &response.disposition {
        Disposition::Attachment { filename } => filename.clone(),
        Disposition::Inline => filename_from_title(&manuscript.title),
    }
}

fn summary(response: &PdfResponse, path: Option<&PathBuf>) -> serde_json::Value {
    serde_json::json!({
        "requestId": response.request_id.to_string(),
        "backend": response.backend.name(),
        "contentType": PdfResponse::CONTENT_TYPE,
        "contentLength": response.content_length(),
        "contentDisposition": response.disposition.header_value(),
        "sha256": response.digest,
        "path": path.map(|p| p.display().to_string()),
    })
}

/// Print the error as JSON on stderr and pick the exit code: 2 for bad
/// input, 1 for everything else.
fn report(err: &FormatFlexError, production: bool) -> ExitCode {
    let human = humanize_error(err, production);
    eprintln!("{}", human.to_json());
    if err.is_validation() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}
