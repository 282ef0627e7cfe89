// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CareStudio command-line tools.
//
// Entry point. Initialises logging, resolves configuration and dispatches to
// one of the document commands or the detection server.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use carestudio_core::alerts;
use carestudio_core::config::AppConfig;
use carestudio_core::error::CareStudioError;

#[derive(Debug, Parser)]
#[command(name = "carestudio", version, about = "Document scanner and PDF utilities")]
struct Cli {
    /// JSON config file; environment variables and flags override it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crop, straighten and clean up photographed pages into one PDF.
    Scan {
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,
        #[arg(long, default_value = ".", value_name = "DIR")]
        out_dir: PathBuf,
        /// Corner-detection endpoint (overrides `scan_endpoint`).
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Skip corner detection; every page is resized without cropping.
        #[arg(long)]
        offline: bool,
        /// Files processed at once (1 = sequential).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },
    /// Place images on A4 pages of a single PDF.
    Jpg2pdf {
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,
        #[arg(long, default_value = ".", value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Concatenate PDFs in the order given.
    Merge {
        #[arg(required = true, value_name = "PDF")]
        pdfs: Vec<PathBuf>,
        #[arg(long, default_value = ".", value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Export every page of a PDF as a JPEG.
    Pdf2jpg {
        pdf: PathBuf,
        #[arg(long, default_value = ".", value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Run the `POST /api/scan` detection endpoint until Ctrl-C.
    Serve {
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

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

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan {
            images,
            out_dir,
            endpoint,
            offline,
            concurrency,
        } => {
            let mut config = config;
            if let Some(endpoint) = endpoint {
                config.scan_endpoint = endpoint;
            }
            if let Some(concurrency) = concurrency {
                config.detection_concurrency = concurrency;
            }
            let config = config.validate()?;
            commands::scan(&config, &images, &out_dir, offline).await
        }
        Command::Jpg2pdf { images, out_dir } => commands::jpg_to_pdf(&images, &out_dir),
        Command::Merge { pdfs, out_dir } => commands::merge(&pdfs, &out_dir),
        Command::Pdf2jpg { pdf, out_dir } => commands::pdf_to_jpg(&config, &pdf, &out_dir),
        Command::Serve { bind, port } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            commands::serve(&config).await
        }
    }
}

/// Defaults, then the config file, then `CARESTUDIO_*` variables.
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let base = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("reading config file {}", path.display()))?,
        None => AppConfig::default(),
    };
    Ok(base.with_env()?)
}

/// Print a failure the way the user should see it: the alert when the cause
/// is one of ours, then the technical chain.
fn report(err: &anyhow::Error) {
    if let Some(cause) = err.downcast_ref::<CareStudioError>() {
        eprintln!("{}", alerts::alert_for(cause));
    }
    eprintln!("error: {err:#}");
}
