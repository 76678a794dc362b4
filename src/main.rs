use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod runtime;
mod utils;
mod workflow;

use config::RelayConfig;
use runtime::host::MessageHost;
use runtime::messages::CheckPdfResponse;
use runtime::transport::StdioTransport;
use utils::notify::{NotificationSink, StderrNotifier};
use utils::pdf::{is_pdf, is_pdf_content_type};
use workflow::client::{RedactorBackend, ReqwestBackend};
use workflow::upload::{TargetReference, UploadOutcome, UploadWorkflow};

const EXIT_OK: i32 = 0;
/// The run ended in a failure outcome, or `check` found no PDF.
const EXIT_FAILED: i32 = 1;
/// Configuration or I/O error before an outcome existed.
const EXIT_ERROR: i32 = 2;

fn cli() -> Command {
    Command::new("pdf-redactor-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sends the PDF a tab is showing to a local redaction server")
        .long_about(
            "Detects whether a page is a PDF, fetches it and uploads it as multipart form data\n\
            to the redaction server.\n\
            - send: upload the document at a URL (toolbar click)\n\
            - check: classify a URL or content type as PDF\n\
            - serve: answer JSON-lines requests on stdio (send-pdf, action-clicked,\n  \
            tab-activated, check-pdf, popup-status)",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .value_name("URL")
                .help("Redaction server upload endpoint [default: http://localhost:8000/upload]")
                .global(true)
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Request timeout; by default the HTTP client imposes none")
                .global(true)
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors and do not draw notification boxes")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("send")
                .about("Upload the PDF at URL to the redaction server")
                .arg(Arg::new("url").value_name("URL").required(true)),
        )
        .subcommand(
            Command::new("check")
                .about("Report whether a URL or content type denotes a PDF")
                .arg(Arg::new("value").value_name("VALUE").required(true))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Treat VALUE as a declared content type and require exactly application/pdf")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the JSON-lines message bus on stdin/stdout")
                .arg(
                    Arg::new("active-tab")
                        .long("active-tab")
                        .value_name("URL")
                        .help("URL of the initially active tab")
                        .action(clap::ArgAction::Set),
                ),
        )
}

/// Builds the log filter: `RUST_LOG` directives when set and valid, otherwise a
/// default level that `--quiet` lowers to errors.
fn log_filter(rust_log: Option<&str>, quiet: bool) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if quiet { "error" } else { "info" }))
}

fn init_tracing(quiet: bool) {
    // Logs go to stderr only; stdout carries bus responses
    let rust_log = std::env::var("RUST_LOG").ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(rust_log.as_deref(), quiet))
        .init();
}

fn build_workflow(matches: &ArgMatches) -> Result<UploadWorkflow<ReqwestBackend>> {
    let config = RelayConfig::from_env_and_args(
        matches.get_one::<String>("endpoint").cloned(),
        matches.get_one::<String>("timeout").cloned(),
    )?;
    info!(endpoint = %config.endpoint, timeout = ?config.timeout, "Relay configured");

    let backend = match config.timeout {
        Some(timeout) => {
            ReqwestBackend::with_timeout(timeout).context("failed to build HTTP client")?
        }
        None => ReqwestBackend::new(),
    };
    Ok(UploadWorkflow::new(backend, config.endpoint))
}

/// Toolbar-click equivalent: one run, one notification, the server response on `out`.
async fn send_command<B: RedactorBackend>(
    workflow: &UploadWorkflow<B>,
    url: Option<&str>,
    sink: &dyn NotificationSink,
    out: &mut impl Write,
) -> Result<i32> {
    let target = url.map(TargetReference::from_url);

    match workflow.run_and_notify(target.as_ref(), sink).await {
        UploadOutcome::Success { server_response } => {
            writeln!(out, "{}", serde_json::to_string_pretty(&server_response)?)?;
            Ok(EXIT_OK)
        }
        UploadOutcome::Failure { .. } => Ok(EXIT_FAILED),
    }
}

fn check_command(value: Option<&str>, strict: bool, out: &mut impl Write) -> Result<i32> {
    let is_pdf = if strict {
        is_pdf_content_type(value)
    } else {
        is_pdf(value)
    };
    writeln!(out, "{}", serde_json::to_string(&CheckPdfResponse { is_pdf })?)?;
    Ok(if is_pdf { EXIT_OK } else { EXIT_FAILED })
}

async fn run(matches: ArgMatches) -> Result<i32> {
    let quiet = matches.get_flag("quiet");
    let mut stdout = std::io::stdout();

    match matches.subcommand() {
        Some(("send", sub)) => {
            let workflow = build_workflow(&matches)?;
            let notifier = StderrNotifier::new(quiet);
            let url = sub.get_one::<String>("url").map(String::as_str);
            send_command(&workflow, url, &notifier, &mut stdout).await
        }
        Some(("check", sub)) => check_command(
            sub.get_one::<String>("value").map(String::as_str),
            sub.get_flag("strict"),
            &mut stdout,
        ),
        Some(("serve", sub)) => {
            let workflow = build_workflow(&matches)?;
            let active_tab = sub
                .get_one::<String>("active-tab")
                .map(|url| TargetReference::from_url(url.as_str()));
            let mut host = MessageHost::new(workflow, Arc::new(StderrNotifier::new(quiet)))
                .with_active_tab(active_tab);
            let mut transport = StdioTransport::stdio();
            host.serve(&mut transport).await?;
            Ok(EXIT_OK)
        }
        _ => unreachable!("clap enforces a subcommand"),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("quiet"));

    match run(matches).await {
        Ok(EXIT_OK) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            process::exit(EXIT_ERROR);
        }
    }
}
