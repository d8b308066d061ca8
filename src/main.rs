use anyhow::{Context, Result};
use clap::Parser;
use plugin_intake::cli::{Cli, Commands, OutputArgs, OutputFormat};
use plugin_intake::{
    ArchiveError, ArchiveSource, CancelToken, Config, InspectError, Inspection, Inspector,
    MetaError, PluginMetadata, ScanReport,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = parse_cli();
    init_tracing(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn parse_cli() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    Cli::parse_from(rewrite_args_for_implicit_inspect(args))
}

fn rewrite_args_for_implicit_inspect(mut args: Vec<String>) -> Vec<String> {
    if args.len() <= 1 {
        return args;
    }

    let subcommands = ["inspect", "meta", "scan", "checks", "help"];

    let mut idx = 1usize;
    while idx < args.len() {
        let a = args[idx].as_str();
        if a == "--" {
            idx += 1;
            break;
        }

        if a == "--config" || a == "--log-level" {
            idx += 2;
            continue;
        }

        if a.starts_with("--config=") || a.starts_with("--log-level=") {
            idx += 1;
            continue;
        }

        if a.starts_with('-') && a != "-" {
            idx += 1;
            continue;
        }

        break;
    }

    if idx < args.len() {
        let token = args[idx].as_str();
        if !subcommands.contains(&token) {
            args.insert(idx, "inspect".to_string());
        }
    }

    args
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::resolve(cli.config.as_deref())?;
    let inspector = Inspector::new(config)?;

    match &cli.command {
        Commands::Inspect {
            archive,
            id,
            timeout_ms,
            output,
        } => {
            let id = id.clone().unwrap_or_else(|| archive.display().to_string());
            let inspection = inspector.inspect(source(archive), &id, &cancel_token(*timeout_ms))?;
            emit(&inspection, output, render_inspection)?;
        }
        Commands::Meta { archive, output } => {
            let archive = inspector.open(source(archive))?;
            let metadata = inspector.extract_metadata(&archive, &CancelToken::new())?;
            emit(&metadata, output, render_metadata)?;
        }
        Commands::Scan {
            archive,
            timeout_ms,
            output,
        } => {
            let archive = inspector.open(source(archive))?;
            let report = inspector.scan(&archive, &cancel_token(*timeout_ms));
            emit(&report, output, render_scan)?;
        }
        Commands::Checks { output } => {
            let checks: Vec<_> = inspector.registry().iter().collect();
            emit(&checks, output, |checks| {
                let mut out = String::new();
                for c in checks {
                    let descriptor = c.target.descriptor.as_deref().unwrap_or("*");
                    let _ = writeln!(
                        out,
                        "{} [{:?}] {}.{}{} - {}",
                        c.id, c.severity, c.target.owner, c.target.name, descriptor, c.message
                    );
                }
                out
            })?;
        }
    }

    Ok(())
}

fn source(path: &Path) -> ArchiveSource {
    if path == Path::new("-") {
        ArchiveSource::Reader(Box::new(std::io::stdin()))
    } else {
        path.into()
    }
}

fn cancel_token(timeout_ms: Option<u64>) -> CancelToken {
    timeout_ms
        .map(|ms| CancelToken::with_timeout(Duration::from_millis(ms)))
        .unwrap_or_default()
}

#[derive(Serialize)]
struct Rejection<'a> {
    error: &'static str,
    message: &'a str,
}

/// Typed rejections are printed as JSON on stdout with exit code 2; anything
/// else is an operational failure (exit code 1).
fn report_failure(err: &anyhow::Error) -> ExitCode {
    let (code, exit) = if let Some(e) = err.downcast_ref::<InspectError>() {
        let exit = if matches!(e, InspectError::Cancelled) { 1 } else { 2 };
        (e.code(), exit)
    } else if let Some(e) = err.downcast_ref::<MetaError>() {
        let exit = if matches!(e, MetaError::Cancelled) { 1 } else { 2 };
        (e.code(), exit)
    } else if let Some(e) = err.downcast_ref::<ArchiveError>() {
        (e.code(), 2)
    } else {
        eprintln!("error: {err:#}");
        return ExitCode::from(1);
    };

    let message = err.to_string();
    let body = Rejection {
        error: code,
        message: &message,
    };
    match serde_json::to_string_pretty(&body) {
        Ok(json) => println!("{json}"),
        Err(_) => eprintln!("error: {message}"),
    }
    ExitCode::from(exit)
}

fn emit<T: Serialize>(
    value: &T,
    args: &OutputArgs,
    render_text: impl FnOnce(&T) -> String,
) -> Result<()> {
    let content = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Text => render_text(value),
    };

    if let Some(path) = args.output.as_deref() {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

fn render_metadata(metadata: &PluginMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name: {}", metadata.name);
    let _ = writeln!(out, "version: {}", metadata.version);
    if let Some(description) = &metadata.description {
        let _ = writeln!(out, "description: {description}");
    }
    for (platform, meta) in &metadata.platforms {
        let _ = writeln!(out, "[{platform}] from {}", meta.source);
        if !meta.authors.is_empty() {
            let _ = writeln!(out, "  authors: {}", meta.authors.join(", "));
        }
        for dep in &meta.dependencies {
            let kind = if dep.required { "required" } else { "optional" };
            let _ = writeln!(out, "  depends: {} ({kind})", dep.name);
        }
        for constraint in &meta.platform_versions {
            let _ = writeln!(out, "  platform version: {constraint}");
        }
    }
    out
}

fn render_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "classes: {}, instructions: {}, partial: {}",
        report.classes_scanned, report.instructions_scanned, report.partial
    );
    for f in &report.findings {
        let _ = writeln!(
            out,
            "- {} [{:?}] {}#{} @{}: {}",
            f.rule_id,
            f.severity,
            f.class_name,
            f.method.as_deref().unwrap_or("?"),
            f.offset.map_or_else(|| "?".to_string(), |o| o.to_string()),
            f.message
        );
    }
    for failure in &report.failures {
        let _ = writeln!(out, "! {failure}");
    }
    out
}

fn render_inspection(inspection: &Inspection) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id: {}", inspection.correlation_id);
    let _ = writeln!(out, "sha256: {}", inspection.archive.sha256);
    if let Some(nested) = &inspection.archive.nested {
        let _ = writeln!(out, "nested: {nested}");
    }
    out.push_str(&render_metadata(&inspection.metadata));
    out.push_str(&render_scan(&inspection.scan));
    out
}
