//! Schema Registration CLI
//!
//! Registers every configured subject against the Schema Registry, in order.
//!
//! Usage:
//!   register-schemas --config demos/claims.toml
//!   SCHEMA_REGISTRY_URL=http://registry:8081/ register-schemas --quiet
//!   register-schemas --check

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use schema_registrar::{Registrar, RegistrarConfig, RegistrarError, RunReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "register-schemas")]
#[command(about = "Register schema files under their subjects in a Schema Registry")]
struct Cli {
    /// Config file to load on top of the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Registry base URL (overrides SCHEMA_REGISTRY_URL and the config file)
    #[arg(long)]
    registry_url: Option<String>,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// Register the remaining entries after a failure (the run still fails)
    #[arg(long)]
    continue_on_error: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Validate the configuration and read every schema file without registering
    #[arg(long)]
    check: bool,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the merged configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        let code = e
            .downcast_ref::<RegistrarError>()
            .map(RegistrarError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RegistrarConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    config.registry.quiet |= cli.quiet;
    config.registry.continue_on_error |= cli.continue_on_error;
    if let Some(timeout) = cli.timeout {
        config.registry.timeout_secs = timeout;
    }
    let quiet = config.registry.quiet;

    let default_filter = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let entries = config.entries()?;
    if entries.is_empty() {
        return Err(RegistrarError::InvalidConfiguration("no subjects configured".to_string()).into());
    }
    let target = config.resolve_target(cli.registry_url.as_deref())?;

    if cli.check {
        println!("🔍 Checking {} subject(s) for {}", entries.len(), target.base_url);
        for entry in &entries {
            let source = entry.read_schema()?;
            println!(
                "  ✅ {} ({}) {} [{}]",
                entry.subject,
                entry.format,
                entry.schema_path.display(),
                source.checksum.short()
            );
            for reference in &entry.references {
                println!("     └─ {} -> {} v{}", reference.name, reference.subject, reference.version);
            }
        }
        return Ok(());
    }

    let registry_url = target.base_url.to_string();
    let registrar = Registrar::connect(target)?.continue_on_error(config.registry.continue_on_error);

    let mut report = RunReport::new(&registry_url);
    let result = registrar.run(&entries, &mut report);

    // A failed report write must not mask the registration error's exit code.
    if let Some(path) = &cli.report {
        if let Err(e) = write_report(path, &report) {
            if result.is_ok() {
                return Err(e);
            }
            tracing::error!("{:#}", e);
        }
    }

    if !quiet {
        for outcome in &report.registered {
            let id = outcome.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
            println!("  ✅ {} -> id {}", outcome.subject, id);
        }
        for failure in &report.failed {
            println!("  ❌ {} ({})", failure.subject, failure.kind);
        }
        if !report.not_attempted.is_empty() {
            println!("  ⏭  not attempted: {}", report.not_attempted.join(", "));
        }
    }

    result?;

    if !quiet {
        println!("✅ Registered {} schema(s) at {}", report.registered.len(), registry_url);
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))
}
