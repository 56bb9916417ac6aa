use anyhow::Result;
use clap::{Parser, Subcommand};
use extkit_bootstrap::{parse_option_arg, AppConfig, CliArgs, ReportFormat};

use std::path::PathBuf;

mod app;
mod demo;
mod report;

/// ExtKit inspector - boots the demo application and reports its configuration
#[derive(Parser)]
#[command(name = "extkit-inspect")]
#[command(about = "ExtKit inspector - boots an application and reports where every item came from")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Application name override
    #[arg(short, long)]
    app: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Report format: text, yaml or json
    #[arg(short, long)]
    format: Option<ReportFormat>,

    /// Additional package prefix to scan (repeatable)
    #[arg(long = "scan", value_name = "PACKAGE")]
    scan: Vec<String>,

    /// Option override as NAME=VALUE (repeatable)
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the application and print the configured reports
    Run,
    /// Boot the application and fail on configuration warnings
    Check,
    /// Boot the application and print the options report only
    Options,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        application: cli.app.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
        format: cli.format,
        scan: cli.scan.clone(),
        options: cli
            .options
            .iter()
            .map(|raw| parse_option_arg(raw))
            .collect::<Result<Vec<_>>>()?,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (EXTKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    extkit_bootstrap::init_logging(config.logging.as_ref(), &config.home_dir());
    tracing::info!(application = %config.application.name, "ExtKit inspector starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config),
        Commands::Check => check(&config),
        Commands::Options => {
            let boot = app::boot(&config)?;
            println!("{}", report::render_options(&boot.info));
            Ok(())
        }
    }
}

fn run(config: &AppConfig) -> Result<()> {
    let boot = app::boot(config)?;
    println!("{}", report::render(&boot.info, &config.report)?);
    if config.report.format == ReportFormat::Text {
        // tracked host bundles never reach the host itself
        let bundles = if boot.host_bundles.is_empty() {
            "-".to_string()
        } else {
            boot.host_bundles.join(", ")
        };
        println!("HOST\n    bundles  {bundles}\n    commands {}", boot.commands.join(", "));
    }
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    let boot = app::boot(config)?;
    let warnings = report::warnings(&boot.info);
    if warnings.is_empty() {
        tracing::info!("Configuration check passed");
        println!("OK");
        return Ok(());
    }
    for warning in &warnings {
        tracing::warn!(%warning, "Configuration check");
        println!("WARNING {warning}");
    }
    anyhow::bail!("configuration check found {} warning(s)", warnings.len())
}
