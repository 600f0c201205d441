//! distmc CLI entry point

use anyhow::{Context, Result};
use distmc::config::cli::Cli;
use distmc::config::{toml, validator, Config};
use distmc::coordinator::Coordinator;
use distmc::output::{json, text};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    init_logging(&cli);

    println!("distmc v{}", env!("CARGO_PKG_VERSION"));
    println!("Distributed Monte Carlo estimation");
    println!();

    let config = build_config(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    text::print_configuration(&config);

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    println!();

    let report = Coordinator::new(config.clone()).run()?;

    text::print_results(&report, &config);

    if let Some(ref path) = config.output.json_output {
        json::write_json_output(path, &json::build_report(&report, &config), true)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

/// RUST_LOG wins over -v
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Start from the TOML file if given, otherwise from defaults; CLI flags override
fn build_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => toml::parse_toml_file(path)?,
        None => Config::default(),
    };

    toml::merge_cli_with_config(cli, base)
}
