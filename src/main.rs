//! monke-dist CLI
//!
//! Entry point for the `monke-dist` release packaging tool.

use clap::Parser;
use monke_dist::artifact::CleanupPolicy;
use monke_dist::build::ProcessRunner;
use monke_dist::config::{EffectiveConfig, REPO_CONFIG_FILE};
use monke_dist::{BuildRequest, FailureKind, Pipeline, Platform};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Package a compiled release into a distributable directory
#[derive(Parser)]
#[command(name = "monke-dist")]
#[command(about = "Release packaging for monke", version)]
struct Cli {
    /// Output directory (default: dist/<app-name>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Synchronize assets, build and assemble the distribution
    #[arg(short, long)]
    build: bool,

    /// Request publishing to Steam (recorded only)
    #[arg(long)]
    steam: bool,

    /// Target platform
    #[arg(long, value_enum, default_value_t = Platform::Windows)]
    platform: Platform,

    /// Path to repo config file
    #[arg(long, short = 'c', default_value = REPO_CONFIG_FILE)]
    config: PathBuf,

    /// Build configuration (default: Release)
    #[arg(long)]
    configuration: Option<String>,

    /// What to do with the build workspace afterwards
    #[arg(long, value_enum)]
    cleanup: Option<CleanupPolicy>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Output the run summary in JSON format
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags that override configuration values
    fn config_overrides(&self) -> Option<Value> {
        let mut overrides = Map::new();
        if let Some(ref configuration) = self.configuration {
            overrides.insert("build".to_string(), json!({ "configuration": configuration }));
        }
        if let Some(cleanup) = self.cleanup {
            overrides.insert("cleanup".to_string(), json!(cleanup.as_str()));
        }
        if overrides.is_empty() {
            None
        } else {
            Some(Value::Object(overrides))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let effective = match EffectiveConfig::build(Some(&cli.config), cli.config_overrides()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: configuration error: {}", e);
            process::exit(FailureKind::Config.exit_code());
        }
    };

    if cli.print_config {
        match effective.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(FailureKind::Io.exit_code());
            }
        }
        return;
    }

    let config = match effective.packager() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: configuration error: {}", e);
            process::exit(FailureKind::Config.exit_code());
        }
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| config.default_output_dir());
    let mut request = BuildRequest::new(output)
        .build(cli.build)
        .platform(cli.platform);
    request.publish = cli.steam;

    let pipeline = Pipeline::new(config, Arc::new(ProcessRunner::new()));
    match pipeline.run(&request) {
        Ok(summary) => {
            if cli.json {
                match summary.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        process::exit(FailureKind::Io.exit_code());
                    }
                }
            } else {
                println!("{}", summary.human());
            }
        }
        Err(e) => {
            let kind = e.failure_kind();
            eprintln!("error: {}: {}", kind.description(), e);
            let output = e.tool_output();
            if !output.is_empty() {
                eprintln!("--- last {} lines of build tool output ---", output.len());
                for line in output {
                    eprintln!("{}", line);
                }
            }
            process::exit(kind.exit_code());
        }
    }
}
