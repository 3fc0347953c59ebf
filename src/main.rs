// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sensorbarn

//! SensorBarn command-line front end
//!
//! Adds, finds and bulk-loads sensor types, sensors and readings in the
//! store named by the configured (or `--db`) connection URL.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use sensorbarn::cli::parse_assignments;
use sensorbarn::loader::{load_records, LoadReport};
use sensorbarn::{AppErrors, Config, Engine, EntityKind, VERSION};

/// SensorBarn - sensor telemetry catalog
#[derive(Parser, Debug)]
#[command(name = "sensorbarn")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Validated catalog of sensor types, sensors and period-aligned readings")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, `scheme://host:port/database`
    #[arg(long)]
    db: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add one record
    Add {
        kind: EntityKind,
        /// Field values; dotted names nest (`limits.min=0`)
        #[arg(value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
    /// Find records and print the result as JSON
    Find {
        kind: EntityKind,
        #[arg(value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
    /// Add every record of JSON array files
    Load {
        kind: EntityKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove all sensor types, sensors and readings
    Clear,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_create(&config_path)?.with_database_url(args.db);

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("SensorBarn v{}, configuration {:?}", VERSION, config_path);

    let engine = match Engine::connect(&config.database.url, &config.database).await {
        Ok(engine) => engine,
        Err(errors) => {
            report(&errors);
            return Ok(ExitCode::FAILURE);
        }
    };

    let outcome = run(&engine, args.command).await;
    let closed = engine.close().await;

    let mut ok = match outcome {
        Ok(failures) => {
            for line in &failures {
                eprintln!("{}", line);
            }
            failures.is_empty()
        }
        Err(err) => {
            eprintln!("{:#}", err);
            false
        }
    };
    if let Err(errors) = closed {
        report(&errors);
        ok = false;
    }

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run one command, returning the user-facing error lines
async fn run(engine: &Engine, command: Command) -> Result<Vec<String>> {
    match command {
        Command::Add { kind, fields } => {
            let outcome = match parse_assignments(&fields) {
                Ok(record) => engine.add(kind, &record).await,
                Err(errors) => Err(errors),
            };
            Ok(lines(outcome.err()))
        }
        Command::Find { kind, fields } => {
            let outcome = match parse_assignments(&fields) {
                Ok(spec) => engine.find(kind, &spec).await,
                Err(errors) => Err(errors),
            };
            match outcome {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(Vec::new())
                }
                Err(errors) => Ok(lines(Some(errors))),
            }
        }
        Command::Load { kind, files } => {
            let mut total = LoadReport::default();
            for path in &files {
                total.merge(load_records(engine, kind, path).await?);
            }
            Ok(total.failures)
        }
        Command::Clear => Ok(lines(engine.clear().await.err())),
    }
}

fn lines(errors: Option<AppErrors>) -> Vec<String> {
    errors
        .into_iter()
        .flatten()
        .map(|err| err.to_string())
        .collect()
}

fn report(errors: &AppErrors) {
    for err in errors.errors() {
        eprintln!("{}", err);
    }
}
