//! mssql-dump CLI - dump an MSSQL database into a replayable SQL script.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mssql_dump::{DumpError, DumpOptions, Dumper, Engine, EngineConfig, Include};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mssql-dump")]
#[command(about = "Dump a database's schema, data and constraints into a replayable script")]
#[command(version)]
struct Cli {
    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the database into a SQL script file
    Dump {
        /// Connection string of the database (required)
        #[arg(long)]
        conn: String,

        /// Database engine (mssql, postgres, sqlite)
        #[arg(long, default_value = "mssql")]
        db: String,

        /// What to include: all, schema or data
        #[arg(long, default_value = "all")]
        include: String,

        /// Comma-separated list of tables whose data is skipped
        #[arg(long, default_value = "")]
        skip_data: String,

        /// File to save the dump
        #[arg(long, short, default_value = "dump.sql")]
        output: PathBuf,

        /// Rows per INSERT statement
        #[arg(long, default_value = "50")]
        batch_size: usize,

        /// Maximum concurrent per-table dump tasks
        #[arg(long)]
        workers: Option<usize>,

        /// Per-table deadline in seconds
        #[arg(long, default_value = "60")]
        table_timeout: u64,

        /// Print the run summary as JSON
        #[arg(long)]
        output_json: bool,
    },

    /// Import a previously produced script (not implemented)
    Import {
        /// Connection string of the target database
        #[arg(long)]
        conn: String,

        /// Path to the SQL script to import
        #[arg(long)]
        file: PathBuf,
    },

    /// Test the database connection
    HealthCheck {
        /// Connection string of the database (required)
        #[arg(long)]
        conn: String,

        /// Database engine (mssql, postgres, sqlite)
        #[arg(long, default_value = "mssql")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DumpError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;
    let cancel = setup_signal_handler();

    match cli.command {
        Commands::Dump {
            conn,
            db,
            include,
            skip_data,
            output,
            batch_size,
            workers,
            table_timeout,
            output_json,
        } => {
            let options = DumpOptions {
                connection_string: conn,
                engine: db.parse::<Engine>()?,
                include: include.parse::<Include>()?,
                skip_data: split_and_trim(&skip_data, ','),
                batch_size,
                workers: workers.unwrap_or_else(mssql_dump::engine::default_workers),
                table_timeout_secs: table_timeout,
            };

            if !options.skip_data.is_empty() {
                info!("Skipping data for tables: {:?}", options.skip_data);
            }

            let dumper = Dumper::new(options)?.with_cancellation(cancel);
            let outcome = dumper.run().await?;

            std::fs::write(&output, &outcome.script)?;
            info!("Dump written to {:?}", output);

            if output_json {
                println!("{}", outcome.summary.to_json()?);
            } else {
                println!("\nDump completed!");
                println!("  Duration: {:.2}s", outcome.summary.duration_seconds);
                println!("  Schema: {} bytes", outcome.summary.schema_bytes);
                println!("  Data: {} bytes", outcome.summary.data_bytes);
                println!("  Constraints: {} bytes", outcome.summary.constraint_bytes);
                if !outcome.summary.skipped_tables.is_empty() {
                    println!("  Skipped data: {:?}", outcome.summary.skipped_tables);
                }
            }
        }

        Commands::Import { .. } => {
            return Err(DumpError::InvalidInput(
                "the import command is not implemented yet; only dump is supported".to_string(),
            ));
        }

        Commands::HealthCheck { conn, db } => {
            let engine = db.parse::<Engine>()?;
            let mut driver =
                mssql_dump::create_driver(engine, EngineConfig::default(), cancel.clone())?;

            let start = std::time::Instant::now();
            driver.connect(&conn).await?;
            println!(
                "Health Check: {} OK ({}ms)",
                engine,
                start.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

/// Split a comma-separated flag value, dropping empty entries.
fn split_and_trim(input: &str, sep: char) -> Vec<String> {
    input
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), DumpError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => {
            return Err(DumpError::InvalidInput(format!(
                "unknown verbosity '{}'",
                other
            )))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().init(),
        "text" => builder.init(),
        other => {
            return Err(DumpError::InvalidInput(format!(
                "unknown log format '{}'",
                other
            )))
        }
    }

    Ok(())
}

/// Cancel the run on SIGINT/SIGTERM so a half-written dump is never left
/// behind as if complete.
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();

    #[cfg(unix)]
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => warn!("Received SIGINT, cancelling dump"),
                _ = sigterm.recv() => warn!("Received SIGTERM, cancelling dump"),
            }
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl-C, cancelling dump");
                token.cancel();
            }
        });
    }

    cancel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_trim_drops_blanks() {
        assert_eq!(
            split_and_trim("a, b ,,c ", ','),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_and_trim("", ',').is_empty());
        assert!(split_and_trim(" , ", ',').is_empty());
    }
}
