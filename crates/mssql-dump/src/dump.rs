//! Dump run composition.
//!
//! `Dumper` wires a driver to a set of options and assembles the final
//! script in the conventional order: schema, data, constraints. Constraints
//! come last so bulk inserts never trip referential checks during replay.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DumpOptions;
use crate::driver::create_driver;
use crate::error::Result;

/// Composes connect + dump operations into one run.
pub struct Dumper {
    options: DumpOptions,
    cancel: CancellationToken,
}

/// Result of a dump run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpSummary {
    /// Engine the dump was taken from.
    pub engine: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Bytes in the schema section (0 when not included).
    pub schema_bytes: usize,

    /// Bytes in the data section (0 when not included).
    pub data_bytes: usize,

    /// Bytes in the constraints section (0 when not included).
    pub constraint_bytes: usize,

    /// Tables whose data was skipped on request.
    pub skipped_tables: Vec<String>,
}

impl DumpSummary {
    /// Convert to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A finished dump: the replayable script plus run statistics.
#[derive(Debug, Clone)]
pub struct DumpOutcome {
    pub script: String,
    pub summary: DumpSummary,
}

impl Dumper {
    /// Create a dumper after validating the options.
    pub fn new(options: DumpOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an external cancellation token (signal handling).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the dump run and assemble the script.
    ///
    /// Any failure aborts the whole run; a partially assembled script is
    /// never returned as success.
    pub async fn run(&self) -> Result<DumpOutcome> {
        let started = Instant::now();

        let mut driver = create_driver(
            self.options.engine,
            self.options.engine_config(),
            self.cancel.clone(),
        )?;
        driver.connect(&self.options.connection_string).await?;

        let include = self.options.include;
        let mut script = String::new();
        let mut summary = DumpSummary {
            engine: self.options.engine.to_string(),
            duration_seconds: 0.0,
            schema_bytes: 0,
            data_bytes: 0,
            constraint_bytes: 0,
            skipped_tables: self.options.skip_data.clone(),
        };

        if include.schema() {
            let section = driver.dump_schema().await?;
            summary.schema_bytes = section.len();
            script.push_str(&section);
        }

        if include.data() {
            let section = driver.dump_data(&self.options.skip_data).await?;
            summary.data_bytes = section.len();
            script.push_str(&section);
        }

        if include.constraints() {
            let section = driver.dump_constraints().await?;
            summary.constraint_bytes = section.len();
            script.push_str(&section);
        }

        summary.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "Dump completed in {:.1}s ({} bytes)",
            summary.duration_seconds,
            script.len()
        );

        Ok(DumpOutcome { script, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Include;
    use crate::driver::Engine;
    use crate::error::DumpError;

    #[test]
    fn invalid_options_fail_construction() {
        let options = DumpOptions::default();
        assert!(matches!(Dumper::new(options), Err(DumpError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unsupported_engine_fails_before_connecting() {
        let options = DumpOptions {
            connection_string: "server=tcp:localhost,1433".to_string(),
            engine: Engine::Postgres,
            include: Include::Schema,
            ..DumpOptions::default()
        };
        let dumper = Dumper::new(options).unwrap();
        assert!(matches!(
            dumper.run().await,
            Err(DumpError::UnsupportedEngine(_))
        ));
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = DumpSummary {
            engine: "mssql".to_string(),
            duration_seconds: 1.5,
            schema_bytes: 10,
            data_bytes: 20,
            constraint_bytes: 5,
            skipped_tables: vec!["AuditLog".to_string()],
        };
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"engine\": \"mssql\""));
        assert!(json.contains("AuditLog"));
    }
}
