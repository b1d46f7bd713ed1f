//! Dump run options.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::Engine;
use crate::engine::{default_workers, EngineConfig, DEFAULT_BATCH_SIZE};
use crate::error::{DumpError, Result};

/// Which script sections a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Include {
    /// Schema, data and constraints.
    #[default]
    All,

    /// Schema and constraints only (table structures).
    Schema,

    /// Data only (INSERT statements).
    Data,
}

impl Include {
    pub fn schema(&self) -> bool {
        matches!(self, Include::All | Include::Schema)
    }

    pub fn data(&self) -> bool {
        matches!(self, Include::All | Include::Data)
    }

    pub fn constraints(&self) -> bool {
        matches!(self, Include::All | Include::Schema)
    }
}

impl FromStr for Include {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Include::All),
            "schema" | "content" => Ok(Include::Schema),
            "data" => Ok(Include::Data),
            other => Err(DumpError::InvalidInput(format!(
                "unknown include selection '{}' (expected all, schema or data)",
                other
            ))),
        }
    }
}

/// Options for one dump run.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Opaque, engine-specific connection string. Never parsed by the core;
    /// it is handed verbatim to the driver library.
    pub connection_string: String,

    /// Which engine to dump from.
    pub engine: Engine,

    /// Which sections to produce.
    pub include: Include,

    /// Bare table names whose data is excluded (schema is still dumped).
    pub skip_data: Vec<String>,

    /// Rows per INSERT statement.
    pub batch_size: usize,

    /// Maximum concurrent per-table dump tasks.
    pub workers: usize,

    /// Per-table row-streaming deadline in seconds.
    pub table_timeout_secs: u64,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            engine: Engine::Mssql,
            include: Include::All,
            skip_data: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            table_timeout_secs: 60,
        }
    }
}

impl DumpOptions {
    /// Validate the options before a run.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(DumpError::InvalidInput(
                "connection string is required".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(DumpError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(DumpError::InvalidInput(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.table_timeout_secs == 0 {
            return Err(DumpError::InvalidInput(
                "table timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine-level configuration derived from these options.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size,
            workers: self.workers,
            table_timeout: Duration::from_secs(self.table_timeout_secs),
        }
    }
}
