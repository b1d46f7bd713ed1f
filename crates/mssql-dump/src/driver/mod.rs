//! Database driver contract and engine selection.
//!
//! Additional engines plug in behind [`DatabaseDriver`] without touching
//! callers. Only MSSQL is production-ready; the other identifiers resolve to
//! a typed unsupported-engine error, never a silent no-op.

mod mssql;

pub use mssql::MssqlDriver;

use std::str::FromStr;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::EngineConfig;
use crate::error::{DumpError, Result};

/// Supported database engine identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Mssql,
    Postgres,
    Sqlite,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Mssql => "mssql",
            Engine::Postgres => "postgres",
            Engine::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mssql" => Ok(Engine::Mssql),
            "postgres" => Ok(Engine::Postgres),
            "sqlite" => Ok(Engine::Sqlite),
            other => Err(DumpError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// Uniform dump contract implemented per engine.
///
/// `connect` must succeed before any dump operation; the dump operations are
/// independent of each other, but the conventional script assembly order is
/// schema, then data, then constraints.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Open and liveness-check a connection from an opaque connection
    /// string. The string is handed to the engine's driver library and
    /// never parsed here.
    async fn connect(&mut self, connection_string: &str) -> Result<()>;

    /// Render the schema section: schema-creation guards and CREATE TABLE
    /// statements in dependency order.
    async fn dump_schema(&self) -> Result<String>;

    /// Render the data section: batched INSERT statements for every table
    /// whose bare name is not in `skip_data`.
    async fn dump_data(&self, skip_data: &[String]) -> Result<String>;

    /// Render the constraints section: PRIMARY KEY then FOREIGN KEY
    /// ALTER TABLE statements.
    async fn dump_constraints(&self) -> Result<String>;
}

/// Construct the driver for an engine.
///
/// # Errors
///
/// [`DumpError::UnsupportedEngine`] for engines without a working driver.
pub fn create_driver(
    engine: Engine,
    config: EngineConfig,
    cancel: CancellationToken,
) -> Result<Box<dyn DatabaseDriver>> {
    match engine {
        Engine::Mssql => Ok(Box::new(MssqlDriver::new(config, cancel))),
        other => Err(DumpError::UnsupportedEngine(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_parses_known_names() {
        assert_eq!("mssql".parse::<Engine>().unwrap(), Engine::Mssql);
        assert_eq!("MSSQL".parse::<Engine>().unwrap(), Engine::Mssql);
        assert!("oracle".parse::<Engine>().is_err());
    }

    #[test]
    fn only_mssql_has_a_driver() {
        let cancel = CancellationToken::new();
        assert!(create_driver(Engine::Mssql, EngineConfig::default(), cancel.clone()).is_ok());
        assert!(matches!(
            create_driver(Engine::Postgres, EngineConfig::default(), cancel.clone()),
            Err(DumpError::UnsupportedEngine(_))
        ));
        assert!(matches!(
            create_driver(Engine::Sqlite, EngineConfig::default(), cancel),
            Err(DumpError::UnsupportedEngine(_))
        ));
    }
}
