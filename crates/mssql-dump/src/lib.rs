//! # mssql-dump
//!
//! Library for dumping an MSSQL database's structure and contents into a
//! replayable, dependency-ordered SQL script:
//!
//! - **Dependency-ordered schema** - tables are topologically sorted by
//!   foreign-key dependency so CREATE TABLE statements replay cleanly
//! - **Concurrent data dump** - one bounded task per table with per-table
//!   deadlines, batched multi-row INSERT statements, identity-insert
//!   handling
//! - **Constraint reassembly** - composite primary and foreign keys
//!   regrouped from flat catalog rows into ALTER TABLE statements
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_dump::{DumpOptions, Dumper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mssql_dump::DumpError> {
//!     let options = DumpOptions {
//!         connection_string: "server=tcp:localhost,1433;user=sa;password=...".into(),
//!         ..DumpOptions::default()
//!     };
//!     let outcome = Dumper::new(options)?.run().await?;
//!     std::fs::write("dump.sql", outcome.script)?;
//!     println!("{}", outcome.summary.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod constraints;
pub mod depgraph;
pub mod driver;
pub mod dump;
pub mod engine;
pub mod error;
pub mod naming;
pub mod schema;
pub mod value;

// Re-exports for convenient access
pub use config::{DumpOptions, Include};
pub use driver::{create_driver, DatabaseDriver, Engine, MssqlDriver};
pub use dump::{DumpOutcome, DumpSummary, Dumper};
pub use engine::{EngineConfig, BATCH_SEPARATOR};
pub use error::{DumpError, Result};
pub use naming::{format_object_name, TableName};
