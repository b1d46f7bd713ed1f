//! Error types for the dump library.

use thiserror::Error;

/// Main error type for dump operations.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Invalid input (bad flags, empty connection string, malformed options).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to establish or validate a database connection.
    #[error("Connection error: {0}")]
    Connection(#[from] tiberius::error::Error),

    /// Connection pool error with context about where it occurred.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A catalog or data query failed at a named stage.
    #[error("Query error at {stage}: {message}")]
    Query { stage: String, message: String },

    /// Schema dump failed.
    #[error("Schema dump failed: {0}")]
    SchemaDump(String),

    /// Data dump failed for one or more tables.
    #[error("Data dump failed for {table}: {message}")]
    DataDump { table: String, message: String },

    /// Constraint dump failed.
    #[error("Constraint dump failed: {0}")]
    ConstraintDump(String),

    /// Cyclic or incomplete dependency graph - no valid table ordering exists.
    #[error("Cyclic dependency or incomplete dependency graph detected")]
    DependencyCycle,

    /// The requested database engine has no working driver.
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    /// A per-table dump exceeded its deadline.
    #[error("Dump of table {table} timed out after {seconds}s")]
    Timeout { table: String, seconds: u64 },

    /// The dump run was cancelled (SIGINT, etc.)
    #[error("Dump cancelled")]
    Cancelled,

    /// IO error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DumpError {
    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        DumpError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Query error for a named query stage.
    pub fn query(stage: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::Query {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a DataDump error for a table.
    pub fn data_dump(table: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::DataDump {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            DumpError::InvalidInput(_) => 2,
            DumpError::Connection(_) | DumpError::Pool { .. } => 3,
            DumpError::UnsupportedEngine(_) => 4,
            DumpError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for dump operations.
pub type Result<T> = std::result::Result<T, DumpError>;
