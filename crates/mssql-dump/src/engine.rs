//! Concurrent, batched data dumping.
//!
//! One task per table, bounded by a worker-pool semaphore, each with its own
//! deadline around the row loop. The rendered block for a table is appended
//! to the shared output buffer in one exclusive-access critical section, so
//! blocks never interleave; ordering between tables is whatever completion
//! order produces, which is safe because constraints are applied after data
//! load in the assembled script.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::ColumnDef;
use crate::error::{DumpError, Result};
use crate::naming::{format_object_name, TableName};
use crate::value::SqlValue;

/// Terminator between table blocks and script sections, for sequential
/// replay.
pub const BATCH_SEPARATOR: &str = "GO;";

/// Rows per multi-row INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Per-table row-streaming deadline.
pub const DEFAULT_TABLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Data dump engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rows per INSERT statement.
    pub batch_size: usize,

    /// Maximum concurrent per-table tasks.
    pub workers: usize,

    /// Deadline for a single table's row loop.
    pub table_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            table_timeout: DEFAULT_TABLE_TIMEOUT,
        }
    }
}

/// Worker cap derived from available cores, bounded to keep connection
/// usage sane on wide machines.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(2, 8)
}

/// Accumulates rows into fixed-size multi-row INSERT statements.
pub struct InsertBatcher {
    head: String,
    batch_size: usize,
    pending: Vec<String>,
    out: String,
    rows_seen: usize,
}

impl InsertBatcher {
    /// Start a batcher for one table.
    pub fn new(table: &TableName, column_names: &[String], batch_size: usize) -> Self {
        let cols = column_names
            .iter()
            .map(|c| format_object_name(&[c]))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            head: format!("INSERT INTO {} ({}) VALUES \n", table, cols),
            batch_size: batch_size.max(1),
            pending: Vec::with_capacity(batch_size),
            out: String::new(),
            rows_seen: 0,
        }
    }

    /// Append one row; flushes a full statement every `batch_size` rows.
    pub fn push_row(&mut self, values: &[SqlValue]) {
        if self.pending.is_empty() {
            self.out.push_str(&self.head);
        }
        let literals = values
            .iter()
            .map(SqlValue::to_sql_literal)
            .collect::<Vec<_>>()
            .join(", ");
        self.pending.push(format!("({})", literals));
        self.rows_seen += 1;

        if self.pending.len() >= self.batch_size {
            self.flush();
        }
    }

    /// Number of rows pushed so far.
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Flush any partial batch and return the accumulated statements.
    pub fn finish(mut self) -> String {
        self.flush();
        self.out
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.out.push_str(&self.pending.join(",\n"));
        self.out.push_str(";\n");
        self.pending.clear();
    }
}

/// Wrap a table's INSERT statements into its output block: comment header,
/// identity-insert toggles when any column is an identity column, and the
/// batch terminator.
pub fn render_table_block(
    table: &TableName,
    column_defs: &[ColumnDef],
    insert_statements: &str,
) -> String {
    let mut block = format!("-- Data dump for table: {}\n", table);

    let has_identity = column_defs.iter().any(|c| c.is_identity);
    if has_identity {
        block.push_str(&format!("SET IDENTITY_INSERT {} ON;\n", table));
        block.push_str(insert_statements);
        block.push_str(&format!("SET IDENTITY_INSERT {} OFF;\n", table));
    } else {
        block.push_str(insert_statements);
    }

    block.push_str(&format!("\n{}\n\n", BATCH_SEPARATOR));
    block
}

/// Outcome of one table task, reported on the progress channel.
enum TableOutcome {
    Dumped,
    Skipped,
}

/// Dump all tables concurrently through `dump_one` and concatenate the
/// rendered blocks.
///
/// `dump_one` receives a table name and returns that table's fully rendered
/// block; it is responsible for row streaming and cancellation checks
/// between rows. Tables whose bare name is in `skip_data` are reported as
/// progress but contribute nothing.
///
/// All tasks run to completion even when some fail; failures are aggregated
/// into a single error naming every failed table, and accumulated output is
/// discarded.
pub(crate) async fn dump_tables_concurrently<F, Fut>(
    tables: Vec<TableName>,
    skip_data: Arc<HashSet<String>>,
    config: EngineConfig,
    cancel: CancellationToken,
    dump_one: F,
) -> Result<String>
where
    F: Fn(TableName) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let total = tables.len();
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let output = Arc::new(Mutex::new(String::new()));
    let dump_one = Arc::new(dump_one);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<TableOutcome>();
    let reporter = tokio::spawn(async move {
        let mut processed = 0;
        while let Some(outcome) = progress_rx.recv().await {
            processed += 1;
            match outcome {
                TableOutcome::Dumped => info!("Dumping data ({}/{})", processed, total),
                TableOutcome::Skipped => debug!("Skipped data ({}/{})", processed, total),
            }
        }
    });

    let mut handles = Vec::with_capacity(total);
    for table in tables {
        let semaphore = semaphore.clone();
        let output = output.clone();
        let skip_data = skip_data.clone();
        let progress = progress_tx.clone();
        let cancel = cancel.clone();
        let dump_one = dump_one.clone();
        let timeout = config.table_timeout;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| DumpError::pool(e.to_string(), "data dump worker pool"))?;

            let (_, bare_name) = table.parts();
            if skip_data.contains(&bare_name) {
                let _ = progress.send(TableOutcome::Skipped);
                return Ok::<(), DumpError>(());
            }

            let block = tokio::select! {
                _ = cancel.cancelled() => Err(DumpError::Cancelled),
                res = tokio::time::timeout(timeout, dump_one(table.clone())) => match res {
                    Err(_) => Err(DumpError::Timeout {
                        table: table.to_string(),
                        seconds: timeout.as_secs(),
                    }),
                    Ok(block) => block,
                },
            }?;

            let mut buf = output.lock().expect("dump output lock poisoned");
            buf.push_str(&block);
            drop(buf);

            let _ = progress.send(TableOutcome::Dumped);
            Ok(())
        }));
    }
    drop(progress_tx);

    // Wait for every task so no work leaks, collecting all failures.
    let mut failures: Vec<String> = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e.to_string()),
            Err(e) => failures.push(format!("task panicked: {}", e)),
        }
    }

    let _ = reporter.await;

    if !failures.is_empty() {
        return Err(DumpError::data_dump(
            format!("{} table(s)", failures.len()),
            failures.join("; "),
        ));
    }

    let out = Arc::try_unwrap(output)
        .map(|m| m.into_inner().expect("dump output lock poisoned"))
        .unwrap_or_else(|arc| arc.lock().expect("dump output lock poisoned").clone());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;

    fn table(name: &str) -> TableName {
        TableName::new("dbo", name)
    }

    fn int_col(name: &str, is_identity: bool) -> ColumnDef {
        ColumnDef {
            schema: "dbo".to_string(),
            table: "T".to_string(),
            name: name.to_string(),
            ordinal: 1,
            data_type: "int".to_string(),
            max_length: 4,
            precision: 10,
            scale: 0,
            is_nullable: false,
            is_identity,
            is_computed: false,
        }
    }

    fn rows_of(n: usize) -> Vec<Vec<SqlValue>> {
        (0..n).map(|i| vec![SqlValue::I32(i as i32)]).collect()
    }

    fn batch_insert(table: &TableName, rows: &[Vec<SqlValue>], batch: usize) -> String {
        let mut b = InsertBatcher::new(table, &["Id".to_string()], batch);
        for row in rows {
            b.push_row(row);
        }
        b.finish()
    }

    #[test]
    fn batches_split_at_fixed_size() {
        let out = batch_insert(&table("T"), &rows_of(120), 50);
        assert_eq!(out.matches("INSERT INTO [dbo].[T]").count(), 3);
        assert_eq!(out.matches(';').count(), 3);
        // 50 + 50 + 20 value tuples
        assert_eq!(out.matches('(').count() - 3, 120);
    }

    #[test]
    fn exact_multiple_has_no_empty_statement() {
        let out = batch_insert(&table("T"), &rows_of(100), 50);
        assert_eq!(out.matches("INSERT INTO").count(), 2);
    }

    #[test]
    fn no_rows_renders_nothing() {
        let out = batch_insert(&table("T"), &[], 50);
        assert!(out.is_empty());
    }

    #[test]
    fn identity_table_is_wrapped() {
        let stmts = batch_insert(&table("T"), &rows_of(1), 50);
        let block = render_table_block(&table("T"), &[int_col("Id", true)], &stmts);

        let on = block.find("SET IDENTITY_INSERT [dbo].[T] ON;").unwrap();
        let ins = block.find("INSERT INTO").unwrap();
        let off = block.find("SET IDENTITY_INSERT [dbo].[T] OFF;").unwrap();
        assert!(on < ins && ins < off);
        assert!(block.trim_end().ends_with(BATCH_SEPARATOR));
    }

    #[test]
    fn plain_table_has_no_identity_toggle() {
        let stmts = batch_insert(&table("T"), &rows_of(1), 50);
        let block = render_table_block(&table("T"), &[int_col("Id", false)], &stmts);
        assert!(!block.contains("IDENTITY_INSERT"));
        assert!(block.starts_with("-- Data dump for table: [dbo].[T]\n"));
    }

    #[tokio::test]
    async fn concurrent_blocks_never_interleave() {
        let tables: Vec<TableName> = (0..8).map(|i| table(&format!("T{}", i))).collect();
        let expected: Vec<String> = tables.iter().map(|t| format!("<{}>", t)).collect();

        let out = dump_tables_concurrently(
            tables,
            Arc::new(HashSet::new()),
            EngineConfig::default(),
            CancellationToken::new(),
            |t: TableName| async move {
                // Stagger completions so append order differs from spawn order.
                let (_, bare) = t.parts();
                let n: u64 = bare.trim_start_matches('T').parse().unwrap();
                tokio::time::sleep(Duration::from_millis((8 - n) * 5)).await;
                Ok(format!("<{}>", t))
            },
        )
        .await
        .unwrap();

        for block in expected {
            assert_eq!(out.matches(&block).count(), 1);
        }
    }

    #[tokio::test]
    async fn skipped_tables_emit_nothing() {
        let skip: HashSet<String> = ["T1".to_string()].into_iter().collect();
        let out = dump_tables_concurrently(
            vec![table("T0"), table("T1")],
            Arc::new(skip),
            EngineConfig::default(),
            CancellationToken::new(),
            |t: TableName| async move { Ok(format!("<{}>", t)) },
        )
        .await
        .unwrap();

        assert!(out.contains("<[dbo].[T0]>"));
        assert!(!out.contains("T1"));
    }

    #[tokio::test]
    async fn failures_aggregate_across_tables() {
        let result = dump_tables_concurrently(
            vec![table("Good"), table("Bad1"), table("Bad2")],
            Arc::new(HashSet::new()),
            EngineConfig::default(),
            CancellationToken::new(),
            |t: TableName| async move {
                let (_, bare) = t.parts();
                if bare.starts_with("Bad") {
                    Err(DumpError::data_dump(t.to_string(), "boom"))
                } else {
                    Ok(String::from("ok"))
                }
            },
        )
        .await;

        let err = result.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Bad1") && msg.contains("Bad2"));
    }

    #[tokio::test]
    async fn per_table_timeout_fires() {
        let config = EngineConfig {
            table_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let result = dump_tables_concurrently(
            vec![table("Slow")],
            Arc::new(HashSet::new()),
            config,
            CancellationToken::new(),
            |_t: TableName| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(String::new())
            },
        )
        .await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_tables() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = dump_tables_concurrently(
            vec![table("T0")],
            Arc::new(HashSet::new()),
            EngineConfig::default(),
            cancel,
            |_t: TableName| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(String::new())
            },
        )
        .await;

        assert!(result.unwrap_err().to_string().contains("cancelled"));
    }
}
