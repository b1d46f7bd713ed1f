//! MSSQL driver: tiberius clients behind a bb8 pool.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures::TryStreamExt;
use tiberius::{Client, Config, QueryItem, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{self, build_table_mapping, ColumnDef, TableMapping};
use crate::constraints::{assemble_constraints_section, ForeignKeyRow, PrimaryKeyRow};
use crate::depgraph::{
    build_dependency_tree, sort_tables_by_dependencies, validate_skip_list, DependencyRow,
};
use crate::driver::DatabaseDriver;
use crate::engine::{
    dump_tables_concurrently, render_table_block, EngineConfig, InsertBatcher, BATCH_SEPARATOR,
};
use crate::error::{DumpError, Result};
use crate::naming::TableName;
use crate::schema::assemble_schema_section;
use crate::value::SqlValue;

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: Config,
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// MSSQL implementation of [`DatabaseDriver`].
pub struct MssqlDriver {
    pool: Option<Pool<TiberiusConnectionManager>>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl MssqlDriver {
    /// Create a disconnected driver.
    pub fn new(config: EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            pool: None,
            config,
            cancel,
        }
    }

    fn pool(&self) -> Result<&Pool<TiberiusConnectionManager>> {
        self.pool
            .as_ref()
            .ok_or_else(|| DumpError::pool("not connected", "call connect before dumping"))
    }

    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool()?
            .get()
            .await
            .map_err(|e| DumpError::pool(e.to_string(), "failed to get connection"))
    }

    async fn run_catalog_query(&self, sql: &str, stage: &str) -> Result<Vec<Row>> {
        let mut client = self.get_client().await?;
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| DumpError::query(stage, e.to_string()))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| DumpError::query(stage, e.to_string()))
    }

    /// All base tables with schema and name.
    async fn fetch_table_list(&self) -> Result<Vec<TableName>> {
        let rows = self
            .run_catalog_query(catalog::QUERY_TABLE_LIST, "table list")
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: &str = row.get(0).unwrap_or_default();
            let table: &str = row.get(1).unwrap_or_default();
            tables.push(TableName::new(schema, table));
        }
        Ok(tables)
    }

    /// Column metadata for every table, grouped and ordered by ordinal.
    async fn fetch_table_mappings(&self) -> Result<TableMapping> {
        let rows = self
            .run_catalog_query(catalog::QUERY_TABLE_MAPPINGS, "table mappings")
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnDef {
                schema: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                table: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                name: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                ordinal: row.get::<i32, _>(3).unwrap_or(0),
                data_type: row.get::<&str, _>(4).unwrap_or_default().to_string(),
                max_length: row.get::<i32, _>(5).unwrap_or(0),
                precision: row.get::<i32, _>(6).unwrap_or(0),
                scale: row.get::<i32, _>(7).unwrap_or(0),
                is_nullable: row.get::<bool, _>(8).unwrap_or(false),
                is_identity: row.get::<bool, _>(9).unwrap_or(false),
                is_computed: row.get::<bool, _>(10).unwrap_or(false),
            });
        }
        Ok(build_table_mapping(columns))
    }

    /// Foreign-key relationships, child side nullable.
    async fn fetch_dependency_rows(&self) -> Result<Vec<DependencyRow>> {
        let rows = self
            .run_catalog_query(catalog::QUERY_DEPENDENCIES, "dependencies")
            .await?;

        Ok(rows
            .iter()
            .map(|row| DependencyRow {
                child_schema: row.get::<&str, _>(0).map(str::to_string),
                child_table: row.get::<&str, _>(1).map(str::to_string),
                parent_schema: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                parent_table: row.get::<&str, _>(3).unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn fetch_primary_key_rows(&self) -> Result<Vec<PrimaryKeyRow>> {
        let rows = self
            .run_catalog_query(catalog::QUERY_PRIMARY_KEYS, "primary keys")
            .await?;

        Ok(rows
            .iter()
            .map(|row| PrimaryKeyRow {
                schema: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                table: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                constraint_name: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                column: row.get::<&str, _>(3).unwrap_or_default().to_string(),
                ordinal: row.get::<i32, _>(4).unwrap_or(0),
            })
            .collect())
    }

    async fn fetch_foreign_key_rows(&self) -> Result<Vec<ForeignKeyRow>> {
        let rows = self
            .run_catalog_query(catalog::QUERY_FOREIGN_KEYS, "foreign keys")
            .await?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeyRow {
                child_schema: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                child_table: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                constraint_name: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                parent_schema: row.get::<&str, _>(3).unwrap_or_default().to_string(),
                parent_table: row.get::<&str, _>(4).unwrap_or_default().to_string(),
                child_column: row.get::<&str, _>(5).unwrap_or_default().to_string(),
                parent_column: row.get::<&str, _>(6).unwrap_or_default().to_string(),
                update_rule: row.get::<&str, _>(7).unwrap_or_default().to_string(),
                delete_rule: row.get::<&str, _>(8).unwrap_or_default().to_string(),
                ordinal: row.get::<i32, _>(9).unwrap_or(0),
            })
            .collect())
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    async fn connect(&mut self, connection_string: &str) -> Result<()> {
        if connection_string.trim().is_empty() {
            return Err(DumpError::InvalidInput(
                "connection string is required".to_string(),
            ));
        }

        let config = Config::from_ado_string(connection_string)?;
        let manager = TiberiusConnectionManager { config };

        // One connection per worker plus one for catalog queries.
        let pool = Pool::builder()
            .max_size(self.config.workers as u32 + 1)
            .build(manager)
            .await
            .map_err(|e| DumpError::pool(e.to_string(), "failed to create MSSQL pool"))?;

        // Liveness check before reporting the connection as usable.
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| DumpError::pool(e.to_string(), "failed to get connection"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!("Connected to MSSQL (pool_size={})", self.config.workers + 1);
        self.pool = Some(pool);
        Ok(())
    }

    async fn dump_schema(&self) -> Result<String> {
        let dependency_rows = self.fetch_dependency_rows().await?;
        let tables = self.fetch_table_list().await?;

        let deps = build_dependency_tree(&dependency_rows, &tables);
        let sorted = sort_tables_by_dependencies(&deps)?;
        let mapping = self.fetch_table_mappings().await?;

        info!("Dumping schema for {} tables", sorted.len());
        let mut section = assemble_schema_section(&sorted, &mapping)?;
        section.push_str(&format!("{}\n\n", BATCH_SEPARATOR));
        Ok(section)
    }

    async fn dump_data(&self, skip_data: &[String]) -> Result<String> {
        let tables = self.fetch_table_list().await?;
        let mapping = Arc::new(self.fetch_table_mappings().await?);

        // Skipping the data of a referenced parent would produce a script
        // that violates its dependents' foreign keys on replay.
        let dependency_rows = self.fetch_dependency_rows().await?;
        let deps = build_dependency_tree(&dependency_rows, &tables);
        validate_skip_list(&deps, skip_data)?;

        let skip: HashSet<String> = skip_data.iter().cloned().collect();
        let pool = self.pool()?.clone();
        let batch_size = self.config.batch_size;
        let cancel = self.cancel.clone();

        info!("Dumping data for {} tables", tables.len());
        dump_tables_concurrently(
            tables,
            Arc::new(skip),
            self.config.clone(),
            self.cancel.clone(),
            move |table: TableName| {
                dump_table_data(
                    pool.clone(),
                    table,
                    mapping.clone(),
                    batch_size,
                    cancel.clone(),
                )
            },
        )
        .await
    }

    async fn dump_constraints(&self) -> Result<String> {
        let pk_rows = self.fetch_primary_key_rows().await?;
        let fk_rows = self.fetch_foreign_key_rows().await?;

        info!(
            "Dumping constraints ({} PK rows, {} FK rows)",
            pk_rows.len(),
            fk_rows.len()
        );
        let mut section = assemble_constraints_section(&pk_rows, &fk_rows);
        section.push_str(&format!("\n{}\n", BATCH_SEPARATOR));
        Ok(section)
    }
}

/// Stream one table's rows and render its INSERT block.
async fn dump_table_data(
    pool: Pool<TiberiusConnectionManager>,
    table: TableName,
    mapping: Arc<TableMapping>,
    batch_size: usize,
    cancel: CancellationToken,
) -> Result<String> {
    let columns = mapping
        .get(&table)
        .ok_or_else(|| DumpError::data_dump(table.to_string(), "no column metadata"))?;

    if columns.iter().any(|c| is_spatial_type(&c.data_type)) {
        warn!(
            "table {} contains spatial columns; their values are dumped as NULL (known limitation)",
            table
        );
    }

    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut conn = pool
        .get()
        .await
        .map_err(|e| DumpError::pool(e.to_string(), "failed to get connection"))?;

    let query = format!("SELECT * FROM {}", table);
    let mut stream = conn
        .simple_query(&query)
        .await
        .map_err(|e| DumpError::data_dump(table.to_string(), e.to_string()))?;

    let mut batcher = InsertBatcher::new(&table, &column_names, batch_size);
    while let Some(item) = stream
        .try_next()
        .await
        .map_err(|e| DumpError::data_dump(table.to_string(), e.to_string()))?
    {
        if cancel.is_cancelled() {
            return Err(DumpError::Cancelled);
        }
        let row = match item {
            QueryItem::Row(row) => row,
            QueryItem::Metadata(_) => continue,
        };

        let values: Vec<SqlValue> = (0..columns.len())
            .map(|i| convert_row_value(&row, i, &columns[i].data_type))
            .collect();
        batcher.push_row(&values);
    }

    debug!("Dumped {} rows from {}", batcher.rows_seen(), table);
    Ok(render_table_block(&table, columns, &batcher.finish()))
}

/// Opaque spatial types have no faithful literal form yet and are emitted
/// as NULL.
fn is_spatial_type(data_type: &str) -> bool {
    data_type.eq_ignore_ascii_case("geography") || data_type.eq_ignore_ascii_case("geometry")
}

/// Convert a row value to SqlValue based on the declared column type.
fn convert_row_value(row: &Row, idx: usize, data_type: &str) -> SqlValue {
    if is_spatial_type(data_type) {
        return SqlValue::Null;
    }

    let dt = data_type.to_lowercase();
    match dt.as_str() {
        "bit" => row.get::<bool, _>(idx).map(SqlValue::Bool).unwrap_or(SqlValue::Null),
        "tinyint" => row
            .get::<u8, _>(idx)
            .map(|v| SqlValue::I16(v as i16))
            .unwrap_or(SqlValue::Null),
        "smallint" => row.get::<i16, _>(idx).map(SqlValue::I16).unwrap_or(SqlValue::Null),
        "int" => row.get::<i32, _>(idx).map(SqlValue::I32).unwrap_or(SqlValue::Null),
        "bigint" => row.get::<i64, _>(idx).map(SqlValue::I64).unwrap_or(SqlValue::Null),
        "real" => row.get::<f32, _>(idx).map(SqlValue::F32).unwrap_or(SqlValue::Null),
        "float" => row.get::<f64, _>(idx).map(SqlValue::F64).unwrap_or(SqlValue::Null),
        "uniqueidentifier" => row
            .get::<uuid::Uuid, _>(idx)
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null),
        "datetime" | "datetime2" | "smalldatetime" => row
            .get::<chrono::NaiveDateTime, _>(idx)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null),
        "date" => {
            // Tiberius surfaces date as NaiveDateTime; keep only the date part.
            row.get::<chrono::NaiveDateTime, _>(idx)
                .map(|dt| SqlValue::Date(dt.date()))
                .unwrap_or(SqlValue::Null)
        }
        "time" => row
            .get::<chrono::NaiveDateTime, _>(idx)
            .map(|dt| SqlValue::Time(dt.time()))
            .unwrap_or(SqlValue::Null),
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => row
            .get::<&[u8], _>(idx)
            .map(|v| SqlValue::Bytes(v.to_vec()))
            .unwrap_or(SqlValue::Null),
        "decimal" | "numeric" | "money" | "smallmoney" => row
            .get::<&str, _>(idx)
            .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
            .map(SqlValue::Decimal)
            .or_else(|| row.get::<f64, _>(idx).map(SqlValue::F64))
            .unwrap_or(SqlValue::Null),
        // varchar, nvarchar, char, nchar, text, ntext, xml, etc.
        _ => row
            .get::<&str, _>(idx)
            .map(|s| SqlValue::String(s.to_string()))
            .unwrap_or(SqlValue::Null),
    }
}
