//! PostgreSQL backend over `tokio-postgres`, one connection per request.

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::warn;

use super::{ConnectionSource, Row, StoreConnection};
use crate::error::StoreError;
use crate::sql::{Dialect, SqlValue};

static NULL_INTEGER: Option<i64> = None;

/// Opens a fresh connection for every acquire.
#[derive(Clone)]
pub struct PostgresSource {
    conninfo: String,
}

impl PostgresSource {
    pub fn new(conninfo: impl Into<String>) -> Self {
        Self {
            conninfo: conninfo.into(),
        }
    }
}

#[async_trait]
impl ConnectionSource for PostgresSource {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let (client, connection) = tokio_postgres::connect(&self.conninfo, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection closed with error");
            }
        });
        Ok(Box::new(PostgresConnection { client, driver }))
    }
}

/// Client plus the spawned task driving its socket.
pub struct PostgresConnection {
    client: Client,
    driver: JoinHandle<()>,
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl StoreConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query_rows(&mut self, sql: &str, binds: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let params = bind_params(binds);
        let rows = self.client.query(sql, &params).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn query_count(&mut self, sql: &str, binds: &[SqlValue]) -> Result<u64, StoreError> {
        let params = bind_params(binds);
        let row = self.client.query_one(sql, &params).await?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn execute_committed(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<u64, StoreError> {
        let params = bind_params(binds);
        let transaction = self.client.transaction().await?;
        let affected = transaction.execute(sql, &params).await?;
        transaction.commit().await?;
        Ok(affected)
    }
}

fn bind_params(binds: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    binds.iter().map(as_param).collect()
}

fn as_param(value: &SqlValue) -> &(dyn ToSql + Sync) {
    match value {
        SqlValue::Text(text) => text,
        SqlValue::Integer(int) => int,
        // Nulls are only written into integer columns.
        SqlValue::Null => &NULL_INTEGER,
    }
}

fn row_to_json(row: &tokio_postgres::Row) -> Result<Row, StoreError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = match column.type_().name() {
            "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
            "int2" => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
            "int4" => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
            "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
            "oid" => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
            "float4" => row
                .try_get::<_, Option<f32>>(idx)?
                .map(|v| Value::from(f64::from(v))),
            "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
            other => row
                .try_get::<_, Option<String>>(idx)
                .map_err(|err| StoreError::UnsupportedValue {
                    column: column.name().to_string(),
                    detail: format!("type {other}: {err}"),
                })?
                .map(Value::from),
        };
        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    Ok(out)
}
