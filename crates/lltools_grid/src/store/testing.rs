//! In-memory connection that records statements and replays canned results.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{Row, StoreConnection};
use crate::error::StoreError;
use crate::sql::{Dialect, SqlValue};

pub(crate) struct ScriptedConnection {
    dialect: Dialect,
    rows: Vec<Row>,
    counts: VecDeque<u64>,
    affected: u64,
    fail: bool,
    statements: Vec<(String, Vec<SqlValue>)>,
}

impl ScriptedConnection {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            rows: Vec::new(),
            counts: VecDeque::new(),
            affected: 1,
            fail: false,
            statements: Vec::new(),
        }
    }

    pub(crate) fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub(crate) fn with_counts(mut self, counts: Vec<u64>) -> Self {
        self.counts = counts.into();
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn statements(&self) -> &[(String, Vec<SqlValue>)] {
        &self.statements
    }

    fn record(&mut self, sql: &str, binds: &[SqlValue]) -> Result<(), StoreError> {
        self.statements.push((sql.to_string(), binds.to_vec()));
        if self.fail {
            return Err(StoreError::UnsupportedValue {
                column: "scripted".to_string(),
                detail: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query_rows(&mut self, sql: &str, binds: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        self.record(sql, binds)?;
        Ok(self.rows.clone())
    }

    async fn query_count(&mut self, sql: &str, binds: &[SqlValue]) -> Result<u64, StoreError> {
        self.record(sql, binds)?;
        Ok(self.counts.pop_front().unwrap_or(0))
    }

    async fn execute_committed(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<u64, StoreError> {
        self.record(sql, binds)?;
        Ok(self.affected)
    }
}
