//! Write path: single-row delete, tags update and field update.
//!
//! Every identifier is resolved through the registry and every value,
//! including the row id, is bound. Resolution and value checks run before
//! the statement is sent, so a rejected mutation never reaches the store.

use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::executor::query_failed;
use crate::registry::{ColumnKind, ColumnRegistry};
use crate::request::RowMutation;
use crate::sql::{Dialect, SqlFragment, SqlValue};
use crate::store::StoreConnection;

/// Result of an applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Delete or tags update; nothing is returned to the client.
    Applied,
    /// Field update; the written value is echoed back.
    Written(String),
}

/// Renders the statement for `mutation` without touching the store.
pub fn plan_mutation(
    registry: &ColumnRegistry,
    dialect: Dialect,
    mutation: &RowMutation,
) -> GridResult<SqlFragment> {
    let table = registry.table();
    let row_id = registry.row_id();
    match mutation {
        RowMutation::Delete { row_id: id } => Ok(SqlFragment {
            text: format!(
                "DELETE FROM {table} WHERE {row_id} = CAST({} AS BIGINT)",
                dialect.placeholder(1)
            ),
            binds: vec![SqlValue::Integer(*id)],
        }),
        RowMutation::SetTags { row_id: id, tags } => {
            let column = registry.tags_column()?.name();
            Ok(SqlFragment {
                text: format!(
                    "UPDATE {table} SET {column} = {} WHERE {row_id} = CAST({} AS BIGINT)",
                    dialect.placeholder(1),
                    dialect.placeholder(2)
                ),
                binds: vec![SqlValue::Text(tags.clone()), SqlValue::Integer(*id)],
            })
        }
        RowMutation::SetField {
            row_id: id,
            column,
            value,
        } => {
            let column = registry.column(*column)?;
            let (target, bind) = match column.kind() {
                ColumnKind::Placeholder => {
                    return Err(GridError::UnknownColumn(column.name().to_string()))
                }
                ColumnKind::Text => (dialect.placeholder(1), SqlValue::Text(value.clone())),
                ColumnKind::Integer => (
                    format!("CAST({} AS BIGINT)", dialect.placeholder(1)),
                    parse_integer(column.name(), value)?,
                ),
            };
            Ok(SqlFragment {
                text: format!(
                    "UPDATE {table} SET {} = {target} WHERE {row_id} = CAST({} AS BIGINT)",
                    column.name(),
                    dialect.placeholder(2)
                ),
                binds: vec![bind, SqlValue::Integer(*id)],
            })
        }
    }
}

/// Applies one mutation and commits it.
pub async fn apply_mutation(
    conn: &mut dyn StoreConnection,
    registry: &ColumnRegistry,
    mutation: RowMutation,
) -> GridResult<MutationOutcome> {
    let statement = plan_mutation(registry, conn.dialect(), &mutation)?;
    let affected = conn
        .execute_committed(&statement.text, &statement.binds)
        .await
        .map_err(|err| query_failed(&statement.text, err))?;

    if affected == 0 {
        warn!(
            kind = mutation.kind(),
            row_id = mutation.row_id(),
            "mutation matched no rows"
        );
    } else {
        debug!(kind = mutation.kind(), row_id = mutation.row_id(), affected, "mutation committed");
    }

    Ok(match mutation {
        RowMutation::SetField { value, .. } => MutationOutcome::Written(value),
        RowMutation::Delete { .. } | RowMutation::SetTags { .. } => MutationOutcome::Applied,
    })
}

fn parse_integer(column: &str, value: &str) -> GridResult<SqlValue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(SqlValue::Null);
    }
    trimmed
        .parse::<i64>()
        .map(SqlValue::Integer)
        .map_err(|_| GridError::InvalidValue {
            column: column.to_string(),
            value: value.to_string(),
        })
}
