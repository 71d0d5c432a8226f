//! Read path: composes the builders into one page query plus counts, runs
//! them on a request-scoped connection and shapes the grid response.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{GridError, GridResult, StoreError};
use crate::order::{build_sort_specs, render_order_clause};
use crate::predicate::build_predicate;
use crate::registry::ColumnRegistry;
use crate::request::ReadRequest;
use crate::sql::{prefix_pattern, Dialect, SqlValue};
use crate::store::{Row, StoreConnection};

/// Field injected into every row for the UI's delete control.
pub const DELETE_FIELD: &str = "delete";

/// Response body of a grid read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPage {
    #[serde(rename = "sEcho")]
    pub echo: Option<i64>,
    #[serde(rename = "iTotalRecords")]
    pub total_records: u64,
    #[serde(rename = "iTotalDisplayRecords")]
    pub total_display_records: u64,
    #[serde(rename = "aaData")]
    pub rows: Vec<Row>,
}

/// SQL for one grid read. All statements share `binds`, which belong to the
/// predicate; select, order and page carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub select: String,
    pub count_all: String,
    /// `None` when no predicate applies and the total doubles as display count.
    pub count_filtered: Option<String>,
    pub binds: Vec<SqlValue>,
}

/// Builds every statement a read needs without touching the store.
pub fn plan_read(
    registry: &ColumnRegistry,
    dialect: Dialect,
    request: &ReadRequest,
) -> GridResult<ReadPlan> {
    let predicate = build_predicate(registry, &request.search)?.map(|p| p.render(dialect));
    let order = render_order_clause(&build_sort_specs(registry, &request.order)?);
    let limit = request.page.limit_clause()?;

    let from = format!("FROM {}", registry.table());
    let where_clause = predicate.as_ref().map(|p| format!("WHERE {}", p.text));

    let mut select = vec![format!("SELECT {}", registry.select_list()), from.clone()];
    select.extend(where_clause.clone());
    select.extend(order.map(|order| format!("ORDER BY {order}")));
    select.extend(limit);

    Ok(ReadPlan {
        select: select.join(" "),
        count_all: format!("SELECT COUNT(*) {from}"),
        count_filtered: where_clause.map(|clause| format!("SELECT COUNT(*) {from} {clause}")),
        binds: predicate.map(|p| p.binds).unwrap_or_default(),
    })
}

/// Runs one grid read.
pub async fn read_page(
    conn: &mut dyn StoreConnection,
    registry: &ColumnRegistry,
    request: &ReadRequest,
) -> GridResult<GridPage> {
    let plan = plan_read(registry, conn.dialect(), request)?;
    debug!(sql = %plan.select, binds = plan.binds.len(), "grid read planned");

    let mut rows = conn
        .query_rows(&plan.select, &plan.binds)
        .await
        .map_err(|err| query_failed(&plan.select, err))?;
    for row in &mut rows {
        row.insert(DELETE_FIELD.to_string(), Value::String(String::new()));
    }

    let total_records = conn
        .query_count(&plan.count_all, &[])
        .await
        .map_err(|err| query_failed(&plan.count_all, err))?;
    let total_display_records = match &plan.count_filtered {
        Some(sql) => conn
            .query_count(sql, &plan.binds)
            .await
            .map_err(|err| query_failed(sql, err))?,
        None => total_records,
    };

    Ok(GridPage {
        echo: request.echo,
        total_records,
        total_display_records,
        rows,
    })
}

/// Distinct tag values starting with `term`.
pub async fn autocomplete_tags(
    conn: &mut dyn StoreConnection,
    registry: &ColumnRegistry,
    term: &str,
) -> GridResult<Vec<String>> {
    let tags = registry.tags_column()?.name();
    let sql = format!(
        "SELECT DISTINCT {tags} FROM {} WHERE {tags} LIKE {} ORDER BY {tags}",
        registry.tag_source_table(),
        conn.dialect().placeholder(1),
    );
    let rows = conn
        .query_rows(&sql, &[prefix_pattern(term)])
        .await
        .map_err(|err| query_failed(&sql, err))?;

    Ok(rows
        .into_iter()
        .filter_map(|mut row| match row.remove(tags) {
            Some(Value::String(tag)) => Some(tag),
            _ => None,
        })
        .collect())
}

/// Logs the failing statement server-side and hides it from the client.
pub(crate) fn query_failed(sql: &str, err: StoreError) -> GridError {
    error!(sql = %sql, error = %err, "grid statement failed");
    GridError::QueryFailed(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderRequest, SortRequest};
    use crate::page::Page;
    use crate::predicate::{ColumnSearch, SearchRequest};
    use crate::store::testing::ScriptedConnection;

    fn registry() -> ColumnRegistry {
        ColumnRegistry::builder("words", "rowid")
            .text("word")
            .text("gloss")
            .text("tags")
            .build()
            .unwrap()
    }

    #[test]
    fn unfiltered_plan_has_no_where_or_binds() {
        let plan = plan_read(&registry(), Dialect::Postgres, &ReadRequest::default()).unwrap();
        assert_eq!(
            plan.select,
            "SELECT word,gloss,tags,rowid AS \"DT_RowId\" FROM words"
        );
        assert_eq!(plan.count_all, "SELECT COUNT(*) FROM words");
        assert_eq!(plan.count_filtered, None);
        assert!(plan.binds.is_empty());
    }

    #[test]
    fn full_plan_orders_clauses() {
        let request = ReadRequest {
            echo: Some(1),
            page: Page::new(Some(5), Some(10)),
            order: OrderRequest {
                specs: vec![SortRequest {
                    column: 1,
                    direction: Some("asc".into()),
                }],
                sortable: [1].into_iter().collect(),
            },
            search: SearchRequest {
                global: Some("cat".into()),
                columns: vec![
                    ColumnSearch {
                        searchable: true,
                        term: None,
                    },
                    ColumnSearch::default(),
                    ColumnSearch::default(),
                ],
            },
        };
        let plan = plan_read(&registry(), Dialect::Sqlite, &request).unwrap();
        assert_eq!(
            plan.select,
            "SELECT word,gloss,tags,rowid AS \"DT_RowId\" FROM words \
             WHERE (CAST(word AS TEXT) LIKE ?1) ORDER BY gloss ASC LIMIT 10 OFFSET 5"
        );
        assert_eq!(
            plan.count_filtered.as_deref(),
            Some("SELECT COUNT(*) FROM words WHERE (CAST(word AS TEXT) LIKE ?1)")
        );
        assert_eq!(plan.binds, vec![SqlValue::Text("%cat%".into())]);
    }

    #[test]
    fn invalid_page_fails_before_any_statement() {
        let request = ReadRequest {
            page: Page::new(Some(-3), Some(10)),
            ..ReadRequest::default()
        };
        assert!(matches!(
            plan_read(&registry(), Dialect::Postgres, &request),
            Err(GridError::InvalidPage { .. })
        ));
    }

    #[tokio::test]
    async fn read_injects_delete_field_and_reuses_total() {
        let mut row = Row::new();
        row.insert("word".into(), Value::from("gatto"));
        let mut conn = ScriptedConnection::new(Dialect::Postgres)
            .with_rows(vec![row])
            .with_counts(vec![25]);

        let page = read_page(&mut conn, &registry(), &ReadRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_records, 25);
        assert_eq!(page.total_display_records, 25);
        assert_eq!(page.rows[0].get(DELETE_FIELD), Some(&Value::from("")));
        assert_eq!(conn.statements().len(), 2);

        let body = serde_json::to_value(&page).unwrap();
        assert_eq!(body["iTotalRecords"], 25);
        assert_eq!(body["aaData"][0]["word"], "gatto");
    }

    #[tokio::test]
    async fn store_failure_becomes_query_failed() {
        let mut conn = ScriptedConnection::new(Dialect::Postgres).failing();
        let err = read_page(&mut conn, &registry(), &ReadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::QueryFailed(_)));
        assert!(!err.to_string().contains("SELECT"));
    }

    #[tokio::test]
    async fn autocomplete_binds_prefix_pattern() {
        let mut row = Row::new();
        row.insert("tags".into(), Value::from("verb"));
        let mut null_row = Row::new();
        null_row.insert("tags".into(), Value::Null);
        let mut conn = ScriptedConnection::new(Dialect::Postgres).with_rows(vec![row, null_row]);

        let tags = autocomplete_tags(&mut conn, &registry(), "ve").await.unwrap();
        assert_eq!(tags, vec!["verb".to_string()]);
        let (sql, binds) = &conn.statements()[0];
        assert_eq!(
            sql,
            "SELECT DISTINCT tags FROM words WHERE tags LIKE $1 ORDER BY tags"
        );
        assert_eq!(binds, &vec![SqlValue::Text("ve%".into())]);
    }
}
