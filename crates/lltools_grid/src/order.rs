//! Sort-spec-to-`ORDER BY` translation.
//!
//! When no spec survives, no `ORDER BY` is emitted and row order is whatever
//! the store returns; callers paging through such results may see unstable
//! pages.

use std::collections::BTreeSet;

use crate::error::GridResult;
use crate::registry::ColumnRegistry;

/// Sort direction for one spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    DescendingNullsLast,
}

impl SortDirection {
    /// Only the exact token `"asc"` sorts ascending; anything else, missing
    /// included, sorts descending with nulls last.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("asc") => Self::Ascending,
            _ => Self::DescendingNullsLast,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::DescendingNullsLast => "DESC NULLS LAST",
        }
    }
}

/// One requested sort spec, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRequest {
    pub column: i64,
    pub direction: Option<String>,
}

/// Sort inputs for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderRequest {
    /// Specs in request order.
    pub specs: Vec<SortRequest>,
    /// Column indices flagged sortable for this request.
    pub sortable: BTreeSet<i64>,
}

/// A resolved sort spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Resolves the requested specs, dropping those on non-sortable or
/// placeholder columns while keeping request order.
pub fn build_sort_specs(
    registry: &ColumnRegistry,
    request: &OrderRequest,
) -> GridResult<Vec<SortSpec>> {
    let mut specs = Vec::with_capacity(request.specs.len());
    for spec in &request.specs {
        if !request.sortable.contains(&spec.column) {
            continue;
        }
        let column = registry.column(spec.column)?;
        if !column.is_stored() {
            continue;
        }
        specs.push(SortSpec {
            column: column.name().to_string(),
            direction: SortDirection::from_token(spec.direction.as_deref()),
        });
    }
    Ok(specs)
}

/// Renders the body of an `ORDER BY` clause, or `None` when nothing sorts.
pub fn render_order_clause(specs: &[SortSpec]) -> Option<String> {
    if specs.is_empty() {
        return None;
    }
    Some(
        specs
            .iter()
            .map(|spec| format!("{} {}", spec.column, spec.direction.as_sql()))
            .collect::<Vec<_>>()
            .join(","),
    )
}
