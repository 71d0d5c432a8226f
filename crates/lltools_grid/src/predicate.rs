//! Search-to-`WHERE` translation.
//!
//! The grid sends one optional global term and, per display column, a
//! searchable flag plus an optional column term. The global term is OR-ed
//! across every searchable column; column terms are AND-ed. Both groups are
//! AND-ed together when present.

use crate::error::GridResult;
use crate::registry::ColumnRegistry;
use crate::sql::{contains_pattern, Dialect, SqlFragment, SqlValue};

/// Per display column search state for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSearch {
    pub searchable: bool,
    pub term: Option<String>,
}

/// Search inputs for one request, indexed like the registry's display columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub global: Option<String>,
    pub columns: Vec<ColumnSearch>,
}

/// Boolean filter tree over registry-resolved columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Like { column: String, pattern: SqlValue },
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    fn like(column: &str, pattern: SqlValue) -> Self {
        Self::Like {
            column: column.to_string(),
            pattern,
        }
    }

    /// Renders the tree with placeholders numbered from 1.
    pub fn render(&self, dialect: Dialect) -> SqlFragment {
        let mut out = SqlFragment::default();
        self.render_into(dialect, &mut out, false);
        out
    }

    fn render_into(&self, dialect: Dialect, out: &mut SqlFragment, nested: bool) {
        match self {
            Self::Like { column, pattern } => {
                out.binds.push(pattern.clone());
                let placeholder = dialect.placeholder(out.binds.len());
                out.text
                    .push_str(&format!("CAST({column} AS TEXT) LIKE {placeholder}"));
            }
            Self::Any(terms) => {
                out.text.push('(');
                render_joined(terms, " OR ", dialect, out);
                out.text.push(')');
            }
            Self::All(terms) => {
                if nested {
                    out.text.push('(');
                }
                render_joined(terms, " AND ", dialect, out);
                if nested {
                    out.text.push(')');
                }
            }
        }
    }
}

fn render_joined(terms: &[Predicate], separator: &str, dialect: Dialect, out: &mut SqlFragment) {
    for (idx, term) in terms.iter().enumerate() {
        if idx > 0 {
            out.text.push_str(separator);
        }
        term.render_into(dialect, out, true);
    }
}

/// Builds the request predicate, or `None` when every row matches.
///
/// Flags on placeholder columns are ignored: they hold no stored value.
/// A searchable flag on an index outside the registry is `OutOfRange`.
pub fn build_predicate(
    registry: &ColumnRegistry,
    search: &SearchRequest,
) -> GridResult<Option<Predicate>> {
    let global = non_empty(search.global.as_deref());
    let mut any_column = Vec::new();
    let mut per_column = Vec::new();

    for (index, column_search) in search.columns.iter().enumerate() {
        if !column_search.searchable {
            continue;
        }
        let column = registry.column(index as i64)?;
        if !column.is_stored() {
            continue;
        }
        if let Some(term) = global {
            any_column.push(Predicate::like(column.name(), contains_pattern(term)));
        }
        if let Some(term) = non_empty(column_search.term.as_deref()) {
            per_column.push(Predicate::like(column.name(), contains_pattern(term)));
        }
    }

    let mut groups = Vec::with_capacity(per_column.len() + 1);
    if !any_column.is_empty() {
        groups.push(Predicate::Any(any_column));
    }
    groups.extend(per_column);

    Ok(match groups.len() {
        0 => None,
        1 => groups.pop(),
        _ => Some(Predicate::All(groups)),
    })
}

fn non_empty(term: Option<&str>) -> Option<&str> {
    term.filter(|value| !value.is_empty())
}
