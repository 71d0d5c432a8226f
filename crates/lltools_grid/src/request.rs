//! Decoding of DataTables query and form parameters into typed requests.
//!
//! Unparseable integers and booleans are treated as absent, so a malformed
//! optional field degrades to its default instead of failing the request.
//! Fields a mutation cannot do without fail with `MissingParameter`.

use std::collections::{BTreeSet, HashMap};

use crate::error::{GridError, GridResult};
use crate::order::{OrderRequest, SortRequest};
use crate::page::Page;
use crate::predicate::{ColumnSearch, SearchRequest};
use crate::registry::ColumnRegistry;

/// Raw query-string or form parameters.
pub type Params = HashMap<String, String>;

/// A decoded read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridRead {
    /// Tag prefix lookup; bypasses paging, sorting and filtering.
    Autocomplete { term: String },
    Page(ReadRequest),
}

/// Paging, sorting and search inputs for one grid read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// Opaque `sEcho` token, returned unchanged.
    pub echo: Option<i64>,
    pub page: Page,
    pub order: OrderRequest,
    pub search: SearchRequest,
}

/// A single-row write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMutation {
    Delete {
        row_id: i64,
    },
    SetTags {
        row_id: i64,
        tags: String,
    },
    SetField {
        row_id: i64,
        column: i64,
        value: String,
    },
}

impl RowMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::SetTags { .. } => "set_tags",
            Self::SetField { .. } => "set_field",
        }
    }

    pub fn row_id(&self) -> i64 {
        match self {
            Self::Delete { row_id }
            | Self::SetTags { row_id, .. }
            | Self::SetField { row_id, .. } => *row_id,
        }
    }
}

/// Parses a truth value the way the grid's form helpers spell them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn get_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn get_int(params: &Params, key: &str) -> Option<i64> {
    get_str(params, key).and_then(|raw| raw.trim().parse::<i64>().ok())
}

fn get_flag(params: &Params, key: &str) -> bool {
    get_str(params, key).and_then(parse_bool).unwrap_or(false)
}

/// Decodes a GET request against `registry`.
///
/// `iSortingCols` is clamped to the number of display columns, so a request
/// with more sort specs than columns keeps only the first `len` of them and
/// the parameter scan stays bounded. Search flags are only read for indices
/// the registry defines.
pub fn parse_read(registry: &ColumnRegistry, params: &Params) -> GridRead {
    if let Some(term) = get_str(params, "term").filter(|term| !term.is_empty()) {
        return GridRead::Autocomplete {
            term: term.to_string(),
        };
    }

    let sort_count = get_int(params, "iSortingCols")
        .unwrap_or(0)
        .clamp(0, registry.len() as i64);
    let mut specs = Vec::new();
    let mut sortable = BTreeSet::new();
    for idx in 0..sort_count {
        let Some(column) = get_int(params, &format!("iSortCol_{idx}")) else {
            continue;
        };
        if get_flag(params, &format!("bSortable_{column}")) {
            sortable.insert(column);
        }
        specs.push(SortRequest {
            column,
            direction: get_str(params, &format!("sSortDir_{idx}")).map(str::to_string),
        });
    }

    let columns = (0..registry.len())
        .map(|idx| ColumnSearch {
            searchable: get_flag(params, &format!("bSearchable_{idx}")),
            term: get_str(params, &format!("sSearch_{idx}"))
                .filter(|term| !term.is_empty())
                .map(str::to_string),
        })
        .collect();

    GridRead::Page(ReadRequest {
        echo: get_int(params, "sEcho"),
        page: Page::new(
            get_int(params, "iDisplayStart"),
            get_int(params, "iDisplayLength"),
        ),
        order: OrderRequest { specs, sortable },
        search: SearchRequest {
            global: get_str(params, "sSearch")
                .filter(|term| !term.is_empty())
                .map(str::to_string),
            columns,
        },
    })
}

/// Decodes a POST form into one row mutation.
pub fn parse_mutation(form: &Params) -> GridResult<RowMutation> {
    let row_id = || get_int(form, "row_id").ok_or(GridError::MissingParameter("row_id"));

    if get_flag(form, "delete") {
        return Ok(RowMutation::Delete { row_id: row_id()? });
    }

    if get_str(form, "update").is_some_and(|update| !update.is_empty()) {
        let tags = get_str(form, "tags").ok_or(GridError::MissingParameter("tags"))?;
        return Ok(RowMutation::SetTags {
            row_id: row_id()?,
            tags: tags.to_string(),
        });
    }

    let row_id = row_id()?;
    let column = get_int(form, "column").ok_or(GridError::MissingParameter("column"))?;
    let value = get_str(form, "value").ok_or(GridError::MissingParameter("value"))?;
    Ok(RowMutation::SetField {
        row_id,
        column,
        value: value.to_string(),
    })
}
