//! Column registry: the single allowlist of identifiers that may appear in SQL.
//!
//! Display columns are addressed by the zero-based index the grid client
//! sends. The registry also owns the table identity (table name, physical row
//! id column, tags column and autocomplete source), so that the read path and
//! the write path resolve every identifier through the same object.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::{GridError, GridResult};
use crate::sql::is_plain_identifier;

/// Alias under which the physical row id is returned in every row.
pub const ROW_ID_ALIAS: &str = "DT_RowId";

/// Storage kind of a display column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Stored text column.
    Text,
    /// Stored integer column; written values are parsed before binding.
    Integer,
    /// UI-only column with no stored value (e.g. the delete control).
    Placeholder,
}

/// One client-visible column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayColumn {
    name: String,
    kind: ColumnKind,
}

impl DisplayColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// True when the column maps to a stored value that can be filtered,
    /// sorted or written.
    pub fn is_stored(&self) -> bool {
        self.kind != ColumnKind::Placeholder
    }
}

/// Rejections raised while assembling a registry from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identifier {0:?} is not a plain SQL identifier")]
    InvalidIdentifier(String),
    #[error("duplicate display column {0:?}")]
    DuplicateColumn(String),
    #[error("tags column {0:?} is not a stored display column")]
    MissingTagsColumn(String),
}

/// Immutable, process-wide column allowlist for one grid table.
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    table: String,
    row_id: String,
    tags_column: String,
    tag_source_table: String,
    display: Vec<DisplayColumn>,
    select: Vec<String>,
}

impl ColumnRegistry {
    pub fn builder(table: impl Into<String>, row_id: impl Into<String>) -> ColumnRegistryBuilder {
        ColumnRegistryBuilder {
            table: table.into(),
            row_id: row_id.into(),
            tags_column: "tags".to_string(),
            tag_source_table: None,
            display: Vec::new(),
        }
    }

    /// Layout of the lltools vocabulary table.
    ///
    /// Index 0 is the delete-control placeholder the UI renders per row.
    pub fn vocabulary(
        table: &str,
        tag_source_table: &str,
        row_id: &str,
    ) -> Result<Self, RegistryError> {
        Self::builder(table, row_id)
            .placeholder("delete")
            .text("italian")
            .text("english")
            .text("part_of_speech")
            .text("course")
            .text("tags")
            .integer("wiktionary_rank")
            .integer("it_2012_occurrences")
            .tags_column("tags")
            .tag_source_table(tag_source_table)
            .build()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn tag_source_table(&self) -> &str {
        &self.tag_source_table
    }

    /// Number of display columns.
    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Resolves a client index to its display column.
    pub fn column(&self, index: i64) -> GridResult<&DisplayColumn> {
        usize::try_from(index)
            .ok()
            .and_then(|idx| self.display.get(idx))
            .ok_or(GridError::OutOfRange {
                index,
                len: self.display.len(),
            })
    }

    /// Resolves a client index to its logical column name.
    pub fn name(&self, index: i64) -> GridResult<&str> {
        self.column(index).map(DisplayColumn::name)
    }

    /// Confirms `name` is a display column.
    pub fn require(&self, name: &str) -> GridResult<&DisplayColumn> {
        self.display
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| GridError::UnknownColumn(name.to_string()))
    }

    /// Resolves the tags column through the allowlist.
    pub fn tags_column(&self) -> GridResult<&DisplayColumn> {
        self.require(&self.tags_column)
    }

    /// Comma-joined select expressions, row id alias last.
    pub fn select_list(&self) -> String {
        self.select.join(",")
    }
}

/// Incremental builder for [`ColumnRegistry`]; validation runs in `build`.
#[derive(Debug, Clone)]
pub struct ColumnRegistryBuilder {
    table: String,
    row_id: String,
    tags_column: String,
    tag_source_table: Option<String>,
    display: Vec<DisplayColumn>,
}

impl ColumnRegistryBuilder {
    pub fn text(self, name: impl Into<String>) -> Self {
        self.push(name.into(), ColumnKind::Text)
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.push(name.into(), ColumnKind::Integer)
    }

    pub fn placeholder(self, name: impl Into<String>) -> Self {
        self.push(name.into(), ColumnKind::Placeholder)
    }

    pub fn tags_column(mut self, name: impl Into<String>) -> Self {
        self.tags_column = name.into();
        self
    }

    /// Table queried by tag autocomplete; defaults to the grid table.
    pub fn tag_source_table(mut self, table: impl Into<String>) -> Self {
        self.tag_source_table = Some(table.into());
        self
    }

    fn push(mut self, name: String, kind: ColumnKind) -> Self {
        self.display.push(DisplayColumn { name, kind });
        self
    }

    pub fn build(self) -> Result<ColumnRegistry, RegistryError> {
        let tag_source_table = self
            .tag_source_table
            .unwrap_or_else(|| self.table.clone());
        for ident in [&self.table, &self.row_id, &tag_source_table] {
            if !is_plain_identifier(ident) {
                return Err(RegistryError::InvalidIdentifier(ident.clone()));
            }
        }

        let mut seen = HashSet::new();
        for column in &self.display {
            if !is_plain_identifier(&column.name) {
                return Err(RegistryError::InvalidIdentifier(column.name.clone()));
            }
            if column.name == ROW_ID_ALIAS || !seen.insert(column.name.as_str()) {
                return Err(RegistryError::DuplicateColumn(column.name.clone()));
            }
        }

        // Tags are optional for registries without a tags column, but when
        // one is named it must be stored.
        if seen.contains(self.tags_column.as_str())
            && !self
                .display
                .iter()
                .any(|column| column.name == self.tags_column && column.is_stored())
        {
            return Err(RegistryError::MissingTagsColumn(self.tags_column));
        }

        let mut select: Vec<String> = self
            .display
            .iter()
            .filter(|column| column.is_stored())
            .map(|column| column.name.clone())
            .collect();
        select.push(format!("{} AS \"{ROW_ID_ALIAS}\"", self.row_id));

        Ok(ColumnRegistry {
            table: self.table,
            row_id: self.row_id,
            tags_column: self.tags_column,
            tag_source_table,
            display: self.display,
            select,
        })
    }
}
