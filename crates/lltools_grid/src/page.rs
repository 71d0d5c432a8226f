//! Offset/length-to-`LIMIT` translation.

use crate::error::{GridError, GridResult};

/// Length value the grid sends to request every row.
pub const ALL_ROWS: i64 = -1;

/// Requested window of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: Option<i64>,
    pub length: Option<i64>,
}

impl Page {
    pub fn new(offset: Option<i64>, length: Option<i64>) -> Self {
        Self { offset, length }
    }

    /// Returns the `LIMIT .. OFFSET ..` clause, or `None` for an unbounded read.
    ///
    /// Both numbers are validated integers, so they are rendered inline.
    pub fn limit_clause(&self) -> GridResult<Option<String>> {
        let invalid = || GridError::InvalidPage {
            offset: self.offset,
            length: self.length,
        };
        if self.offset.is_some_and(|offset| offset < 0) {
            return Err(invalid());
        }
        if self.length.is_some_and(|length| length < ALL_ROWS) {
            return Err(invalid());
        }

        Ok(match (self.offset, self.length) {
            (Some(offset), Some(length)) if length != ALL_ROWS => {
                Some(format!("LIMIT {length} OFFSET {offset}"))
            }
            _ => None,
        })
    }
}
