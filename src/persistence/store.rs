//! Append-only tabular log store boundary

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Classification;
use crate::error::Result;

/// A named sheet where row 1 is the header and rows 2.. are log records.
///
/// Rows and columns are 1-based, matching spreadsheet addressing.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Human readable identifier for logs
    fn describe(&self) -> String;

    /// Number of non-empty rows, header included
    async fn row_count(&self) -> Result<u64>;

    /// Values of row 1, `None` when the sheet is empty
    async fn first_row(&self) -> Result<Option<Vec<Value>>>;

    /// Overwrite row 1 with `header`
    async fn write_header_row(&self, header: &[Value]) -> Result<()>;

    /// Append rows after the last non-empty row in a single call
    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<()>;

    async fn set_cell_background(
        &self,
        row: u64,
        column: u32,
        classification: Classification,
    ) -> Result<()>;

    /// Write `header` unless row 1 already holds exactly it.
    ///
    /// Returns whether a write happened.
    async fn ensure_header_row(&self, header: &[Value]) -> Result<bool> {
        if let Some(existing) = self.first_row().await? {
            if existing.as_slice() == header {
                return Ok(false);
            }
        }
        self.write_header_row(header).await?;
        Ok(true)
    }
}
