//! Rate-limited writer for the append-only log
//!
//! One cycle's batch is written as: header check, one bulk append, a short
//! pause, then per-row classification of the three flag cells with a pause
//! after every `rate_limit_batch_size` rows.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::store::LogStore;
use crate::domain::{header_row, LogRecord, FLAG_COLUMNS};
use crate::error::Result;

/// Throttling knobs for the sink
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Rows annotated between pauses
    pub rate_limit_batch_size: usize,
    /// Pause after each `rate_limit_batch_size` annotated rows
    pub rate_limit_pause: Duration,
    /// Pause between the bulk append and the first annotation
    pub post_append_pause: Duration,
}

impl SinkConfig {
    /// Same batching without any pauses, for stores without request quotas
    pub fn unthrottled(self) -> Self {
        Self {
            rate_limit_pause: Duration::ZERO,
            post_append_pause: Duration::ZERO,
            ..self
        }
    }
}

/// Outcome of writing one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub appended: usize,
    /// Sheet row of the first appended record
    pub first_row: u64,
    pub annotated_cells: usize,
}

pub struct LogSink {
    store: Arc<dyn LogStore>,
    config: SinkConfig,
}

impl LogSink {
    pub fn new(store: Arc<dyn LogStore>, config: SinkConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Last log id in the store, derived from its row count.
    ///
    /// Row 1 is the header, so N rows hold ids 1..=N-1.
    pub async fn discover_last_id(&self) -> Result<u64> {
        let rows = self.store.row_count().await?;
        Ok(if rows > 1 { rows - 1 } else { 0 })
    }

    /// Write the fixed header if row 1 is missing or different
    pub async fn ensure_header(&self) -> Result<bool> {
        let written = self.store.ensure_header_row(&header_row()).await?;
        if written {
            info!("[SINK] Wrote log header to {}", self.store.describe());
        }
        Ok(written)
    }

    /// Append all records in one bulk call
    pub async fn append_batch(&self, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<_> = records.iter().map(LogRecord::to_row).collect();
        info!("[SINK] Appending {} logs to sheet...", rows.len());
        self.store.append_rows(&rows).await
    }

    /// Colour the flag cells of rows `start_row..start_row + records.len()`
    pub async fn annotate(&self, records: &[LogRecord], start_row: u64) -> Result<usize> {
        let batch = self.config.rate_limit_batch_size;
        let mut cells = 0;

        for (idx, record) in records.iter().enumerate() {
            let row = start_row + idx as u64;
            for (column, flag) in FLAG_COLUMNS.iter().zip(record.flags()) {
                self.store
                    .set_cell_background(row, *column, flag.classification())
                    .await?;
                cells += 1;
            }

            let processed = idx + 1;
            if batch > 0 && processed % batch == 0 {
                pause(self.config.rate_limit_pause).await;
                info!("[SINK] Processed {}/{} rows...", processed, records.len());
            }
        }

        Ok(cells)
    }

    /// Header check, bulk append, pause, then annotation
    pub async fn write_batch(&self, records: &[LogRecord]) -> Result<WriteSummary> {
        self.ensure_header().await?;
        let existing = self.store.row_count().await?;
        let first_row = existing + 1;

        if records.is_empty() {
            return Ok(WriteSummary {
                appended: 0,
                first_row,
                annotated_cells: 0,
            });
        }

        self.append_batch(records).await?;
        pause(self.config.post_append_pause).await;

        let annotated_cells = self.annotate(records, first_row).await?;
        debug!(
            "[SINK] Batch written at rows {}..={} ({} cells annotated)",
            first_row,
            first_row + records.len() as u64 - 1,
            annotated_cells
        );

        Ok(WriteSummary {
            appended: records.len(),
            first_row,
            annotated_cells,
        })
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
