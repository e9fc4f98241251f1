//! In-process log store
//!
//! Used for dry runs and tests. Keeps rows and cell backgrounds in memory and
//! can be told to fail writes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::Classification;
use crate::error::{LoggerError, Result};
use crate::persistence::LogStore;

#[derive(Default)]
struct Sheet {
    rows: Vec<Vec<Value>>,
    backgrounds: HashMap<(u64, u32), Classification>,
}

pub struct InMemoryLogStore {
    name: String,
    sheet: Mutex<Sheet>,
    header_writes: AtomicUsize,
    append_calls: AtomicUsize,
    fail_appends: AtomicBool,
    fail_annotations: AtomicBool,
}

impl InMemoryLogStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sheet: Mutex::new(Sheet::default()),
            header_writes: AtomicUsize::new(0),
            append_calls: AtomicUsize::new(0),
            fail_appends: AtomicBool::new(false),
            fail_annotations: AtomicBool::new(false),
        }
    }

    /// Store pre-filled with `rows` rows (header plus `rows - 1` placeholder records)
    pub fn with_rows(name: &str, rows: u64) -> Self {
        let store = Self::new(name);
        {
            let mut sheet = store.lock();
            for idx in 0..rows {
                let row = if idx == 0 {
                    crate::domain::header_row()
                } else {
                    vec![Value::from(idx)]
                };
                sheet.rows.push(row);
            }
        }
        store
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_annotations(&self, fail: bool) {
        self.fail_annotations.store(fail, Ordering::SeqCst);
    }

    pub fn header_writes(&self) -> usize {
        self.header_writes.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Value at a 1-based cell
    pub fn cell(&self, row: u64, column: u32) -> Option<Value> {
        let sheet = self.lock();
        sheet
            .rows
            .get((row as usize).checked_sub(1)?)
            .and_then(|r| r.get((column as usize).checked_sub(1)?))
            .cloned()
    }

    pub fn background(&self, row: u64, column: u32) -> Option<Classification> {
        self.lock().backgrounds.get(&(row, column)).copied()
    }

    /// Snapshot of every row, header included
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Sheet> {
        self.sheet.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.lock().rows.len() as u64)
    }

    async fn first_row(&self) -> Result<Option<Vec<Value>>> {
        Ok(self.lock().rows.first().cloned())
    }

    async fn write_header_row(&self, header: &[Value]) -> Result<()> {
        let mut sheet = self.lock();
        match sheet.rows.first_mut() {
            Some(first) => *first = header.to_vec(),
            None => sheet.rows.push(header.to_vec()),
        }
        self.header_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LoggerError::StoreWrite(format!(
                "append to {} rejected",
                self.name
            )));
        }
        self.lock().rows.extend(rows.iter().cloned());
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_cell_background(
        &self,
        row: u64,
        column: u32,
        classification: Classification,
    ) -> Result<()> {
        if self.fail_annotations.load(Ordering::SeqCst) {
            return Err(LoggerError::StoreWrite(format!(
                "format of {}!R{}C{} rejected",
                self.name, row, column
            )));
        }
        self.lock().backgrounds.insert((row, column), classification);
        Ok(())
    }
}
