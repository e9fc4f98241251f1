use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::market::Flag;

/// Fixed column layout of the log sheet
pub const LOG_HEADER: [&str; 11] = [
    "log_id",
    "market_id",
    "market_label",
    "yes_price",
    "no_price",
    "sum_price",
    "difference_from_1",
    "below_threshold1",
    "below_threshold2",
    "below_threshold3",
    "timestamp_UTC",
];

/// 1-based columns holding below_threshold1..3
pub const FLAG_COLUMNS: [u32; 3] = [8, 9, 10];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One row of the append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub log_id: u64,
    pub market_id: String,
    pub market_label: String,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub sum_price: Decimal,
    pub difference_from_1: Decimal,
    pub below_threshold1: Flag,
    pub below_threshold2: Flag,
    pub below_threshold3: Flag,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Flags in column order
    pub fn flags(&self) -> [Flag; 3] {
        [
            self.below_threshold1,
            self.below_threshold2,
            self.below_threshold3,
        ]
    }

    /// Timestamp as written to the sheet, e.g. "2024-01-31 23:59:01 UTC"
    pub fn timestamp_utc(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Cell values in `LOG_HEADER` order
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.log_id),
            Value::from(self.market_id.clone()),
            Value::from(self.market_label.clone()),
            decimal_cell(self.yes_price),
            decimal_cell(self.no_price),
            decimal_cell(self.sum_price),
            decimal_cell(self.difference_from_1),
            Value::from(self.below_threshold1.as_str()),
            Value::from(self.below_threshold2.as_str()),
            Value::from(self.below_threshold3.as_str()),
            Value::from(self.timestamp_utc()),
        ]
    }
}

/// Header row as cell values
pub fn header_row() -> Vec<Value> {
    LOG_HEADER.iter().map(|h| Value::from(*h)).collect()
}

/// Whether a row read back from the store is exactly the log header
pub fn is_log_header(row: &[Value]) -> bool {
    row.len() == LOG_HEADER.len()
        && row
            .iter()
            .zip(LOG_HEADER.iter())
            .all(|(cell, expected)| cell.as_str() == Some(*expected))
}

fn decimal_cell(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}
