//! Google Sheets log store over the Sheets v4 REST API
//!
//! Authentication is a bearer OAuth access token; minting it is outside this
//! crate. A token taken from the environment is read once at open and stops
//! working when it expires (about an hour for Google tokens). For long runs
//! point `sheet.access_token_file` at a file kept fresh by an external
//! refresher; it is re-read before every request.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::SheetConfig;
use crate::domain::{Classification, Rgb, LOG_HEADER};
use crate::error::{LoggerError, Result};
use crate::persistence::LogStore;

/// Size of a freshly created log worksheet
const NEW_SHEET_ROWS: u32 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const HEADER_BACKGROUND: Rgb = Rgb {
    red: 0.0,
    green: 0.48,
    blue: 1.0,
};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Where the bearer token comes from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Fixed token, read from the environment at open
    Static(String),
    /// Token file, re-read per request
    File(PathBuf),
}

impl TokenSource {
    /// File when configured, otherwise the environment variable
    pub fn from_config(config: &SheetConfig) -> Result<Self> {
        if let Some(path) = &config.access_token_file {
            return Ok(TokenSource::File(path.clone()));
        }
        std::env::var(&config.access_token_env)
            .map(TokenSource::Static)
            .map_err(|_| LoggerError::Auth(format!("{} is not set", config.access_token_env)))
    }

    pub async fn token(&self) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    LoggerError::Auth(format!("cannot read token file {:?}: {}", path, e))
                })?;
                let token = content.trim();
                if token.is_empty() {
                    return Err(LoggerError::Auth(format!("token file {:?} is empty", path)));
                }
                Ok(token.to_string())
            }
        }
    }
}

/// Handle to one worksheet of a spreadsheet
pub struct SheetsLogStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    sheet_id: i64,
    tokens: TokenSource,
}

impl SheetsLogStore {
    /// Authenticate, locate the worksheet (creating it if missing).
    ///
    /// Every failure here is reported as `StoreOpen` or `Auth`.
    #[instrument(skip(config), fields(sheet = %config.sheet_name))]
    pub async fn open(config: &SheetConfig) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| LoggerError::StoreOpen("sheet.spreadsheet_id is not set".into()))?;

        let tokens = TokenSource::from_config(config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LoggerError::StoreOpen(e.to_string()))?;

        let mut store = Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            sheet_name: config.sheet_name.clone(),
            sheet_id: 0,
            tokens,
        };

        store.sheet_id = store
            .resolve_sheet_id()
            .await
            .map_err(|e| match e {
                LoggerError::Auth(_) | LoggerError::StoreOpen(_) => e,
                other => LoggerError::StoreOpen(other.to_string()),
            })?;

        Ok(store)
    }

    async fn resolve_sheet_id(&self) -> Result<i64> {
        let url = format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id);
        let resp = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("fields", "sheets.properties")]),
                "read spreadsheet",
            )
            .await?;
        let meta: SpreadsheetMeta = resp.json().await?;

        if let Some(id) = find_sheet_id(&meta, &self.sheet_name) {
            info!(
                "Found existing sheet '{}', will continue from last row",
                self.sheet_name
            );
            return Ok(id);
        }

        let reply = self
            .batch_update(vec![add_sheet_request(&self.sheet_name)])
            .await?;
        let id = reply
            .pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                LoggerError::StoreResponse("addSheet reply without sheetId".into())
            })?;
        info!("Created new sheet '{}'", self.sheet_name);
        Ok(id)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(&a1_range(&self.sheet_name, range))
        )
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let resp = self
            .send(self.client.get(self.values_url(range)), "read values")
            .await?;
        let body: ValueRange = resp.json().await?;
        Ok(body.values)
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<Value> {
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let resp = self
            .send(
                self.client.post(&url).json(&json!({ "requests": requests })),
                "batch update",
            )
            .await?;
        Ok(resp.json().await?)
    }

    /// Send with auth; non-2xx and transport failures become `StoreWrite`
    async fn send(&self, request: RequestBuilder, op: &str) -> Result<Response> {
        let token = self.tokens.token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LoggerError::StoreWrite(format!("{}: {}", op, e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LoggerError::Auth(format!("{}: HTTP {}: {}", op, status, body)));
        }
        Err(LoggerError::StoreWrite(format!(
            "{}: HTTP {}: {}",
            op, status, body
        )))
    }
}

#[async_trait]
impl LogStore for SheetsLogStore {
    fn describe(&self) -> String {
        format!("sheets:{}/{}", self.spreadsheet_id, self.sheet_name)
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.get_values(&last_column_range()).await?.len() as u64)
    }

    async fn first_row(&self) -> Result<Option<Vec<Value>>> {
        let rows = self.get_values(&header_range()).await?;
        Ok(rows.into_iter().next().filter(|row| !row.is_empty()))
    }

    async fn write_header_row(&self, header: &[Value]) -> Result<()> {
        self.send(
            self.client
                .put(self.values_url(&header_range()))
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "values": [header] })),
            "write header",
        )
        .await?;

        self.batch_update(vec![header_format_request(self.sheet_id)])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<()> {
        self.send(
            self.client
                .post(format!("{}:append", self.values_url("A1")))
                .query(&[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&json!({ "values": rows })),
            "append rows",
        )
        .await?;
        debug!("Appended {} rows to '{}'", rows.len(), self.sheet_name);
        Ok(())
    }

    async fn set_cell_background(
        &self,
        row: u64,
        column: u32,
        classification: Classification,
    ) -> Result<()> {
        self.batch_update(vec![background_request(
            self.sheet_id,
            row,
            column,
            classification.color(),
        )])
        .await?;
        Ok(())
    }
}

/// `'sheet name'!A1:K1`, with embedded quotes doubled
fn a1_range(sheet_name: &str, range: &str) -> String {
    format!("'{}'!{}", sheet_name.replace('\'', "''"), range)
}

/// Column letter of a 1-based column index (up to Z)
fn column_letter(column: u32) -> char {
    (b'A' + (column.clamp(1, 26) - 1) as u8) as char
}

fn header_range() -> String {
    let last = column_letter(LOG_HEADER.len() as u32);
    format!("A1:{}1", last)
}

fn last_column_range() -> String {
    let last = column_letter(LOG_HEADER.len() as u32);
    format!("A:{}", last)
}

fn find_sheet_id(meta: &SpreadsheetMeta, title: &str) -> Option<i64> {
    meta.sheets
        .iter()
        .find(|s| s.properties.title == title)
        .map(|s| s.properties.sheet_id)
}

fn add_sheet_request(title: &str) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": title,
                "gridProperties": {
                    "rowCount": NEW_SHEET_ROWS,
                    "columnCount": LOG_HEADER.len(),
                }
            }
        }
    })
}

fn background_request(sheet_id: i64, row: u64, column: u32, color: Rgb) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": row - 1,
                "endRowIndex": row,
                "startColumnIndex": column - 1,
                "endColumnIndex": column,
            },
            "cell": { "userEnteredFormat": { "backgroundColor": color } },
            "fields": "userEnteredFormat.backgroundColor",
        }
    })
}

/// Blue bold centred header, as the sheet has always been styled
fn header_format_request(sheet_id: i64) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": 0,
                "endRowIndex": 1,
                "startColumnIndex": 0,
                "endColumnIndex": LOG_HEADER.len(),
            },
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": HEADER_BACKGROUND,
                    "textFormat": {
                        "foregroundColor": { "red": 1.0, "green": 1.0, "blue": 1.0 },
                        "bold": true,
                    },
                    "horizontalAlignment": "CENTER",
                }
            },
            "fields": "userEnteredFormat(backgroundColor,textFormat,horizontalAlignment)",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert_eq!(header_range(), "A1:K1");
        assert_eq!(last_column_range(), "A:K");
        assert_eq!(a1_range("logs", "A1:K1"), "'logs'!A1:K1");
        assert_eq!(a1_range("Bob's logs", "A:K"), "'Bob''s logs'!A:K");
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), 'A');
        assert_eq!(column_letter(8), 'H');
        assert_eq!(column_letter(11), 'K');
    }

    #[test]
    fn test_find_sheet_id() {
        let meta: SpreadsheetMeta = serde_json::from_value(json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Sheet1", "index": 0 } },
                { "properties": { "sheetId": 1234, "title": "logs", "index": 1 } }
            ]
        }))
        .unwrap();

        assert_eq!(find_sheet_id(&meta, "logs"), Some(1234));
        assert_eq!(find_sheet_id(&meta, "missing"), None);
    }

    #[test]
    fn test_background_request_targets_single_cell() {
        let req = background_request(7, 5, 8, Classification::Deviation.color());
        let range = &req["repeatCell"]["range"];

        assert_eq!(range["sheetId"], 7);
        assert_eq!(range["startRowIndex"], 4);
        assert_eq!(range["endRowIndex"], 5);
        assert_eq!(range["startColumnIndex"], 7);
        assert_eq!(range["endColumnIndex"], 8);

        let color = &req["repeatCell"]["cell"]["userEnteredFormat"]["backgroundColor"];
        assert!((color["red"].as_f64().unwrap() - 0.97).abs() < 1e-6);
    }

    #[test]
    fn test_add_sheet_request_shape() {
        let req = add_sheet_request("logs");
        assert_eq!(req["addSheet"]["properties"]["title"], "logs");
        assert_eq!(
            req["addSheet"]["properties"]["gridProperties"]["columnCount"],
            11
        );
    }

    #[test]
    fn test_empty_value_range_parses() {
        let body: ValueRange = serde_json::from_str(r#"{"range": "logs!A1:K1"}"#).unwrap();
        assert!(body.values.is_empty());
    }

    #[tokio::test]
    async fn test_token_file_is_reread_per_call() {
        let path = std::env::temp_dir().join(format!(
            "threshold_logger_token_{}",
            std::process::id()
        ));
        std::fs::write(&path, "first-token\n").unwrap();
        let tokens = TokenSource::File(path.clone());
        assert_eq!(tokens.token().await.unwrap(), "first-token");

        std::fs::write(&path, "second-token").unwrap();
        assert_eq!(tokens.token().await.unwrap(), "second-token");

        std::fs::write(&path, "  ").unwrap();
        assert!(matches!(tokens.token().await, Err(LoggerError::Auth(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_token_file_takes_precedence_over_env() {
        let config = SheetConfig {
            access_token_env: "THRESHOLD_LOGGER_UNSET_TOKEN_VAR".to_string(),
            access_token_file: Some(PathBuf::from("/run/secrets/token")),
            ..SheetConfig::default()
        };
        assert!(matches!(
            TokenSource::from_config(&config).unwrap(),
            TokenSource::File(_)
        ));

        let config = SheetConfig {
            access_token_file: None,
            ..config
        };
        assert!(matches!(
            TokenSource::from_config(&config),
            Err(LoggerError::Auth(_))
        ));
    }
}
