//! HTTP client for the sheet API backing the roster.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::RosterError;
use crate::layout::{cell_range, data_range};
use crate::types::{ApiErrorBody, Row, ValueRange, WorkbookMeta};

/// Client for the sheet API that persists the roster.
///
/// Reads retry transient failures with a short backoff; writes are issued
/// exactly once so a slow-but-successful write is never duplicated.
pub struct RosterClient {
    http: Client,
    base_url: String,
    workbook_id: String,
    token: String,
}

impl RosterClient {
    /// Create a new client for the given API base URL and workbook.
    pub fn new(
        base_url: impl Into<String>,
        workbook_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            workbook_id: workbook_id.into(),
            token: token.into(),
        }
    }

    /// The API base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the titles of all sheets in the workbook.
    pub async fn sheet_titles(&self) -> Result<Vec<String>, RosterError> {
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=sheets.properties.title",
            self.base_url, self.workbook_id
        );

        let meta: WorkbookMeta = self.get_with_retry(&url).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Whether a sheet with the given title exists in the workbook.
    pub async fn sheet_exists(&self, title: &str) -> Result<bool, RosterError> {
        Ok(self.sheet_titles().await?.iter().any(|t| t == title))
    }

    /// Read all data rows of a sheet, in sheet order.
    ///
    /// Row indices are the 1-based sheet rows the values came from, so a
    /// caller can write mutations back to the exact source cells.
    pub async fn rows(&self, sheet: &str) -> Result<Vec<Row>, RosterError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            self.workbook_id,
            data_range(sheet)
        );

        let range: ValueRange = self.get_with_retry(&url).await?;
        let rows = range
            .values
            .into_iter()
            .enumerate()
            // Data starts below the header row
            .map(|(i, cells)| Row {
                index: i as u32 + 2,
                cells,
            })
            .collect::<Vec<_>>();

        debug!(sheet, count = rows.len(), "read roster rows");
        Ok(rows)
    }

    /// Write a single cell.
    pub async fn update_cell(
        &self,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<(), RosterError> {
        let range = cell_range(sheet, row, column);
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.workbook_id, range
        );

        let body = ValueRange {
            range: None,
            values: vec![vec![value.to_string()]],
        };

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;

        self.handle_response::<serde_json::Value>(response).await?;
        debug!(%range, value, "updated cell");
        Ok(())
    }

    /// Add an empty sheet with the given title to the workbook.
    pub async fn add_sheet(&self, title: &str) -> Result<(), RosterError> {
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.base_url, self.workbook_id
        );

        let body = serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        self.handle_response::<serde_json::Value>(response).await?;
        debug!(title, "added sheet");
        Ok(())
    }

    /// Append rows after the last non-empty row of a sheet.
    pub async fn append_rows(
        &self,
        sheet: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), RosterError> {
        if values.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/v4/spreadsheets/{}/values/'{}'!A1:append",
            self.base_url, self.workbook_id, sheet
        );

        let count = values.len();
        let body = ValueRange {
            range: None,
            values,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await?;

        self.handle_response::<serde_json::Value>(response).await?;
        debug!(sheet, count, "appended rows");
        Ok(())
    }

    /// GET a JSON resource, retrying transient failures.
    async fn get_with_retry<T: DeserializeOwned + std::fmt::Debug>(&self, url: &str) -> Result<T, RosterError> {
        // Retry up to 3 times: initial + 2 retries with backoff
        let mut last_error = None;
        for attempt in 0..3 {
            let response = match self.http.get(url).bearer_auth(&self.token).send().await {
                Ok(r) => r,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < 2 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s
                    warn!(attempt = attempt + 1, backoff_ms, error = %e, "transport error, retrying read");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(RosterError::Http(e));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let result = self.handle_response(response).await;

            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if Self::is_transient(e) && attempt < 2 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s
                    warn!(attempt = attempt + 1, backoff_ms, error = %e, "transient error, retrying read");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(result.unwrap_err());
                    continue;
                }
                Err(_) => return result,
            }
        }

        Err(last_error.unwrap_or_else(|| RosterError::InvalidResponse("retry exhausted".into())))
    }

    /// Check if an error is transient and worth retrying.
    fn is_transient(err: &RosterError) -> bool {
        match err {
            RosterError::Api { status, .. } => *status >= 500,
            RosterError::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RosterError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(RosterError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let text = response.text().await.map_err(|e| {
                RosterError::InvalidResponse(format!(
                    "request failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;

            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) {
                return Err(RosterError::Api {
                    status: status.as_u16(),
                    message: body.error.message,
                });
            }

            return Err(RosterError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
