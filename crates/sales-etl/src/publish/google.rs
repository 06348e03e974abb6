//! Google Sheets sink over the Sheets v4 REST API.
//!
//! Authorization uses a static bearer token read from a JSON credential file
//! of the form `{"access_token": "..."}`. Token refresh is left to whatever
//! produces that file.

use super::SheetSink;
use crate::error::{EtlError, Result};
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Base URL of the Sheets v4 spreadsheets resource.
pub const GOOGLE_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct Credentials {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

/// A worksheet in a Google spreadsheet.
pub struct GoogleSheet {
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
    base_url: String,
    name: String,
    client: Client,
}

impl GoogleSheet {
    /// Create a sink with an explicit access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        let spreadsheet_id = spreadsheet_id.into();
        let worksheet = worksheet.into();
        let name = format!("sheets:{}/{}", spreadsheet_id, worksheet);

        Ok(Self {
            spreadsheet_id,
            worksheet,
            access_token: access_token.into(),
            base_url: GOOGLE_SHEETS_API_BASE.to_string(),
            name,
            client,
        })
    }

    /// Create a sink, reading the access token from a credential file.
    ///
    /// # Errors
    ///
    /// [`EtlError::SourceUnavailable`] if the file is missing or has no usable token.
    pub fn from_credentials_file(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        credentials_path: &Path,
    ) -> Result<Self> {
        let source_name = credentials_path.display().to_string();
        let content = std::fs::read_to_string(credentials_path)
            .map_err(|e| EtlError::source_unavailable(source_name.clone(), e))?;
        let credentials: Credentials = serde_json::from_str(&content)
            .map_err(|e| EtlError::source_unavailable(source_name.clone(), e))?;

        if credentials.access_token.trim().is_empty() {
            return Err(EtlError::source_unavailable(source_name, "empty access_token"));
        }

        Self::new(spreadsheet_id, worksheet, credentials.access_token)
    }

    /// Point the sink at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/{spreadsheet_id}/values/{worksheet}{suffix}`, percent-encoded.
    fn values_url(&self, suffix: &str) -> Result<Url> {
        let invalid = |reason: String| EtlError::PublishFailed {
            sink: self.name.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("bad base url '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("base url '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", self.worksheet, suffix));
        Ok(url)
    }

    fn check(&self, response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(EtlError::PublishFailed {
            sink: self.name.clone(),
            reason: format!("Sheets API Error {}: {}", status, response.text()?),
        })
    }
}

impl SheetSink for GoogleSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&self) -> Result<()> {
        let url = self.values_url(":clear")?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()?;
        self.check(response)
    }

    fn update(&self, values: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url("")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!("PUT {} ({} rows)", url, values.len());

        let body = ValueRange {
            range: &self.worksheet,
            major_dimension: "ROWS",
            values,
        };
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()?;
        self.check(response)
    }
}
