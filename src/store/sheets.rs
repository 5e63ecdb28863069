//! A [`Grid`] backed by the Google Sheets v4 REST API, authenticated as a
//! service account.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::{debug, trace, Logger};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use url::Url;

use super::{Connector, Grid, GridInfo};
use crate::config::get_optional_variable;
use crate::errors::StoreError;

const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.file";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const LAST_COLUMN: char = 'L';

/// How long a signed assertion asks the token to live for.
const TOKEN_LIFETIME: Duration = Duration::hours(1);

/// Tokens are refreshed this long before they actually expire.
const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// The sheet within the spreadsheet that holds the entries.
const SHEET_ID: i64 = 0;

/// Service-account credentials.
#[derive(Clone)]
pub struct ServiceAccount {
    client_email: String,
    private_key: String,
}

impl ServiceAccount {
    /// Creates credentials, turning literal `\n` sequences in the key into newlines.
    pub fn new(client_email: impl Into<String>, private_key: impl AsRef<str>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.as_ref().replace("\\n", "\n"),
        }
    }

    /// Reads `GOOGLE_CLIENT_EMAIL` and `GOOGLE_PRIVATE_KEY`.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_parts(
            get_optional_variable("GOOGLE_CLIENT_EMAIL"),
            get_optional_variable("GOOGLE_PRIVATE_KEY"),
        )
    }

    fn from_parts(client_email: Option<String>, private_key: Option<String>) -> Result<Self, StoreError> {
        let client_email = client_email.ok_or(StoreError::MissingConfiguration {
            name: "GOOGLE_CLIENT_EMAIL",
        })?;
        let private_key = private_key.ok_or(StoreError::MissingConfiguration {
            name: "GOOGLE_PRIVATE_KEY",
        })?;

        Ok(Self::new(client_email, private_key))
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }
}

// keep the key out of logs
impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

/// Where the API and the token exchange live.
#[derive(Clone, Debug)]
pub struct Endpoints {
    api_base: Url,
    token_uri: Url,
}

impl Endpoints {
    pub fn new(api_base: Url, token_uri: Url) -> Self {
        Self {
            api_base,
            token_uri,
        }
    }

    /// Reads `GOOGLE_SHEETS_API_BASE` and `GOOGLE_TOKEN_URI`, falling back to Google's.
    pub fn from_env() -> Result<Self, StoreError> {
        let api_base = parse_endpoint(
            "GOOGLE_SHEETS_API_BASE",
            get_optional_variable("GOOGLE_SHEETS_API_BASE").as_deref().unwrap_or(DEFAULT_API_BASE),
        )?;
        let token_uri = parse_endpoint(
            "GOOGLE_TOKEN_URI",
            get_optional_variable("GOOGLE_TOKEN_URI").as_deref().unwrap_or(DEFAULT_TOKEN_URI),
        )?;

        Ok(Self::new(api_base, token_uri))
    }

    /// Builds `{base}/v4/spreadsheets/{id}{method}/{segments...}`. The ID and
    /// every segment are percent-encoded, so none of them can leave their
    /// own path segment.
    fn spreadsheet(&self, spreadsheet_id: &str, method: &str, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.api_base.clone();

        url.path_segments_mut()
            .map_err(|_| StoreError::MalformedUrl {
                url: self.api_base.to_string(),
            })?
            .pop_if_empty()
            .extend(&["v4", "spreadsheets"])
            .push(&format!("{}{}", spreadsheet_id, method))
            .extend(segments);

        Ok(url)
    }
}

fn parse_endpoint(name: &'static str, value: &str) -> Result<Url, StoreError> {
    Url::parse(value).map_err(|_| StoreError::InvalidConfiguration { name })
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME.whole_seconds()
}

struct AccessToken {
    value: String,
    expires_at: OffsetDateTime,
}

impl AccessToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at - REFRESH_MARGIN > now
    }
}

/// An authenticated HTTP client shared by every [`SheetsGrid`].
pub struct SheetsClient {
    http: Client,
    account: ServiceAccount,
    key: EncodingKey,
    endpoints: Endpoints,
    token: Mutex<Option<AccessToken>>,
    logger: Arc<Logger>,
}

impl SheetsClient {
    /// Creates a client. Fails if the private key is not an RSA PEM key.
    pub fn new(logger: Arc<Logger>, account: ServiceAccount, endpoints: Endpoints) -> Result<Self, StoreError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|source| StoreError::Authentication { source })?;

        Ok(Self {
            http: Client::new(),
            account,
            key,
            endpoints,
            token: Mutex::new(None),
            logger,
        })
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.token.lock().await;
        let now = OffsetDateTime::now_utc();

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        debug!(self.logger, "Requesting access token..."; "client_email" => &self.account.client_email);
        let token = self.request_token(now).await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    async fn request_token(&self, now: OffsetDateTime) -> Result<AccessToken, StoreError> {
        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: self.endpoints.token_uri.as_str(),
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_LIFETIME).unix_timestamp(),
        };

        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|source| StoreError::Authentication { source })?;

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http
            .post(self.endpoints.token_uri.clone())
            .form(&params)
            .send()
            .await
            .map_err(|source| StoreError::Transport { source })?;

        let response: TokenResponse = parse(response).await?;

        Ok(AccessToken {
            value: response.access_token,
            expires_at: now + Duration::seconds(response.expires_in),
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let token = self.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| StoreError::Transport { source })?;

        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|source| StoreError::MalformedResponse { source });
    }

    let body = response.text().await.unwrap_or_default();

    Err(StoreError::Rejected {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pulls a human-readable message out of an error body from either the API
/// or the token endpoint.
fn error_message(body: &str) -> String {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) if body.trim().is_empty() => return "no response body".to_owned(),
        Err(_) => return body.trim().to_owned(),
    };

    let candidates = [
        value.pointer("/error/message"),
        value.get("error_description"),
        value.get("error"),
    ];

    candidates
        .iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| body.trim().to_owned())
}

/// An A1 range covering every column from `first` through `last`.
fn row_range(first: usize, last: Option<usize>) -> String {
    match last {
        Some(last) => format!("A{}:{}{}", first, LAST_COLUMN, last),
        None => format!("A{}:{}", first, LAST_COLUMN),
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetInfo {
    spreadsheet_id: String,
    #[serde(default)]
    properties: Option<SpreadsheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: Option<String>,
}

/// One spreadsheet, addressed through a shared [`SheetsClient`].
pub struct SheetsGrid {
    client: Arc<SheetsClient>,
    spreadsheet_id: String,
}

impl SheetsGrid {
    pub fn new(client: Arc<SheetsClient>, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    fn url(&self, method: &str, segments: &[&str]) -> Result<Url, StoreError> {
        self.client.endpoints.spreadsheet(&self.spreadsheet_id, method, segments)
    }

    async fn get_values(&self, range: String) -> Result<Vec<Vec<String>>, StoreError> {
        trace!(self.client.logger, "Reading values..."; "range" => &range);
        let url = self.url("", &["values", &range])?;

        let values: ValueRange = self.client.send(self.client.http.get(url)).await?;

        Ok(values.into_rows())
    }

    async fn put_values(&self, row: usize, values: Vec<String>) -> Result<(), StoreError> {
        let range = row_range(row, Some(row));
        trace!(self.client.logger, "Writing values..."; "range" => &range);
        let url = self.url("", &["values", &range])?;

        let request = self
            .client
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "values": [values] }));

        let _: Value = self.client.send(request).await?;

        Ok(())
    }

    async fn post_append(&self, values: Vec<String>) -> Result<(), StoreError> {
        trace!(self.client.logger, "Appending values...");
        let url = self.url("", &["values", &format!("A:{}:append", LAST_COLUMN)])?;

        let request = self
            .client
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [values] }));

        let _: Value = self.client.send(request).await?;

        Ok(())
    }

    async fn batch_update(&self, request: Value) -> Result<(), StoreError> {
        let url = self.url(":batchUpdate", &[])?;

        let request = self
            .client
            .http
            .post(url)
            .json(&json!({ "requests": [request] }));

        let _: Value = self.client.send(request).await?;

        Ok(())
    }

    async fn get_info(&self) -> Result<GridInfo, StoreError> {
        let url = self.url("", &[])?;

        let request = self
            .client
            .http
            .get(url)
            .query(&[("fields", "spreadsheetId,properties.title")]);

        let info: SpreadsheetInfo = self.client.send(request).await?;

        Ok(GridInfo {
            id: info.spreadsheet_id,
            title: info.properties.and_then(|p| p.title),
        })
    }
}

fn delete_row_request(row: usize) -> Value {
    json!({
        "deleteDimension": {
            "range": {
                "sheetId": SHEET_ID,
                "dimension": "ROWS",
                "startIndex": row - 1,
                "endIndex": row,
            }
        }
    })
}

fn header_style_request(width: usize) -> Value {
    json!({
        "repeatCell": {
            "range": {
                "sheetId": SHEET_ID,
                "startRowIndex": 0,
                "endRowIndex": 1,
                "startColumnIndex": 0,
                "endColumnIndex": width,
            },
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": { "red": 0.2, "green": 0.6, "blue": 1.0 },
                    "textFormat": {
                        "bold": true,
                        "foregroundColor": { "red": 1, "green": 1, "blue": 1 },
                    },
                },
            },
            "fields": "userEnteredFormat",
        }
    })
}

impl Grid for SheetsGrid {
    fn read_rows(
        &self,
        first: usize,
        last: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Vec<String>>, StoreError>> {
        self.get_values(row_range(first, last)).boxed()
    }

    fn read_ids(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        async move {
            let rows = self.get_values("A:A".to_owned()).await?;

            Ok(rows
                .into_iter()
                .map(|row| row.into_iter().next().unwrap_or_default())
                .collect())
        }
        .boxed()
    }

    fn write_row(&self, row: usize, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.put_values(row, values).boxed()
    }

    fn append_row(&self, values: Vec<String>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.post_append(values).boxed()
    }

    fn delete_row(&self, row: usize) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            if row == 0 {
                return Err(StoreError::Rejected {
                    status: 400,
                    message: "rows are numbered from 1".to_owned(),
                });
            }

            self.batch_update(delete_row_request(row)).await
        }
        .boxed()
    }

    fn style_header(&self, width: usize) -> BoxFuture<'_, Result<(), StoreError>> {
        self.batch_update(header_style_request(width)).boxed()
    }

    fn describe(&self) -> BoxFuture<'_, Result<GridInfo, StoreError>> {
        self.get_info().boxed()
    }
}

/// A connector that opens spreadsheets through the given client.
pub fn make_connector(client: Arc<SheetsClient>) -> Arc<Connector> {
    Arc::new(move |spreadsheet_id: &str| {
        Arc::new(SheetsGrid::new(client.clone(), spreadsheet_id)) as Arc<dyn Grid>
    })
}
