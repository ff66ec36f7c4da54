//! reqwest client for the todo list service.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::wire::{parse_entry, parse_entry_list};
use super::{
    DeleteOutcome, EntryList, EntryPayload, RemoteEntries, RemoteError, RemoteResult,
    WriteOutcome, WriteStatus,
};
use crate::auth::Credential;
use crate::models::RemoteId;
use crate::sync::SyncCursor;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Socket timeout applied to every request unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ENTRIES_PATH: &str = "/todolist/entries";

/// HTTP implementation of [`RemoteEntries`].
pub struct HttpEntryClient {
    base_url: String,
    client: reqwest::Client,
    credential: RwLock<Option<Credential>>,
}

impl std::fmt::Debug for HttpEntryClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpEntryClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.current_credential())
            .finish_non_exhaustive()
    }
}

impl HttpEntryClient {
    pub fn new(base_url: impl Into<String>) -> RemoteResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Request(error.to_string()))?;
        Ok(Self {
            base_url,
            client,
            credential: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_credential(&self) -> Option<Credential> {
        match self.credential.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}{ENTRIES_PATH}", self.base_url)
    }

    fn item_url(&self, id: RemoteId) -> String {
        format!("{}{ENTRIES_PATH}/{id}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match self.current_credential() {
            Some(credential) => builder.bearer_auth(credential.token()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        builder.send().await.map_err(|error| transport_error(&error))
    }

    async fn write(&self, method: Method, url: String) -> RemoteResult<WriteOutcome> {
        let response = self.send(self.request(method, &url)).await?;
        let status = response.status();
        let write_status = match status {
            StatusCode::CREATED => WriteStatus::Created,
            StatusCode::OK => WriteStatus::Updated,
            _ => return Err(status_error(response).await),
        };

        let body = read_body(response).await?;
        Ok(WriteOutcome {
            status: write_status,
            entry: parse_entry(&body)?,
        })
    }
}

impl RemoteEntries for HttpEntryClient {
    fn set_credential(&self, credential: Option<Credential>) {
        match self.credential.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    async fn create(&self, payload: &EntryPayload) -> RemoteResult<WriteOutcome> {
        let url = format!("{}?{}", self.collection_url(), encode_payload(payload));
        self.write(Method::POST, url).await
    }

    async fn update(&self, id: RemoteId, payload: &EntryPayload) -> RemoteResult<WriteOutcome> {
        let url = format!("{}?{}", self.item_url(id), encode_payload(payload));
        self.write(Method::PUT, url).await
    }

    async fn delete(&self, id: RemoteId) -> RemoteResult<DeleteOutcome> {
        let response = self
            .send(self.request(Method::DELETE, &self.item_url(id)))
            .await?;
        match response.status() {
            StatusCode::GONE => Ok(DeleteOutcome::Gone),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(status_error(response).await),
        }
    }

    async fn list(&self, since: Option<SyncCursor>) -> RemoteResult<EntryList> {
        let url = match since {
            Some(cursor) => format!("{}?modified={}", self.collection_url(), cursor.to_query()),
            None => self.collection_url(),
        };

        let response = self.send(self.request(Method::GET, &url)).await?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }

        let body = read_body(response).await?;
        parse_entry_list(&body)
    }
}

/// Encode entry fields as the service's semicolon-separated query string.
fn encode_payload(payload: &EntryPayload) -> String {
    format!(
        "title={};notes={};complete={}",
        urlencoding::encode(&payload.title),
        urlencoding::encode(&payload.notes),
        u8::from(payload.complete)
    )
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Request("server URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Request(format!(
            "server URL must include http:// or https://: {base_url}"
        )))
    }
}

fn transport_error(error: &reqwest::Error) -> RemoteError {
    if error.is_builder() {
        RemoteError::Request(error.to_string())
    } else {
        RemoteError::Network(error.to_string())
    }
}

async fn read_body(response: Response) -> RemoteResult<String> {
    response
        .text()
        .await
        .map_err(|error| RemoteError::Network(error.to_string()))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }
    compact_text(body)
}

/// Map a non-success response onto a failure category.
async fn status_error(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(&body);
    let code = status.as_u16();

    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth {
            invalid_credentials: true,
            message,
        },
        StatusCode::FORBIDDEN => RemoteError::Auth {
            invalid_credentials: false,
            message,
        },
        _ if status.is_server_error() => RemoteError::Server {
            status: code,
            message,
        },
        _ => RemoteError::Rejected {
            status: code,
            message,
        },
    }
}
