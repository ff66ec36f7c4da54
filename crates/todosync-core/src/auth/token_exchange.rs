//! Token exchange resolver: trades an API key for short-lived bearer tokens.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AccountRef, AuthError, AuthResult, Credential, CredentialResolver};
use crate::util::{compact_text, is_http_url, normalize_text_option, unix_timestamp_now};

/// Resolver that POSTs to a token endpoint and caches the result until it expires.
pub struct TokenExchangeResolver {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    cached: Mutex<Option<(String, Credential)>>,
}

impl std::fmt::Debug for TokenExchangeResolver {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TokenExchangeResolver")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    account: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl TokenExchangeResolver {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> AuthResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::Request("API key must not be empty".to_string()));
        }

        Ok(Self {
            endpoint,
            api_key,
            client: reqwest::Client::builder()
                .timeout(crate::remote::DEFAULT_REQUEST_TIMEOUT)
                .build()
                .map_err(|error| AuthError::Request(error.to_string()))?,
            cached: Mutex::new(None),
        })
    }

    async fn exchange(&self, account: &AccountRef) -> AuthResult<Credential> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&TokenRequest {
                account: &account.name,
            })
            .send()
            .await
            .map_err(|error| {
                if error.is_builder() {
                    AuthError::Request(error.to_string())
                } else {
                    AuthError::Network(error.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| AuthError::Network(error.to_string()))?;

        match status {
            StatusCode::OK | StatusCode::CREATED => parse_token(&body),
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials(account.name.clone())),
            _ => Err(AuthError::Denied(parse_api_error(status, &body))),
        }
    }
}

impl CredentialResolver for TokenExchangeResolver {
    async fn resolve(&self, account: &AccountRef) -> AuthResult<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some((name, credential)) = cached.as_ref() {
            if *name == account.name && !credential.is_expired() {
                return Ok(credential.clone());
            }
        }

        let credential = self.exchange(account).await?;
        tracing::debug!("Exchanged token for account {account}");
        *cached = Some((account.name.clone(), credential.clone()));
        Ok(credential)
    }
}

fn parse_token(body: &str) -> AuthResult<Credential> {
    let payload: TokenResponse = serde_json::from_str(body)
        .map_err(|error| AuthError::Denied(format!("invalid token payload: {error}")))?;

    let token = payload
        .access_token
        .or(payload.token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AuthError::Denied("response did not include access_token/token".to_string())
        })?;

    let expires_at = payload.expires_at.or_else(|| {
        payload
            .expires_in
            .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
    });

    let credential = Credential::new(token);
    Ok(match expires_at {
        Some(expires_at) => credential.expiring_at(expires_at),
        None => credential,
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<TokenErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> AuthResult<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| AuthError::Request("token endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(AuthError::Request(
            "token endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("auth.example.com".to_string()).is_err());
    }

    #[test]
    fn parse_token_accepts_expires_in() {
        let credential = parse_token(r#"{"token": "abc", "expires_in": 600}"#).unwrap();
        assert_eq!(credential.token(), "abc");
        assert!(credential.expires_at().unwrap() > unix_timestamp_now());
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        let message = parse_api_error(StatusCode::FORBIDDEN, r#"{"message": "suspended"}"#);
        assert_eq!(message, "suspended (403)");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolve_caches_until_expiry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("authorization", "Bearer key-1")
                    .json_body(json!({"account": "alice"}));
                then.status(200)
                    .json_body(json!({"access_token": "tok", "expires_in": 3600}));
            })
            .await;

        let resolver = TokenExchangeResolver::new(server.url("/token"), "key-1").unwrap();
        let account = AccountRef::new("alice");

        assert_eq!(resolver.resolve(&account).await.unwrap().token(), "tok");
        assert_eq!(resolver.resolve(&account).await.unwrap().token(), "tok");
        mock.assert_hits_async(1).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_means_invalid_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(401);
            })
            .await;

        let resolver = TokenExchangeResolver::new(server.url("/token"), "key-1").unwrap();
        let result = resolver.resolve(&AccountRef::new("alice")).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }
}
