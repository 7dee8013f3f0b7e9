//! HTTP gateway implementation against the hosted platform's REST surface:
//! `/rest/v1` tables, `/auth/v1` identity, `/storage/v1` object storage.

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use async_trait::async_trait;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};

use super::query::filter_params;
use super::{AuthEvent, AuthGateway, AuthSession, AuthUser, DataGateway, Filter, ObjectStorage, Page, Query};

pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
    access_token: RwLock<Option<String>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let (auth_events, _) = broadcast::channel(16);
        Self {
            client: Client::new(),
            base_url: normalize_base_url(&config.base_url),
            api_key: config.api_key.clone(),
            bucket: config.storage_bucket.clone(),
            access_token: RwLock::new(None),
            auth_events,
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, endpoint)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    /// Attach the project key plus the user's bearer token (the key doubles
    /// as the anonymous bearer before sign-in).
    async fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.read().await.clone();
        let bearer = token.unwrap_or_else(|| self.api_key.clone());
        builder
            .header("apikey", &self.api_key)
            .header("authorization", format!("Bearer {}", bearer))
    }

    async fn install_session(&self, session: &AuthSession) {
        *self.access_token.write().await = Some(session.access_token.clone());
        let _ = self.auth_events.send(AuthEvent::SignedIn(session.clone()));
    }
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn select(&self, table: &str, query: Query) -> AppResult<Page> {
        let mut request = self
            .authed(self.client.get(self.rest_url(table)))
            .await
            .query(&query.to_params());
        if query.count {
            request = request.header("prefer", "count=exact");
        }
        if let Some(range) = query.range {
            request = request
                .header("range-unit", "items")
                .header("range", format!("{}-{}", range.from, range.to));
        }

        let response = check(request.send().await?).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<Value> = response.json().await?;
        Ok(Page { rows, total })
    }

    async fn insert(&self, table: &str, row: Value) -> AppResult<Value> {
        let request = self
            .authed(self.client.post(self.rest_url(table)))
            .await
            .header("prefer", "return=representation")
            .json(&row);

        let response = check(request.send().await?).await?;
        let rows: Vec<Value> = response.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Business("insert returned no rows".to_string()))
    }

    async fn update(
        &self,
        table: &str,
        filters: Vec<Filter>,
        patch: Value,
    ) -> AppResult<Vec<Value>> {
        let request = self
            .authed(self.client.patch(self.rest_url(table)))
            .await
            .query(&filter_params(&filters))
            .header("prefer", "return=representation")
            .json(&patch);

        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> AppResult<()> {
        let request = self
            .authed(self.client.delete(self.rest_url(table)))
            .await
            .query(&filter_params(&filters));

        check(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for RestGateway {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let request = self
            .authed(self.client.post(self.object_url(path)))
            .await
            .header("content-type", content_type.to_string())
            .header("x-upsert", "false")
            .body(bytes);

        let response = check(request.send().await?).await?;
        let parsed: UploadResponse = response.json().await.unwrap_or(UploadResponse { key: None });
        // The response key is prefixed with the bucket name; callers work with
        // bare object paths.
        let stored = parsed
            .key
            .and_then(|key| {
                key.strip_prefix(&format!("{}/", self.bucket))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| path.to_string());
        Ok(stored)
    }

    async fn download(&self, path: &str) -> AppResult<Vec<u8>> {
        let request = self.authed(self.client.get(self.object_url(path))).await;
        let response = check(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn remove(&self, paths: &[String]) -> AppResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let request = self
            .authed(self.client.delete(url))
            .await
            .json(&serde_json::json!({ "prefixes": paths }));

        check(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for RestGateway {
    async fn current_session(&self) -> AppResult<Option<AuthSession>> {
        let token = self.access_token.read().await.clone();
        let Some(token) = token else {
            return Ok(None);
        };

        let request = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.api_key)
            .header("authorization", format!("Bearer {}", token));
        let response = check(request.send().await?).await?;
        let user: AuthUser = response.json().await?;
        Ok(Some(AuthSession {
            access_token: token,
            user,
        }))
    }

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }));

        let response = check(request.send().await?).await?;
        let session: AuthSession = response.json().await?;
        self.install_session(&session).await;
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }));

        let response = check(request.send().await?).await?;
        let session: AuthSession = response.json().await?;
        self.install_session(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let token = self.access_token.read().await.clone();
        if let Some(token) = token {
            let request = self
                .client
                .post(self.auth_url("logout"))
                .header("apikey", &self.api_key)
                .header("authorization", format!("Bearer {}", token));
            check(request.send().await?).await?;
        }

        *self.access_token.write().await = None;
        let _ = self.auth_events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}

async fn check(response: reqwest::Response) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Gateway {
        status,
        message: extract_message(&body),
    })
}

/// Error bodies come as {"message": ...} or {"error_description": ...}
/// depending on which surface rejected the request.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|key| {
                    value
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// "0-9/57" -> 57
fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.parse().ok()
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-9/57"), Some(57));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(extract_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(
            extract_message(r#"{"error_description":"invalid login"}"#),
            "invalid login"
        );
        assert_eq!(extract_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://example.supabase.co/ "),
            "https://example.supabase.co"
        );
    }
}
