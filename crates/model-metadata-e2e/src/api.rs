//! REST client for the application's card endpoints
//!
//! Cards (models) are fetched and updated directly over HTTP, outside the
//! page, to set up or patch state between UI steps.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{HelperError, Result};

/// Header carrying the API session token
pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// One entry of a model's `result_metadata`
///
/// The schema belongs to the application, so the descriptor is kept as the
/// raw JSON object. Accessors cover the fields helpers touch; everything else
/// round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMetadata(Map<String, Value>);

impl ColumnMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        Self(fields)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_field("display_name")
    }

    pub fn base_type(&self) -> Option<&str> {
        self.str_field("base_type")
    }

    pub fn effective_type(&self) -> Option<&str> {
        self.str_field("effective_type")
    }

    pub fn semantic_type(&self) -> Option<&str> {
        self.str_field("semantic_type")
    }

    pub fn with_display_name(self, display_name: impl Into<String>) -> Self {
        self.with("display_name", Value::String(display_name.into()))
    }

    pub fn with_base_type(self, base_type: impl Into<String>) -> Self {
        self.with("base_type", Value::String(base_type.into()))
    }

    /// `None` writes an explicit `null`, which clears the semantic type
    pub fn with_semantic_type(self, semantic_type: Option<&str>) -> Self {
        let value = semantic_type
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null);
        self.with("semantic_type", value)
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for ColumnMetadata {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A saved question or model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub result_metadata: Option<Vec<ColumnMetadata>>,
    /// Every other field of the card
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
}

/// HTTP client bound to one application origin
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = Self::new(config.app.base_url.clone());
        match &config.api.session_token {
            Some(token) => client.with_session_token(token.clone()),
            None => client,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Authenticate with `POST /api/session` and keep the returned token
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String> {
        let session: SessionResponse = self
            .request(
                Method::POST,
                "/api/session",
                Some(json!({ "username": username, "password": password })),
            )
            .await?;
        debug!("Logged in as {}", username);
        self.session_token = Some(session.id.clone());
        Ok(session.id)
    }

    #[instrument(skip(self))]
    pub async fn get_card(&self, card_id: u64) -> Result<Card> {
        self.request(Method::GET, &format!("/api/card/{}", card_id), None)
            .await
    }

    /// `PUT /api/card/{id}` with an arbitrary partial body
    #[instrument(skip(self, body))]
    pub async fn update_card(&self, card_id: u64, body: Value) -> Result<Card> {
        self.request(Method::PUT, &format!("/api/card/{}", card_id), Some(body))
            .await
    }

    /// Replace a card's `result_metadata`
    pub async fn update_card_metadata(
        &self,
        card_id: u64,
        result_metadata: &[ColumnMetadata],
    ) -> Result<Card> {
        self.update_card(card_id, json!({ "result_metadata": result_metadata }))
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.session_token {
            request = request.header(SESSION_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HelperError::Http {
                status: status.as_u16(),
                url,
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}
