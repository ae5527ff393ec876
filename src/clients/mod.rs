/// External API clients module
use crate::domain::{Cursor, RaidParams};
use crate::errors::{ApiError, ApiResult};
use crate::utils::normalize_tag;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("clan-capital-service/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Clash of Clans API client
pub struct ClashClient {
    http_client: HttpClient,
    base_url: Url,
    token: String,
}

impl ClashClient {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Internal(format!("invalid CLASH_API_URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Internal(format!(
                "invalid CLASH_API_URL: {} cannot be a base",
                base_url
            )));
        }
        Ok(Self {
            http_client: HttpClient::new(timeout)?,
            base_url,
            token,
        })
    }

    /// Fetch a player by tag, `None` when upstream does not answer with success
    pub async fn get_player(&self, tag: &str) -> ApiResult<Option<Value>> {
        let url = self.tagged_url("players", tag, None);
        self.get_json(url, &[]).await
    }

    /// Fetch a clan by tag
    pub async fn get_clan(&self, tag: &str) -> ApiResult<Option<Value>> {
        let url = self.tagged_url("clans", tag, None);
        self.get_json(url, &[]).await
    }

    /// Fetch a page of capital raid seasons for a clan
    pub async fn get_capital_raids(
        &self,
        tag: &str,
        params: &RaidParams,
    ) -> ApiResult<Option<Value>> {
        let url = self.tagged_url("clans", tag, Some("capitalraidseasons"));
        self.get_json(url, &raid_query(params)).await
    }

    /// `{base}/{collection}/%23{TAG}[/{suffix}]`
    fn tagged_url(&self, collection: &str, tag: &str, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(collection)
                .push(&format!("#{}", normalize_tag(tag)));
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> ApiResult<Option<Value>> {
        let resp = self
            .http_client
            .get_client()
            .get(url.clone())
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::warn!(url = %url, status = %resp.status(), "Clash API request unsuccessful");
            return Ok(None);
        }

        let json = resp.json().await?;
        Ok(Some(json))
    }
}

fn raid_query(params: &RaidParams) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", params.limit.to_string())];
    match &params.cursor {
        Some(Cursor::After(c)) => query.push(("after", c.clone())),
        Some(Cursor::Before(c)) => query.push(("before", c.clone())),
        None => {}
    }
    query
}
