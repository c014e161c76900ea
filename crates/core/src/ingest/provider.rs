use crate::config::Settings;
use crate::ingest::error::SourceError;
use crate::ingest::types::RawRatingsPage;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::time::Duration;

const NEXT_PAGE_PARAM: &str = "next_page";
// Error bodies are echoed into logs; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// A paginated upstream of analyst ratings.
#[async_trait::async_trait]
pub trait RatingsSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches one page. `cursor` is the previous page's `next_page` token, passed back verbatim.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<RawRatingsPage, SourceError>;
}

#[derive(Debug, Clone)]
pub struct HttpRatingsSource {
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpRatingsSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.require_ratings_api_url()?,
            settings.require_ratings_api_key()?,
            Duration::from_secs(settings.ratings_api_timeout_secs),
        )
    }

    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ratings api http client")?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("RATINGS_API_KEY is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http,
            url: url.trim().to_string(),
            headers,
        })
    }
}

#[async_trait::async_trait]
impl RatingsSource for HttpRatingsSource {
    fn source_name(&self) -> &'static str {
        "ratings_http_json"
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<RawRatingsPage, SourceError> {
        let mut req = self.http.get(&self.url).headers(self.headers.clone());
        if let Some(cursor) = cursor {
            req = req.query(&[(NEXT_PAGE_PARAM, cursor)]);
        }

        let res = req
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| SourceError::Request(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        serde_json::from_str::<RawRatingsPage>(&text)
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}
