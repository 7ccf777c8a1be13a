//! Feed API access.
//!
//! [`FeedClient`] is the seam the ingestion loop depends on; [`TumblrClient`]
//! implements it against the Tumblr v2 HTTP API.

use crate::config::ApiConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{BlogMetadata, PostsPage};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// Envelope statuses the API uses for success
const SUCCESS_STATUSES: [u16; 3] = [200, 201, 301];

/// Source of pages and metadata for a blog
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch up to `page_size` posts starting at `offset`
    async fn fetch_page(
        &self,
        blog: &str,
        offset: u32,
        page_size: u32,
    ) -> std::result::Result<PostsPage, FetchError>;

    /// Fetch the blog's title, URL and last update time
    async fn fetch_metadata(&self, blog: &str) -> std::result::Result<BlogMetadata, FetchError>;
}

/// `{"meta": {...}, "response": {...}}` wrapper around every API reply
#[derive(Deserialize)]
struct Envelope {
    meta: Meta,
    #[serde(default)]
    response: Value,
}

#[derive(Deserialize)]
struct Meta {
    status: u16,
    #[serde(default)]
    msg: String,
}

#[derive(Deserialize)]
struct BlogInfoResponse {
    blog: BlogInfo,
}

#[derive(Deserialize)]
struct BlogInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    updated: i64,
}

/// Unwrap an API reply body into its `response` payload
///
/// An HTTP status outside the success set is an error carrying that status,
/// whatever the body says. Anything else that is not a well-formed success
/// envelope becomes an application-level [`FetchError`] as well.
fn parse_envelope<T: DeserializeOwned>(
    http_status: u16,
    body: &str,
) -> std::result::Result<T, FetchError> {
    let parsed = serde_json::from_str::<Envelope>(body);

    if !SUCCESS_STATUSES.contains(&http_status) {
        let message = match parsed {
            Ok(envelope) if !envelope.meta.msg.is_empty() => envelope.meta.msg,
            Ok(_) => format!("HTTP {}", http_status),
            Err(_) => "Non-JSON error response".to_string(),
        };
        return Err(FetchError::Application {
            status: http_status,
            message,
        });
    }

    let envelope = parsed.map_err(|_| FetchError::Application {
        status: 500,
        message: "Malformed JSON or HTML was returned.".to_string(),
    })?;

    if !SUCCESS_STATUSES.contains(&envelope.meta.status) {
        return Err(FetchError::Application {
            status: envelope.meta.status,
            message: envelope.meta.msg,
        });
    }

    serde_json::from_value(envelope.response).map_err(|e| FetchError::Application {
        status: 500,
        message: format!("Unexpected response shape: {}", e),
    })
}

/// HTTP client for the Tumblr v2 API
pub struct TumblrClient {
    http: reqwest::Client,
    base_url: url::Url,
    api_key: Option<String>,
}

impl TumblrClient {
    /// Create a client from API settings
    ///
    /// # Errors
    /// Returns a configuration error if the base URL is invalid, or an error if
    /// the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = url::Url::parse(&config.base_url).map_err(|e| {
            Error::config(
                "api.base_url",
                format!("invalid base URL '{}': {}", config.base_url, e),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(
                "api.base_url",
                format!("base URL '{}' cannot have paths", config.base_url),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Build `{base}blog/{blog}/{endpoint}?{params}&api_key=...`
    fn endpoint(&self, blog: &str, endpoint: &str, params: &[(&str, String)]) -> url::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["blog", blog, endpoint]);
        }
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(key) = &self.api_key {
                query.append_pair("api_key", key);
            }
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: url::Url) -> std::result::Result<T, FetchError> {
        debug!(path = %url.path(), "Requesting feed API");

        let response = self.http.get(url).send().await?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("Failed to read response body: {}", e)))?;

        parse_envelope(status, &body)
    }
}

#[async_trait]
impl FeedClient for TumblrClient {
    async fn fetch_page(
        &self,
        blog: &str,
        offset: u32,
        page_size: u32,
    ) -> std::result::Result<PostsPage, FetchError> {
        let url = self.endpoint(
            blog,
            "posts",
            &[
                ("offset", offset.to_string()),
                ("limit", page_size.to_string()),
            ],
        );
        let page: PostsPage = self.get(url).await?;

        if !page.posts.is_empty() {
            info!(
                "Got posts {} to {} out of {} ({})",
                offset,
                offset as usize + page.posts.len() - 1,
                page.total_posts,
                blog
            );
        }
        Ok(page)
    }

    async fn fetch_metadata(&self, blog: &str) -> std::result::Result<BlogMetadata, FetchError> {
        let url = self.endpoint(blog, "info", &[]);
        let info: BlogInfoResponse = self.get(url).await?;

        Ok(BlogMetadata {
            url: info.blog.url.unwrap_or_else(|| blog.to_string()),
            title: info.blog.title,
            last_update: info.blog.updated,
        })
    }
}
