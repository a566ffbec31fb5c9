//! GitHub repository provider
//!
//! Looks up repositories by numeric id and counts their contributors through the
//! GitHub REST API. Contributor listings are paginated; every page is followed via the
//! `Link` header so the count covers the whole repository.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Response, StatusCode, header};
use tracing::{debug, warn};
use url::Url;

use crate::config::AppConfig;
use crate::connectors::trait_::{ProviderError, RepositoryProvider, RepositorySummary};

pub const GITHUB_PROVIDER_SLUG: &str = "github";

const USER_AGENT: &str = concat!("OpenSesame/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const CONTRIBUTORS_PER_PAGE: u32 = 100;

/// Hard stop for pagination in case the provider keeps returning `next` links.
const MAX_CONTRIBUTOR_PAGES: usize = 200;

/// GitHub REST client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client against `api_base` (e.g. `https://api.github.com`).
    ///
    /// `timeout` bounds each individual HTTP request.
    pub fn new(
        api_base: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| ProviderError::malformed(format!("invalid GitHub API base: {}", e)))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base,
            token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Self::new(
            &config.github_api_base,
            config.github_token.clone(),
            config.github.request_timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        let base = self.api_base.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
            .map_err(|e| ProviderError::malformed(format!("invalid GitHub URL: {}", e)))
    }

    async fn get(&self, url: Url, repository_id: &str) -> Result<Response, ProviderError> {
        let mut request = self
            .http
            .get(url)
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::transient(format!("GitHub request timed out: {}", e))
            } else {
                ProviderError::transient(format!("GitHub request failed: {}", e))
            }
        })?;

        check_status(response, repository_id).await
    }

    fn repository_path(repository_id: &str) -> Result<String, ProviderError> {
        if repository_id.is_empty() || !repository_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProviderError::NotFound {
                repository_id: repository_id.to_string(),
            });
        }
        Ok(format!("/repositories/{}", repository_id))
    }
}

/// Map non-success responses onto [`ProviderError`].
async fn check_status(response: Response, repository_id: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && header_value(&response, "x-ratelimit-remaining").as_deref() == Some("0"));

    if rate_limited {
        let retry_after = header_value(&response, "retry-after")
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| {
                header_value(&response, "x-ratelimit-reset")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|reset| (reset - Utc::now().timestamp()).max(0) as u64)
            });
        warn!(repository_id, ?retry_after, "GitHub rate limit hit");
        return Err(ProviderError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();

    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::NotFound {
            repository_id: repository_id.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized {
            details: format!("{}: {}", status, snippet),
        },
        s if s.is_server_error() => ProviderError::transient(format!("{}: {}", status, snippet)),
        _ => ProviderError::malformed(format!("unexpected status {}: {}", status, snippet)),
    })
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Extract the `rel="next"` target from a GitHub `Link` header.
fn parse_next_link(link_header: &str) -> Option<String> {
    // <https://api.github.com/resource?page=2>; rel="next", <...>; rel="last"
    for link in link_header.split(',') {
        let mut parts = link.split(';');
        let (Some(url_part), Some(rel_part)) = (parts.next(), parts.next()) else {
            continue;
        };

        if rel_part.trim() == "rel=\"next\""
            && let Some(start) = url_part.find('<')
            && let Some(end) = url_part.find('>')
            && start < end
        {
            return Some(url_part[start + 1..end].to_string());
        }
    }
    None
}

#[async_trait]
impl RepositoryProvider for GitHubClient {
    fn slug(&self) -> &'static str {
        GITHUB_PROVIDER_SLUG
    }

    async fn repository(&self, repository_id: &str) -> Result<RepositorySummary, ProviderError> {
        let url = self.endpoint(&Self::repository_path(repository_id)?)?;
        let response = self.get(url, repository_id).await?;
        response
            .json::<RepositorySummary>()
            .await
            .map_err(|e| ProviderError::malformed(format!("repository payload: {}", e)))
    }

    async fn contributor_count(&self, repository_id: &str) -> Result<u32, ProviderError> {
        let mut url = self.endpoint(&format!(
            "{}/contributors",
            Self::repository_path(repository_id)?
        ))?;
        // Anonymous (email-only) committers are not counted.
        url.query_pairs_mut()
            .append_pair("per_page", &CONTRIBUTORS_PER_PAGE.to_string());

        let mut total: u32 = 0;
        for page in 1..=MAX_CONTRIBUTOR_PAGES {
            let response = self.get(url.clone(), repository_id).await?;

            // Empty repositories answer 204 with no body.
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }

            let next = header_value(&response, "link").and_then(|link| parse_next_link(&link));
            let contributors = response
                .json::<Vec<serde_json::Value>>()
                .await
                .map_err(|e| ProviderError::malformed(format!("contributors payload: {}", e)))?;
            total = total.saturating_add(contributors.len() as u32);

            match next {
                Some(next) => {
                    url = Url::parse(&next).map_err(|e| {
                        ProviderError::malformed(format!("invalid pagination link: {}", e))
                    })?;
                }
                None => break,
            }

            if page == MAX_CONTRIBUTOR_PAGES {
                warn!(
                    repository_id,
                    pages = page,
                    "Stopped following contributor pagination; count is truncated"
                );
            }
        }

        debug!(repository_id, contributors = total, "Counted GitHub contributors");
        Ok(total)
    }
}
