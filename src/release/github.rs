use crate::error::{ReleaseError, Result};
use crate::release::{ReleaseInfo, ReleaseQueryService};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Environment variables holding the API token, in order of precedence
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Read the API token from the environment
///
/// `GITHUB_TOKEN` wins over `GH_TOKEN`; blank values are ignored.
pub fn token_from_env() -> Option<String> {
    token_from(|name| std::env::var(name).ok())
}

/// Resolve the API token through an arbitrary variable lookup
pub fn token_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// GitHub Releases client (read-only)
pub struct GitHubReleases {
    owner: String,
    api_url: Url,
    token: String,
    client: Client,
}

impl GitHubReleases {
    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("release-orchestrator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(GitHubReleases {
            owner: owner.into(),
            api_url: parse_api_url(DEFAULT_API_URL)?,
            token: token.into(),
            client,
        })
    }

    /// Point the client at another API root (GitHub Enterprise, test servers)
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self> {
        self.api_url = parse_api_url(api_url)?;
        Ok(self)
    }

    /// `{api}/repos/{owner}/{repo}/releases/tags/{tag}` with encoded segments
    pub fn release_url(&self, repo: &str, tag: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| ReleaseError::config(format!("Invalid API URL '{}'", self.api_url)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), repo, "releases", "tags", tag]);
        Ok(url)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if self.token.trim().is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }
}

fn parse_api_url(api_url: &str) -> Result<Url> {
    Url::parse(api_url)
        .map_err(|e| ReleaseError::config(format!("Invalid API URL '{}': {}", api_url, e)))
}

impl ReleaseQueryService for GitHubReleases {
    fn get_release(&self, repo: &str, tag: &str) -> Result<Option<ReleaseInfo>> {
        let url = self.release_url(repo, tag)?;

        let response = self.get(url).send().map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ReleaseError::ApiUnavailable(format!("GitHub API request failed: {}", e))
            } else {
                ReleaseError::Http(e)
            }
        })?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|remaining| remaining.as_bytes() == b"0");

        if status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
            || (status == StatusCode::FORBIDDEN && rate_limited)
        {
            return Err(ReleaseError::ApiUnavailable(format!(
                "GitHub API returned {} for {}/{}",
                status, self.owner, repo
            )));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReleaseError::api(format!(
                "GitHub API auth failed (status {}). Set GITHUB_TOKEN/GH_TOKEN with access to {}/{}",
                status, self.owner, repo
            )));
        }

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReleaseError::api(format!(
                "GitHub API error ({}): {}",
                status, body
            )));
        }

        let release = response.json::<ReleaseInfo>()?;
        Ok(Some(release))
    }
}
