use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Token;

/// Media type requested from the REST API
pub const GITHUB_V3_ACCEPT: &str = "application/vnd.github.v3+json";

/// Largest page size the listing endpoint accepts
pub const PER_PAGE: u32 = 100;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A repository entry as returned by `GET /user/repos`.
///
/// Every field is optional so that one odd entry doesn't fail the whole
/// listing; incomplete entries are dropped during discovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRepository {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub owner: Option<RawOwner>,
    pub ssh_url: Option<String>,
    pub clone_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOwner {
    pub login: Option<String>,
}

/// Minimal GitHub REST client for the repository listing
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
}

impl GitHubClient {
    /// Build a client authenticated with `token` against `api_url`
    pub fn new(api_url: &str, token: &Token, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;

        let mut auth = HeaderValue::from_str(&format!("token {}", token.expose()))
            .context("GitHub token contains characters that are not valid in an HTTP header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_V3_ACCEPT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create GitHub HTTP client")?;

        Ok(Self { http, api_url })
    }

    /// First page of the listing: every visibility class, 100 per page
    pub fn repositories_url(&self) -> Result<Url> {
        let url = format!(
            "{}/user/repos?per_page={}&type=all",
            self.api_url.as_str().trim_end_matches('/'),
            PER_PAGE
        );
        Url::parse(&url).with_context(|| format!("Invalid repository listing URL: {}", url))
    }

    /// List every repository visible to the token.
    ///
    /// Follows `Link: <...>; rel="next"` until the last page. Any transport
    /// error or non-success status aborts the listing and nothing is returned.
    pub async fn list_repositories(&self) -> Result<Vec<RawRepository>> {
        let mut repositories = Vec::new();
        let mut next = Some(self.repositories_url()?);
        let mut page = 0usize;

        while let Some(url) = next.take() {
            page += 1;
            debug!("Fetching repositories page {}: {}", page, url);

            let resp = self
                .http
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("Failed to fetch repositories page {}", page))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(anyhow!(
                    "GitHub API returned {} for repositories page {}",
                    status,
                    page
                ));
            }

            next = resp
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_next_link)
                .map(|target| url.join(&target))
                .transpose()
                .context("Invalid next page URL in Link header")?;

            let items: Vec<RawRepository> = resp
                .json()
                .await
                .with_context(|| format!("Failed to decode repositories page {}", page))?;

            debug!("Page {} returned {} repositories", page, items.len());
            repositories.extend(items);
        }

        info!(
            "Found {} repositories across {} pages",
            repositories.len(),
            page
        );
        Ok(repositories)
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
///
/// GitHub sends `<https://...&page=2>; rel="next", <https://...>; rel="last"`.
/// A relation list (`rel="next last"`) and unquoted values are accepted.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?;

        let is_next = parts.any(|param| match param.split_once('=') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("rel") => value
                .trim()
                .trim_matches('"')
                .split_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case("next")),
            _ => false,
        });

        is_next.then(|| target.to_string())
    })
}
