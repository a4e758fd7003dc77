//! GitHub API Client
//!
//! Module for managing interactions with the GitHub REST API

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::{parse_repository, Label};
use crate::error::{Error, Result};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// GitHub Label Information
///
/// Represents label information retrieved from the GitHub API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubLabel {
    /// Label ID
    #[serde(default)]
    pub id: u64,

    /// Label name
    pub name: String,

    /// Label color (6-digit hexadecimal, without #)
    #[serde(default)]
    pub color: String,

    /// Label description
    #[serde(default)]
    pub description: Option<String>,

    /// Whether this is a default label
    #[serde(default)]
    pub default: bool,
}

/// Open issue as returned by the issues listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    /// Issue number
    pub number: u64,

    /// Labels attached at listing time
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
}

/// Remote label operations against one API endpoint
///
/// Every call is independently fallible. Callers decide whether an error
/// aborts anything; the sync pipeline logs and continues.
#[async_trait]
pub trait LabelService: Send + Sync {
    /// List the open issues of `repository`
    async fn list_issues(&self, repository: &str) -> Result<Vec<Issue>>;

    /// List the labels attached to one issue
    async fn list_issue_labels(&self, repository: &str, issue: u64) -> Result<Vec<GitHubLabel>>;

    /// Create a label from its `name` and `color`
    async fn create_label(&self, repository: &str, label: &Label) -> Result<GitHubLabel>;

    /// Update the label named `label.current_name`
    async fn update_label(&self, repository: &str, label: &Label) -> Result<GitHubLabel>;

    /// Delete a label by name
    async fn delete_label(&self, repository: &str, name: &str) -> Result<()>;
}

/// GitHub API Client
///
/// reqwest-backed [`LabelService`] authenticating with a static bearer token
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    token: String,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Arguments
    /// - `api_url`: API base URL (e.g. `https://api.github.com`)
    /// - `access_token`: GitHub access token
    ///
    /// # Errors
    /// Returns an error if the token is empty, the URL is invalid or the
    /// HTTP client cannot be built
    pub fn new(api_url: &str, access_token: &str) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(Error::config_validation("Access token is required"));
        }

        let api_url = Url::parse(api_url)?;
        if api_url.cannot_be_a_base() {
            return Err(Error::config_validation(format!(
                "API URL cannot be used as a base: {}",
                api_url
            )));
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            api_url,
            token: access_token.to_string(),
        })
    }

    /// Build `{api}/repos/{owner}/{repo}/{segments...}`
    ///
    /// Each segment is percent-encoded on its own, so label names with
    /// spaces, slashes or non-ASCII characters stay a single segment.
    fn repo_url(&self, repository: &str, segments: &[&str]) -> Result<Url> {
        let (owner, repo) = parse_repository(repository)?;
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config_validation("API URL cannot be used as a base"))?
            .pop_if_empty()
            .push("repos")
            .push(&owner)
            .push(&repo)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "GitHub API request");
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header(USER_AGENT, concat!("git-label/", env!("CARGO_PKG_VERSION")))
    }

    /// Check response status and return error if not successful
    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::AuthenticationFailed);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<Value>(&body).ok().and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

        let message = match parsed {
            Some(message) => message,
            None if body.is_empty() => format!("HTTP {}", status.as_u16()),
            None => body,
        };

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl LabelService for GitHubClient {
    async fn list_issues(&self, repository: &str) -> Result<Vec<Issue>> {
        let url = self.repo_url(repository, &["issues"])?;
        let response = self.request(Method::GET, url).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn list_issue_labels(&self, repository: &str, issue: u64) -> Result<Vec<GitHubLabel>> {
        let number = issue.to_string();
        let url = self.repo_url(repository, &["issues", &number, "labels"])?;
        let response = self.request(Method::GET, url).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn create_label(&self, repository: &str, label: &Label) -> Result<GitHubLabel> {
        let body = label.create_payload()?;
        let url = self.repo_url(repository, &["labels"])?;
        let response = self.request(Method::POST, url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn update_label(&self, repository: &str, label: &Label) -> Result<GitHubLabel> {
        let (current_name, body) = label.update_payload()?;
        let url = self.repo_url(repository, &["labels", current_name])?;
        let response = self.request(Method::PATCH, url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn delete_label(&self, repository: &str, name: &str) -> Result<()> {
        let url = self.repo_url(repository, &["labels", name])?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
