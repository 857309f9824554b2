//! Thin client for the GitHub REST v3 endpoints the assistant needs.
//!
//! Every repository name is resolved under the login of the token owner,
//! which is looked up once when the client is built.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

#[derive(Error, Debug)]
pub enum GithubError {
    #[error("404 Not Found: {0}")]
    NotFound(String),

    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl GithubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::NotFound(_))
    }
}

pub type GithubResult<T> = Result<T, GithubError>;

/// Which of the authenticated user's repositories to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoFilter {
    All,
    Public,
    Private,
    /// Owned repositories that are not forks
    Sources,
}

impl RepoFilter {
    pub const VALID: [&'static str; 4] = ["all", "public", "private", "sources"];

    fn query_type(&self) -> &'static str {
        match self {
            RepoFilter::All => "all",
            RepoFilter::Public => "public",
            RepoFilter::Private => "private",
            RepoFilter::Sources => "owner",
        }
    }
}

impl FromStr for RepoFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(RepoFilter::All),
            "public" => Ok(RepoFilter::Public),
            "private" => Ok(RepoFilter::Private),
            "sources" => Ok(RepoFilter::Sources),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for RepoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepoFilter::All => "all",
            RepoFilter::Public => "public",
            RepoFilter::Private => "private",
            RepoFilter::Sources => "sources",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
}

/// An entry returned by the contents endpoint
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Option<String>,
    pub encoding: Option<String>,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Contents {
    Many(Vec<ContentEntry>),
    One(ContentEntry),
}

#[derive(Debug, Clone, Deserialize)]
struct CommitEnvelope {
    commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitDetail {
    message: String,
    author: CommitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

/// The parts of a commit shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl CommitSummary {
    /// First line of the commit message
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Deserialize, Default)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
    login: String,
}

impl GithubClient {
    /// Build a client for `token` and resolve the owning login
    pub async fn connect(token: &str, base_url: &str) -> GithubResult<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| GithubError::Decode(format!("invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("devpilot"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder().default_headers(headers).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let user: AuthenticatedUser =
            Self::send(client.get(format!("{}/user", base_url))).await?;

        Ok(Self {
            client,
            base_url,
            login: user.login,
        })
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    fn repo_url(&self, repo: &str, rest: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, self.login, repo, rest)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> GithubResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            let message = serde_json::from_str::<ApiMessage>(&body)
                .unwrap_or_default()
                .message;
            return Err(GithubError::NotFound(message));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ApiMessage>(&body)
                .map(|m| m.message)
                .unwrap_or(body);
            return Err(GithubError::Api { status, message });
        }

        serde_json::from_str(&body).map_err(|e| GithubError::Decode(e.to_string()))
    }

    /// List the user's repositories, following pagination to the end
    pub async fn list_repos(&self, filter: RepoFilter) -> GithubResult<Vec<Repository>> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            let request = self
                .client
                .get(format!("{}/user/repos", self.base_url))
                .query(&[
                    ("type", filter.query_type().to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ]);
            let batch: Vec<Repository> = Self::send(request).await?;
            let done = batch.len() < PER_PAGE;
            repos.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        if filter == RepoFilter::Sources {
            repos.retain(|r| !r.fork);
        }
        Ok(repos)
    }

    /// `/repos/{login}/{repo}/contents/{path}` with every segment escaped
    fn contents_url(&self, repo: &str, path: &str) -> GithubResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GithubError::Decode(format!("invalid API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| GithubError::Decode(format!("invalid API URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["repos", self.login.as_str(), repo, "contents"])
            .extend(path.trim_matches('/').split('/'));
        Ok(url)
    }

    async fn contents(&self, repo: &str, path: &str, branch: &str) -> GithubResult<Vec<ContentEntry>> {
        let request = self
            .client
            .get(self.contents_url(repo, path)?)
            .query(&[("ref", branch)]);
        Ok(match Self::send::<Contents>(request).await? {
            Contents::Many(entries) => entries,
            Contents::One(entry) => vec![entry],
        })
    }

    /// Fetch a file and decode its base64 payload as UTF-8 text
    pub async fn read_file(&self, repo: &str, path: &str, branch: &str) -> GithubResult<String> {
        let entries = self.contents(repo, path, branch).await?;
        let file = match entries.as_slice() {
            [entry] if entry.is_file() => entry,
            _ => {
                return Err(GithubError::Decode(format!(
                    "'{}' is a directory, not a file",
                    path
                )))
            }
        };
        decode_content(file)
    }

    /// List the entries of a directory
    pub async fn list_dir(
        &self,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> GithubResult<Vec<ContentEntry>> {
        self.contents(repo, path, branch).await
    }

    pub async fn get_repo(&self, repo: &str) -> GithubResult<Repository> {
        Self::send(self.client.get(self.repo_url(repo, ""))).await
    }

    /// Most recent commits on the default branch, newest first
    pub async fn recent_commits(&self, repo: &str, limit: usize) -> GithubResult<Vec<CommitSummary>> {
        let mut commits = Vec::new();
        let mut page = 1;
        while commits.len() < limit {
            let request = self
                .client
                .get(self.repo_url(repo, "/commits"))
                .query(&[
                    ("per_page", PER_PAGE.min(limit).to_string()),
                    ("page", page.to_string()),
                ]);
            let batch: Vec<CommitEnvelope> = Self::send(request).await?;
            let done = batch.len() < PER_PAGE.min(limit);
            commits.extend(batch.into_iter().map(|c| CommitSummary {
                message: c.commit.message,
                author: c.commit.author.name,
                date: c.commit.author.date,
            }));
            if done {
                break;
            }
            page += 1;
        }
        commits.truncate(limit);
        Ok(commits)
    }
}

fn decode_content(entry: &ContentEntry) -> GithubResult<String> {
    let encoded = entry.content.as_deref().unwrap_or_default();
    if let Some(encoding) = entry.encoding.as_deref() {
        if encoding != "base64" {
            return Err(GithubError::Decode(format!(
                "unsupported encoding '{}' for '{}'",
                encoding, entry.path
            )));
        }
    }
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| GithubError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GithubError::Decode(e.to_string()))
}
