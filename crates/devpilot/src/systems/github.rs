use async_trait::async_trait;

use crate::errors::{AgentError, AgentResult};
use crate::github::{GithubClient, GithubError, RepoFilter};
use crate::models::tool::{ParamKind, Tool, ToolCall, ToolParam};
use crate::systems::System;

const NOT_INITIALIZED: &str = "GitHub client not initialized. Check your access token.";

/// Read-only tools over the authenticated user's GitHub repositories
pub struct GithubSystem {
    client: Option<GithubClient>,
    tools: Vec<Tool>,
}

impl GithubSystem {
    /// A system without a client answers every call with a "not initialized" note
    pub fn new(client: Option<GithubClient>) -> Self {
        let repo_name = || {
            ToolParam::required(
                "repo_name",
                ParamKind::String,
                "Repository name (e.g., 'my-website').",
            )
        };
        let branch = || {
            ToolParam::required("branch", ParamKind::String, "Branch name, defaults to 'main'.")
                .with_default("main")
        };

        let tools = vec![
            Tool::new(
                "list_github_repositories",
                "Lists the user's GitHub repositories with details.",
                vec![ToolParam::required(
                    "filter_type",
                    ParamKind::String,
                    "Filter repos by 'all', 'public', 'private', or 'sources' (excludes forks).",
                )
                .with_default("all")],
            ),
            Tool::new(
                "get_repo_file_content",
                "Reads the content of a specific file from a GitHub repository.",
                vec![
                    repo_name(),
                    ToolParam::required(
                        "file_path",
                        ParamKind::String,
                        "Full path to the file (e.g., 'README.md' or 'src/main.py').",
                    ),
                    branch(),
                ],
            ),
            Tool::new(
                "list_repo_files",
                "Lists all files and folders in a repository directory.",
                vec![
                    repo_name(),
                    ToolParam::required(
                        "path",
                        ParamKind::String,
                        "Directory path within repo (empty string for root).",
                    )
                    .with_default(""),
                    branch(),
                ],
            ),
            Tool::new(
                "get_repo_info",
                "Gets detailed information about a specific repository.",
                vec![repo_name()],
            ),
            Tool::new(
                "get_recent_commits",
                "Gets recent commits from a repository.",
                vec![
                    repo_name(),
                    ToolParam::required(
                        "limit",
                        ParamKind::Integer,
                        "Maximum number of commits to return (default: 5).",
                    )
                    .with_default(5),
                ],
            ),
        ];

        Self { client, tools }
    }

    async fn list_repositories(client: &GithubClient, filter_type: &str) -> String {
        let filter = match filter_type.parse::<RepoFilter>() {
            Ok(filter) => filter,
            Err(other) => {
                return format!(
                    "❌ Unknown filter '{}'. Use one of: {}.",
                    other,
                    RepoFilter::VALID.join(", ")
                )
            }
        };

        match client.list_repos(filter).await {
            Ok(repos) if repos.is_empty() => format!("No {} repositories found.", filter),
            Ok(repos) => repos
                .iter()
                .map(|r| {
                    let visibility = if r.private { "🔒private" } else { "🌐public" };
                    format!("• {} ({}) ⭐{}", r.name, visibility, r.stargazers_count)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => fault(e),
        }
    }

    async fn file_content(client: &GithubClient, repo: &str, path: &str, branch: &str) -> String {
        match client.read_file(repo, path, branch).await {
            Ok(text) => text,
            Err(e) if e.is_not_found() => {
                format!("❌ File '{}' or repository '{}' not found.", path, repo)
            }
            Err(e) => fault(e),
        }
    }

    async fn files(client: &GithubClient, repo: &str, path: &str, branch: &str) -> String {
        match client.list_dir(repo, path, branch).await {
            Ok(entries) => entries
                .iter()
                .map(|entry| {
                    if entry.is_file() {
                        format!("📄 {}", entry.name)
                    } else {
                        format!("📁 {}/", entry.name)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) if e.is_not_found() => format!("❌ Path '{}' not found in '{}'.", path, repo),
            Err(e) => fault(e),
        }
    }

    async fn info(client: &GithubClient, repo: &str) -> String {
        match client.get_repo(repo).await {
            Ok(r) => format!(
                "📂 Repository: {}\nDescription: {}\nLanguage: {}, Stars: ⭐{}, Forks: {}",
                r.full_name,
                r.description.as_deref().unwrap_or("None"),
                r.language.as_deref().unwrap_or("None"),
                r.stargazers_count,
                r.forks_count
            ),
            Err(e) if e.is_not_found() => format!("❌ Repository '{}' not found.", repo),
            Err(e) => fault(e),
        }
    }

    async fn commits(client: &GithubClient, repo: &str, limit: i64) -> String {
        let limit = usize::try_from(limit).unwrap_or(0);
        match client.recent_commits(repo, limit).await {
            Ok(commits) => commits
                .iter()
                .map(|c| {
                    format!(
                        "[{}] {} - by {}",
                        c.date.format("%Y-%m-%d"),
                        c.headline(),
                        c.author
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) if e.is_not_found() => format!("❌ Repository '{}' not found.", repo),
            Err(e) => fault(e),
        }
    }
}

/// Remote faults and local decoding faults are worded differently
fn fault(error: GithubError) -> String {
    tracing::debug!("github call failed: {}", error);
    match error {
        GithubError::Decode(detail) => format!("Unexpected error: {}", detail),
        other => format!("GitHub error: {}", other),
    }
}

#[async_trait]
impl System for GithubSystem {
    fn name(&self) -> &str {
        "github"
    }

    fn description(&self) -> &str {
        "Browse the authenticated user's GitHub repositories, files and commits."
    }

    fn instructions(&self) -> &str {
        "Repository names are plain names like 'my-website'; the owner is always the \
         authenticated user."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<String> {
        let args = self.tool(&tool_call.name)?.resolve(&tool_call.arguments)?;
        let Some(client) = &self.client else {
            return Ok(NOT_INITIALIZED.to_string());
        };

        let output = match tool_call.name.as_str() {
            "list_github_repositories" => {
                Self::list_repositories(client, args.str("filter_type")?).await
            }
            "get_repo_file_content" => {
                Self::file_content(
                    client,
                    args.str("repo_name")?,
                    args.str("file_path")?,
                    args.str("branch")?,
                )
                .await
            }
            "list_repo_files" => {
                Self::files(
                    client,
                    args.str("repo_name")?,
                    args.str("path")?,
                    args.str("branch")?,
                )
                .await
            }
            "get_repo_info" => Self::info(client, args.str("repo_name")?).await,
            "get_recent_commits" => {
                Self::commits(client, args.str("repo_name")?, args.integer("limit")?).await
            }
            other => return Err(AgentError::ToolNotFound(other.to_string())),
        };
        Ok(output)
    }
}
