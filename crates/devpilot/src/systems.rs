use async_trait::async_trait;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

pub mod github;
pub mod supabase;

pub use github::GithubSystem;
pub use supabase::SupabaseSystem;

/// Core trait that defines a system that can be operated by an AI agent
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get system instructions
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given parameters.
    ///
    /// Remote failures are reported inside the returned text; an `Err` means the
    /// call itself was malformed (unknown tool, missing parameter).
    async fn call(&self, tool_call: ToolCall) -> AgentResult<String>;

    /// Look up one of this system's tools by name
    fn tool(&self, name: &str) -> AgentResult<&Tool> {
        self.tools()
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }
}
