use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::config::Settings;
use crate::errors::{AgentError, AgentResult};
use crate::github::GithubClient;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::{load_prompt, read_prompt_file, REACT_TEMPLATE};
use crate::providers::base::Provider;
use crate::providers::ollama::OllamaProvider;
use crate::react::{self, AgentAction, ReactOutput, OBSERVATION_STOP};
use crate::supabase::SupabaseClient;
use crate::systems::{GithubSystem, SupabaseSystem, System};

pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

/// Executor options for the reasoning loop
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Log every thought, action and observation at info level instead of debug
    pub verbose: bool,
    /// Feed unparseable model output back as an observation instead of failing
    pub handle_parsing_errors: bool,
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            handle_parsing_errors: true,
            max_iterations: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRequest {
    pub input: String,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// One completed round of the loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub output: String,
    pub intermediate_steps: Vec<AgentStep>,
}

#[derive(Serialize)]
struct PromptContext<'a> {
    tools: String,
    instructions: String,
    tool_names: String,
    input: &'a str,
    agent_scratchpad: &'a str,
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    systems: Vec<Box<dyn System>>,
    provider: Box<dyn Provider>,
    template: String,
    config: AgentConfig,
}

macro_rules! trace_step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

impl Agent {
    /// Create a new Agent with the specified provider and the built-in prompt
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            systems: Vec::new(),
            provider,
            template: REACT_TEMPLATE.to_string(),
            config: AgentConfig::default(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Add a system to the agent. Tool names must stay unique across systems.
    pub fn add_system(&mut self, system: Box<dyn System>) -> AgentResult<()> {
        {
            let mut seen: HashSet<&str> = self.tools().map(|t| t.name.as_str()).collect();
            for tool in system.tools() {
                if !seen.insert(tool.name.as_str()) {
                    return Err(AgentError::DuplicateTool(tool.name.clone()));
                }
            }
        }
        self.systems.push(system);
        Ok(())
    }

    /// All tools in registration order
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.systems.iter().flat_map(|s| s.tools().iter())
    }

    fn find_tool(&self, name: &str) -> Option<(&dyn System, &Tool)> {
        self.systems.iter().find_map(|system| {
            system
                .tools()
                .iter()
                .find(|t| t.name == name)
                .map(|tool| (system.as_ref(), tool))
        })
    }

    fn render_prompt(&self, input: &str, scratchpad: &str) -> AgentResult<String> {
        let tools = self
            .tools()
            .map(|t| format!("{} - {}", t.signature(), t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = self
            .tools()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let instructions = self
            .systems
            .iter()
            .map(|s| format!("{}: {} {}", s.name(), s.description(), s.instructions()))
            .collect::<Vec<_>>()
            .join("\n");

        let context = PromptContext {
            tools,
            instructions,
            tool_names,
            input,
            agent_scratchpad: scratchpad,
        };
        load_prompt(&self.template, &context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Turn the raw `Action Input` text into call arguments. A JSON object is used
    /// as-is; anything else is bound to the tool's first parameter.
    fn bind_input(tool: &Tool, tool_input: &str) -> Value {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(tool_input) {
            return Value::Object(map);
        }
        let mut arguments = Map::new();
        if let Some(first) = tool.first_param() {
            arguments.insert(first.to_string(), Value::String(tool_input.to_string()));
        }
        Value::Object(arguments)
    }

    /// Run a requested action and describe the outcome for the model
    async fn dispatch(&self, action: &AgentAction) -> String {
        let Some((system, tool)) = self.find_tool(&action.tool) else {
            let names = self
                .tools()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return format!("{} is not a valid tool, try one of [{}].", action.tool, names);
        };

        let call = ToolCall::new(&tool.name, Self::bind_input(tool, &action.tool_input));
        match system.call(call).await {
            Ok(output) => output,
            Err(e) => e.to_string(),
        }
    }

    /// Answer one user request, calling tools until the model gives a final answer
    pub async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse> {
        let verbose = self.config.verbose;
        let stop = vec![OBSERVATION_STOP.to_string()];
        let mut scratchpad = String::new();
        let mut steps = Vec::new();

        trace_step!(verbose, "Entering agent loop for: {}", request.input);
        for iteration in 0..self.config.max_iterations {
            let prompt = self.render_prompt(&request.input, &scratchpad)?;
            let (message, usage) = self
                .provider
                .complete("", &[Message::user().with_text(prompt)], &stop)
                .await?;
            let text = message.text();
            tracing::debug!(iteration, ?usage, "model turn complete");
            trace_step!(verbose, "{}", text);

            let (action, observation) = match react::parse(text) {
                Ok(ReactOutput::Finish(output)) => {
                    trace_step!(verbose, "Finished chain");
                    return Ok(AgentResponse {
                        output,
                        intermediate_steps: steps,
                    });
                }
                Ok(ReactOutput::Action(action)) => {
                    let observation = self.dispatch(&action).await;
                    (action, observation)
                }
                Err(e) if self.config.handle_parsing_errors => {
                    tracing::warn!("{}", e);
                    let observation = e.observation().to_string();
                    let action = AgentAction {
                        tool: "_Exception".to_string(),
                        tool_input: observation.clone(),
                        log: text.to_string(),
                    };
                    (action, observation)
                }
                Err(e) => {
                    tracing::debug!("{}", e);
                    return Err(AgentError::OutputParsing(text.to_string()).into());
                }
            };

            trace_step!(verbose, "Observation: {}", observation);
            scratchpad.push_str(&format!(
                "{}\nObservation: {}\nThought: ",
                action.log, observation
            ));
            steps.push(AgentStep {
                action,
                observation,
            });
        }

        trace_step!(verbose, "{}", ITERATION_LIMIT_OUTPUT);
        Ok(AgentResponse {
            output: ITERATION_LIMIT_OUTPUT.to_string(),
            intermediate_steps: steps,
        })
    }
}

/// Assemble the assistant from settings. Returns `None` when the model backend
/// cannot be reached; a service whose client fails only loses its tools.
pub async fn build_agent(settings: &Settings) -> Option<Agent> {
    tracing::info!("Initializing AI Agent Executor...");

    let ollama_config = settings.ollama_config();
    let host = ollama_config.host.clone();
    let provider = match OllamaProvider::new(ollama_config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Could not create the Ollama client: {}", e);
            return None;
        }
    };
    if let Err(e) = provider.ping().await {
        tracing::error!("Could not connect to Ollama at {}: {}", host, e);
        return None;
    }
    tracing::info!("Using model {} at {}", provider.model(), host);

    let github = match settings.gh_access_token.as_deref() {
        Some(token) => match GithubClient::connect(token, &settings.github_api_url).await {
            Ok(client) => {
                tracing::info!("GitHub connected as: {}", client.login());
                Some(client)
            }
            Err(e) => {
                tracing::error!("Error initializing GitHub client: {}", e);
                None
            }
        },
        None => {
            tracing::warn!("GH_ACCESS_TOKEN is not set; GitHub tools are disabled");
            None
        }
    };

    let supabase = match settings.supabase_credentials() {
        Ok((url, key)) => match SupabaseClient::new(url, key) {
            Ok(client) => {
                tracing::info!("Supabase client initialized for URL: {}", client.base_url());
                Some(client)
            }
            Err(e) => {
                tracing::error!("Error initializing Supabase client: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("{}; Supabase tools are disabled", e);
            None
        }
    };

    let template = match &settings.devpilot_prompt_template {
        Some(path) => match read_prompt_file(path.clone()) {
            Ok(template) => template,
            Err(e) => {
                tracing::warn!(
                    "Could not read prompt template {}: {}; using the built-in one",
                    path.display(),
                    e
                );
                REACT_TEMPLATE.to_string()
            }
        },
        None => REACT_TEMPLATE.to_string(),
    };

    let mut agent = Agent::new(Box::new(provider)).with_template(template);
    let systems: Vec<Box<dyn System>> = vec![
        Box::new(GithubSystem::new(github)),
        Box::new(SupabaseSystem::new(supabase)),
    ];
    for system in systems {
        if let Err(e) = agent.add_system(system) {
            tracing::error!("Could not register tools: {}", e);
            return None;
        }
    }

    Some(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::{ParamKind, ToolParam};
    use crate::providers::mock::MockProvider;
    use crate::react::{MISSING_ACTION, INVALID_RESPONSE};
    use async_trait::async_trait;

    // Mock system for testing
    struct MockSystem {
        name: String,
        tools: Vec<Tool>,
    }

    impl MockSystem {
        fn new(name: &str, tool_names: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                tools: tool_names
                    .iter()
                    .map(|tool| {
                        Tool::new(
                            *tool,
                            "Echoes back the input",
                            vec![ToolParam::required("message", ParamKind::String, "Text")],
                        )
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl System for MockSystem {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "A mock system for testing"
        }

        fn instructions(&self) -> &str {
            "Mock system instructions"
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: ToolCall) -> AgentResult<String> {
            let args = self.tool(&tool_call.name)?.resolve(&tool_call.arguments)?;
            Ok(format!("echo: {}", args.str("message")?))
        }
    }

    fn agent_with(replies: &[&str]) -> (Agent, MockProvider) {
        let provider = MockProvider::scripted(replies);
        let mut agent = Agent::new(Box::new(provider.clone()));
        agent
            .add_system(Box::new(MockSystem::new("test", &["echo"])))
            .unwrap();
        (agent, provider)
    }

    #[tokio::test]
    async fn test_simple_response() -> Result<()> {
        let (agent, provider) = agent_with(&["Thought: easy\nFinal Answer: Hello!"]);

        let response = agent.invoke(AgentRequest::new("Hi")).await?;
        assert_eq!(response.output, "Hello!");
        assert!(response.intermediate_steps.is_empty());

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("echo(message: string) - Echoes back the input"));
        assert!(prompts[0].contains("should be one of [echo]"));
        assert!(prompts[0].contains("test: A mock system for testing Mock system instructions"));
        assert!(prompts[0].ends_with("Question: Hi\nThought:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_call() -> Result<()> {
        let first = "Thought: echo it\nAction: echo\nAction Input: \"test\"";
        let (agent, provider) = agent_with(&[first, "Final Answer: Done!"]);

        let response = agent.invoke(AgentRequest::new("Echo test")).await?;
        assert_eq!(response.output, "Done!");
        assert_eq!(response.intermediate_steps.len(), 1);
        assert_eq!(response.intermediate_steps[0].observation, "echo: test");

        let prompts = provider.prompts();
        let expected = format!("Thought:{}\nObservation: echo: test\nThought: ", first);
        assert!(prompts[1].ends_with(&expected));
        Ok(())
    }

    #[tokio::test]
    async fn test_json_action_input() -> Result<()> {
        let (agent, _) = agent_with(&[
            "Action: echo\nAction Input: {\"message\": \"structured\"}",
            "Final Answer: ok",
        ]);
        let response = agent.invoke(AgentRequest::new("go")).await?;
        assert_eq!(response.intermediate_steps[0].observation, "echo: structured");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_tool() -> Result<()> {
        let (agent, _) = agent_with(&[
            "Action: invalid_tool\nAction Input: x",
            "Final Answer: Error occurred",
        ]);

        let response = agent.invoke(AgentRequest::new("Invalid tool")).await?;
        assert_eq!(
            response.intermediate_steps[0].observation,
            "invalid_tool is not a valid tool, try one of [echo]."
        );
        assert_eq!(response.output, "Error occurred");
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_error_recovery() -> Result<()> {
        let (agent, _) = agent_with(&[
            "I am not sure",
            "Action: echo\nAction Input: x\nFinal Answer: both",
            "Final Answer: recovered",
        ]);

        let response = agent.invoke(AgentRequest::new("hm")).await?;
        assert_eq!(response.output, "recovered");
        assert_eq!(response.intermediate_steps[0].observation, MISSING_ACTION);
        assert_eq!(response.intermediate_steps[1].observation, INVALID_RESPONSE);
        assert_eq!(response.intermediate_steps[0].action.tool, "_Exception");
        Ok(())
    }

    #[tokio::test]
    async fn test_parse_error_without_recovery() {
        let (agent, _) = agent_with(&["I am not sure"]);
        let agent = agent.with_config(AgentConfig {
            handle_parsing_errors: false,
            ..Default::default()
        });

        let err = agent.invoke(AgentRequest::new("hm")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentError>(),
            Some(AgentError::OutputParsing(_))
        ));
    }

    #[tokio::test]
    async fn test_iteration_limit() -> Result<()> {
        let looping: Vec<&str> = vec!["Action: echo\nAction Input: again"; 12];
        let (agent, provider) = agent_with(&looping);

        let response = agent.invoke(AgentRequest::new("loop")).await?;
        assert_eq!(response.output, ITERATION_LIMIT_OUTPUT);
        assert_eq!(response.intermediate_steps.len(), 10);
        assert_eq!(provider.prompts().len(), 10);
        Ok(())
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut agent = Agent::new(Box::new(MockProvider::default()));
        agent
            .add_system(Box::new(MockSystem::new("one", &["echo", "shout"])))
            .unwrap();
        let err = agent
            .add_system(Box::new(MockSystem::new("two", &["shout"])))
            .unwrap_err();
        assert_eq!(err, AgentError::DuplicateTool("shout".to_string()));
        assert_eq!(agent.tools().count(), 2);
    }

    #[tokio::test]
    async fn test_build_agent_without_backend() {
        let settings = Settings {
            ollama_host: "127.0.0.1:9".to_string(),
            ..Default::default()
        };
        assert!(build_agent(&settings).await.is_none());
    }
}
