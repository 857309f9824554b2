//! A conversation with the assistant: the transcript plus the agent answering it.

use anyhow::Result;

use crate::agent::{build_agent, Agent, AgentRequest, AgentResponse};
use crate::config::Settings;
use crate::models::message::Message;

pub const AGENT_UNAVAILABLE: &str = "Agent not initialized. Please check the terminal for errors.";

pub struct ChatSession {
    agent: Option<Agent>,
    transcript: Vec<Message>,
}

impl ChatSession {
    pub fn new(agent: Option<Agent>) -> Self {
        Self {
            agent,
            transcript: Vec::new(),
        }
    }

    /// Build the agent from settings; the session still works without one
    pub async fn start(settings: &Settings) -> Self {
        Self::new(build_agent(settings).await)
    }

    pub fn is_ready(&self) -> bool {
        self.agent.is_some()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Record the user line and ask the agent. On failure the transcript keeps
    /// only the user entry and the error is returned to the caller.
    pub async fn respond(&mut self, line: &str) -> Result<String> {
        Ok(self.exchange(line).await?.output)
    }

    /// Like [`respond`](Self::respond), keeping the tool steps behind the answer
    pub async fn exchange(&mut self, line: &str) -> Result<AgentResponse> {
        self.transcript.push(Message::user().with_text(line));

        let response = match &self.agent {
            Some(agent) => agent.invoke(AgentRequest::new(line)).await?,
            None => AgentResponse {
                output: AGENT_UNAVAILABLE.to_string(),
                intermediate_steps: Vec::new(),
            },
        };

        self.transcript
            .push(Message::assistant().with_text(&response.output));
        Ok(response)
    }

    /// Like [`respond`](Self::respond), but errors become the assistant's reply
    pub async fn submit(&mut self, line: &str) -> &Message {
        if let Err(e) = self.respond(line).await {
            tracing::error!("chat turn failed: {}", e);
            self.transcript
                .push(Message::assistant().with_text(format!("An error occurred: {}", e)));
        }
        // respond() or the error branch always leaves an assistant entry last
        &self.transcript[self.transcript.len() - 1]
    }
}
