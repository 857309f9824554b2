//! Parsing of ReAct-formatted model output.
//!
//! A model turn either names a tool (`Action:` + `Action Input:`) or ends the
//! exchange with `Final Answer:`. Output that does both, or neither, is a
//! parse error carrying an observation to feed back to the model.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const FINAL_ANSWER: &str = "Final Answer:";
pub const OBSERVATION_STOP: &str = "\nObservation:";

pub const MISSING_ACTION: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
pub const MISSING_ACTION_INPUT: &str = "Invalid Format: Missing 'Action Input:' after 'Action:'";
pub const FINAL_ANSWER_AND_ACTION: &str =
    "Parsing LLM output produced both a final answer and a parse-able action:";
/// Observation used when a parse error has no more specific hint for the model
pub const INVALID_RESPONSE: &str = "Invalid or incomplete response";

lazy_static! {
    static ref ACTION_RE: Regex =
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .unwrap();
    static ref ACTION_ONLY_RE: Regex = Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").unwrap();
    static ref ACTION_INPUT_RE: Regex =
        Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").unwrap();
}

/// A tool the model asked for, with the raw text that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    pub log: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReactOutput {
    Action(AgentAction),
    Finish(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    hint: Option<&'static str>,
}

impl ParseError {
    fn new(message: String, hint: Option<&'static str>) -> Self {
        Self { message, hint }
    }

    /// What the model is told on its next turn when recovery is enabled
    pub fn observation(&self) -> &str {
        self.hint.unwrap_or(INVALID_RESPONSE)
    }
}

pub fn parse(text: &str) -> Result<ReactOutput, ParseError> {
    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some(captures) = ACTION_RE.captures(text) {
        if includes_answer {
            return Err(ParseError::new(
                format!("{} {}", FINAL_ANSWER_AND_ACTION, text),
                None,
            ));
        }
        let tool = captures[1].trim().to_string();
        let tool_input = captures[2].trim().trim_matches('"').to_string();
        return Ok(ReactOutput::Action(AgentAction {
            tool,
            tool_input,
            log: text.to_string(),
        }));
    }

    if includes_answer {
        let answer = text.rsplit(FINAL_ANSWER).next().unwrap_or_default();
        return Ok(ReactOutput::Finish(answer.trim().to_string()));
    }

    let message = format!("Could not parse LLM output: `{}`", text);
    if !ACTION_ONLY_RE.is_match(text) {
        Err(ParseError::new(message, Some(MISSING_ACTION)))
    } else if !ACTION_INPUT_RE.is_match(text) {
        Err(ParseError::new(message, Some(MISSING_ACTION_INPUT)))
    } else {
        Err(ParseError::new(message, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        let text = "Thought: I should list the repos\nAction: list_github_repositories\nAction Input: \"public\"";
        match parse(text).unwrap() {
            ReactOutput::Action(action) => {
                assert_eq!(action.tool, "list_github_repositories");
                assert_eq!(action.tool_input, "public");
                assert_eq!(action.log, text);
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_with_json_input() {
        let text = "Action: get_repo_info\nAction Input: {\"repo_name\": \"site\"}\n";
        match parse(text).unwrap() {
            ReactOutput::Action(action) => {
                assert_eq!(action.tool_input, "{\"repo_name\": \"site\"}");
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let text = "Thought: I now know the final answer\nFinal Answer:  You have 2 public repos. ";
        assert_eq!(
            parse(text).unwrap(),
            ReactOutput::Finish("You have 2 public repos.".to_string())
        );
    }

    #[test]
    fn test_answer_and_action_is_an_error() {
        let text = "Action: get_repo_info\nAction Input: site\nFinal Answer: done";
        let err = parse(text).unwrap_err();
        assert!(err.message.starts_with(FINAL_ANSWER_AND_ACTION));
        assert_eq!(err.observation(), INVALID_RESPONSE);
    }

    #[test]
    fn test_missing_action() {
        let err = parse("I think the answer is 4").unwrap_err();
        assert_eq!(err.observation(), MISSING_ACTION);
        assert!(err.to_string().starts_with("Could not parse LLM output"));
    }

    #[test]
    fn test_missing_action_input() {
        let err = parse("Thought: look it up\nAction: get_repo_info").unwrap_err();
        assert_eq!(err.observation(), MISSING_ACTION_INPUT);
    }

    #[test]
    fn test_numbered_action() {
        let text = "Action 1: count_supabase_records\nAction 1 Input: users";
        match parse(text).unwrap() {
            ReactOutput::Action(action) => {
                assert_eq!(action.tool, "count_supabase_records");
                assert_eq!(action.tool_input, "users");
            }
            other => panic!("expected action, got {:?}", other),
        }
    }
}
