use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AgentError, AgentResult};

/// Primitive type accepted by a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    fn schema_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

/// A single declared parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParam {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParam {
    /// A parameter the caller must always supply
    pub fn required<N, D>(name: N, kind: ParamKind, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolParam {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// A parameter that may be omitted entirely
    pub fn optional<N, D>(name: N, kind: ParamKind, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolParam {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Make the parameter optional, falling back to `default` when omitted
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }

    fn coerce(&self, value: &Value) -> AgentResult<Value> {
        match (self.kind, value) {
            (ParamKind::String, Value::String(_)) => Ok(value.clone()),
            (ParamKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ParamKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (ParamKind::Integer, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| self.type_error(value)),
            (ParamKind::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.type_error(value)),
            _ => Err(self.type_error(value)),
        }
    }

    fn type_error(&self, value: &Value) -> AgentError {
        AgentError::InvalidParameters(format!(
            "Parameter '{}' must be {}, got {}",
            self.name,
            self.kind.schema_type(),
            value
        ))
    }
}

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters that the tool accepts, in declaration order
    pub params: Vec<ToolParam>,
}

impl Tool {
    /// Create a new tool with the given name, description and parameters
    pub fn new<N, D>(name: N, description: D, params: Vec<ToolParam>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    /// One-line signature used when presenting the tool to a model,
    /// e.g. `get_recent_commits(repo_name: string, limit: integer = 5)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut rendered = format!("{}: {}", p.name, p.kind.schema_type());
                match &p.default {
                    Some(default) => rendered.push_str(&format!(" = {}", default)),
                    None if !p.required => rendered.push_str(" = null"),
                    None => {}
                }
                rendered
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }

    /// Name of the first declared parameter, if any
    pub fn first_param(&self) -> Option<&str> {
        self.params.first().map(|p| p.name.as_str())
    }

    /// Check the call arguments against the declared parameters, applying defaults
    /// and coercing primitive values to the declared type.
    pub fn resolve(&self, arguments: &Value) -> AgentResult<ToolArgs> {
        let supplied = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(AgentError::InvalidParameters(format!(
                    "Arguments for '{}' must be an object, got {}",
                    self.name, other
                )))
            }
        };

        let mut resolved = Map::new();
        for param in &self.params {
            let value = supplied
                .get(&param.name)
                .filter(|v| !v.is_null())
                .or(param.default.as_ref());
            match value {
                Some(v) if !v.is_null() => {
                    resolved.insert(param.name.clone(), param.coerce(v)?);
                }
                _ if param.required => {
                    return Err(AgentError::InvalidParameters(format!(
                        "Missing required parameter '{}' for '{}'",
                        param.name, self.name
                    )))
                }
                _ => {}
            }
        }

        Ok(ToolArgs(resolved))
    }
}

/// Arguments after validation against a tool's parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn str(&self, name: &str) -> AgentResult<&str> {
        self.opt_str(name)
            .ok_or_else(|| AgentError::InvalidParameters(format!("'{}' is required", name)))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn integer(&self, name: &str) -> AgentResult<i64> {
        self.0
            .get(name)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AgentError::InvalidParameters(format!("'{}' is required", name)))
    }
}

/// A tool call request that a system can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The parameters for the execution
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and parameters
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
