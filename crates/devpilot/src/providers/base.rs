use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Base trait for language model backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant message. Generation halts before any of the
    /// `stop` sequences would be emitted.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        stop: &[String],
    ) -> Result<(Message, Usage)>;
}
