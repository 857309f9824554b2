use super::base::{Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{
    check_openai_context_length_error, get_openai_usage, messages_to_openai_spec,
    openai_response_to_message,
};
use crate::models::message::Message;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check that the backend is reachable by listing its local models
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.host.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("Ollama responded with {}", response.status()))
        }
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            StatusCode::BAD_REQUEST => {
                let body: Value = response.json().await.unwrap_or_default();
                if let Some(err) = check_openai_context_length_error(&body["error"]) {
                    return Err(err.into());
                }
                Err(anyhow!("Request failed: 400 Bad Request\nPayload: {}", payload))
            }
            status => Err(anyhow!("Request failed: {}\nPayload: {}", status, payload)),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        stop: &[String],
    ) -> Result<(Message, Usage)> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(system, messages),
        });

        if !stop.is_empty() {
            payload["stop"] = json!(stop);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        let message = openai_response_to_message(&response)?;
        // Some compatible servers omit usage entirely
        let usage = get_openai_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::OLLAMA_MODEL;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OllamaProvider {
        let config = OllamaProviderConfig {
            host: server.uri(),
            model: OLLAMA_MODEL.to_string(),
            temperature: Some(0.0),
            max_tokens: None,
        };
        OllamaProvider::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stop": ["\nObservation:"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "Thought: I know this\nFinal Answer: Hello!"
                    },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 12,
                    "completion_tokens": 15,
                    "total_tokens": 27
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let messages = vec![Message::user().with_text("Hello?")];
        let (message, usage) = provider
            .complete("", &messages, &["\nObservation:".to_string()])
            .await?;

        assert_eq!(message.text(), "Thought: I know this\nFinal Answer: Hello!");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.total_tokens, Some(27));
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server);
        let messages = vec![Message::user().with_text("Hello?")];
        let result = provider.complete("", &messages, &[]).await;

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server error: 500"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ping() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&mock_server)
            .await;

        provider_for(&mock_server).ping().await
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let config = OllamaProviderConfig {
            // Reserved port that nothing listens on
            host: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let provider = OllamaProvider::new(config).unwrap();
        assert!(provider.ping().await.is_err());
    }
}
