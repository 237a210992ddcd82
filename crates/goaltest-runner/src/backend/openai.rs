use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::DecisionBackend;
use crate::config::ModelConfig;
use crate::session::{ContentPart, Role, Turn};
use crate::{Error, Result};

/// Live backend for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens,
            api_key: api_key.into(),
        }
    }

    /// Build from config, reading the key from the configured env var.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "API key not found in environment variable {}",
                    config.api_key_env
                ))
            })?;
        Ok(Self::new(
            config.base_url.trim_end_matches('/'),
            &config.model,
            config.max_tokens,
            api_key,
        ))
    }

    fn request_body(&self, history: &[Turn]) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages(history),
        })
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Map turns to chat messages. Images become JPEG data URLs.
fn messages(history: &[Turn]) -> Vec<Value> {
    history
        .iter()
        .map(|turn| {
            let content: Vec<Value> = turn
                .content
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { data } => json!({
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{}", data) }
                    }),
                })
                .collect();
            json!({ "role": role_name(turn.role), "content": content })
        })
        .collect()
}

/// Pull the reply text out of a completion.
fn reply_text(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Protocol("no choices in model response".into()))?;
    match choice.finish_reason.as_deref() {
        Some("stop") => {}
        other => {
            return Err(Error::Protocol(format!(
                "model did not finish, finish reason: {}",
                other.unwrap_or("none")
            )))
        }
    }
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::Protocol("model returned no content".into())),
    }
}

#[async_trait]
impl DecisionBackend for OpenAiBackend {
    async fn process_turn(&mut self, history: &[Turn]) -> Result<Turn> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("requesting decision from {} ({} turns)", self.model, history.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(history))
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        Ok(Turn::assistant(reply_text(body)?))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_messages_mapping() {
        let history = vec![
            Turn::system("prompt"),
            Turn::user_with_image("This is step 0.", "AAAA"),
        ];
        let msgs = messages(&history);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[0]["content"][0]["text"], "prompt");
        assert_eq!(msgs[1]["content"][1]["type"], "image_url");
        assert_eq!(
            msgs[1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_request_body() {
        let backend = OpenAiBackend::new("http://localhost/v1", "gpt-4o", 350, "k");
        let body = backend.request_body(&[Turn::system("p")]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 350);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_reply_text() {
        let ok = response(
            r#"{"choices":[{"message":{"role":"assistant","content":"```json\n{}\n```"},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(reply_text(ok).unwrap(), "```json\n{}\n```");
    }

    #[test]
    fn test_reply_errors() {
        for json in [
            r#"{"choices":[]}"#,
            r#"{}"#,
            r#"{"choices":[{"message":{"content":"partial"},"finish_reason":"length"}]}"#,
            r#"{"choices":[{"message":{"content":""},"finish_reason":"stop"}]}"#,
            r#"{"choices":[{"message":{"content":null},"finish_reason":"stop"}]}"#,
        ] {
            assert!(
                matches!(reply_text(response(json)), Err(Error::Protocol(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = ModelConfig {
            api_key_env: "GOALTEST_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        assert!(matches!(
            OpenAiBackend::from_config(&config),
            Err(Error::Config(_))
        ));
    }
}
