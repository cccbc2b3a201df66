//! OpenAI Responses API client.

use async_trait::async_trait;
use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LanguageService, ServiceConfig, SpanDetection};
use crate::error::{Error, Result};

/// Maximum characters of input sent per request.
pub const MAX_INPUT_CHARS: usize = 12_000;

const TRUNCATION_MARKER: &str = "\n\n[...truncated for request size...]";

const SPAN_PROMPT: &str = "For the following English paragraph, bracket only O (object) and C (complement) spans.
Use bracket format like: (O ... ) and (C ... ). You may include multiple O/C spans.
Return ONLY valid JSON with the shape:
{\"tokens\":[\"...\"],\"bracket\":\"(O ... ) (C ... )\"}
Tokens must be whitespace-split tokens in order. Bracket must use the same tokens.
Do not include any extra text.
";

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    input: Input,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    effort: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Input {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
struct InputContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    text: String,
}

/// HTTP client for the Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: ServiceConfig,
}

impl OpenAiClient {
    /// Create a client for the given configuration.
    ///
    /// Redirects are not followed, so a misconfigured endpoint fails
    /// instead of forwarding the credential.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn request(&self, body: &ResponsesRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.trim())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let data: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            log::warn!("language service returned {}", status);
            return Err(Error::Service(error_message(&data)));
        }

        let reply: ResponsesReply = serde_json::from_value(data)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        let text = extract_output_text(&reply);
        if text.is_empty() {
            return Err(Error::EmptyOutput);
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageService for OpenAiClient {
    async fn translate(&self, text: &str) -> Result<String> {
        let body = ResponsesRequest {
            model: &self.config.model,
            reasoning: Some(Reasoning { effort: "low" }),
            instructions: Some(&self.config.translate_instructions),
            input: Input::Text(clamp_text(text, MAX_INPUT_CHARS)),
        };
        self.request(&body).await
    }

    async fn detect_spans(&self, text: &str) -> Result<SpanDetection> {
        let body = ResponsesRequest {
            model: &self.config.model,
            reasoning: None,
            instructions: None,
            input: Input::Messages(vec![InputMessage {
                role: "user",
                content: vec![InputContent {
                    r#type: "input_text",
                    text: format!("{}\n{}", SPAN_PROMPT, text),
                }],
            }]),
        };
        let output = self.request(&body).await?;
        SpanDetection::parse(&output)
    }
}

/// Cut `text` to `limit` characters, appending a truncation marker.
pub fn clamp_text(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

fn extract_output_text(reply: &ResponsesReply) -> String {
    reply
        .output
        .iter()
        .filter(|item| item.r#type == "message")
        .flat_map(|item| item.content.iter())
        .filter(|content| content.r#type == "output_text")
        .map(|content| content.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn error_message(data: &Value) -> String {
    data.pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("OpenAI request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_text() {
        assert_eq!(clamp_text("short", 10), "short");
        assert_eq!(clamp_text("exactly10!", 10), "exactly10!");
        let clamped = clamp_text("あいうえおかきくけこさ", 10);
        assert!(clamped.starts_with("あいうえおかきくけこ"));
        assert!(clamped.ends_with("[...truncated for request size...]"));
        assert!(!clamped.contains('さ'));
    }

    #[test]
    fn test_extract_output_text() {
        let reply: ResponsesReply = serde_json::from_value(json!({
            "output": [
                { "type": "reasoning", "content": [] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "first" },
                    { "type": "refusal", "text": "ignored" },
                    { "type": "output_text", "text": "second " }
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(extract_output_text(&reply), "first\nsecond");
        assert_eq!(extract_output_text(&ResponsesReply::default()), "");
    }

    #[test]
    fn test_error_message() {
        let data = json!({ "error": { "message": "Incorrect API key provided" } });
        assert_eq!(error_message(&data), "Incorrect API key provided");
        assert_eq!(error_message(&Value::Null), "OpenAI request failed");
    }

    #[test]
    fn test_translate_request_shape() {
        let config = ServiceConfig::new("sk-test");
        let body = ResponsesRequest {
            model: &config.model,
            reasoning: Some(Reasoning { effort: "low" }),
            instructions: Some(&config.translate_instructions),
            input: Input::Text("Hello".to_string()),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], config.model.as_str());
        assert_eq!(value["reasoning"]["effort"], "low");
        assert_eq!(value["input"], "Hello");
    }

    #[test]
    fn test_span_request_shape() {
        let body = ResponsesRequest {
            model: "m",
            reasoning: None,
            instructions: None,
            input: Input::Messages(vec![InputMessage {
                role: "user",
                content: vec![InputContent {
                    r#type: "input_text",
                    text: "x".to_string(),
                }],
            }]),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("reasoning").is_none());
        assert!(value.get("instructions").is_none());
        assert_eq!(value["input"][0]["content"][0]["type"], "input_text");
    }
}
