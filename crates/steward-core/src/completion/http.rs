//! OpenAI-compatible HTTP completion client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    parse_arguments, AssistantReply, CompletionClient, ParsedToolCall, ToolChoice, ToolSchema,
    WireMessage,
};
use crate::error::{Error, Result};

// ── request types ────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatToolDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Serialize)]
struct ChatToolDef {
    #[serde(rename = "type")]
    def_type: String,
    function: ChatFunctionDef,
}

#[derive(Serialize)]
struct ChatFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

// ── response types ───────────────────────────────────────

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatResponseToolCall>,
}

#[derive(Deserialize)]
struct ChatResponseToolCall {
    id: String,
    function: ChatResponseFunction,
}

#[derive(Deserialize)]
struct ChatResponseFunction {
    name: String,
    arguments: Value,
}

// ── client ───────────────────────────────────────────────

/// Client for an OpenAI-style `/chat/completions` endpoint.
///
/// Credentials come from an opaque provider upstream; this type only holds
/// the resulting base URL and bearer token.
pub struct HttpCompletion {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpCompletion {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn build_tools(tools: Vec<ToolSchema>) -> Vec<ChatToolDef> {
        tools
            .into_iter()
            .map(|t| ChatToolDef {
                def_type: "function".to_string(),
                function: ChatFunctionDef {
                    name: t.name,
                    description: t.description,
                    parameters: t.parameters,
                },
            })
            .collect()
    }
}

#[async_trait]
impl CompletionClient for HttpCompletion {
    async fn complete(
        &self,
        model: &str,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSchema>,
        tool_choice: ToolChoice,
    ) -> Result<AssistantReply> {
        let has_tools = !tools.is_empty();
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            tools: Self::build_tools(tools),
            tool_choice: if has_tools {
                Some(tool_choice.as_wire().to_string())
            } else {
                None
            },
        };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "completion service returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("unparseable response: {}", e)))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Completion("empty choices in response".to_string()))?
            .message;

        let mut tool_calls = Vec::new();
        for tc in message.tool_calls {
            tool_calls.push(ParsedToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: parse_arguments(&tc.function.arguments)?,
            });
        }

        Ok(AssistantReply {
            content: message.content,
            tool_calls,
        })
    }
}
