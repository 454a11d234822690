use std::time::Duration;

use async_trait::async_trait;
use careline_core::config::LlmConfig;
use careline_core::state::{ChatMessage, ChatRole};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Schema-described tool made available to the model for one call.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// A structured tool-call request emitted by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One model response: text and tool calls may coexist, and either may
/// be absent.
#[derive(Clone, Debug, Default)]
pub struct LlmReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl LlmReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), tool_calls: Vec::new() }
    }

    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingCredentials,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed LLM response: {0}")]
    Decode(String),
}

/// The hosted LLM request/response service, seen as an opaque
/// text-plus-tool-calls generator. The one seam the tests script.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmReply, LlmError>;
}

/// OpenAI-compatible chat-completions client over HTTPS.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl ChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }

    fn wire_messages(system_prompt: &str, history: &[ChatMessage]) -> Vec<Value> {
        let mut wire = vec![json!({"role": "system", "content": system_prompt})];
        for message in history {
            wire.push(match message.role {
                ChatRole::System => json!({"role": "system", "content": message.content}),
                ChatRole::User => json!({"role": "user", "content": message.content}),
                ChatRole::Assistant => {
                    let mut entry = Map::new();
                    entry.insert("role".to_string(), json!("assistant"));
                    entry.insert("content".to_string(), json!(message.content));
                    if !message.tool_calls.is_empty() {
                        let calls: Vec<Value> = message
                            .tool_calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": call.arguments.to_string(),
                                    },
                                })
                            })
                            .collect();
                        entry.insert("tool_calls".to_string(), Value::Array(calls));
                    }
                    Value::Object(entry)
                }
                ChatRole::Tool => json!({
                    "role": "tool",
                    "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                }),
            });
        }
        wire
    }

    fn wire_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect()
    }

    fn parse_reply(body: &Value) -> Result<LlmReply, LlmError> {
        let message = body
            .pointer("/choices/0/message")
            .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;
        let text = message
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|t| !t.is_empty());
        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let function = call.get("function")?;
                        let name = function.get("name")?.as_str()?.to_string();
                        let raw_arguments =
                            function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                        let arguments = serde_json::from_str(raw_arguments)
                            .unwrap_or_else(|_| json!({}));
                        Some(ToolCallRequest {
                            id: call
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            name,
                            arguments,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(LlmReply { text, tool_calls })
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmReply, LlmError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(LlmError::MissingCredentials);
        };

        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(self.model));
        payload.insert("messages".to_string(), json!(Self::wire_messages(system_prompt, history)));
        payload.insert("max_tokens".to_string(), json!(self.max_output_tokens));
        payload.insert("temperature".to_string(), json!(self.temperature));
        if !tools.is_empty() {
            payload.insert("tools".to_string(), json!(Self::wire_tools(tools)));
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }
        let body: Value =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        Self::parse_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use careline_core::state::{ChatMessage, ToolInvocation};
    use serde_json::json;

    use super::{ChatClient, ToolSpec};

    #[test]
    fn wire_messages_carry_tool_calls_and_results() {
        let history = vec![
            ChatMessage::user("cancel my plan"),
            ChatMessage::assistant_with_calls(
                "",
                vec![ToolInvocation {
                    id: "call_1".to_string(),
                    name: "set_route".to_string(),
                    arguments: json!({"route": "cancel"}),
                }],
            ),
            ChatMessage::tool_result("call_1", "set_route", &json!("Route set to: cancel")),
        ];
        let wire = ChatClient::wire_messages("be helpful", &history);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "set_route");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn parse_reply_extracts_text_and_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "On it.",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "set_route", "arguments": "{\"route\":\"retention\"}"},
                    }],
                },
            }],
        });
        let reply = ChatClient::parse_reply(&body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("On it."));
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].arguments["route"], "retention");
    }

    #[test]
    fn parse_reply_tolerates_malformed_arguments() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_2",
                        "function": {"name": "set_route", "arguments": "not json"},
                    }],
                },
            }],
        });
        let reply = ChatClient::parse_reply(&body).unwrap();
        assert!(reply.text.is_none());
        assert_eq!(reply.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn tool_specs_serialize_as_function_declarations() {
        let specs = [ToolSpec {
            name: "set_route",
            description: "Set the next step.",
            parameters: json!({"type": "object", "properties": {"route": {"type": "string"}}}),
        }];
        let wire = ChatClient::wire_tools(&specs);
        assert_eq!(wire[0]["function"]["name"], "set_route");
        assert_eq!(wire[0]["type"], "function");
    }
}
