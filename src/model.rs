//! Model abstraction for LLM interactions
//!
//! [`ModelProvider`] is the seam between the run loop and whatever produces
//! assistant turns. [`OpenAIProvider`] talks to the Chat Completions API via
//! async-openai; [`ScriptedProvider`] replays canned responses so routing can
//! be exercised without a network.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::config::AppConfig;
use crate::error::{AgentsError, Result};
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::schema::OutputSchema;
use crate::tool::ToolSpec;
use crate::usage::Usage;

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Name of the agent issuing the request, for logs and scripted routing.
    pub agent: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub output_schema: Option<OutputSchema>,
    /// Per-agent model override.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// `Some(false)` asks the model for at most one tool call per turn.
    pub parallel_tool_calls: Option<bool>,
}

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate one assistant turn and report what it cost.
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)>;

    /// Default model name
    fn model_name(&self) -> &str;
}

/// OpenAI model provider using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    /// Build a client from the application configuration.
    pub fn new(config: &AppConfig) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(base) = &config.base_url {
            openai = openai.with_api_base(base.clone());
        }
        Self::with_client(Client::with_config(openai), config.model.clone())
    }

    /// Create with a custom client
    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone());
                if let Some(tool_calls) = &msg.tool_calls {
                    let calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_tool(spec: &ToolSpec) -> Result<ChatCompletionTool> {
        let function = FunctionObjectArgs::default()
            .name(spec.name.clone())
            .description(spec.description.clone())
            .parameters(spec.parameters.clone())
            .build()?;
        Ok(ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(function)
            .build()?)
    }

    fn response_format(schema: &OutputSchema) -> ResponseFormat {
        let mut body = schema.schema().clone();
        if let Some(obj) = body.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: schema.name().to_string(),
                schema: Some(body),
                strict: None,
            },
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        let messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(request.model.as_deref().unwrap_or(&self.model))
            .messages(messages);

        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(Self::convert_tool)
                .collect::<Result<Vec<_>>>()?;
            builder.tools(tools);
            if let Some(parallel) = request.parallel_tool_calls {
                builder.parallel_tool_calls(parallel);
            }
        }
        if let Some(schema) = &request.output_schema {
            builder.response_format(Self::response_format(schema));
        }
        if let Some(temp) = request.temperature {
            builder.temperature(temp);
        }
        if let Some(max) = request.max_tokens {
            builder.max_completion_tokens(max);
        }

        let response = self.client.chat().create(builder.build()?).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentsError::model_behavior("No choices in response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::String(tc.function.arguments.clone())),
            })
            .collect();

        let model_response = ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        };

        let usage = response
            .usage
            .as_ref()
            .map(|u| Usage::new(u.prompt_tokens as usize, u.completion_tokens as usize))
            .unwrap_or_else(|| Usage {
                requests: 1,
                ..Usage::empty()
            });

        Ok((model_response, usage))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Provider that replays a fixed script of responses in order.
///
/// Nested agent runs share one provider, so the script is written in the order
/// the run loop will ask: the concierge's tool call, then the specialist's
/// turns, then the concierge's final answer.
pub struct ScriptedProvider {
    model: String,
    usage_per_call: Usage,
    responses: Mutex<VecDeque<ModelResponse>>,
    seen: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            usage_per_call: Usage::new(10, 5),
            responses: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        self.with_response(ModelResponse::new_tool_calls(vec![ToolCall::new(
            tool_name, args,
        )]))
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage_per_call = usage;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        let agent = request.agent.clone();
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(response) => Ok((response, self.usage_per_call)),
            None => Err(AgentsError::model_behavior(format!(
                "scripted provider exhausted (request from {})",
                agent
            ))),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
