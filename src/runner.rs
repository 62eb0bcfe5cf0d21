//! # Runner
//!
//! [`Runner::run`] drives one agent to a final answer:
//!
//! 1. `AgentStart` on the agent's observer.
//! 2. Each turn: `LlmStart`, one provider call (usage folded into the
//!    [`RunContext`]), `LlmEnd`.
//! 3. Tool calls go through the tower stack in [`crate::service`], which emits
//!    `ToolStart`/`ToolEnd`. A call to a `transfer_to_*` function switches the
//!    active agent instead.
//! 4. A turn without tool calls is final. With an output schema the text must
//!    parse and validate; otherwise it is returned as a JSON string.
//!
//! `AgentEnd` is emitted for every `AgentStart`, on success and on failure.
//!
//! An agent with an agent-tool limit has parallel tool calls disabled in its
//! requests, and any agent-backed tool call past the limit is answered with a
//! tool error without running the wrapped agent.

use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::handoff::{Handoff, HandoffData};
use crate::hooks::{notify, LifecycleEvent};
use crate::items::{Message, ModelResponse, RunItem, ToolCall};
use crate::model::ModelRequest;
use crate::service::{build_tool_stack, ToolRequest};
use crate::tool::{ToolResult, ToolSpec};
use crate::usage::Usage;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Final answer: validated JSON when the agent has an output schema,
    /// otherwise the assistant text as a JSON string.
    pub final_output: Value,
    pub items: Vec<RunItem>,
    /// Agent that produced the final answer (differs from the entry agent after a handoff).
    pub last_agent: String,
    /// Cumulative usage of the context at the end of the run.
    pub usage: Usage,
}

pub struct Runner;

struct RunState {
    current: Agent,
    messages: Vec<Message>,
    items: Vec<RunItem>,
    /// Agent-backed tool calls run by the current agent.
    agent_tool_calls: usize,
}

enum TurnOutcome {
    Final(Value),
    Continue,
}

impl Runner {
    pub async fn run(agent: &Agent, input: impl Into<String>, ctx: RunContext) -> Result<RunResult> {
        let span = info_span!("agent_run", agent = %agent.name());
        Self::run_inner(agent.clone(), input.into(), ctx)
            .instrument(span)
            .await
    }

    async fn run_inner(agent: Agent, input: String, ctx: RunContext) -> Result<RunResult> {
        info!(model = ctx.provider().model_name(), "starting agent run");
        let mut state = RunState {
            messages: vec![agent.build_system_message(), Message::user(input)],
            current: agent,
            items: Vec::new(),
            agent_tool_calls: 0,
        };

        notify(
            state.current.hooks(),
            LifecycleEvent::AgentStart {
                agent: state.current.name().to_string(),
                usage: ctx.usage(),
            },
        )
        .await;

        let outcome = Self::run_loop(&mut state, &ctx).await;

        let output = match &outcome {
            Ok(value) => Some(value.clone()),
            Err(e) => {
                warn!(agent = %state.current.name(), error = %e, "agent run failed");
                None
            }
        };
        notify(
            state.current.hooks(),
            LifecycleEvent::AgentEnd {
                agent: state.current.name().to_string(),
                output,
                usage: ctx.usage(),
            },
        )
        .await;

        let final_output = outcome?;
        Ok(RunResult {
            final_output,
            items: state.items,
            last_agent: state.current.name().to_string(),
            usage: ctx.usage(),
        })
    }

    async fn run_loop(state: &mut RunState, ctx: &RunContext) -> Result<Value> {
        let max_turns = ctx.max_turns();
        let mut turn = 0;

        loop {
            turn += 1;
            if turn > max_turns {
                return Err(AgentsError::MaxTurnsExceeded { max_turns });
            }
            debug!(turn, agent = %state.current.name(), "starting turn");

            let response = Self::call_model(state, ctx).await?;

            match Self::process_response(state, ctx, response).await? {
                TurnOutcome::Final(value) => return Ok(value),
                TurnOutcome::Continue => continue,
            }
        }
    }

    async fn call_model(state: &RunState, ctx: &RunContext) -> Result<ModelResponse> {
        let agent = &state.current;
        let hooks = agent.hooks();

        notify(
            hooks,
            LifecycleEvent::LlmStart {
                agent: agent.name().to_string(),
                usage: ctx.usage(),
            },
        )
        .await;

        let request = ModelRequest {
            agent: agent.name().to_string(),
            messages: state.messages.clone(),
            tools: advertised_tools(agent),
            output_schema: agent.output_schema().cloned(),
            model: agent.config().model.clone(),
            temperature: agent.config().temperature,
            max_tokens: agent.config().max_tokens,
            parallel_tool_calls: agent.agent_tool_limit().map(|_| false),
        };

        let (response, usage) = ctx.provider().complete(request).await?;
        ctx.record_usage(agent.name(), usage);

        notify(
            hooks,
            LifecycleEvent::LlmEnd {
                agent: agent.name().to_string(),
                response: response.text().map(str::to_string),
                usage: ctx.usage(),
            },
        )
        .await;

        Ok(response)
    }

    async fn process_response(
        state: &mut RunState,
        ctx: &RunContext,
        response: ModelResponse,
    ) -> Result<TurnOutcome> {
        if !response.has_tool_calls() {
            let text = response.text().unwrap_or_default().to_string();
            state.messages.push(Message::assistant(text.clone()));
            state
                .items
                .push(RunItem::message(state.current.name(), text.clone()));

            let value = match state.current.output_schema() {
                Some(schema) => schema.parse_output(&text)?,
                None => Value::String(text),
            };
            return Ok(TurnOutcome::Final(value));
        }

        state.messages.push(Message::assistant_with_tool_calls(
            response.content.clone().unwrap_or_default(),
            response.tool_calls.clone(),
        ));
        for call in &response.tool_calls {
            state
                .items
                .push(RunItem::tool_call(state.current.name(), call));
        }

        let handoff = response.tool_calls.iter().find_map(|call| {
            state
                .current
                .find_handoff(&call.name)
                .map(|h| (call.clone(), h.clone()))
        });
        if let Some((call, handoff)) = handoff {
            Self::perform_handoff(state, ctx, &response.tool_calls, call, handoff).await;
            return Ok(TurnOutcome::Continue);
        }

        for call in &response.tool_calls {
            let result = if Self::claim_agent_tool_slot(state, call) {
                Self::execute_tool(state, ctx, call).await?
            } else {
                warn!(
                    agent = %state.current.name(),
                    tool = %call.name,
                    "agent tool limit reached, call skipped"
                );
                ToolResult::error(format!(
                    "{} was not run: {} may delegate to at most {} agent(s) per request",
                    call.name,
                    state.current.name(),
                    state.current.agent_tool_limit().unwrap_or_default()
                ))
            };
            state
                .messages
                .push(Message::tool(result.to_content(), call.id.clone()));
            state.items.push(RunItem::tool_output(
                &call.id,
                result.output.clone(),
                result.error.clone(),
            ));
        }
        Ok(TurnOutcome::Continue)
    }

    /// Count an agent-backed call against the current agent's limit.
    /// Returns false when the limit is already used up.
    fn claim_agent_tool_slot(state: &mut RunState, call: &ToolCall) -> bool {
        let Some(limit) = state.current.agent_tool_limit() else {
            return true;
        };
        let delegates = state
            .current
            .find_tool(&call.name)
            .is_some_and(|tool| tool.delegates_to_agent());
        if !delegates {
            return true;
        }
        if state.agent_tool_calls >= limit {
            return false;
        }
        state.agent_tool_calls += 1;
        true
    }

    async fn execute_tool(state: &RunState, ctx: &RunContext, call: &ToolCall) -> Result<ToolResult> {
        let agent = &state.current;
        let Some(tool) = agent.find_tool(&call.name).cloned() else {
            warn!(agent = %agent.name(), tool = %call.name, "model called an unknown tool");
            return Ok(ToolResult::error(format!("Unknown tool: {}", call.name)));
        };

        let request = ToolRequest {
            ctx: ctx.clone(),
            agent: agent.name().to_string(),
            hooks: agent.hooks().cloned(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        };
        let response = build_tool_stack(tool).oneshot(request).await?;
        Ok(response.result)
    }

    async fn perform_handoff(
        state: &mut RunState,
        ctx: &RunContext,
        calls: &[ToolCall],
        call: ToolCall,
        handoff: Handoff,
    ) {
        let from = state.current.name().to_string();
        let target: Arc<Agent> = handoff.agent().clone();
        let data = HandoffData::from_arguments(&from, target.name(), &call.arguments);
        info!(from = %data.from_agent, to = %data.to_agent, reason = ?data.reason, "handoff");

        // Every tool call id needs a reply before the next model request.
        for other in calls {
            let reply = if other.id == call.id {
                serde_json::json!({ "assistant": target.name() }).to_string()
            } else {
                "Error: not executed, the conversation was handed off".to_string()
            };
            state.messages.push(Message::tool(reply, other.id.clone()));
        }
        state.items.push(RunItem::handoff(&from, target.name()));

        notify(
            state.current.hooks(),
            LifecycleEvent::AgentEnd {
                agent: from.clone(),
                output: None,
                usage: ctx.usage(),
            },
        )
        .await;
        notify(
            target.hooks(),
            LifecycleEvent::Handoff {
                agent: target.name().to_string(),
                from,
                usage: ctx.usage(),
            },
        )
        .await;

        state.current = target.as_ref().clone();
        state.agent_tool_calls = 0;
        if let Some(first) = state.messages.first_mut() {
            *first = state.current.build_system_message();
        }

        notify(
            state.current.hooks(),
            LifecycleEvent::AgentStart {
                agent: state.current.name().to_string(),
                usage: ctx.usage(),
            },
        )
        .await;
    }
}

/// Function tools first, then handoffs, in declaration order.
fn advertised_tools(agent: &Agent) -> Vec<ToolSpec> {
    agent
        .tools()
        .iter()
        .map(|t| t.spec())
        .chain(agent.handoffs().iter().map(Handoff::spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::RecordingHooks;
    use crate::items::Role;
    use crate::model::ScriptedProvider;
    use crate::schema::{FinalResult, OutputSchema};
    use crate::tool::FunctionTool;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx(provider: ScriptedProvider) -> (RunContext, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (RunContext::new(provider.clone()), provider)
    }

    fn echo_tool() -> Arc<dyn crate::tool::Tool> {
        Arc::new(FunctionTool::new(
            "print_query",
            "Echo the query",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
            Ok,
        ))
    }

    #[tokio::test]
    async fn test_plain_text_run() {
        let hooks = Arc::new(RecordingHooks::new());
        let agent = Agent::builder("Knowledge Agent", "Answers questions.")
            .with_hooks(hooks.clone())
            .build()
            .unwrap();
        let (ctx, _) = ctx(ScriptedProvider::new("scripted").with_message("Hello there"));

        let result = Runner::run(&agent, "hi", ctx).await.unwrap();

        assert_eq!(result.final_output, Value::String("Hello there".into()));
        assert_eq!(result.last_agent, "Knowledge Agent");
        assert_eq!(result.usage.requests, 1);
        assert_eq!(hooks.kinds(), vec!["agent_start", "llm_start", "llm_end", "agent_end"]);
    }

    #[tokio::test]
    async fn test_tool_call_then_structured_answer() {
        let hooks = Arc::new(RecordingHooks::new());
        let agent = Agent::builder("Product Agent", "Recommends products.")
            .with_tool(echo_tool())
            .with_output_schema(OutputSchema::of::<FinalResult>().unwrap())
            .with_hooks(hooks.clone())
            .build()
            .unwrap();
        let (ctx, provider) = ctx(ScriptedProvider::new("scripted")
            .with_tool_call("print_query", json!({"query": "ETFs"}))
            .with_message("```json\n{\"query\": \"ETFs\"}\n```"));

        let result = Runner::run(&agent, "ETFs", ctx.clone()).await.unwrap();

        assert_eq!(result.final_output, json!({"query": "ETFs"}));
        assert_eq!(
            hooks.kinds(),
            vec![
                "agent_start",
                "llm_start",
                "llm_end",
                "tool_start",
                "tool_end",
                "llm_start",
                "llm_end",
                "agent_end"
            ]
        );

        let second = &provider.requests()[1];
        let tool_reply = second.messages.last().unwrap();
        assert_eq!(tool_reply.role, Role::Tool);
        assert_eq!(tool_reply.content, r#"{"query":"ETFs"}"#);
        assert_eq!(second.tools[0].name, "print_query");
        assert!(second.output_schema.is_some());
        assert_eq!(ctx.usage().requests, 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let agent = Agent::builder("Trade Agent", "Trades.").build().unwrap();
        let (ctx, provider) = ctx(ScriptedProvider::new("scripted")
            .with_tool_call("nope", json!({}))
            .with_message("sorry"));

        let result = Runner::run(&agent, "buy", ctx).await.unwrap();
        assert_eq!(result.final_output, Value::String("sorry".into()));
        let reply = provider.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(reply.content, "Error: Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_max_turns_still_emits_agent_end() {
        let hooks = Arc::new(RecordingHooks::new());
        let agent = Agent::builder("Looping Agent", "Loops.")
            .with_tool(echo_tool())
            .with_hooks(hooks.clone())
            .build()
            .unwrap();
        let (ctx, _) = ctx(ScriptedProvider::new("scripted")
            .with_tool_call("print_query", json!({"query": "a"}))
            .with_tool_call("print_query", json!({"query": "b"})));

        let err = Runner::run(&agent, "loop", ctx.with_max_turns(2))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentsError::MaxTurnsExceeded { max_turns: 2 }));
        let kinds = hooks.kinds();
        assert_eq!(kinds.first(), Some(&"agent_start"));
        assert_eq!(kinds.last(), Some(&"agent_end"));
    }

    #[tokio::test]
    async fn test_invalid_structured_output_fails_run() {
        let hooks = Arc::new(RecordingHooks::new());
        let agent = Agent::builder("Compliance Agent", "Checks compliance.")
            .with_output_schema(OutputSchema::of::<FinalResult>().unwrap())
            .with_hooks(hooks.clone())
            .build()
            .unwrap();
        let (ctx, _) = ctx(ScriptedProvider::new("scripted").with_message("not json"));

        let err = Runner::run(&agent, "is this allowed?", ctx).await.unwrap_err();
        assert!(matches!(err, AgentsError::ModelBehavior { .. }));
        match hooks.events().last() {
            Some(LifecycleEvent::AgentEnd { output, .. }) => assert!(output.is_none()),
            other => panic!("expected AgentEnd, got {:?}", other),
        }
    }

    fn desk(name: &str, hooks: Arc<RecordingHooks>) -> crate::agent_tool::AgentTool {
        Agent::builder(name, "Answers.")
            .with_hooks(hooks)
            .build()
            .unwrap()
            .as_tool(format!("{}_tool", name.to_lowercase()), "desk")
    }

    #[tokio::test]
    async fn test_agent_tool_limit_runs_only_first_delegate() {
        let first = Arc::new(RecordingHooks::new());
        let second = Arc::new(RecordingHooks::new());
        let router = Agent::builder("Concierge Agent", "Routes.")
            .with_tool(echo_tool())
            .with_tool(Arc::new(desk("Product", first.clone())))
            .with_tool(Arc::new(desk("Trade", second.clone())))
            .with_agent_tool_limit(1)
            .build()
            .unwrap();
        let (ctx, provider) = ctx(ScriptedProvider::new("scripted")
            .with_response(ModelResponse::new_tool_calls(vec![
                ToolCall::new("product_tool", json!({"input": "ETFs"})),
                ToolCall::new("trade_tool", json!({"input": "ETFs"})),
                ToolCall::new("print_query", json!({"query": "ETFs"})),
            ]))
            .with_message("product answer")
            .with_message("done"));

        let result = Runner::run(&router, "ETFs", ctx.clone()).await.unwrap();

        assert_eq!(result.final_output, Value::String("done".into()));
        assert_eq!(first.kinds(), vec!["agent_start", "llm_start", "llm_end", "agent_end"]);
        assert!(second.events().is_empty());
        assert_eq!(ctx.usage().requests, 3);

        let requests = provider.requests();
        assert_eq!(requests[0].parallel_tool_calls, Some(false));
        let replies: Vec<&str> = requests[2]
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], "product answer");
        assert!(replies[1].starts_with("Error: trade_tool was not run"));
        assert_eq!(replies[2], r#"{"query":"ETFs"}"#);
    }

    #[tokio::test]
    async fn test_agent_tool_limit_spans_turns() {
        let first = Arc::new(RecordingHooks::new());
        let second = Arc::new(RecordingHooks::new());
        let router = Agent::builder("Concierge Agent", "Routes.")
            .with_tool(Arc::new(desk("Product", first.clone())))
            .with_tool(Arc::new(desk("Trade", second.clone())))
            .with_agent_tool_limit(1)
            .build()
            .unwrap();
        let (ctx, _) = ctx(ScriptedProvider::new("scripted")
            .with_tool_call("product_tool", json!({"input": "ETFs"}))
            .with_message("product answer")
            .with_tool_call("trade_tool", json!({"input": "ETFs"}))
            .with_message("done"));

        Runner::run(&router, "ETFs", ctx).await.unwrap();
        assert!(!first.events().is_empty());
        assert!(second.events().is_empty());
    }

    #[tokio::test]
    async fn test_unlimited_agent_allows_parallel_calls() {
        let agent = Agent::builder("Product Agent", "Recommends.")
            .with_tool(echo_tool())
            .build()
            .unwrap();
        let (ctx, provider) = ctx(ScriptedProvider::new("scripted").with_message("hi"));
        Runner::run(&agent, "hi", ctx).await.unwrap();
        assert_eq!(provider.requests()[0].parallel_tool_calls, None);
    }

    #[tokio::test]
    async fn test_handoff_switches_agent() {
        let source_hooks = Arc::new(RecordingHooks::new());
        let target_hooks = Arc::new(RecordingHooks::new());
        let trade = Arc::new(
            Agent::builder("Trade Agent", "Trades.")
                .with_hooks(target_hooks.clone())
                .build()
                .unwrap(),
        );
        let concierge = Agent::builder("Concierge Agent", "Routes.")
            .with_handoff(Handoff::new(trade))
            .with_hooks(source_hooks.clone())
            .build()
            .unwrap();
        let (ctx, provider) = ctx(ScriptedProvider::new("scripted")
            .with_tool_call("transfer_to_trade_agent", json!({"reason": "balance"}))
            .with_message("Your balance is fine."));

        let result = Runner::run(&concierge, "What is my balance?", ctx).await.unwrap();

        assert_eq!(result.last_agent, "Trade Agent");
        assert_eq!(
            source_hooks.kinds(),
            vec!["agent_start", "llm_start", "llm_end", "agent_end"]
        );
        assert_eq!(
            target_hooks.kinds(),
            vec!["handoff", "agent_start", "llm_start", "llm_end", "agent_end"]
        );

        let requests = provider.requests();
        assert_eq!(requests[0].tools[0].name, "transfer_to_trade_agent");
        assert_eq!(requests[1].agent, "Trade Agent");
        assert!(requests[1].messages[0].content.starts_with("Trades."));
        assert!(result
            .items
            .iter()
            .any(|item| matches!(item, RunItem::Handoff(h) if h.to_agent == "Trade Agent")));
    }
}
