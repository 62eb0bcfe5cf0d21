//! End-to-end routing through the concierge with a scripted model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use concierge_agents::hooks::LifecycleEvent;
use concierge_agents::items::{ModelResponse, Role, ToolCall};
use concierge_agents::{
    AgentHooks, AgentsError, Dispatch, Dispatcher, FinalResult, RecordingHooks, Roster,
    RunContext, ScriptedProvider,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const ETF_QUERY: &str = "What ETFs do you recommend?";

type HookMap = Arc<Mutex<HashMap<String, Arc<RecordingHooks>>>>;

fn recorded_roster() -> (Roster, HookMap) {
    let hooks: HookMap = Arc::default();
    let registry = hooks.clone();
    let roster = Roster::with_hooks(move |name| {
        let recorder = Arc::new(RecordingHooks::new());
        registry
            .lock()
            .unwrap()
            .insert(name.to_string(), recorder.clone());
        recorder as Arc<dyn AgentHooks>
    })
    .unwrap();
    (roster, hooks)
}

fn kinds(hooks: &HookMap, agent: &str) -> Vec<&'static str> {
    hooks.lock().unwrap()[agent].kinds()
}

fn etf_script() -> ScriptedProvider {
    ScriptedProvider::new("scripted")
        .with_tool_call("product_tool", json!({"input": ETF_QUERY}))
        .with_tool_call("print_query", json!({"query": ETF_QUERY}))
        .with_message(json!({"query": ETF_QUERY}).to_string())
        .with_message(json!({"query": ETF_QUERY}).to_string())
}

fn assert_balanced(events: &[&str]) {
    let count = |k: &str| events.iter().filter(|e| **e == k).count();
    assert_eq!(count("agent_start"), count("agent_end"), "{:?}", events);
    assert_eq!(count("tool_start"), count("tool_end"), "{:?}", events);
}

#[tokio::test]
async fn etf_question_is_routed_to_product_agent() {
    let (roster, hooks) = recorded_roster();
    let provider = Arc::new(etf_script());
    let ctx = RunContext::new(provider.clone());
    let dispatcher = Dispatcher::new(&roster.concierge, roster.specialists, ctx.clone()).unwrap();

    let result = dispatcher.select_and_run(ETF_QUERY).await.unwrap();

    assert_eq!(
        result,
        FinalResult {
            query: ETF_QUERY.to_string()
        }
    );
    assert_eq!(provider.remaining(), 0);
    assert_eq!(ctx.usage().requests, 4);

    assert_eq!(
        kinds(&hooks, "Concierge Agent"),
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
    assert_eq!(
        kinds(&hooks, "Product Agent"),
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
    for idle in ["Trade Agent", "Compliance Agent", "Escalation Agent", "Knowledge Agent"] {
        assert!(kinds(&hooks, idle).is_empty(), "{} should not run", idle);
    }
}

#[tokio::test]
async fn tool_events_carry_specialist_output_and_growing_usage() {
    let (roster, hooks) = recorded_roster();
    let dispatcher = Dispatcher::new(
        &roster.concierge,
        roster.specialists,
        RunContext::new(Arc::new(etf_script())),
    )
    .unwrap();
    dispatcher.select_and_run(ETF_QUERY).await.unwrap();

    let concierge_events = hooks.lock().unwrap()["Concierge Agent"].events();
    let tool_end = concierge_events
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::ToolEnd { tool, result, .. } => Some((tool.clone(), result.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(tool_end.0, "product_tool");
    assert_eq!(tool_end.1, json!({"query": ETF_QUERY}).to_string());

    let requests: Vec<usize> = concierge_events.iter().map(|e| e.usage().requests).collect();
    assert!(requests.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(requests.last(), Some(&4));
}

#[tokio::test]
async fn specialists_do_not_see_routing_tools() {
    let (roster, _) = recorded_roster();
    let provider = Arc::new(etf_script());
    let dispatcher = Dispatcher::new(
        &roster.concierge,
        roster.specialists,
        RunContext::new(provider.clone()),
    )
    .unwrap();
    dispatcher.select_and_run(ETF_QUERY).await.unwrap();

    let requests = provider.requests();
    let router_tools: Vec<String> = requests[0].tools.iter().map(|t| t.name.clone()).collect();
    assert_eq!(router_tools.len(), 6);
    assert!(router_tools.contains(&"product_tool".to_string()));
    assert!(!router_tools.contains(&"print_query".to_string()));
    assert_eq!(requests[0].parallel_tool_calls, Some(false));

    assert_eq!(requests[1].agent, "Product Agent");
    let product_tools: Vec<String> = requests[1].tools.iter().map(|t| t.name.clone()).collect();
    assert_eq!(product_tools, vec!["print_query".to_string()]);
    assert_eq!(requests[1].messages.last().unwrap().content, ETF_QUERY);
}

#[tokio::test]
async fn engine_failure_passes_through_with_balanced_events() {
    let (roster, hooks) = recorded_roster();
    // Script ends while the product agent is still working.
    let provider = ScriptedProvider::new("scripted")
        .with_tool_call("product_tool", json!({"input": ETF_QUERY}));
    let dispatcher = Dispatcher::new(
        &roster.concierge,
        roster.specialists,
        RunContext::new(Arc::new(provider)),
    )
    .unwrap();

    let err = dispatcher.select_and_run(ETF_QUERY).await.unwrap_err();
    assert!(matches!(err, AgentsError::ModelBehavior { .. }));
    assert!(!err.is_validation());

    assert_balanced(&kinds(&hooks, "Concierge Agent"));
    assert_balanced(&kinds(&hooks, "Product Agent"));
}

#[tokio::test]
async fn original_concierge_keeps_its_own_tools() {
    let (roster, _) = recorded_roster();
    let concierge = roster.concierge.clone();
    let dispatcher = Dispatcher::new(
        &roster.concierge,
        roster.specialists,
        RunContext::new(Arc::new(ScriptedProvider::new("scripted"))),
    )
    .unwrap();

    let router = dispatcher.router();
    assert_eq!(router.name(), concierge.name());
    assert_eq!(router.instructions(), concierge.instructions());
    assert_eq!(router.output_schema(), concierge.output_schema());
    assert_eq!(concierge.tools().len(), 1);
    assert_eq!(router.tools().len(), 6);
    assert!(router.find_tool("print_query").is_none());
    assert!(concierge.find_tool("print_query").is_some());
}

#[tokio::test]
async fn two_specialist_calls_in_one_turn_run_only_the_first() {
    let (roster, hooks) = recorded_roster();
    let provider = Arc::new(
        ScriptedProvider::new("scripted")
            .with_response(ModelResponse::new_tool_calls(vec![
                ToolCall::new("product_tool", json!({"input": ETF_QUERY})),
                ToolCall::new("trade_tool", json!({"input": ETF_QUERY})),
            ]))
            .with_tool_call("print_query", json!({"query": ETF_QUERY}))
            .with_message(json!({"query": ETF_QUERY}).to_string())
            .with_message(json!({"query": ETF_QUERY}).to_string()),
    );
    let ctx = RunContext::new(provider.clone());
    let dispatcher = Dispatcher::new(&roster.concierge, roster.specialists, ctx.clone()).unwrap();

    let result = dispatcher.select_and_run(ETF_QUERY).await.unwrap();

    assert_eq!(result.query, ETF_QUERY);
    assert_eq!(provider.remaining(), 0);
    assert_eq!(ctx.usage().requests, 4);
    assert!(!kinds(&hooks, "Product Agent").is_empty());
    assert!(kinds(&hooks, "Trade Agent").is_empty());
    assert_balanced(&kinds(&hooks, "Concierge Agent"));

    let requests = provider.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.agent, "Concierge Agent");
    let replies: Vec<&str> = last
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(replies.len(), 2);
    assert!(replies[1].starts_with("Error: trade_tool was not run"));
}
