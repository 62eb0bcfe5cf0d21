//! Tower-based tool execution.
//!
//! Every tool call the run loop makes goes through a small service stack:
//! [`LifecycleLayer`] around a [`BaseToolService`]. The lifecycle layer emits
//! `ToolStart` before the call and `ToolEnd` after it on the calling agent's
//! observer, whatever the outcome, so tool events always come in pairs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tower::{util::BoxService, Layer, Service};
use tracing::debug;

use crate::context::RunContext;
use crate::error::AgentsError;
use crate::hooks::{notify, AgentHooks, LifecycleEvent};
use crate::tool::{Tool, ToolResult};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, AgentsError>> + Send>>;

/// Request passed into the tool service stack.
#[derive(Clone)]
pub struct ToolRequest {
    pub ctx: RunContext,
    /// Agent that issued the call.
    pub agent: String,
    /// The calling agent's observer.
    pub hooks: Option<Arc<dyn AgentHooks>>,
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Response from the tool service stack.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub call_id: String,
    pub result: ToolResult,
}

/// Boxed stack type used by the runner.
pub type ToolBoxService = BoxService<ToolRequest, ToolResponse, AgentsError>;

/// Adapts a `dyn Tool` to a tower `Service`.
#[derive(Clone)]
pub struct BaseToolService {
    tool: Arc<dyn Tool>,
}

impl BaseToolService {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

impl Service<ToolRequest> for BaseToolService {
    type Response = ToolResponse;
    type Error = AgentsError;
    type Future = BoxFuture<ToolResponse>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let tool = self.tool.clone();
        Box::pin(async move {
            let result = tool.execute(&req.ctx, req.arguments).await?;
            Ok(ToolResponse {
                call_id: req.call_id,
                result,
            })
        })
    }
}

/// Emits `ToolStart`/`ToolEnd` around the inner service.
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleLayer;

#[derive(Clone, Debug)]
pub struct LifecycleService<S> {
    inner: S,
}

impl<S> Layer<S> for LifecycleLayer {
    type Service = LifecycleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LifecycleService { inner }
    }
}

impl<S> Service<ToolRequest> for LifecycleService<S>
where
    S: Service<ToolRequest, Response = ToolResponse, Error = AgentsError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ToolResponse;
    type Error = AgentsError;
    type Future = BoxFuture<ToolResponse>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        Box::pin(async move {
            let ctx = req.ctx.clone();
            let hooks = req.hooks.clone();
            let agent = req.agent.clone();
            let tool = req.tool_name.clone();

            notify(
                hooks.as_ref(),
                LifecycleEvent::ToolStart {
                    agent: agent.clone(),
                    tool: tool.clone(),
                    usage: ctx.usage(),
                },
            )
            .await;

            let outcome = inner.call(req).await;
            let result = match &outcome {
                Ok(response) => response.result.to_content(),
                Err(e) => format!("Error: {}", e),
            };
            debug!(%agent, %tool, ok = outcome.is_ok(), "tool call finished");

            notify(
                hooks.as_ref(),
                LifecycleEvent::ToolEnd {
                    agent,
                    tool,
                    result,
                    usage: ctx.usage(),
                },
            )
            .await;
            outcome
        })
    }
}

/// The stack used for one tool call.
pub fn build_tool_stack(tool: Arc<dyn Tool>) -> ToolBoxService {
    BoxService::new(LifecycleLayer.layer(BaseToolService::new(tool)))
}
