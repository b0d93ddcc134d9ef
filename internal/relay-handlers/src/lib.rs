//! Tool Handlers (C7): per-tool business logic — assemble a provider
//! request, poll, persist the resulting artifact, emit usage (§4.4).
//!
//! A handler is one function per slug, whether the tool is single-step or
//! multi-step: a multi-step tool's handler branches on `inputParams.step`
//! (§4.4), it is not a different trait shape. The split the worker cares
//! about is slug → handler, nothing else.

mod context;
mod progress;
mod registry;

pub mod handlers;

pub use context::HandlerContext;
pub use progress::ProgressSink;
pub use registry::HandlerRegistry;

use async_trait::async_trait;
use relay_types::RelayResult;
use serde_json::Value as JsonValue;

/// `{outputData, usageData}` from §4.4. `usage_data` is forwarded into a
/// [`relay_types::UsageLog`] row by the worker, which fills in the
/// remaining ledger fields (`task_id`, `owner_id`, …) that a handler has no
/// reason to compute itself.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub output_data: JsonValue,
    pub usage_data: JsonValue,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The catalog slug this handler answers for. Must match a `tools.slug`
    /// row for the handler to ever be dispatched (§4.6).
    fn slug(&self) -> &'static str;

    async fn execute(&self, ctx: &HandlerContext) -> RelayResult<HandlerOutput>;
}
