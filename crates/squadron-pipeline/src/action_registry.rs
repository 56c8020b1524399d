// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action Registry: pluggable named operations an `action` stage performs
//! against the forge. Generic over the concrete [`PlatformApi`]
//! adapter for the same reason as [`crate::gate_registry::GateCheckRegistry`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use squadron_adapters::PlatformApi;
use squadron_registry::Registry;

use crate::error::PipelineError;

pub struct ActionContext<'a, P: PlatformApi> {
    pub platform: &'a P,
    pub registry: &'a Registry,
    pub pr_id: Option<u64>,
    pub issue_id: Option<u64>,
}

#[async_trait]
pub trait ActionHandler<P: PlatformApi>: Send + Sync {
    async fn execute(&self, config: &Value, ctx: &ActionContext<'_, P>) -> Result<Value, PipelineError>;
}

/// Merges the run's PR with the configured merge method, defaulting to
/// `merge` (the `merge_pr` action; `AutoMergeConfig` drives the config
/// that reaches here).
struct MergePrAction;

#[async_trait]
impl<P: PlatformApi> ActionHandler<P> for MergePrAction {
    async fn execute(&self, config: &Value, ctx: &ActionContext<'_, P>) -> Result<Value, PipelineError> {
        let pr_id = ctx
            .pr_id
            .ok_or_else(|| PipelineError::InvalidActionConfig("`merge_pr` action requires a PR-scoped run".to_string()))?;
        let method = config.get("method").and_then(Value::as_str).unwrap_or("merge");

        ctx.platform.merge_pr(pr_id, method).await.map_err(|e| PipelineError::ActionFailed(e.to_string()))?;
        Ok(serde_json::json!({"pr_id": pr_id, "method": method}))
    }
}

/// Posts a comment on the run's issue (falling back to its PR) — the
/// `comment_on_issue` action.
struct CommentOnIssueAction;

#[async_trait]
impl<P: PlatformApi> ActionHandler<P> for CommentOnIssueAction {
    async fn execute(&self, config: &Value, ctx: &ActionContext<'_, P>) -> Result<Value, PipelineError> {
        let target = ctx.issue_id.or(ctx.pr_id).ok_or_else(|| {
            PipelineError::InvalidActionConfig("`comment_on_issue` action requires an issue or PR target".to_string())
        })?;
        let body = config
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidActionConfig("`comment_on_issue` action missing `body`".to_string()))?;

        let comment =
            ctx.platform.create_comment(target, body).await.map_err(|e| PipelineError::ActionFailed(e.to_string()))?;
        Ok(serde_json::json!({"target": target, "comment_id": comment.id}))
    }
}

/// The named actions available to `action` stages, keyed by `action`.
pub struct ActionRegistry<P: PlatformApi> {
    handlers: HashMap<String, Box<dyn ActionHandler<P>>>,
}

impl<P: PlatformApi> ActionRegistry<P> {
    pub fn with_builtins() -> Self {
        let mut handlers: HashMap<String, Box<dyn ActionHandler<P>>> = HashMap::new();
        handlers.insert("merge_pr".to_string(), Box::new(MergePrAction));
        handlers.insert("comment_on_issue".to_string(), Box::new(CommentOnIssueAction));
        Self { handlers }
    }

    pub fn register(&mut self, action: impl Into<String>, handler: Box<dyn ActionHandler<P>>) {
        self.handlers.insert(action.into(), handler);
    }

    pub async fn execute(&self, action: &str, config: &Value, ctx: &ActionContext<'_, P>) -> Result<Value, PipelineError> {
        let handler = self.handlers.get(action).ok_or_else(|| PipelineError::UnknownAction(action.to_string()))?;
        handler.execute(config, ctx).await
    }
}

#[cfg(test)]
#[path = "action_registry_tests.rs"]
mod tests;
