// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool hook seam.
//!
//! The core supplies both hooks; a concrete [`LlmSession`](crate::llm::LlmSession)
//! implementation invokes `pre_tool` before dispatching a tool call and
//! `post_tool` once it returns. The pre-tool hook is how the watchdog's
//! tool-call counter (circuit breaker Layer 1) and the per-role tool
//! allowlist get enforced without the session implementation knowing
//! anything about agent lifecycle.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use squadron_core::AgentId;

/// What the pre-tool hook decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

/// The tool call the model is about to make (or just made).
#[derive(Debug, Clone)]
pub struct HookInput {
    pub tool_name: String,
    pub tool_input: Value,
}

/// Context the hook needs beyond the tool call itself.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub agent_id: AgentId,
    pub session_id: String,
}

/// Implemented by the lifecycle manager's watchdog; invoked by the session
/// adapter around every tool dispatch.
#[async_trait]
pub trait ToolHook: Send + Sync + 'static {
    async fn pre_tool(&self, input: &HookInput, context: &HookContext) -> Decision;
    async fn post_tool(&self, input: &HookInput, context: &HookContext, duration: Duration);
}

/// A hook that allows every call and records nothing. Useful as a default
/// when wiring a session adapter outside the full lifecycle manager (e.g.
/// adapter-level tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllHook;

#[async_trait]
impl ToolHook for AllowAllHook {
    async fn pre_tool(&self, _input: &HookInput, _context: &HookContext) -> Decision {
        Decision::Allow
    }

    async fn post_tool(&self, _input: &HookInput, _context: &HookContext, _duration: Duration) {}
}

#[cfg(test)]
#[path = "tool_hook_tests.rs"]
mod tests;
