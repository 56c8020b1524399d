// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM session adapter.
//!
//! The core never speaks to a model provider directly; it only drives the
//! five abstract operations here. A concrete implementation owns whatever
//! provider SDK or subprocess protocol is actually in play.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLlmSession, FakeLlmSessionFactory, LlmCall};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use squadron_core::SessionId;
use thiserror::Error;

/// Errors from LLM session operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session spawn failed: {0}")]
    SpawnFailed(String),
    #[error("turn timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Parameters for creating or resuming an LLM session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tool_allowlist: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Result of a single prompt/turn exchange.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub output: String,
    pub tool_calls: u32,
    pub stop_reason: String,
}

/// A single bound session. Sessions are not `Clone`; the factory hands out
/// `Arc<dyn LlmSession>` so the lifecycle manager can hold one per agent.
#[async_trait]
pub trait LlmSession: Send + Sync + 'static {
    fn id(&self) -> &SessionId;

    /// Send a prompt and block until the model finishes its turn or `timeout`
    /// elapses. The pre/post-tool hook (see [`crate::tool_hook`]) fires for
    /// every tool call the model makes along the way.
    async fn send_prompt_and_await_turn(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<TurnResult, LlmError>;
}

/// Adapter that creates and tears down LLM sessions.
#[async_trait]
pub trait LlmSessionFactory: Clone + Send + Sync + 'static {
    async fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn LlmSession>, LlmError>;
    async fn resume_session(
        &self,
        id: &SessionId,
        config: SessionConfig,
    ) -> Result<Arc<dyn LlmSession>, LlmError>;
    async fn delete_session(&self, id: &SessionId) -> Result<(), LlmError>;

    /// Stop the factory itself (e.g. release a provider connection pool).
    /// Does not affect sessions already handed out.
    async fn stop(&self) -> Result<(), LlmError>;
}
