// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two narrow seams between the Pipeline Engine and the Agent Lifecycle
//! Manager: the engine calls back into the manager through a narrow
//! `SpawnAgent` interface, and the manager reports agent terminal outcomes
//! back into the engine through `AgentOutcomeSink`.
//!
//! Neither trait carries a `Clone` bound, so both are usable as trait
//! objects — the engine holds `Arc<dyn SpawnAgent>`, the lifecycle manager
//! holds `Arc<dyn AgentOutcomeSink>`, and neither crate needs to know the
//! other's concrete adapter type parameters.

use async_trait::async_trait;
use serde_json::Value;
use squadron_core::{AgentId, PipelineRunId};
use thiserror::Error;

/// A request to spawn a workflow agent for one agent-typed stage.
#[derive(Debug, Clone)]
pub struct SpawnAgentRequest {
    pub role: String,
    pub issue_id: Option<u64>,
    pub pr_id: Option<u64>,
    pub run_id: PipelineRunId,
    pub stage_id: String,
    pub action: Option<String>,
    pub continue_session: bool,
}

#[derive(Debug, Error)]
pub enum SpawnAgentError {
    #[error("{0}")]
    Rejected(String),
}

/// Implemented by the Agent Lifecycle Manager; invoked by the Pipeline
/// Engine's agent-stage dispatch.
#[async_trait]
pub trait SpawnAgent: Send + Sync + 'static {
    async fn spawn_workflow_agent(&self, req: SpawnAgentRequest) -> Result<AgentId, SpawnAgentError>;
}

/// Implemented by the Pipeline Engine; invoked by the Agent Lifecycle
/// Manager's post-turn state machine once a workflow agent reaches a
/// terminal status, from the post-turn state machine.
#[async_trait]
pub trait AgentOutcomeSink: Send + Sync + 'static {
    async fn on_agent_complete(&self, run_id: &PipelineRunId, stage_id: &str, agent_id: &AgentId, outputs: Value);
    async fn on_agent_error(&self, run_id: &PipelineRunId, stage_id: &str, agent_id: &AgentId, message: String);
}
