// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use squadron_core::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("registry error: {0}")]
    Registry(#[from] squadron_registry::RegistryError),

    #[error("git worktree error: {0}")]
    Git(#[from] squadron_adapters::GitError),

    #[error("llm session error: {0}")]
    Llm(#[from] squadron_adapters::LlmError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] squadron_adapters::SandboxError),

    #[error("platform API error: {0}")]
    Platform(#[from] squadron_adapters::PlatformError),

    #[error("unknown agent role {0}")]
    UnknownRole(String),

    #[error("agent {0} is terminal")]
    Terminal(AgentId),

    #[error("agent {0} is not sleeping and cannot be woken")]
    NotSleeping(AgentId),

    #[error("at concurrency capacity, no slot available for agent {0}")]
    AtCapacity(String),

    #[error("no open issue or PR found for branch resolution on role {role}")]
    NoBranchTarget { role: String },
}
