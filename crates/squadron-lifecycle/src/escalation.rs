// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow seam the Watchdog (layer 2) and Circuit Breaker (layer 1)
//! use to force an agent to `ESCALATED` without knowing anything about
//! task handles, sessions or worktrees — that cleanup is the Lifecycle
//! Manager's job. Mirrors the `SpawnAgent`/`AgentOutcomeSink`
//! split in the pipeline engine: neither enforcement layer needs `Clone`,
//! so both sides of the seam are trait objects.

use async_trait::async_trait;
use squadron_core::AgentId;

/// Which enforcement layer forced the escalation, carried through to the
/// activity log and the escalation comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementLayer {
    Watchdog,
    CircuitBreaker,
}

impl EnforcementLayer {
    pub fn label(&self) -> &'static str {
        match self {
            EnforcementLayer::Watchdog => "watchdog",
            EnforcementLayer::CircuitBreaker => "circuit_breaker",
        }
    }
}

/// Implemented by the Agent Lifecycle Manager; invoked by the Watchdog and
/// the Circuit Breaker when their respective limit is exceeded.
#[async_trait]
pub trait AgentEscalation: Send + Sync + 'static {
    async fn force_escalate(&self, agent_id: &AgentId, layer: EnforcementLayer, reason: String);
}
