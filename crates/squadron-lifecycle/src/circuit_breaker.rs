// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layer 1 circuit breaker: a [`ToolHook`] that counts tool
//! calls per agent in memory, periodically flushing the count to the
//! Registry so it survives a crash, and denying (then escalating) once a
//! role's `max_tool_calls` limit is reached.
//!
//! Counting in memory rather than hitting the Registry on every call keeps
//! the hook off the hot path of every single tool dispatch; the tradeoff is
//! that a crash can lose up to `FLUSH_EVERY - 1` calls of count — acceptable
//! since the watchdog's duration timer is the backstop of last resort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use squadron_adapters::{Decision, HookContext, HookInput, ToolHook};
use squadron_core::{AgentId, CircuitBreakerConfig, Clock};
use squadron_registry::Registry;

use crate::escalation::{AgentEscalation, EnforcementLayer};

/// Flush the in-memory counter to the Registry every this many tool calls.
const FLUSH_EVERY: u32 = 10;

struct Counters {
    role: String,
    tool_calls: u32,
    since_flush: u32,
}

/// Shared across every active agent's session; registered as the
/// [`ToolHook`] each `LlmSessionFactory` wiring is built with.
pub struct CircuitBreaker<C> {
    config: CircuitBreakerConfig,
    registry: Arc<Registry>,
    escalation: RwLock<Arc<dyn AgentEscalation>>,
    clock: C,
    counters: Mutex<HashMap<AgentId, Counters>>,
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(config: CircuitBreakerConfig, registry: Arc<Registry>, escalation: Arc<dyn AgentEscalation>, clock: C) -> Self {
        Self { config, registry, escalation: RwLock::new(escalation), clock, counters: Mutex::new(HashMap::new()) }
    }

    /// Re-point the escalation target. Used by the Lifecycle Manager, which
    /// can only hand out an `Arc<Self>` to wire itself in as the escalation
    /// target after it has finished constructing itself.
    pub fn set_escalation(&self, escalation: Arc<dyn AgentEscalation>) {
        *self.escalation.write() = escalation;
    }

    /// Start counting for `agent_id`. Called when the agent transitions to
    /// `ACTIVE`; a fresh session always starts its own count at zero even if
    /// the agent had prior activity while sleeping.
    pub fn register(&self, agent_id: AgentId, role: &str) {
        self.counters.lock().insert(agent_id, Counters { role: role.to_string(), tool_calls: 0, since_flush: 0 });
    }

    /// Stop counting for `agent_id` and flush whatever is outstanding. Called
    /// on any transition out of `ACTIVE` (sleep, completion, escalation).
    pub fn unregister(&self, agent_id: &AgentId) {
        if let Some(counters) = self.counters.lock().remove(agent_id) {
            self.flush(agent_id, &counters);
        }
    }

    fn flush(&self, agent_id: &AgentId, counters: &Counters) {
        let Ok(Some(mut agent)) = self.registry.get_agent(agent_id) else {
            return;
        };
        agent.tool_call_count = counters.tool_calls;
        agent.last_updated = self.clock.epoch_ms();
        if let Err(e) = self.registry.update_agent(&agent) {
            tracing::warn!(%agent_id, error = %e, "failed to flush tool call count to registry");
        }
    }
}

#[async_trait]
impl<C: Clock> ToolHook for CircuitBreaker<C> {
    async fn pre_tool(&self, _input: &HookInput, context: &HookContext) -> Decision {
        let (tripped, to_flush) = {
            let mut counters = self.counters.lock();
            let Some(entry) = counters.get_mut(&context.agent_id) else {
                // Not a counted agent (e.g. ephemeral out-of-band usage): allow.
                return Decision::Allow;
            };
            entry.tool_calls += 1;
            entry.since_flush += 1;
            let limits = self.config.resolve(&entry.role);

            let tripped = entry.tool_calls > limits.max_tool_calls;
            let should_flush = tripped || entry.since_flush >= FLUSH_EVERY;
            if should_flush {
                entry.since_flush = 0;
            }

            if !tripped {
                let warn_at = (limits.max_tool_calls as f64 * limits.warning_threshold) as u32;
                if entry.tool_calls == warn_at {
                    tracing::warn!(
                        agent = %context.agent_id,
                        tool_calls = entry.tool_calls,
                        max = limits.max_tool_calls,
                        "agent approaching max_tool_calls"
                    );
                }
            }

            let to_flush = should_flush.then(|| Counters { role: entry.role.clone(), tool_calls: entry.tool_calls, since_flush: 0 });
            let tripped = tripped.then_some((entry.tool_calls, limits.max_tool_calls));
            (tripped, to_flush)
        };

        if let Some(counters) = &to_flush {
            self.flush(&context.agent_id, counters);
        }

        if let Some((count, max)) = tripped {
            let reason = format!("exceeded max_tool_calls ({count} > {max})");
            tracing::warn!(agent = %context.agent_id, "CIRCUIT BREAKER TRIPPED (layer 1): {reason}");
            let escalation = self.escalation.read().clone();
            escalation.force_escalate(&context.agent_id, EnforcementLayer::CircuitBreaker, reason.clone()).await;
            return Decision::Deny { reason };
        }
        Decision::Allow
    }

    async fn post_tool(&self, _input: &HookInput, _context: &HookContext, _duration: std::time::Duration) {}
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;
