// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layer 2 duration watchdog and the heartbeat/stall detector. The
//! watchdog is a cooperative `tokio` task — cancelling it is how
//! a normal agent completion stops the timer. The heartbeat is a real OS
//! thread: its entire purpose is to notice when the cooperative runtime
//! itself is wedged, so it cannot be built from the thing it's watching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use squadron_core::{AgentId, Clock};
use squadron_registry::Registry;

use crate::escalation::{AgentEscalation, EnforcementLayer};

/// Cleanup operations the watchdog waits on get a generous but bounded
/// window of 30 s.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Heartbeat fires a `NO-ACTIVITY ALERT` once an agent has shown zero
/// tool-call/turn progress for this long.
const STALL_THRESHOLD: Duration = Duration::from_secs(120);

/// Per-agent duration timers, started on `ACTIVE` entry and cancelled on
/// any terminal/sleeping transition.
pub struct Watchdogs {
    tasks: Mutex<HashMap<AgentId, tokio::task::JoinHandle<()>>>,
}

impl Default for Watchdogs {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdogs {
    pub fn new() -> Self {
        Self { tasks: Mutex::new(HashMap::new()) }
    }

    /// Start (or restart) a duration timer for `agent_id`. `max_duration`
    /// of `Duration::ZERO` disables the watchdog entirely, matching the
    /// config contract's `max_active_duration <= 0` escape hatch.
    pub fn start(
        &self,
        agent_id: AgentId,
        max_duration: Duration,
        agent_task: Option<tokio::task::AbortHandle>,
        escalation: Arc<dyn AgentEscalation>,
    ) {
        self.cancel(&agent_id);
        if max_duration.is_zero() {
            return;
        }

        let watched = agent_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            tracing::warn!(
                agent = %watched,
                max_seconds = max_duration.as_secs(),
                "WATCHDOG FIRED (layer 1) — agent exceeded max_active_duration, cancelling"
            );
            if let Some(abort) = &agent_task {
                abort.abort();
            }
            escalation
                .force_escalate(
                    &watched,
                    EnforcementLayer::Watchdog,
                    format!("exceeded max_active_duration ({}s)", max_duration.as_secs()),
                )
                .await;
        });
        self.tasks.lock().insert(agent_id, handle);
    }

    /// Cancel the watchdog for `agent_id`, if one is running. A cancelled
    /// watchdog never fires — this is how a normal completion, sleep, or
    /// manual escalation stops the timer.
    pub fn cancel(&self, agent_id: &AgentId) {
        if let Some(handle) = self.tasks.lock().remove(agent_id) {
            handle.abort();
        }
    }
}

/// A stall-detecting OS thread for one active agent. Polls the Registry
/// directly (a blocking call from a dedicated thread, not the agent's
/// async runtime) so it keeps working even if that runtime is blocked.
pub struct Heartbeat {
    stop: Arc<AtomicBool>,
}

impl Heartbeat {
    /// `interval` should be the smaller of `max_active_duration / 10` and a
    /// sensible cap, floored at 30 s. For very short
    /// `max_active_duration` values this floor can exceed the nominal
    /// `/10` ceiling; see DESIGN.md for the accepted tradeoff.
    pub fn spawn<C: Clock>(agent_id: AgentId, registry: Arc<Registry>, interval: Duration, clock: C) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();

        let spawned = std::thread::Builder::new().name(format!("heartbeat-{agent_id}")).spawn(move || {
            let mut last_tool_calls = 0u32;
            let mut last_turns = 0u32;
            let mut stalled_since = None;

            loop {
                std::thread::sleep(interval);
                if stop_for_thread.load(Ordering::SeqCst) {
                    return;
                }

                let agent = match registry.get_agent(&agent_id) {
                    Ok(Some(agent)) => agent,
                    Ok(None) => return,
                    Err(e) => {
                        tracing::warn!(%agent_id, error = %e, "heartbeat failed to read agent, stopping");
                        return;
                    }
                };
                if agent.status.is_terminal() {
                    return;
                }

                if agent.tool_call_count == last_tool_calls && agent.turn_count == last_turns {
                    let started = *stalled_since.get_or_insert_with(|| clock.now());
                    if clock.now().saturating_duration_since(started) >= STALL_THRESHOLD {
                        tracing::warn!(%agent_id, "NO-ACTIVITY ALERT: agent has made no tool calls or turns in 120s");
                    }
                } else {
                    stalled_since = None;
                }
                last_tool_calls = agent.tool_call_count;
                last_turns = agent.turn_count;
            }
        });

        if let Err(e) = spawned {
            tracing::error!(%agent_id, error = %e, "failed to spawn heartbeat thread");
        }

        Self { stop }
    }

    /// Signal the heartbeat thread to exit at its next wakeup. Does not
    /// join — the thread's loop bound is `interval`, not instantaneous.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
