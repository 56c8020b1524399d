// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent Inbox (pull, drained by `check_for_events`) and Mail queue
//! (push, drained implicitly before the agent's next prompt).
//!
//! Both are owned by the Lifecycle Manager; the Event Router and the
//! command-routing path only ever push into them. Single reader (the
//! agent's own task, or the manager building the next prompt) per agent,
//! multiple writers — a `parking_lot::Mutex`-guarded map tolerates that
//! without the caller needing to reason about it.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use squadron_core::{AgentId, Event, Mail};

/// Pull-style delivery: events pertaining to an agent's issue/PR, drained
/// by the agent calling `check_for_events`.
#[derive(Default)]
pub struct Inboxes {
    queues: Mutex<HashMap<AgentId, VecDeque<Event>>>,
}

impl Inboxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty inbox for `agent_id` if one doesn't already exist.
    /// Called before the Registry insert in `createAgent` to close the
    /// webhook race where an event for the new agent arrives mid-spawn.
    pub fn ensure(&self, agent_id: &AgentId) {
        self.queues.lock().entry(agent_id.clone()).or_default();
    }

    pub fn push(&self, agent_id: &AgentId, event: Event) {
        self.queues.lock().entry(agent_id.clone()).or_default().push_back(event);
    }

    pub fn drain(&self, agent_id: &AgentId) -> Vec<Event> {
        match self.queues.lock().get_mut(agent_id) {
            Some(q) => q.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, agent_id: &AgentId) -> usize {
        self.queues.lock().get(agent_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, agent_id: &AgentId) -> bool {
        self.len(agent_id) == 0
    }

    pub fn remove(&self, agent_id: &AgentId) -> Vec<Event> {
        self.queues.lock().remove(agent_id).map(|q| q.into_iter().collect()).unwrap_or_default()
    }

    /// Render the inbox as a human-readable summary for the
    /// `check_for_events` introspection tool.
    pub fn summarize(events: &[Event]) -> String {
        if events.is_empty() {
            return "No pending events.".to_string();
        }
        let mut out = format!("{} pending event(s):\n", events.len());
        for e in events {
            let mut line = format!("- {:?}", e.event_type);
            if let Some(issue_id) = e.issue_id {
                line.push_str(&format!(" on issue #{issue_id}"));
            }
            if let Some(pr_id) = e.pr_id {
                line.push_str(&format!(" on PR #{pr_id}"));
            }
            line.push_str(&format!(" from @{}", e.sender));
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Push-style delivery: mail directed at a currently-ACTIVE agent via an
/// `@bot` command, consumed implicitly before the agent's next turn.
#[derive(Default)]
pub struct MailQueues {
    queues: Mutex<HashMap<AgentId, Vec<Mail>>>,
}

impl MailQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&self, agent_id: &AgentId) {
        self.queues.lock().entry(agent_id.clone()).or_default();
    }

    pub fn push(&self, agent_id: &AgentId, mail: Mail) {
        self.queues.lock().entry(agent_id.clone()).or_default().push(mail);
    }

    /// Drain and return all pending mail for `agent_id`, clearing the queue
    /// so messages are never delivered twice.
    pub fn drain(&self, agent_id: &AgentId) -> Vec<Mail> {
        match self.queues.lock().get_mut(agent_id) {
            Some(q) => std::mem::take(q),
            None => Vec::new(),
        }
    }

    pub fn has_pending(&self, agent_id: &AgentId) -> bool {
        self.queues.lock().get(agent_id).is_some_and(|q| !q.is_empty())
    }

    /// Sleep cleans mail: sleeping agents' mail is re-queued via spawn
    /// rules for ephemeral singletons rather than delivered, so the queue
    /// is discarded outright here and the caller decides whether to
    /// re-issue it as a spawn request.
    pub fn discard(&self, agent_id: &AgentId) -> Vec<Mail> {
        self.queues.lock().remove(agent_id).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
