// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical internal event produced by the Event Normalizer
//! and consumed by the Event Router.

use crate::config::CommandDefinition;
use crate::id::DeliveryId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of canonical event types. Raw webhook events the Normalizer
/// cannot map to one of these are mapped to [`EventType::Unknown`] and
/// dropped by the router before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    IssueOpened,
    IssueAssigned,
    IssueClosed,
    IssueLabeled,
    IssueComment,
    PrOpened,
    PrSynchronize,
    PrClosed,
    PrReviewSubmitted,
    PrReviewComment,
    WakeAgent,
    BlockerResolved,
    WorkflowInternal,
    /// Sentinel for raw events the normalizer could not classify. Never
    /// dispatched past the router.
    Unknown,
}

impl EventType {
    /// Every variant except [`EventType::Unknown`] — the set a daemon binary
    /// wires handler registration against, since `Unknown` is dropped by the
    /// router before dispatch and no handler is ever invoked for it.
    pub const ALL: &'static [EventType] = &[
        EventType::IssueOpened,
        EventType::IssueAssigned,
        EventType::IssueClosed,
        EventType::IssueLabeled,
        EventType::IssueComment,
        EventType::PrOpened,
        EventType::PrSynchronize,
        EventType::PrClosed,
        EventType::PrReviewSubmitted,
        EventType::PrReviewComment,
        EventType::WakeAgent,
        EventType::BlockerResolved,
        EventType::WorkflowInternal,
    ];
}

/// The decision carried by a submitted PR review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

/// Structured detail extracted from review-shaped webhook payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewDetail {
    pub state: Option<ReviewState>,
    pub role: Option<String>,
    pub review_id: Option<String>,
    pub body: Option<String>,
}

/// Structured detail extracted from comment-shaped webhook payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentDetail {
    pub comment_id: Option<String>,
    pub body: String,
}

/// A parsed `@bot <role>: <message>` or `@bot help` command found in a
/// comment body. Parsing lives with the Normalizer; routing lives with the
/// Lifecycle Manager's command sub-handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Help,
    Named { name: String, message: String },
    Route { role: String, message: String },
}

/// Sub-payload carried by an event, when the event type calls for one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// The canonical internal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub delivery_id: DeliveryId,
    pub issue_id: Option<u64>,
    pub pr_id: Option<u64>,
    pub sender: String,
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
}

impl Event {
    pub fn new(event_type: EventType, delivery_id: DeliveryId, sender: impl Into<String>) -> Self {
        Self {
            event_type,
            delivery_id,
            issue_id: None,
            pr_id: None,
            sender: sender.into(),
            payload: EventPayload::default(),
            command: None,
        }
    }

    pub fn with_issue(mut self, issue_id: u64) -> Self {
        self.issue_id = Some(issue_id);
        self
    }

    pub fn with_pr(mut self, pr_id: u64) -> Self {
        self.pr_id = Some(pr_id);
        self
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Unknown-mapped raw events are dropped before dispatch.
    pub fn is_droppable(&self) -> bool {
        matches!(self.event_type, EventType::Unknown)
    }
}

/// Parse a comment body for an `@bot ...` command.
///
/// Supported forms: `@bot help`, `@bot <role>: <message>`, and — supplemented
/// (§D.4) — `@bot <command> [message]` where `<command>` is a name present
/// in `known_commands` (config's `commands` map). A bare mention that
/// matches none of these, including an arbitrary word that isn't a
/// registered command name, yields `None`; this keeps a stray `@bot thanks!`
/// from being misread as a command.
pub fn parse_command(bot_username: &str, body: &str, known_commands: &HashMap<String, CommandDefinition>) -> Option<Command> {
    let prefix = format!("@{bot_username}");
    let rest = body.trim().strip_prefix(&prefix)?;
    let rest = rest.trim_start();

    if rest.eq_ignore_ascii_case("help") {
        return Some(Command::Help);
    }

    if let Some((role, message)) = rest.split_once(':') {
        let role = role.trim();
        let message = message.trim();
        if !role.is_empty() {
            return Some(Command::Route {
                role: role.to_string(),
                message: message.to_string(),
            });
        }
    }

    let (name, message) = match rest.split_once(char::is_whitespace) {
        Some((name, message)) => (name, message.trim()),
        None => (rest, ""),
    };
    if !name.is_empty() && known_commands.contains_key(name) {
        return Some(Command::Named {
            name: name.to_string(),
            message: message.to_string(),
        });
    }
    None
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
