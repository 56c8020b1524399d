// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Normalizer: turns an already-demultiplexed raw webhook delivery —
//! forge event name, action, delivery id, and the JSON payload — into the
//! canonical [`Event`]. The HTTP listener, signature verification, and the
//! forge-specific JSON shape are all collaborator concerns; this module
//! starts from whatever that collaborator handed it.

use serde_json::Value;
use squadron_core::{
    AgentRoleConfig, CommandDefinition, CommentDetail, DeliveryId, Event, EventPayload, EventType,
    ReviewDetail, ReviewState, parse_command,
};
use std::collections::HashMap;

/// A raw webhook delivery, already split into forge event name + action by
/// the (out-of-scope) ingestion layer.
#[derive(Debug, Clone)]
pub struct RawWebhookEvent {
    pub event_name: String,
    pub action: Option<String>,
    pub delivery_id: String,
    pub payload: Value,
}

fn get_str<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

fn get_u64(v: &Value, path: &[&str]) -> Option<u64> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_u64()
}

fn get_bool(v: &Value, path: &[&str]) -> Option<bool> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_bool()
}

fn labels_of(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|l| get_str(l, &["name"]).map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Map a `(event_name, action)` pair to the closed [`EventType`] enum.
/// Anything not recognized maps to [`EventType::Unknown`] —
/// "Unknown raw events are mapped to a sentinel and dropped by the router."
fn classify(event_name: &str, action: Option<&str>) -> EventType {
    match (event_name, action) {
        ("issues", Some("opened")) => EventType::IssueOpened,
        ("issues", Some("assigned")) => EventType::IssueAssigned,
        ("issues", Some("closed")) => EventType::IssueClosed,
        ("issues", Some("labeled")) => EventType::IssueLabeled,
        ("issue_comment", Some("created")) => EventType::IssueComment,
        ("pull_request", Some("opened")) => EventType::PrOpened,
        ("pull_request", Some("synchronize")) => EventType::PrSynchronize,
        ("pull_request", Some("closed")) => EventType::PrClosed,
        ("pull_request_review", Some("submitted")) => EventType::PrReviewSubmitted,
        ("pull_request_review_comment", Some("created")) => EventType::PrReviewComment,
        ("squadron.wake_agent", _) => EventType::WakeAgent,
        ("squadron.blocker_resolved", _) => EventType::BlockerResolved,
        ("squadron.workflow_internal", _) => EventType::WorkflowInternal,
        _ => EventType::Unknown,
    }
}

fn review_state(raw: &str) -> Option<ReviewState> {
    match raw.to_ascii_lowercase().as_str() {
        "approved" => Some(ReviewState::Approved),
        "changes_requested" => Some(ReviewState::ChangesRequested),
        "commented" => Some(ReviewState::Commented),
        _ => None,
    }
}

/// Normalize one raw webhook delivery into the canonical [`Event`].
///
/// `bot_username`, `agent_roles`, and `commands` are used only for the
/// `@bot` command parse and the bot-authored self-loop signature on comment
/// events; every other event type ignores them.
pub fn normalize(
    raw: &RawWebhookEvent,
    bot_username: &str,
    agent_roles: &HashMap<String, AgentRoleConfig>,
    commands: &HashMap<String, CommandDefinition>,
) -> Event {
    let event_type = classify(&raw.event_name, raw.action.as_deref());
    let delivery_id = DeliveryId::new(raw.delivery_id.clone());
    let sender = get_str(&raw.payload, &["sender", "login"]).unwrap_or("unknown").to_string();

    let mut event = Event::new(event_type, delivery_id, sender);

    if let Some(issue_id) = get_u64(&raw.payload, &["issue", "number"]) {
        event = event.with_issue(issue_id);
    }
    if let Some(pr_id) = get_u64(&raw.payload, &["pull_request", "number"]) {
        event = event.with_pr(pr_id);
    }

    let mut payload = EventPayload {
        labels: labels_of(&raw.payload, "issue")
            .into_iter()
            .chain(labels_of(&raw.payload, "pull_request"))
            .collect(),
        base_branch: get_str(&raw.payload, &["pull_request", "base", "ref"]).map(str::to_string),
        assignee: get_str(&raw.payload, &["assignee", "login"]).map(str::to_string),
        ..Default::default()
    };

    match event_type {
        EventType::IssueComment | EventType::PrReviewComment => {
            let body = get_str(&raw.payload, &["comment", "body"]).unwrap_or_default().to_string();
            let comment_id = get_str(&raw.payload, &["comment", "id"]).map(str::to_string);
            if let Some(cmd) = parse_command(bot_username, &body, commands) {
                event = event.with_command(cmd);
            }
            payload.comment = Some(CommentDetail { comment_id, body });
        }
        EventType::PrReviewSubmitted => {
            let state = get_str(&raw.payload, &["review", "state"]).and_then(review_state);
            let role = detect_sender_role(bot_username, agent_roles, &event.sender, get_str(&raw.payload, &["review", "body"]).unwrap_or_default());
            payload.review = Some(ReviewDetail {
                state,
                role,
                review_id: get_str(&raw.payload, &["review", "id"]).map(str::to_string),
                body: get_str(&raw.payload, &["review", "body"]).map(str::to_string),
            });
        }
        _ => {}
    }

    if let Some(merged) = get_bool(&raw.payload, &["pull_request", "merged"]) {
        payload.labels.push(if merged { "__merged__" } else { "__not_merged__" }.to_string());
    }

    event.with_payload(payload)
}

/// Determine whether `sender` is this project's bot account, and if so
/// which configured role authored `body` — the self-loop guard's input
/// — a self-loop guard. Unlike a naive comparison against
/// emoji+display-name match (this config schema carries neither), the
/// match is against `**{role key}**` at the start of the body, which is
/// exactly how `squadron-lifecycle`'s comment-posting helpers would need to
/// tag a role-authored comment to stay self-loop-safe.
pub fn detect_sender_role<'a>(
    bot_username: &str,
    agent_roles: &'a HashMap<String, AgentRoleConfig>,
    sender: &str,
    body: &str,
) -> Option<String> {
    let is_bot = sender.eq_ignore_ascii_case(bot_username)
        || sender.eq_ignore_ascii_case(&format!("{bot_username}[bot]"));
    if !is_bot {
        return None;
    }
    let trimmed = body.trim_start();
    agent_roles
        .keys()
        .find(|role| trimmed.to_ascii_lowercase().starts_with(&format!("**{}**", role.to_ascii_lowercase())))
        .cloned()
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
