// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_core::{DeliveryId, Event, EventType, Mail, MailProvenance};

fn event(delivery: &str) -> Event {
    Event::new(EventType::IssueComment, DeliveryId::new(delivery), "octocat")
}

#[test]
fn inbox_drain_empties_the_queue_and_is_idempotent() {
    let inboxes = Inboxes::new();
    let agent_id = AgentId::new("dev-1");
    inboxes.push(&agent_id, event("d-1"));
    inboxes.push(&agent_id, event("d-2"));

    assert_eq!(inboxes.len(&agent_id), 2);
    let drained = inboxes.drain(&agent_id);
    assert_eq!(drained.len(), 2);
    assert!(inboxes.is_empty(&agent_id));
    assert!(inboxes.drain(&agent_id).is_empty());
}

#[test]
fn inbox_for_an_unknown_agent_behaves_as_empty() {
    let inboxes = Inboxes::new();
    let agent_id = AgentId::new("ghost");
    assert_eq!(inboxes.len(&agent_id), 0);
    assert!(inboxes.is_empty(&agent_id));
    assert!(inboxes.drain(&agent_id).is_empty());
}

#[test]
fn ensure_is_a_harmless_no_op_on_an_existing_queue() {
    let inboxes = Inboxes::new();
    let agent_id = AgentId::new("dev-1");
    inboxes.push(&agent_id, event("d-1"));
    inboxes.ensure(&agent_id);
    assert_eq!(inboxes.len(&agent_id), 1);
}

#[test]
fn remove_returns_and_clears_the_queue() {
    let inboxes = Inboxes::new();
    let agent_id = AgentId::new("dev-1");
    inboxes.push(&agent_id, event("d-1"));
    let removed = inboxes.remove(&agent_id);
    assert_eq!(removed.len(), 1);
    assert!(inboxes.is_empty(&agent_id));
}

#[test]
fn summarize_reports_no_pending_events_when_empty() {
    assert_eq!(Inboxes::summarize(&[]), "No pending events.");
}

#[test]
fn summarize_lists_every_event_with_its_source() {
    let mut e = event("d-1");
    e.issue_id = Some(42);
    let summary = Inboxes::summarize(&[e]);
    assert!(summary.contains("1 pending event(s)"));
    assert!(summary.contains("issue #42"));
    assert!(summary.contains("@octocat"));
}

#[test]
fn mail_queue_drain_clears_pending_and_discard_removes_the_queue_entirely() {
    let mail = MailQueues::new();
    let agent_id = AgentId::new("dev-1");
    mail.push(&agent_id, Mail::new("octocat", "please rebase", MailProvenance::IssueComment { issue_id: 7 }, 1_000));
    assert!(mail.has_pending(&agent_id));

    let drained = mail.drain(&agent_id);
    assert_eq!(drained.len(), 1);
    assert!(!mail.has_pending(&agent_id));

    mail.push(&agent_id, Mail::new("octocat", "ping", MailProvenance::IssueComment { issue_id: 7 }, 2_000));
    let discarded = mail.discard(&agent_id);
    assert_eq!(discarded.len(), 1);
    assert!(!mail.has_pending(&agent_id));
}

#[test]
fn mail_queue_for_an_unregistered_agent_reports_nothing_pending() {
    let mail = MailQueues::new();
    let agent_id = AgentId::new("ghost");
    assert!(!mail.has_pending(&agent_id));
    assert!(mail.drain(&agent_id).is_empty());
    assert!(mail.discard(&agent_id).is_empty());
}
