// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_adapters::{IssueRef, PrRef};
use squadron_core::{Command, CommentDetail, DeliveryId, EventPayload, EventType, MailProvenance, ReviewDetail, ReviewState};

fn issue() -> IssueRef {
    IssueRef { number: 42, title: "Fix the thing".to_string(), body: Some("Details here.".to_string()), labels: vec!["bug".to_string()], state: "open".to_string() }
}

fn pr() -> PrRef {
    PrRef { number: 7, title: "Fix the thing".to_string(), body: None, head_branch: "feature/42".to_string(), base_branch: "main".to_string(), state: "open".to_string(), draft: false }
}

#[test]
fn fresh_prompt_substitutes_template_placeholders_and_embeds_the_issue() {
    let assignment = Assignment { role: "developer", branch: "feature/42", issue: Some(&issue()), pr: None };
    let (system, user) = build_fresh_prompt("You are working on {project_name} as {role} on {branch}.", "squadron", &assignment);

    assert_eq!(system, "You are working on squadron as developer on feature/42.");
    assert!(user.contains("Issue #42: Fix the thing"));
    assert!(user.contains("Details here."));
    assert!(user.contains("Labels: bug"));
    assert!(user.contains("**developer** on branch `feature/42`"));
}

#[test]
fn fresh_prompt_mentions_an_existing_pr_when_one_is_already_open() {
    let assignment = Assignment { role: "developer", branch: "feature/42", issue: Some(&issue()), pr: Some(&pr()) };
    let (_, user) = build_fresh_prompt("{role}", "squadron", &assignment);
    assert!(user.contains("PR #7"));
    assert!(user.contains("feature/42"));
    assert!(user.contains("main"));
}

#[test]
fn wake_prompt_names_the_triggering_event_and_prompts_for_feedback_on_a_review() {
    let mut trigger = squadron_core::Event::new(EventType::PrReviewSubmitted, DeliveryId::new("d-1"), "octocat").with_pr(7);
    trigger.payload = EventPayload { review: Some(ReviewDetail { state: Some(ReviewState::ChangesRequested), ..Default::default() }), ..Default::default() };

    let out = build_wake_prompt(&trigger, 0);
    assert!(out.contains("Session Resumed"));
    assert!(out.contains("@octocat"));
    assert!(out.contains("PR #7"));
    assert!(out.contains("get_pr_feedback"));
    assert!(!out.contains("pending event"));
}

#[test]
fn wake_prompt_mentions_pending_inbox_items_when_there_are_any() {
    let trigger = squadron_core::Event::new(EventType::WakeAgent, DeliveryId::new("d-2"), "octocat");
    let out = build_wake_prompt(&trigger, 3);
    assert!(out.contains("3 pending event(s)"));
    assert!(out.contains("check_for_events"));
}

#[test]
fn ephemeral_prompt_embeds_the_triggering_comment() {
    let mut trigger = squadron_core::Event::new(EventType::IssueComment, DeliveryId::new("d-3"), "octocat").with_issue(42);
    trigger.command = Some(Command::Route { role: "reviewer".to_string(), message: "please take a look".to_string() });
    trigger.payload = EventPayload { comment: Some(CommentDetail { comment_id: Some("c-1".to_string()), body: "@bot reviewer: please take a look".to_string() }), ..Default::default() };

    let assignment = Assignment { role: "reviewer", branch: "feature/42", issue: Some(&issue()), pr: None };
    let out = build_ephemeral_prompt(&trigger, &assignment);

    assert!(out.contains("one-shot **reviewer** agent"));
    assert!(out.contains("Issue #42"));
    assert!(out.contains("please take a look"));
}

#[test]
fn prepend_mail_is_a_no_op_when_there_is_nothing_pending() {
    let prompt = prepend_mail("hello", &[]);
    assert_eq!(prompt, "hello");
}

#[test]
fn prepend_mail_puts_the_inbound_section_ahead_of_the_prompt_body() {
    let mail = squadron_core::Mail::new("octocat", "rebase please", MailProvenance::IssueComment { issue_id: 42 }, 1_000);
    let prompt = prepend_mail("continue your work", &[mail]);
    let inbound_at = prompt.find("Inbound Messages").expect("section present");
    let body_at = prompt.find("continue your work").expect("body present");
    assert!(inbound_at < body_at);
    assert!(prompt.contains("rebase please"));
}
