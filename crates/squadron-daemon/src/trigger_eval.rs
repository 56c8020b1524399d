// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluates `agent_roles.*.triggers` entries against a canonical [`Event`]:
//! the event-type match, the optional label match, and the optional
//! `condition` string.
//!
//! `AgentTrigger.condition` (config.rs) is a plain `Option<String>`
//! representing a small condition language as a comma-separated `key` or
//! `key:value` token list, e.g. `"approval_flow,merged:true"` or
//! `"review_state:approved"`.

use squadron_core::{Event, EventType, ReviewPolicyConfig, ReviewState};

/// One parsed condition token from an `AgentTrigger.condition` string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConditionTerm {
    ApprovalFlow,
    Merged(bool),
    ReviewState(String),
    IsPrComment,
    IsHumanComment,
}

fn parse_terms(condition: &str) -> Vec<ConditionTerm> {
    condition
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .filter_map(|tok| match tok.split_once(':') {
            Some(("merged", v)) => Some(ConditionTerm::Merged(v.eq_ignore_ascii_case("true"))),
            Some(("review_state", v)) => Some(ConditionTerm::ReviewState(v.to_ascii_lowercase())),
            Some(_) => None,
            None => match tok {
                "approval_flow" => Some(ConditionTerm::ApprovalFlow),
                "is_pr_comment" => Some(ConditionTerm::IsPrComment),
                "is_human_comment" => Some(ConditionTerm::IsHumanComment),
                _ => None,
            },
        })
        .collect()
}

/// Evaluate a single condition term against the event, given the role this
/// trigger belongs to (needed for `approval_flow`) and the review policy
/// (needed to compute which roles are currently required reviewers).
fn term_matches(term: &ConditionTerm, event: &Event, role_name: &str, review_policy: &ReviewPolicyConfig) -> bool {
    match term {
        ConditionTerm::ApprovalFlow => {
            if !review_policy.enabled {
                return false;
            }
            review_policy.requirements_for(&event.payload.labels).iter().any(|r| r.role == role_name)
        }
        ConditionTerm::Merged(expected) => event.payload.labels.contains(&"__merged__".to_string()) == *expected,
        ConditionTerm::ReviewState(expected) => event
            .payload
            .review
            .as_ref()
            .and_then(|r| r.state)
            .is_some_and(|state| review_state_name(state) == *expected),
        ConditionTerm::IsPrComment => event.pr_id.is_some(),
        ConditionTerm::IsHumanComment => event.payload.review.as_ref().and_then(|r| r.role.as_ref()).is_none(),
    }
}

fn review_state_name(state: ReviewState) -> String {
    match state {
        ReviewState::Approved => "approved".to_string(),
        ReviewState::ChangesRequested => "changes_requested".to_string(),
        ReviewState::Commented => "commented".to_string(),
    }
}

/// Does `event` satisfy every term of `condition` for the given role?
/// An absent condition always matches.
pub fn condition_matches(
    condition: Option<&str>,
    event: &Event,
    role_name: &str,
    review_policy: &ReviewPolicyConfig,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    parse_terms(condition).iter().all(|term| term_matches(term, event, role_name, review_policy))
}

/// Full trigger match: event type, optional label, then condition (spec
/// §4.4). Label matching checks the event's label list rather than a single
/// `label.name` field, since the normalizer already flattens issue and PR
/// labels into `payload.labels`.
pub fn trigger_matches(
    trigger_event: EventType,
    trigger_label: Option<&str>,
    trigger_condition: Option<&str>,
    event: &Event,
    role_name: &str,
    review_policy: &ReviewPolicyConfig,
) -> bool {
    if trigger_event != event.event_type {
        return false;
    }
    if let Some(label) = trigger_label {
        if !event.payload.labels.iter().any(|l| l == label) {
            return false;
        }
    }
    condition_matches(trigger_condition, event, role_name, review_policy)
}

#[cfg(test)]
#[path = "trigger_eval_tests.rs"]
mod tests;
