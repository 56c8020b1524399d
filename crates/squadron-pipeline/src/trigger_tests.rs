// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_core::{DeliveryId, EventPayload, EventType};

fn event(event_type: EventType, labels: Vec<String>, base_branch: Option<&str>) -> Event {
    Event::new(event_type, DeliveryId::new("d-1"), "someone").with_payload(EventPayload {
        labels,
        base_branch: base_branch.map(str::to_string),
        ..Default::default()
    })
}

#[test]
fn matches_on_event_type_alone_when_trigger_has_no_label() {
    let trigger = PipelineTrigger { event: EventType::PrOpened, label: None, any_of_labels: vec![], base_branch: None };
    assert!(matches(&trigger, &event(EventType::PrOpened, vec![], None)));
    assert!(!matches(&trigger, &event(EventType::PrClosed, vec![], None)));
}

#[test]
fn requires_the_exact_label_when_one_is_set() {
    let trigger = PipelineTrigger {
        event: EventType::IssueLabeled,
        label: Some("ready-for-review".to_string()),
        any_of_labels: vec![],
        base_branch: None,
    };
    assert!(matches(&trigger, &event(EventType::IssueLabeled, vec!["ready-for-review".to_string()], None)));
    assert!(!matches(&trigger, &event(EventType::IssueLabeled, vec!["wip".to_string()], None)));
}

#[test]
fn any_of_labels_matches_if_any_present() {
    let trigger = PipelineTrigger {
        event: EventType::IssueLabeled,
        label: None,
        any_of_labels: vec!["bug".to_string(), "regression".to_string()],
        base_branch: None,
    };
    assert!(matches(&trigger, &event(EventType::IssueLabeled, vec!["regression".to_string()], None)));
    assert!(!matches(&trigger, &event(EventType::IssueLabeled, vec!["feature".to_string()], None)));
}

#[test]
fn base_branch_must_match_exactly() {
    let trigger = PipelineTrigger {
        event: EventType::PrOpened,
        label: None,
        any_of_labels: vec![],
        base_branch: Some("main".to_string()),
    };
    assert!(matches(&trigger, &event(EventType::PrOpened, vec![], Some("main"))));
    assert!(!matches(&trigger, &event(EventType::PrOpened, vec![], Some("develop"))));
    assert!(!matches(&trigger, &event(EventType::PrOpened, vec![], None)));
}
