// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger matching: does an incoming [`Event`] fire a given [`PipelineTrigger`]
//! based on the definition's configured trigger conditions?

use squadron_core::{Event, PipelineTrigger};

/// `event` fires `trigger` iff the event types match and, when the trigger
/// names a label or base branch, the event's payload carries it.
pub fn matches(trigger: &PipelineTrigger, event: &Event) -> bool {
    if trigger.event != event.event_type {
        return false;
    }

    if let Some(label) = &trigger.label {
        if !event.payload.labels.iter().any(|l| l == label) {
            return false;
        }
    }

    if !trigger.any_of_labels.is_empty() {
        let has_any = trigger.any_of_labels.iter().any(|want| event.payload.labels.iter().any(|l| l == want));
        if !has_any {
            return false;
        }
    }

    if let Some(base_branch) = &trigger.base_branch {
        if event.payload.base_branch.as_deref() != Some(base_branch.as_str()) {
            return false;
        }
    }

    true
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
