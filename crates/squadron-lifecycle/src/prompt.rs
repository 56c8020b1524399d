// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt construction. Three shapes — fresh persistent agent,
//! wake, and ephemeral single-shot — plus the mail-draining prepend that
//! runs ahead of all three.
//!
//! Prompt *content* quality (how well a template reads) is explicitly out
//! of scope; what's built here is only the shape each prompt takes and the
//! mechanical pieces (mail, inbox hint, resume header) every shape must
//! carry.

use squadron_adapters::{IssueRef, PrRef};
use squadron_core::{Event, Mail};

/// Everything the prompt builder needs about the assignment a fresh or
/// ephemeral agent is being pointed at.
pub struct Assignment<'a> {
    pub role: &'a str,
    pub branch: &'a str,
    pub issue: Option<&'a IssueRef>,
    pub pr: Option<&'a PrRef>,
}

/// Fresh persistent agent: system message from the role's template, user
/// turn describing the assignment.
pub fn build_fresh_prompt(system_template: &str, project_name: &str, assignment: &Assignment<'_>) -> (String, String) {
    let system = system_template
        .replace("{project_name}", project_name)
        .replace("{role}", assignment.role)
        .replace("{branch}", assignment.branch);

    let mut user = String::new();
    if let Some(issue) = assignment.issue {
        user.push_str(&format!("## Issue #{}: {}\n\n", issue.number, issue.title));
        if let Some(body) = &issue.body {
            user.push_str(body);
            user.push_str("\n\n");
        }
        if !issue.labels.is_empty() {
            user.push_str(&format!("Labels: {}\n\n", issue.labels.join(", ")));
        }
    }
    user.push_str(&format!("You are acting as **{}** on branch `{}`.\n", assignment.role, assignment.branch));
    if let Some(pr) = assignment.pr {
        user.push_str(&format!("An existing PR #{} (`{}` -> `{}`) is already open for this work.\n", pr.number, pr.head_branch, pr.base_branch));
    }
    (system, user)
}

/// Wake prompt: `Session Resumed` header, trigger details, and an explicit
/// instruction to call `get_pr_feedback` when the wake carries review
/// information.
pub fn build_wake_prompt(trigger: &Event, inbox_len: usize) -> String {
    let mut out = String::from("## Session Resumed\n\n");
    out.push_str(&format!("You were woken by a `{:?}` event from @{}.\n", trigger.event_type, trigger.sender));

    if let Some(pr_id) = trigger.pr_id {
        out.push_str(&format!("This concerns PR #{pr_id}.\n"));
    }
    if let Some(issue_id) = trigger.issue_id {
        out.push_str(&format!("This concerns issue #{issue_id}.\n"));
    }

    if trigger.payload.review.is_some() {
        out.push_str("\nA review was submitted while you were sleeping. Call `get_pr_feedback` before doing anything else.\n");
    }

    if inbox_len > 0 {
        out.push_str(&format!("\nYou have {inbox_len} pending event(s) in your inbox — call `check_for_events` to see them.\n"));
    }

    out
}

/// Ephemeral (single-shot) prompt: the full event context embedded inline,
/// no resume state to carry.
pub fn build_ephemeral_prompt(event: &Event, assignment: &Assignment<'_>) -> String {
    let mut out = format!("You are a one-shot **{}** agent responding to a `{:?}` event from @{}.\n\n", assignment.role, event.event_type, event.sender);

    if let Some(issue) = assignment.issue {
        out.push_str(&format!("## Issue #{}: {}\n\n", issue.number, issue.title));
        if let Some(body) = &issue.body {
            out.push_str(body);
            out.push_str("\n\n");
        }
    }
    if let Some(pr) = assignment.pr {
        out.push_str(&format!("## PR #{}: {}\n\n", pr.number, pr.title));
    }
    if let Some(comment) = &event.payload.comment {
        out.push_str(&format!("Comment body:\n\n{}\n", comment.body));
    }
    out
}

/// Prepend the drained mail section to a user-turn prompt. No-op when
/// there is nothing pending — before every prompt, the pending mail queue
/// is drained and prepended.
pub fn prepend_mail(user_prompt: &str, mail: &[Mail]) -> String {
    match Mail::format_section(mail) {
        Some(section) => format!("{section}\n{user_prompt}"),
        None => user_prompt.to_string(),
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
