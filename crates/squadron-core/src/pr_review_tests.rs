// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn requirement(role: &str, count: u32) -> PrReviewRequirement {
    PrReviewRequirement {
        pr_id: 10,
        role: role.to_string(),
        required_count: count,
        pipeline_run_id: None,
        created_at: 0,
    }
}

fn approval(role: &str, approved: bool, stale: bool) -> PrApproval {
    PrApproval {
        pr_id: 10,
        role: role.to_string(),
        approved,
        review_id: "r-1".to_string(),
        stale,
        recorded_at: 0,
    }
}

#[test]
fn ready_when_all_roles_have_enough_non_stale_approvals() {
    let reqs = vec![requirement("pr-review", 1)];
    let approvals = vec![approval("pr-review", true, false)];
    let result = evaluate_merge_readiness(&reqs, &approvals);
    assert!(result.ready);
    assert!(result.missing.is_empty());
}

#[test]
fn stale_approvals_do_not_count() {
    let reqs = vec![requirement("pr-review", 1)];
    let approvals = vec![approval("pr-review", true, true)];
    let result = evaluate_merge_readiness(&reqs, &approvals);
    assert!(!result.ready);
    assert_eq!(result.missing, vec!["pr-review: 0/1".to_string()]);
}

#[test]
fn rejections_do_not_count_towards_approval() {
    let reqs = vec![requirement("pr-review", 1)];
    let approvals = vec![approval("pr-review", false, false)];
    let result = evaluate_merge_readiness(&reqs, &approvals);
    assert!(!result.ready);
}

#[test]
fn missing_lists_every_short_role() {
    let reqs = vec![requirement("pr-review", 1), requirement("security", 1)];
    let approvals = vec![approval("pr-review", true, false)];
    let result = evaluate_merge_readiness(&reqs, &approvals);
    assert!(!result.ready);
    assert_eq!(result.missing, vec!["security: 0/1".to_string()]);
}
