// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn create_issue_then_get_issue_round_trips() {
    let platform = FakePlatformApi::new();
    let created = platform.create_issue("fix the thing", "body", &["bug".to_string()]).await.unwrap();
    let fetched = platform.get_issue(created.number).await.unwrap();
    assert_eq!(fetched.title, "fix the thing");
    assert_eq!(fetched.labels, vec!["bug".to_string()]);
}

#[tokio::test]
async fn get_issue_on_unseeded_number_is_not_found() {
    let platform = FakePlatformApi::new();
    let err = platform.get_issue(404).await.unwrap_err();
    assert!(matches!(err, PlatformError::NotFound(_)));
}

#[tokio::test]
async fn merge_pr_transitions_state_and_is_idempotent_to_read() {
    let platform = FakePlatformApi::new();
    let pr = platform.create_pr("title", "body", "feature/1", "main").await.unwrap();
    platform.merge_pr(pr.number, "squash").await.unwrap();
    let fetched = platform.get_pr(pr.number).await.unwrap();
    assert_eq!(fetched.state, "merged");
}

#[tokio::test]
async fn delete_branch_is_recorded_for_assertions() {
    let platform = FakePlatformApi::new();
    platform.delete_branch("feature/42").await.unwrap();
    assert_eq!(platform.deleted_branches(), vec!["feature/42".to_string()]);
}

#[tokio::test]
async fn combined_status_falls_back_to_pending_when_unseeded() {
    let platform = FakePlatformApi::new();
    let status = platform.combined_status("deadbeef").await.unwrap();
    assert_eq!(status.state, "pending");
    assert!(status.check_runs.is_empty());
}

#[tokio::test]
async fn every_call_is_recorded_for_test_assertions() {
    let platform = FakePlatformApi::new();
    let issue = platform.create_issue("t", "b", &[]).await.unwrap();
    platform.get_issue(issue.number).await.unwrap();
    let calls = platform.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], PlatformCall::CreateIssue { .. }));
    assert!(matches!(calls[1], PlatformCall::GetIssue { .. }));
}
