// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn new_run() -> PipelineRun {
    PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({"stages": []}),
        EventType::IssueOpened,
        DeliveryId::new("d-1"),
        "develop",
        PipelineScope::SinglePr,
        1_000,
    )
}

#[test]
fn new_run_starts_pending_at_initial_stage() {
    let run = new_run();
    assert_eq!(run.status, PipelineRunStatus::Pending);
    assert_eq!(run.current_stage_id, "develop");
    assert_eq!(run.nesting_depth, 0);
}

#[test]
fn sub_pipeline_inherits_incremented_depth() {
    let child = new_run().as_sub_pipeline(PipelineRunId::new("parent"), "gate-1", 2);
    assert_eq!(child.nesting_depth, 3);
    assert!(child.would_exceed_nesting_cap());
}

#[test]
fn depth_within_cap_does_not_exceed() {
    let child = new_run().as_sub_pipeline(PipelineRunId::new("parent"), "gate-1", 1);
    assert_eq!(child.nesting_depth, 2);
    assert!(!child.would_exceed_nesting_cap());
}

#[test]
fn fail_sets_terminal_status_and_error_fields() {
    let mut run = new_run();
    run.start(1_000);
    run.fail("deploy", "boom", 2_000);
    assert_eq!(run.status, PipelineRunStatus::Failed);
    assert!(run.status.is_terminal());
    assert_eq!(run.error_stage_id.as_deref(), Some("deploy"));
    assert_eq!(run.completed_at, Some(2_000));
}
