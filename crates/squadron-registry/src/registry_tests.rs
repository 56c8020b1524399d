// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_core::{
    Agent, AgentId, AgentStatus, DeliveryId, EventType, HumanStageState, PipelineRun, PipelineRunId,
    PipelineScope, PrReviewRequirement, PrSequenceState, StageRun, StageRunId,
};

fn registry() -> Registry {
    Registry::open_in_memory().unwrap()
}

#[test]
fn create_and_fetch_round_trips_an_agent() {
    let reg = registry();
    let mut agent = Agent::new(AgentId::new("dev-42"), "developer", "feature/42", 1_000);
    agent.issue_id = Some(42);
    reg.create_agent(&agent).unwrap();

    let fetched = reg.get_agent(&AgentId::new("dev-42")).unwrap().unwrap();
    assert_eq!(fetched.role, "developer");
    assert_eq!(fetched.issue_id, Some(42));
    assert_eq!(fetched.branch, "feature/42");
}

#[test]
fn get_agent_by_issue_finds_the_owning_agent() {
    let reg = registry();
    let agent = {
        let mut a = Agent::new(AgentId::new("dev-7"), "developer", "feature/7", 1_000);
        a.issue_id = Some(7);
        a
    };
    reg.create_agent(&agent).unwrap();
    let found = reg.get_agent_by_issue(7).unwrap().unwrap();
    assert_eq!(found.id, AgentId::new("dev-7"));
}

#[test]
fn add_blocker_persists_and_round_trips_through_get_agent() {
    let reg = registry();
    let agent = Agent::new(AgentId::new("dev-1"), "developer", "feature/1", 1_000);
    reg.create_agent(&agent).unwrap();

    reg.add_blocker(&AgentId::new("dev-1"), 99).unwrap();
    let fetched = reg.get_agent(&AgentId::new("dev-1")).unwrap().unwrap();
    assert!(fetched.blocked_by.contains(&99));

    let blocked = reg.get_agents_blocked_by(99).unwrap();
    assert_eq!(blocked, vec![AgentId::new("dev-1")]);
}

#[test]
fn add_blocker_rejects_a_two_hop_cycle() {
    let reg = registry();

    let mut a = Agent::new(AgentId::new("agent-a"), "developer", "feature/a", 1_000);
    a.issue_id = Some(1);
    reg.create_agent(&a).unwrap();

    let mut b = Agent::new(AgentId::new("agent-b"), "developer", "feature/b", 1_000);
    b.issue_id = Some(2);
    reg.create_agent(&b).unwrap();

    // agent-a is blocked by issue 2 (owned by agent-b).
    reg.add_blocker(&AgentId::new("agent-a"), 2).unwrap();

    // agent-b becoming blocked by issue 1 (owned by agent-a) would close the loop.
    let err = reg.add_blocker(&AgentId::new("agent-b"), 1).unwrap_err();
    assert!(matches!(err, RegistryError::BlockerCycle { .. }));
}

#[test]
fn remove_blocker_clears_the_wake_candidate_list() {
    let reg = registry();
    let agent = Agent::new(AgentId::new("dev-1"), "developer", "feature/1", 1_000);
    reg.create_agent(&agent).unwrap();
    reg.add_blocker(&AgentId::new("dev-1"), 5).unwrap();
    reg.remove_blocker(&AgentId::new("dev-1"), 5).unwrap();
    assert!(reg.get_agents_blocked_by(5).unwrap().is_empty());
}

#[test]
fn merge_readiness_counts_non_stale_approvals_per_role() {
    let reg = registry();
    reg.record_pr_approval(10, "pr-review", "alice", "r1", squadron_core::ReviewState::Approved, 1_000)
        .unwrap();

    let requirements = vec![("pr-review".to_string(), 1)];
    let readiness = reg.check_pr_merge_ready(10, &requirements).unwrap();
    assert!(readiness.ready);

    reg.invalidate_pr_approvals(10).unwrap();
    let readiness_after_sync = reg.check_pr_merge_ready(10, &requirements).unwrap();
    assert!(!readiness_after_sync.ready);
    assert_eq!(readiness_after_sync.missing, vec!["pr-review: 0/1"]);
}

#[test]
fn pipeline_run_round_trips_through_registry() {
    let reg = registry();
    let run = PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({"stages": []}),
        EventType::IssueLabeled,
        DeliveryId::new("delivery-1"),
        "develop",
        PipelineScope::SinglePr,
        1_000,
    );
    reg.create_pipeline_run(&run).unwrap();

    let fetched = reg.get_pipeline_run(&PipelineRunId::new("run-1")).unwrap().unwrap();
    assert_eq!(fetched.pipeline_name, "feature-pipeline");
    assert_eq!(fetched.current_stage_id, "develop");
    assert_eq!(fetched.trigger_event, EventType::IssueLabeled);
}

#[test]
fn list_active_pipeline_runs_excludes_terminal_runs() {
    let reg = registry();
    let mut run = PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({}),
        EventType::PrOpened,
        DeliveryId::new("delivery-1"),
        "develop",
        PipelineScope::SinglePr,
        1_000,
    );
    run.pr_id = Some(55);
    reg.create_pipeline_run(&run).unwrap();

    let active = reg.list_active_pipeline_runs_for_pr(55).unwrap();
    assert_eq!(active.len(), 1);

    run.complete(2_000);
    reg.update_pipeline_run(&run).unwrap();
    let active_after_complete = reg.list_active_pipeline_runs_for_pr(55).unwrap();
    assert!(active_after_complete.is_empty());
}

#[test]
fn delivery_dedup_marks_and_reports_seen() {
    let reg = registry();
    let delivery = DeliveryId::new("d-1");
    assert!(!reg.is_delivery_seen(&delivery).unwrap());
    reg.mark_delivery_seen(&delivery, 1_000).unwrap();
    assert!(reg.is_delivery_seen(&delivery).unwrap());
}

#[test]
fn try_mark_delivery_seen_is_true_only_on_the_first_call() {
    let reg = registry();
    let delivery = DeliveryId::new("d-2");
    assert!(reg.try_mark_delivery_seen(&delivery, 1_000).unwrap());
    assert!(!reg.try_mark_delivery_seen(&delivery, 2_000).unwrap());
    assert!(reg.is_delivery_seen(&delivery).unwrap());
}

#[test]
fn delete_agent_allows_a_fresh_row_under_the_same_id() {
    let reg = registry();
    let mut agent = Agent::new(AgentId::new("dev-1"), "developer", "feature/1", 1_000);
    agent.mark_active(1_000).unwrap();
    agent.mark_completed(2_000).unwrap();
    reg.create_agent(&agent).unwrap();

    reg.delete_agent(&AgentId::new("dev-1")).unwrap();
    assert!(reg.get_agent(&AgentId::new("dev-1")).unwrap().is_none());

    let fresh = Agent::new(AgentId::new("dev-1"), "developer", "feature/1-v2", 3_000);
    reg.create_agent(&fresh).unwrap();
    let fetched = reg.get_agent(&AgentId::new("dev-1")).unwrap().unwrap();
    assert_eq!(fetched.status, AgentStatus::Created);
}

#[test]
fn list_non_terminal_agents_excludes_terminal_statuses() {
    let reg = registry();
    let active = Agent::new(AgentId::new("dev-1"), "developer", "feature/1", 1_000);
    reg.create_agent(&active).unwrap();

    let mut done = Agent::new(AgentId::new("dev-2"), "developer", "feature/2", 1_000);
    done.mark_active(1_000).unwrap();
    done.mark_completed(2_000).unwrap();
    reg.create_agent(&done).unwrap();

    let non_terminal = reg.list_non_terminal_agents().unwrap();
    assert_eq!(non_terminal.len(), 1);
    assert_eq!(non_terminal[0].id, AgentId::new("dev-1"));
}

#[test]
fn count_pr_approvals_is_scoped_by_role_and_ignores_stale() {
    let reg = registry();
    reg.record_pr_approval(10, "pr-review", "alice", "r1", squadron_core::ReviewState::Approved, 1_000)
        .unwrap();
    reg.record_pr_approval(10, "security-review", "bob", "r2", squadron_core::ReviewState::Approved, 1_000)
        .unwrap();

    assert_eq!(reg.count_pr_approvals(10, Some("pr-review")).unwrap(), 1);
    assert_eq!(reg.count_pr_approvals(10, None).unwrap(), 2);

    reg.invalidate_pr_approvals(10).unwrap();
    assert_eq!(reg.count_pr_approvals(10, Some("pr-review")).unwrap(), 0);
}

#[test]
fn pr_review_requirements_round_trip() {
    let reg = registry();
    let reqs = vec![PrReviewRequirement {
        pr_id: 20,
        role: "pr-review".to_string(),
        required_count: 2,
        pipeline_run_id: Some(PipelineRunId::new("run-1")),
        created_at: 1_000,
    }];
    reg.set_pr_review_requirements(&reqs).unwrap();

    let fetched = reg.list_pr_review_requirements(20).unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].required_count, 2);
}

#[test]
fn pr_sequence_state_round_trips_and_updates() {
    let reg = registry();
    assert!(reg.get_pr_sequence_state(30).unwrap().is_none());

    let state = PrSequenceState {
        pr_id: 30,
        current_role: "pr-review".to_string(),
        sequence_index: 0,
        pipeline_run_id: Some(PipelineRunId::new("run-1")),
    };
    reg.set_pr_sequence_state(&state).unwrap();

    let mut advanced = reg.get_pr_sequence_state(30).unwrap().unwrap();
    assert_eq!(advanced.current_role, "pr-review");
    advanced.current_role = "security-review".to_string();
    advanced.sequence_index = 1;
    reg.set_pr_sequence_state(&advanced).unwrap();

    let fetched = reg.get_pr_sequence_state(30).unwrap().unwrap();
    assert_eq!(fetched.current_role, "security-review");
    assert_eq!(fetched.sequence_index, 1);
}

#[test]
fn stage_run_by_agent_id_finds_the_most_recent_attempt() {
    let reg = registry();
    let run = PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({}),
        EventType::PrOpened,
        DeliveryId::new("delivery-1"),
        "develop",
        PipelineScope::SinglePr,
        1_000,
    );
    reg.create_pipeline_run(&run).unwrap();

    let mut stage = StageRun::new(StageRunId::new("sr-1"), PipelineRunId::new("run-1"), "develop", 1, 1_000);
    stage.agent_id = Some(AgentId::new("dev-1"));
    reg.create_stage_run(&stage).unwrap();

    let found = reg.get_stage_run_by_agent_id(&AgentId::new("dev-1")).unwrap().unwrap();
    assert_eq!(found.id, StageRunId::new("sr-1"));
}

#[test]
fn list_running_pipeline_runs_excludes_terminal_runs() {
    let reg = registry();
    let mut run = PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({}),
        EventType::PrOpened,
        DeliveryId::new("delivery-1"),
        "develop",
        PipelineScope::SinglePr,
        1_000,
    );
    reg.create_pipeline_run(&run).unwrap();
    assert_eq!(reg.list_running_pipeline_runs().unwrap().len(), 1);

    run.complete(2_000);
    reg.update_pipeline_run(&run).unwrap();
    assert!(reg.list_running_pipeline_runs().unwrap().is_empty());
}

#[test]
fn human_stage_state_round_trips_reminders_and_completion() {
    let reg = registry();
    let run = PipelineRun::new(
        PipelineRunId::new("run-1"),
        "feature-pipeline",
        serde_json::json!({}),
        EventType::PrOpened,
        DeliveryId::new("delivery-1"),
        "approve",
        PipelineScope::SinglePr,
        1_000,
    );
    reg.create_pipeline_run(&run).unwrap();
    let stage = StageRun::new(StageRunId::new("sr-1"), PipelineRunId::new("run-1"), "approve", 1, 1_000);
    reg.create_stage_run(&stage).unwrap();

    let mut state = HumanStageState::new(StageRunId::new("sr-1"), vec!["alice".to_string()], 1_000);
    reg.upsert_human_stage_state(&state).unwrap();

    state.record_reminder(2_000);
    state.complete("alice", "approve");
    reg.upsert_human_stage_state(&state).unwrap();

    let fetched = reg.get_human_stage_state(&StageRunId::new("sr-1")).unwrap().unwrap();
    assert_eq!(fetched.reminder_count, 1);
    assert_eq!(fetched.completed_by.as_deref(), Some("alice"));
}
