// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_adapters::{FakeActivityLogger, FakeGitWorktree, FakeLlmSessionFactory, FakePlatformApi, FakeSandbox, IssueRef, LlmCall, TurnResult};
use squadron_core::{AgentLifecycle, AgentRoleConfig, AgentStatus, Config, DeliveryId, EventType, FakeClock, ProjectConfig, SequentialIdGen};
use squadron_registry::Registry;
use std::path::PathBuf;

type TestManager = AgentLifecycleManager<FakePlatformApi, FakeLlmSessionFactory, FakeGitWorktree, FakeSandbox, FakeActivityLogger, FakeClock, SequentialIdGen>;

fn role(lifecycle: AgentLifecycle, singleton: bool) -> AgentRoleConfig {
    AgentRoleConfig {
        agent_definition: "developer".to_string(),
        singleton,
        lifecycle,
        triggers: vec![],
        subagents: vec![],
        branch_template: "feature/{issue_number}".to_string(),
    }
}

fn config() -> Config {
    let mut agent_roles = std::collections::HashMap::new();
    agent_roles.insert("developer".to_string(), role(AgentLifecycle::Persistent, false));
    agent_roles.insert("reviewer".to_string(), role(AgentLifecycle::Ephemeral, true));
    Config {
        project: ProjectConfig { name: "widget".to_string(), ..ProjectConfig::default() },
        agent_roles,
        ..Config::default()
    }
}

struct Harness {
    manager: Arc<TestManager>,
    registry: Arc<Registry>,
    platform: FakePlatformApi,
    llm: FakeLlmSessionFactory,
}

fn harness() -> Harness {
    harness_with_config(config())
}

fn harness_with_config(config: Config) -> Harness {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let platform = FakePlatformApi::new();
    let llm = FakeLlmSessionFactory::new();
    let manager = AgentLifecycleManager::new(
        registry.clone(),
        platform.clone(),
        llm.clone(),
        FakeGitWorktree::new(),
        FakeSandbox::new(),
        FakeActivityLogger::new(),
        FakeClock::new(),
        SequentialIdGen::new("t"),
        Arc::new(config),
        PathBuf::from("/tmp/squadron-test"),
    );
    Harness { manager, registry, platform, llm }
}

fn issue(number: u64) -> IssueRef {
    IssueRef { number, title: "do the thing".to_string(), body: None, labels: vec![], state: "open".to_string() }
}

fn trigger(issue_id: u64) -> Event {
    Event::new(EventType::IssueAssigned, DeliveryId::new("d-1"), "maintainer").with_issue(issue_id)
}

#[tokio::test]
async fn create_agent_spawns_a_session_and_persists_an_active_agent() {
    let h = harness();
    h.platform.seed_issue(issue(1));

    let agent_id = h.manager.create_agent("developer", 1, &trigger(1), None).await.unwrap();
    assert_eq!(agent_id, AgentId::new("developer-1"));

    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
    assert_eq!(agent.branch, "feature/1");
    assert!(agent.session_id.is_some());
}

#[tokio::test]
async fn create_agent_is_idempotent_for_a_persistent_role_already_non_terminal() {
    let h = harness();
    h.platform.seed_issue(issue(2));

    let first = h.manager.create_agent("developer", 2, &trigger(2), None).await.unwrap();
    let second = h.manager.create_agent("developer", 2, &trigger(2), None).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.llm.calls().iter().filter(|c| matches!(c, LlmCall::CreateSession { .. })).count(), 1);
}

#[tokio::test]
async fn create_agent_replaces_a_stale_terminal_row() {
    let h = harness();
    h.platform.seed_issue(issue(3));

    let first = h.manager.create_agent("developer", 3, &trigger(3), None).await.unwrap();
    // Let the first agent's spawned turn task settle (a no-op ACTIVE->ACTIVE
    // post-turn pass) before completing it out from under that task.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.manager.report_complete(&first).await.unwrap();

    let second = h.manager.create_agent("developer", 3, &trigger(3), None).await.unwrap();
    assert_eq!(first, second);
    let agent = h.registry.get_agent(&second).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

#[tokio::test]
async fn ephemeral_singleton_role_reuses_the_active_instance() {
    let h = harness();
    h.platform.seed_issue(issue(4));
    h.platform.seed_issue(issue(5));

    let first = h.manager.create_agent("reviewer", 4, &trigger(4), None).await.unwrap();
    let second = h.manager.create_agent("reviewer", 5, &trigger(5), None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn wake_agent_requires_sleeping_status() {
    let h = harness();
    h.platform.seed_issue(issue(6));
    let agent_id = h.manager.create_agent("developer", 6, &trigger(6), None).await.unwrap();

    let err = h.manager.wake_agent(&agent_id, &trigger(6)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotSleeping(_)));
}

#[tokio::test]
async fn wake_agent_resumes_the_session_and_bumps_iteration_count() {
    let h = harness();
    h.platform.seed_issue(issue(7));
    let agent_id = h.manager.create_agent("developer", 7, &trigger(7), None).await.unwrap();
    h.manager.report_blocked(&agent_id, 99, "waiting on #99").await.unwrap();

    h.manager.wake_agent(&agent_id, &trigger(7)).await.unwrap();
    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
    assert_eq!(agent.iteration_count, 1);
    assert!(h.llm.calls().iter().any(|c| matches!(c, LlmCall::ResumeSession { .. })));
}

#[tokio::test]
async fn report_blocked_records_the_blocker_and_sleeps_the_agent() {
    let h = harness();
    h.platform.seed_issue(issue(8));
    let agent_id = h.manager.create_agent("developer", 8, &trigger(8), None).await.unwrap();

    h.manager.report_blocked(&agent_id, 42, "needs the schema merged first").await.unwrap();

    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Sleeping);
    assert!(agent.blocked_by.contains(&42));
    assert_eq!(h.registry.get_agents_blocked_by(42).unwrap(), vec![agent_id]);
    assert!(h.platform.calls().iter().any(|c| matches!(c, squadron_adapters::PlatformCall::CreateComment { body, .. } if body.contains("#42"))));
}

#[tokio::test]
async fn report_blocked_on_a_terminal_agent_is_rejected() {
    let h = harness();
    h.platform.seed_issue(issue(9));
    let agent_id = h.manager.create_agent("developer", 9, &trigger(9), None).await.unwrap();
    h.manager.report_complete(&agent_id).await.unwrap();

    let err = h.manager.report_blocked(&agent_id, 1, "too late").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Terminal(_)));
}

#[tokio::test]
async fn report_complete_marks_the_agent_completed() {
    let h = harness();
    h.platform.seed_issue(issue(10));
    let agent_id = h.manager.create_agent("developer", 10, &trigger(10), None).await.unwrap();

    h.manager.report_complete(&agent_id).await.unwrap();
    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Completed);
}

#[tokio::test]
async fn complete_agent_also_tears_down_handles() {
    let h = harness();
    h.platform.seed_issue(issue(11));
    let agent_id = h.manager.create_agent("developer", 11, &trigger(11), None).await.unwrap();

    h.manager.complete_agent(&agent_id).await.unwrap();
    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Completed);
    assert!(h.llm.deleted_sessions().contains(&agent.session_id.clone().unwrap()));
}

#[tokio::test]
async fn complete_agent_on_an_already_terminal_agent_is_rejected() {
    let h = harness();
    h.platform.seed_issue(issue(12));
    let agent_id = h.manager.create_agent("developer", 12, &trigger(12), None).await.unwrap();
    h.manager.complete_agent(&agent_id).await.unwrap();

    let err = h.manager.complete_agent(&agent_id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Terminal(_)));
}

#[tokio::test]
async fn sleep_agent_transitions_active_agent_and_tears_down_handles() {
    let h = harness();
    h.platform.seed_issue(issue(14));
    let agent_id = h.manager.create_agent("developer", 14, &trigger(14), None).await.unwrap();

    h.manager.sleep_agent(&agent_id).await.unwrap();
    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Sleeping);
    assert!(agent.session_id.is_some());
    assert!(!h.llm.deleted_sessions().contains(&agent.session_id.clone().unwrap()));
}

#[tokio::test]
async fn sleep_agent_on_an_already_terminal_agent_is_rejected() {
    let h = harness();
    h.platform.seed_issue(issue(15));
    let agent_id = h.manager.create_agent("developer", 15, &trigger(15), None).await.unwrap();
    h.manager.complete_agent(&agent_id).await.unwrap();

    let err = h.manager.sleep_agent(&agent_id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Terminal(_)));
}

#[tokio::test]
async fn check_for_events_drains_the_inbox_into_a_readable_summary() {
    let h = harness();
    h.platform.seed_issue(issue(13));
    let agent_id = h.manager.create_agent("developer", 13, &trigger(13), None).await.unwrap();

    assert_eq!(h.manager.check_for_events(&agent_id), "No pending events.");

    h.manager.inboxes().push(&agent_id, Event::new(EventType::IssueComment, DeliveryId::new("d-2"), "someone").with_issue(13));
    let summary = h.manager.check_for_events(&agent_id);
    assert!(summary.contains("1 pending event"));
    assert!(h.manager.check_for_events(&agent_id).contains("No pending"));
}

#[tokio::test]
async fn resolve_blocker_wakes_every_agent_blocked_on_the_resolved_issue() {
    let h = harness();
    h.platform.seed_issue(issue(20));
    h.platform.seed_issue(issue(21));
    let a = h.manager.create_agent("developer", 20, &trigger(20), None).await.unwrap();
    let b = h.manager.create_agent("developer", 21, &trigger(21), None).await.unwrap();
    h.manager.report_blocked(&a, 99, "shared dependency").await.unwrap();
    h.manager.report_blocked(&b, 99, "shared dependency").await.unwrap();

    let woken = h.manager.resolve_blocker(99, &trigger(99)).await.unwrap();
    assert_eq!(woken.len(), 2);
    assert!(woken.contains(&a));
    assert!(woken.contains(&b));
    for id in [a, b] {
        let agent = h.registry.get_agent(&id).unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Active);
        assert!(agent.blocked_by.is_empty());
    }
}

#[tokio::test]
async fn resolve_blocker_leaves_an_agent_asleep_if_another_blocker_remains() {
    let h = harness();
    h.platform.seed_issue(issue(22));
    let agent_id = h.manager.create_agent("developer", 22, &trigger(22), None).await.unwrap();
    h.manager.report_blocked(&agent_id, 10, "first").await.unwrap();
    h.registry.add_blocker(&agent_id, 11).unwrap();

    let woken = h.manager.resolve_blocker(10, &trigger(10)).await.unwrap();
    assert!(woken.is_empty());
    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Sleeping);
}

#[tokio::test]
async fn route_command_spawns_a_persistent_agent_on_first_mention() {
    let h = harness();
    h.platform.seed_issue(issue(30));
    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-3"), "maintainer")
        .with_issue(30)
        .with_command(squadron_core::Command::Route { role: "developer".to_string(), message: "please start".to_string() });

    h.manager.route_command(&event, None).await.unwrap();
    let agent = h.registry.get_agent(&AgentId::new("developer-30")).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

#[tokio::test]
async fn route_command_delivers_mail_to_an_already_active_agent() {
    let h = harness();
    h.platform.seed_issue(issue(31));
    let agent_id = h.manager.create_agent("developer", 31, &trigger(31), None).await.unwrap();

    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-4"), "maintainer")
        .with_issue(31)
        .with_payload(squadron_core::EventPayload { comment: Some(squadron_core::CommentDetail { comment_id: Some("c1".to_string()), body: "@squadron developer: also check the docs".to_string() }), ..Default::default() })
        .with_command(squadron_core::Command::Route { role: "developer".to_string(), message: "also check the docs".to_string() });

    h.manager.route_command(&event, None).await.unwrap();
    assert!(h.manager.mail_queues().has_pending(&agent_id));
}

#[tokio::test]
async fn route_command_resolves_a_registered_named_command_to_its_configured_role() {
    let mut cfg = config();
    cfg.commands.insert(
        "retry".to_string(),
        squadron_core::CommandDefinition { name: "retry".to_string(), role: Some("developer".to_string()), description: String::new() },
    );
    let h = harness_with_config(cfg);
    h.platform.seed_issue(issue(33));
    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-6"), "maintainer")
        .with_issue(33)
        .with_command(squadron_core::Command::Named { name: "retry".to_string(), message: String::new() });

    h.manager.route_command(&event, None).await.unwrap();
    let agent = h.registry.get_agent(&AgentId::new("developer-33")).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

#[tokio::test]
async fn route_command_unregistered_named_command_posts_an_error_without_spawning() {
    let h = harness();
    h.platform.seed_issue(issue(34));
    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-7"), "maintainer")
        .with_issue(34)
        .with_command(squadron_core::Command::Named { name: "bogus".to_string(), message: String::new() });

    h.manager.route_command(&event, None).await.unwrap();
    assert!(h.platform.calls().iter().any(|c| matches!(c, squadron_adapters::PlatformCall::CreateComment { body, .. } if body.contains("Unknown command"))));
    assert!(h.registry.list_non_terminal_agents().unwrap().is_empty());
}

#[tokio::test]
async fn route_command_help_posts_the_role_table_without_touching_any_agent() {
    let h = harness();
    h.platform.seed_issue(issue(32));
    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-5"), "maintainer")
        .with_issue(32)
        .with_command(squadron_core::Command::Help);

    h.manager.route_command(&event, None).await.unwrap();
    assert!(h.platform.calls().iter().any(|c| matches!(c, squadron_adapters::PlatformCall::CreateComment { body, .. } if body.contains("Available agents"))));
}

#[tokio::test]
async fn post_turn_completed_result_runs_cleanup_and_deletes_the_session() {
    let h = harness();
    h.platform.seed_issue(issue(40));
    h.llm.push_turn(TurnResult { output: "done".to_string(), tool_calls: 2, stop_reason: "end_turn".to_string() });
    let agent_id = h.manager.create_agent("developer", 40, &trigger(40), None).await.unwrap();
    h.manager.report_complete(&agent_id).await.unwrap();

    // Give the spawned turn task a chance to run its post-turn state machine.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Completed);
}

#[tokio::test]
async fn force_escalate_marks_the_agent_escalated_and_notifies() {
    let h = harness();
    h.platform.seed_issue(issue(50));
    let agent_id = h.manager.create_agent("developer", 50, &trigger(50), None).await.unwrap();

    h.manager.force_escalate(&agent_id, EnforcementLayer::CircuitBreaker, "max_tool_calls exceeded".to_string()).await;

    let agent = h.registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Escalated);
    assert!(h.platform.calls().iter().any(|c| matches!(c, squadron_adapters::PlatformCall::CreateComment { body, .. } if body.contains("escalated"))));
}
