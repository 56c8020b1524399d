// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_adapters::{FakeActivityLogger, FakeGitWorktree, FakeLlmSessionFactory, FakePlatformApi, FakeSandbox, IssueRef};
use squadron_core::{AgentLifecycle, AgentRoleConfig, CircuitBreakerConfig, CircuitBreakerDefaults, FakeClock, ProjectConfig, SequentialIdGen};
use squadron_pipeline::spawn::{SpawnAgent, SpawnAgentError, SpawnAgentRequest};
use std::collections::HashMap;
use std::path::PathBuf;

type TestManager = AgentLifecycleManager<FakePlatformApi, FakeLlmSessionFactory, FakeGitWorktree, FakeSandbox, FakeActivityLogger, FakeClock, SequentialIdGen>;
type TestEngine = PipelineEngine<FakePlatformApi, FakeClock, SequentialIdGen>;

struct NullSpawner;

#[async_trait::async_trait]
impl SpawnAgent for NullSpawner {
    async fn spawn_workflow_agent(&self, _req: SpawnAgentRequest) -> Result<squadron_core::AgentId, SpawnAgentError> {
        Err(SpawnAgentError::Rejected("not exercised in this test".to_string()))
    }
}

fn developer_role() -> AgentRoleConfig {
    AgentRoleConfig {
        agent_definition: "developer".to_string(),
        singleton: false,
        lifecycle: AgentLifecycle::Persistent,
        triggers: vec![],
        subagents: vec![],
        branch_template: "feature/{issue_number}".to_string(),
    }
}

fn issue(number: u64, state: &str) -> IssueRef {
    IssueRef { number, title: "do the thing".to_string(), body: None, labels: vec![], state: state.to_string() }
}

fn harness() -> (Arc<TestManager>, Arc<TestEngine>, Arc<Registry>, FakePlatformApi, FakeClock, Arc<Config>) {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let platform = FakePlatformApi::new();
    let clock = FakeClock::new();

    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), developer_role());
    let config = Arc::new(Config {
        project: ProjectConfig { name: "widget".to_string(), ..ProjectConfig::default() },
        agent_roles: roles,
        circuit_breakers: CircuitBreakerConfig {
            defaults: CircuitBreakerDefaults { max_active_duration_secs: 3600, ..CircuitBreakerDefaults::default() },
            roles: HashMap::new(),
        },
        ..Config::default()
    });

    let manager = AgentLifecycleManager::new(
        registry.clone(),
        platform.clone(),
        FakeLlmSessionFactory::new(),
        FakeGitWorktree::new(),
        FakeSandbox::new(),
        FakeActivityLogger::new(),
        clock.clone(),
        SequentialIdGen::new("t"),
        config.clone(),
        PathBuf::from("/tmp/squadron-reconciliation-test"),
    );

    let engine = Arc::new(PipelineEngine::new(
        registry.clone(),
        platform.clone(),
        clock.clone(),
        SequentialIdGen::new("t"),
        HashMap::new(),
        Arc::new(NullSpawner),
    ));

    (manager, engine, registry, platform, clock, config)
}

#[tokio::test]
async fn completes_an_agent_whose_issue_closed_out_from_under_it() {
    let (manager, engine, registry, platform, clock, config) = harness();
    platform.seed_issue(issue(1, "open"));
    let trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-1"), "maintainer").with_issue(1);
    let agent_id = manager.create_agent("developer", 1, &trigger, None).await.unwrap();

    platform.seed_issue(issue(1, "closed"));
    let loop_ = ReconciliationLoop::new(manager.clone(), engine, registry.clone(), platform, clock, config);
    let report = loop_.run_once().await;

    assert_eq!(report.completed, vec![agent_id.as_str().to_string()]);
    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Completed);
}

#[tokio::test]
async fn escalates_an_active_agent_whose_watchdog_should_have_fired_already() {
    let (manager, engine, registry, platform, clock, config) = harness();
    platform.seed_issue(issue(2, "open"));
    let trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-2"), "maintainer").with_issue(2);
    let agent_id = manager.create_agent("developer", 2, &trigger, None).await.unwrap();

    clock.advance(std::time::Duration::from_secs(3601));
    let loop_ = ReconciliationLoop::new(manager.clone(), engine, registry.clone(), platform, clock, config);
    let report = loop_.run_once().await;

    assert_eq!(report.escalated_for_missed_watchdog, vec![agent_id.as_str().to_string()]);
    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Escalated);
}

#[tokio::test]
async fn wakes_an_agent_whose_blocking_issue_closed() {
    let (manager, engine, registry, platform, clock, config) = harness();
    platform.seed_issue(issue(3, "open"));
    let trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-3"), "maintainer").with_issue(3);
    let agent_id = manager.create_agent("developer", 3, &trigger, None).await.unwrap();
    manager.report_blocked(&agent_id, 99, "waiting on a dependency").await.unwrap();

    platform.seed_issue(issue(99, "closed"));
    let loop_ = ReconciliationLoop::new(manager.clone(), engine, registry.clone(), platform, clock, config);
    let report = loop_.run_once().await;

    assert_eq!(report.unblocked, vec![agent_id.as_str().to_string()]);
    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

#[tokio::test]
async fn leaves_a_healthy_active_agent_alone() {
    let (manager, engine, registry, platform, clock, config) = harness();
    platform.seed_issue(issue(4, "open"));
    let trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-4"), "maintainer").with_issue(4);
    let agent_id = manager.create_agent("developer", 4, &trigger, None).await.unwrap();

    let loop_ = ReconciliationLoop::new(manager.clone(), engine, registry.clone(), platform, clock, config);
    let report = loop_.run_once().await;

    assert!(report.completed.is_empty());
    assert!(report.escalated_for_missed_watchdog.is_empty());
    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}
