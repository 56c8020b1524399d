// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_adapters::{FakeActivityLogger, FakeGitWorktree, FakeLlmSessionFactory, FakePlatformApi, FakeSandbox, IssueRef};
use squadron_core::{
    AgentLifecycle, AgentTrigger, Command, DeliveryId, FakeClock, ProjectConfig, ReviewDetail,
    ReviewState, SequentialIdGen, TriggerAction,
};
use squadron_pipeline::spawn::{SpawnAgent, SpawnAgentError, SpawnAgentRequest};
use std::path::PathBuf;

type TestManager = AgentLifecycleManager<FakePlatformApi, FakeLlmSessionFactory, FakeGitWorktree, FakeSandbox, FakeActivityLogger, FakeClock, SequentialIdGen>;

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

fn config_with_roles(roles: HashMap<String, AgentRoleConfig>) -> Config {
    Config { project: ProjectConfig { name: "widget".to_string(), bot_username: "squadron".to_string(), ..ProjectConfig::default() }, agent_roles: roles, ..Config::default() }
}

fn manager_harness(config: Config) -> (Arc<TestManager>, Arc<Registry>, FakePlatformApi) {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let platform = FakePlatformApi::new();
    let manager = AgentLifecycleManager::new(
        registry.clone(),
        platform.clone(),
        FakeLlmSessionFactory::new(),
        FakeGitWorktree::new(),
        FakeSandbox::new(),
        FakeActivityLogger::new(),
        FakeClock::new(),
        SequentialIdGen::new("t"),
        Arc::new(config),
        PathBuf::from("/tmp/squadron-daemon-test"),
    );
    (manager, registry, platform)
}

fn issue(number: u64) -> IssueRef {
    IssueRef { number, title: "do the thing".to_string(), body: None, labels: vec![], state: "open".to_string() }
}

#[tokio::test]
async fn command_handler_spawns_a_persistent_agent_for_a_route_command() {
    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), developer_role());
    let (manager, registry, platform) = manager_harness(config_with_roles(roles));
    platform.seed_issue(issue(1));

    let handler = CommandHandler::new(manager, &config_with_roles({
        let mut r = HashMap::new();
        r.insert("developer".to_string(), developer_role());
        r
    }));

    let mut event = Event::new(EventType::IssueComment, DeliveryId::new("d-1"), "maintainer").with_issue(1);
    event.command = Some(Command::Route { role: "developer".to_string(), message: "go".to_string() });
    event.payload.comment = Some(squadron_core::CommentDetail { comment_id: Some("1".to_string()), body: "@squadron developer: go".to_string() });

    handler.handle(&event).await.unwrap();
    assert!(registry.get_agent(&squadron_core::AgentId::new("developer-1")).unwrap().is_some());
}

#[tokio::test]
async fn command_handler_ignores_events_with_no_command() {
    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), developer_role());
    let config = config_with_roles(roles);
    let (manager, registry, _platform) = manager_harness(config.clone());
    let handler = CommandHandler::new(manager, &config);

    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-2"), "maintainer").with_issue(1);
    handler.handle(&event).await.unwrap();
    assert!(registry.list_non_terminal_agents().unwrap().is_empty());
}

fn trigger_role(event: EventType, action: TriggerAction) -> AgentRoleConfig {
    AgentRoleConfig {
        agent_definition: "developer".to_string(),
        singleton: false,
        lifecycle: AgentLifecycle::Persistent,
        triggers: vec![AgentTrigger { event, label: None, action, condition: None }],
        subagents: vec![],
        branch_template: "feature/{issue_number}".to_string(),
    }
}

#[tokio::test]
async fn role_trigger_handler_spawns_on_matching_trigger() {
    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), trigger_role(EventType::IssueAssigned, TriggerAction::Spawn));
    let config = config_with_roles(roles);
    let (manager, registry, platform) = manager_harness(config.clone());
    platform.seed_issue(issue(2));

    let handler = RoleTriggerHandler::new(manager, registry.clone(), &config);
    let event = Event::new(EventType::IssueAssigned, DeliveryId::new("d-3"), "maintainer").with_issue(2);
    handler.handle(&event).await.unwrap();

    assert!(registry.get_agent(&squadron_core::AgentId::new("developer-2")).unwrap().is_some());
}

#[tokio::test]
async fn role_trigger_handler_wakes_a_sleeping_agent_of_the_matching_role() {
    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), trigger_role(EventType::IssueComment, TriggerAction::Wake));
    let config = config_with_roles(roles);
    let (manager, registry, platform) = manager_harness(config.clone());
    platform.seed_issue(issue(3));

    let create_trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-4"), "maintainer").with_issue(3);
    let agent_id = manager.create_agent("developer", 3, &create_trigger, None).await.unwrap();
    manager.report_blocked(&agent_id, 999, "waiting").await.unwrap();

    let handler = RoleTriggerHandler::new(manager.clone(), registry.clone(), &config);
    manager.resolve_blocker(999, &create_trigger).await.unwrap();
    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);

    manager.report_blocked(&agent_id, 1000, "waiting again").await.unwrap();
    let event = Event::new(EventType::IssueComment, DeliveryId::new("d-5"), "maintainer").with_issue(3);
    handler.handle(&event).await.unwrap();

    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

struct NullSpawner;

#[async_trait]
impl SpawnAgent for NullSpawner {
    async fn spawn_workflow_agent(&self, _req: SpawnAgentRequest) -> Result<squadron_core::AgentId, SpawnAgentError> {
        Err(SpawnAgentError::Rejected("not exercised in this test".to_string()))
    }
}

#[tokio::test]
async fn pipeline_trigger_handler_starts_a_run_on_matching_trigger() {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let mut pipelines = HashMap::new();
    let def = squadron_core::PipelineDef {
        name: "release".to_string(),
        description: String::new(),
        trigger: squadron_core::PipelineTrigger { event: EventType::PrOpened, label: None, any_of_labels: vec![], base_branch: None },
        default_context: HashMap::new(),
        stages: vec![squadron_core::StageDef {
            id: "wait".to_string(),
            condition: None,
            skip_to: None,
            transitions: squadron_core::StageTransitions::default(),
            config: squadron_core::StageConfig::Human(squadron_core::HumanStageConfig { assigned_users: vec![] }),
        }],
        on_events: HashMap::new(),
        scope: squadron_core::PipelineScope::SinglePr,
    };
    pipelines.insert(def.name.clone(), def);

    let engine = Arc::new(PipelineEngine::new(
        registry.clone(),
        FakePlatformApi::new(),
        FakeClock::new(),
        SequentialIdGen::new("t"),
        pipelines,
        Arc::new(NullSpawner),
    ));

    let handler = PipelineTriggerHandler::new(engine, registry.clone());
    let mut event = Event::new(EventType::PrOpened, DeliveryId::new("d-6"), "maintainer");
    event.pr_id = Some(7);
    handler.handle(&event).await.unwrap();

    assert_eq!(registry.list_active_pipeline_runs_for_pr(7).unwrap().len(), 1);
}

#[tokio::test]
async fn pr_review_handler_records_approval_and_auto_merges_when_ready() {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let platform = FakePlatformApi::new();
    platform.seed_pr(squadron_adapters::PrRef {
        number: 11,
        title: "widget".to_string(),
        body: None,
        head_branch: "feature/11".to_string(),
        base_branch: "main".to_string(),
        state: "open".to_string(),
        draft: false,
    });
    let mut config = Config::default();
    config.review_policy.default_requirements = vec![squadron_core::ReviewRequirement { role: "pr-review".to_string(), count: 1 }];
    config.review_policy.auto_merge.enabled = true;

    let handler = PrReviewHandler::new(platform.clone(), registry.clone(), FakeClock::new(), &config);
    let mut event = Event::new(EventType::PrReviewSubmitted, DeliveryId::new("d-7"), "squadron[bot]");
    event.pr_id = Some(11);
    event.payload.review = Some(ReviewDetail {
        state: Some(ReviewState::Approved),
        role: Some("pr-review".to_string()),
        review_id: Some("rev-1".to_string()),
        body: None,
    });

    handler.handle(&event).await.unwrap();

    assert_eq!(registry.count_pr_approvals(11, Some("pr-review")).unwrap(), 1);
    assert!(platform.calls().iter().any(|c| matches!(c, squadron_adapters::PlatformCall::MergePr { number, .. } if *number == 11)));
}

#[tokio::test]
async fn pr_review_handler_invalidates_approvals_on_synchronize() {
    let registry = Arc::new(Registry::open_in_memory().unwrap());
    let platform = FakePlatformApi::new();
    let config = Config::default();

    registry.record_pr_approval(12, "pr-review", "alice", "rev-2", ReviewState::Approved, 1).unwrap();
    let handler = PrReviewHandler::new(platform, registry.clone(), FakeClock::new(), &config);
    let mut event = Event::new(EventType::PrSynchronize, DeliveryId::new("d-8"), "maintainer");
    event.pr_id = Some(12);

    handler.handle(&event).await.unwrap();
    assert_eq!(registry.count_pr_approvals(12, Some("pr-review")).unwrap(), 0);
}

#[tokio::test]
async fn blocker_resolution_handler_wakes_agents_blocked_on_the_closed_issue() {
    let mut roles = HashMap::new();
    roles.insert("developer".to_string(), developer_role());
    let config = config_with_roles(roles);
    let (manager, registry, platform) = manager_harness(config);
    platform.seed_issue(issue(20));

    let trigger = Event::new(EventType::IssueAssigned, DeliveryId::new("d-9"), "maintainer").with_issue(20);
    let agent_id = manager.create_agent("developer", 20, &trigger, None).await.unwrap();
    manager.report_blocked(&agent_id, 21, "waiting on dependency").await.unwrap();

    let handler = BlockerResolutionHandler::new(manager.clone());
    let closed = Event::new(EventType::IssueClosed, DeliveryId::new("d-10"), "maintainer").with_issue(21);
    handler.handle(&closed).await.unwrap();

    let agent = registry.get_agent(&agent_id).unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}
