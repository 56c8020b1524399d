// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static pipeline definitions. A `PipelineDef` is immutable
//! config data; `squadron-pipeline` is the crate that executes it. Kept in
//! `squadron-core` because `Config::workflows` is a map of these.

use crate::event::EventType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel transition targets, plus an explicit named stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTarget {
    Stage(String),
    /// `__complete__`
    Complete,
    /// `__escalate__`
    Escalate,
}

/// A condition attached to a stage, gating whether it runs at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    LabelsInclude(String),
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    /// Evaluate against the current label set on the triggering issue/PR.
    pub fn matches(&self, labels: &[String]) -> bool {
        match self {
            Condition::LabelsInclude(label) => labels.iter().any(|l| l == label),
            Condition::Any(conds) => conds.iter().any(|c| c.matches(labels)),
            Condition::All(conds) => conds.iter().all(|c| c.matches(labels)),
        }
    }
}

/// Retry policy attached to `on_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorTransition {
    #[serde(default)]
    pub retry: u32,
    pub then: TransitionTarget,
}

/// Escape hatch for a transition that would otherwise loop forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationLimit {
    pub max_iterations: u32,
    pub then: TransitionTarget,
}

/// Transitions declared on a stage. Any transition left unset resolves to
/// the implicit `__next__` (next stage in definition order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTransitions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<TransitionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_pass: Option<TransitionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<TransitionTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ErrorTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_limit: Option<IterationLimit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheckConfig {
    pub check_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Event types this check should be re-evaluated against when they
    /// arrive as a reactive `on_events` trigger.
    #[serde(default)]
    pub reactive_to: Vec<EventType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStageConfig {
    pub role: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub continue_session: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStageConfig {
    pub checks: Vec<GateCheckConfig>,
    /// Disjunctive semantics: pass if any check passes rather than all.
    #[serde(default)]
    pub any_of: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStageConfig {
    pub action: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub on_conflict: Option<TransitionTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayStageConfig {
    /// `Ns`/`Nm`/`Nh` literal, parsed with `duration_fmt::parse_duration`.
    pub duration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumanStageConfig {
    #[serde(default)]
    pub assigned_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchDef {
    pub id: String,
    pub stages: Vec<StageDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelStageConfig {
    pub branches: Vec<BranchDef>,
    #[serde(default)]
    pub on_any_reject: Option<TransitionTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPipelineStageConfig {
    pub pipeline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Agent(AgentStageConfig),
    Gate(GateStageConfig),
    Action(ActionStageConfig),
    Delay(DelayStageConfig),
    Human(HumanStageConfig),
    Parallel(ParallelStageConfig),
    Pipeline(SubPipelineStageConfig),
}

impl StageConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            StageConfig::Agent(_) => "agent",
            StageConfig::Gate(_) => "gate",
            StageConfig::Action(_) => "action",
            StageConfig::Delay(_) => "delay",
            StageConfig::Human(_) => "human",
            StageConfig::Parallel(_) => "parallel",
            StageConfig::Pipeline(_) => "pipeline",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub id: String,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub skip_to: Option<TransitionTarget>,
    #[serde(default)]
    pub transitions: StageTransitions,
    #[serde(flatten)]
    pub config: StageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTrigger {
    pub event: EventType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub any_of_labels: Vec<String>,
    #[serde(default)]
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OnEventAction {
    Cancel,
    ReevaluateGates,
    InvalidateAndRestart {
        #[serde(default)]
        cancel_stages: Vec<String>,
        restart_from: Option<String>,
    },
    /// Out-of-scope placeholder.
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineScope {
    SinglePr,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trigger: PipelineTrigger,
    #[serde(default)]
    pub default_context: HashMap<String, serde_json::Value>,
    pub stages: Vec<StageDef>,
    #[serde(default)]
    pub on_events: HashMap<EventType, OnEventAction>,
    #[serde(default = "default_scope")]
    pub scope: PipelineScope,
}

fn default_scope() -> PipelineScope {
    PipelineScope::Other
}

impl PipelineDef {
    pub fn first_stage_id(&self) -> Option<&str> {
        self.stages.first().map(|s| s.id.as_str())
    }

    pub fn get_stage(&self, id: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Resolve `__next__`: the stage following `current` in definition order.
    pub fn next_stage_id(&self, current: &str) -> Option<&str> {
        let idx = self.stages.iter().position(|s| s.id == current)?;
        self.stages.get(idx + 1).map(|s| s.id.as_str())
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
#[path = "pipeline_def_tests.rs"]
mod tests;
