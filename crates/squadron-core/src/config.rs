// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed-set configuration schema consumed by the core.
//!
//! Loading these structures from a file, a secret store, or a CLI flag is
//! out of scope — callers populate a `Config` however
//! they like and hand it to the daemon wiring.

use crate::event::EventType;
use crate::pipeline_def::PipelineDef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub bot_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOverride {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Per-role model/provider override, layered over the project default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: u32,
    #[serde(default = "default_reconciliation_interval")]
    pub reconciliation_interval_secs: u64,
    #[serde(default)]
    pub sparse_checkout: bool,
    pub worktree_dir: String,
    pub default_model: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Per-role model/provider override (supplemented, §D.1).
    #[serde(default)]
    pub models: HashMap<String, ModelOverride>,
}

fn default_max_concurrent_agents() -> u32 {
    4
}

fn default_reconciliation_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerDefaults {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_max_active_duration")]
    pub max_active_duration_secs: u64,
    #[serde(default = "default_max_sleep_duration")]
    pub max_sleep_duration_secs: u64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

// Defaults for the circuit breaker's iteration/tool-call/duration caps.
fn default_max_iterations() -> u32 {
    50
}
fn default_max_tool_calls() -> u32 {
    200
}
fn default_max_turns() -> u32 {
    100
}
fn default_max_active_duration() -> u64 {
    7200
}
fn default_max_sleep_duration() -> u64 {
    86400
}
fn default_warning_threshold() -> f64 {
    0.80
}

impl Default for CircuitBreakerDefaults {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tool_calls: default_max_tool_calls(),
            max_turns: default_max_turns(),
            max_active_duration_secs: default_max_active_duration(),
            max_sleep_duration_secs: default_max_sleep_duration(),
            warning_threshold: default_warning_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub defaults: CircuitBreakerDefaults,
    /// Sparse per-role overrides; unset fields fall back to `defaults`.
    #[serde(default)]
    pub roles: HashMap<String, CircuitBreakerOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitBreakerOverride {
    pub max_iterations: Option<u32>,
    pub max_tool_calls: Option<u32>,
    pub max_turns: Option<u32>,
    pub max_active_duration_secs: Option<u64>,
    pub max_sleep_duration_secs: Option<u64>,
    pub warning_threshold: Option<f64>,
}

impl CircuitBreakerConfig {
    /// Resolve the effective limits for a role, defaults overridden field by
    /// field (`circuit_breakers.defaults` with per-role overrides).
    pub fn resolve(&self, role: &str) -> CircuitBreakerDefaults {
        let base = self.defaults.clone();
        let Some(over) = self.roles.get(role) else {
            return base;
        };
        CircuitBreakerDefaults {
            max_iterations: over.max_iterations.unwrap_or(base.max_iterations),
            max_tool_calls: over.max_tool_calls.unwrap_or(base.max_tool_calls),
            max_turns: over.max_turns.unwrap_or(base.max_turns),
            max_active_duration_secs: over
                .max_active_duration_secs
                .unwrap_or(base.max_active_duration_secs),
            max_sleep_duration_secs: over
                .max_sleep_duration_secs
                .unwrap_or(base.max_sleep_duration_secs),
            warning_threshold: over.warning_threshold.unwrap_or(base.warning_threshold),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    Spawn,
    Wake,
    Complete,
    Sleep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrigger {
    pub event: EventType,
    #[serde(default)]
    pub label: Option<String>,
    pub action: TriggerAction,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycle {
    Ephemeral,
    Persistent,
    Stateful,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRoleConfig {
    pub agent_definition: String,
    #[serde(default)]
    pub singleton: bool,
    pub lifecycle: AgentLifecycle,
    #[serde(default)]
    pub triggers: Vec<AgentTrigger>,
    #[serde(default)]
    pub subagents: Vec<String>,
    pub branch_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchNamingConfig {
    pub feature: String,
    pub bugfix: String,
    pub security: String,
    pub docs: String,
    pub infra: String,
    pub hotfix: String,
}

impl BranchNamingConfig {
    /// Render a template containing a `{issue_number}` placeholder.
    pub fn render(template: &str, issue_number: u64) -> String {
        template.replace("{issue_number}", &issue_number.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequirement {
    pub role: String,
    #[serde(default = "default_review_count")]
    pub count: u32,
}

fn default_review_count() -> u32 {
    1
}

/// A label/path match paired with the reviewer requirements it triggers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCondition {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRule {
    #[serde(rename = "match")]
    pub match_condition: MatchCondition,
    pub requirements: Vec<ReviewRequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoMergeConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynchronizeConfig {
    #[serde(default = "default_true")]
    pub invalidate_approvals: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPolicyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub default_requirements: Vec<ReviewRequirement>,
    /// Supplemented: label/path-matched reviewer overrides (§D.2).
    #[serde(default)]
    pub rules: Vec<ReviewRule>,
    #[serde(default)]
    pub auto_merge: AutoMergeConfig,
    #[serde(default)]
    pub on_synchronize: SynchronizeConfig,
}

impl Default for ReviewPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_requirements: vec![ReviewRequirement {
                role: "pr-review".to_string(),
                count: 1,
            }],
            rules: vec![],
            auto_merge: AutoMergeConfig::default(),
            on_synchronize: SynchronizeConfig::default(),
        }
    }
}

impl ReviewPolicyConfig {
    /// Resolve the requirement set for a PR given its labels (rules first
    /// match wins; falls back to `default_requirements`).
    pub fn requirements_for(&self, labels: &[String]) -> &[ReviewRequirement] {
        for rule in &self.rules {
            if rule.match_condition.labels.iter().any(|l| labels.contains(l)) {
                return &rule.requirements;
            }
        }
        &self.default_requirements
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default)]
    pub default_notify: Vec<String>,
    #[serde(default = "default_escalation_labels")]
    pub escalation_labels: Vec<String>,
    /// Supplemented from `EscalationConfig.labels_to_add` (§D.3): applied to
    /// the issue/PR alongside the escalation comment.
    #[serde(default = "default_escalation_labels")]
    pub labels_to_add: Vec<String>,
    #[serde(default = "default_max_issue_depth")]
    pub max_issue_depth: u32,
}

fn default_escalation_labels() -> Vec<String> {
    vec!["needs-human".to_string(), "escalation".to_string()]
}

fn default_max_issue_depth() -> u32 {
    3
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            default_notify: vec![],
            escalation_labels: default_escalation_labels(),
            labels_to_add: default_escalation_labels(),
            max_issue_depth: default_max_issue_depth(),
        }
    }
}

/// Supplemented (§D.4): a named, role-scoped command beyond the bare
/// `@bot <role>: <message>` / `@bot help` forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
    #[serde(default)]
    pub circuit_breakers: CircuitBreakerConfig,
    #[serde(default)]
    pub agent_roles: HashMap<String, AgentRoleConfig>,
    pub branch_naming: Option<BranchNamingConfig>,
    #[serde(default)]
    pub review_policy: ReviewPolicyConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// `workflows[name]` in the original config schema; `pipelines` is the
    /// current name, kept
    /// as a serde alias since both name the same concept (GLOSSARY).
    #[serde(default, alias = "workflows")]
    pub pipelines: HashMap<String, PipelineDef>,
    /// Supplemented (§D.4).
    #[serde(default)]
    pub commands: HashMap<String, CommandDefinition>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            owner: String::new(),
            repo: String::new(),
            default_branch: "main".to_string(),
            bot_username: "squadron".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
