// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate Check Registry: pluggable named checks a `gate` stage evaluates.
//! Generic over the concrete [`PlatformApi`] adapter rather than
//! `Arc<dyn PlatformApi>` — `PlatformApi` requires `Clone`, which rules out
//! a trait object.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use squadron_adapters::PlatformApi;
use squadron_registry::Registry;

use crate::error::PipelineError;

/// Everything a gate check needs to evaluate itself: the forge adapter, the
/// registry (for checks like `pr_approval` that read prior state), and the
/// identifying context of the pipeline run that reached this stage.
pub struct GateContext<'a, P: PlatformApi> {
    pub platform: &'a P,
    pub registry: &'a Registry,
    pub pr_id: Option<u64>,
    pub issue_id: Option<u64>,
    pub working_dir: Option<&'a std::path::Path>,
    pub sha: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct GateCheckOutcome {
    pub passed: bool,
    pub message: String,
    pub data: Value,
}

impl GateCheckOutcome {
    fn pass(message: impl Into<String>, data: Value) -> Self {
        Self {
            passed: true,
            message: message.into(),
            data,
        }
    }

    fn fail(message: impl Into<String>, data: Value) -> Self {
        Self {
            passed: false,
            message: message.into(),
            data,
        }
    }
}

#[async_trait]
pub trait GateCheck<P: PlatformApi>: Send + Sync {
    async fn evaluate(&self, config: &Value, ctx: &GateContext<'_, P>) -> Result<GateCheckOutcome, PipelineError>;
}

/// Runs an arbitrary shell command in the stage's working directory; passes
/// iff it exits zero (the `command` gate check).
struct CommandCheck;

#[async_trait]
impl<P: PlatformApi> GateCheck<P> for CommandCheck {
    async fn evaluate(&self, config: &Value, ctx: &GateContext<'_, P>) -> Result<GateCheckOutcome, PipelineError> {
        let command = config
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidGateConfig("`command` gate config missing `command`".to_string()))?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = ctx.working_dir {
            cmd.current_dir(dir);
        }

        let output = squadron_adapters::subprocess::run_with_timeout(
            cmd,
            squadron_adapters::subprocess::GATE_COMMAND_TIMEOUT,
            "gate command check",
        )
        .await
        .map_err(PipelineError::GateCheckFailed)?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let data = serde_json::json!({"exit_code": output.status.code(), "stdout": stdout, "stderr": stderr});

        if output.status.success() {
            Ok(GateCheckOutcome::pass(format!("`{command}` exited 0"), data))
        } else {
            Ok(GateCheckOutcome::fail(format!("`{command}` exited {:?}", output.status.code()), data))
        }
    }
}

/// Passes iff a file exists relative to the stage's working directory (spec
/// §4.7, `file_exists` gate check).
struct FileExistsCheck;

#[async_trait]
impl<P: PlatformApi> GateCheck<P> for FileExistsCheck {
    async fn evaluate(&self, config: &Value, ctx: &GateContext<'_, P>) -> Result<GateCheckOutcome, PipelineError> {
        let relative = config
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidGateConfig("`file_exists` gate config missing `path`".to_string()))?;

        let full_path: PathBuf = match ctx.working_dir {
            Some(dir) => dir.join(relative),
            None => PathBuf::from(relative),
        };
        let exists = full_path.exists();
        let data = serde_json::json!({"path": full_path.to_string_lossy()});
        if exists {
            Ok(GateCheckOutcome::pass(format!("{relative} exists"), data))
        } else {
            Ok(GateCheckOutcome::fail(format!("{relative} does not exist"), data))
        }
    }
}

/// Passes iff the PR has the required non-stale approvals for a role (spec
/// §4.7, §4.8, `pr_approval` gate check).
struct PrApprovalCheck;

#[async_trait]
impl<P: PlatformApi> GateCheck<P> for PrApprovalCheck {
    async fn evaluate(&self, config: &Value, ctx: &GateContext<'_, P>) -> Result<GateCheckOutcome, PipelineError> {
        let Some(pr_id) = ctx.pr_id else {
            return Ok(GateCheckOutcome::fail("no PR associated with this run", Value::Null));
        };
        let role = config.get("role").and_then(Value::as_str);
        let required: u32 = config.get("required_count").and_then(Value::as_u64).unwrap_or(1) as u32;

        let count = ctx.registry.count_pr_approvals(pr_id, role)?;
        let data = serde_json::json!({"pr_id": pr_id, "role": role, "count": count, "required": required});
        if count >= required {
            Ok(GateCheckOutcome::pass(format!("{count}/{required} approvals"), data))
        } else {
            Ok(GateCheckOutcome::fail(format!("{count}/{required} approvals"), data))
        }
    }
}

/// Passes iff the combined CI status for the PR's head commit is `success`
/// (the `ci_status` gate check).
struct CiStatusCheck;

#[async_trait]
impl<P: PlatformApi> GateCheck<P> for CiStatusCheck {
    async fn evaluate(&self, _config: &Value, ctx: &GateContext<'_, P>) -> Result<GateCheckOutcome, PipelineError> {
        let Some(sha) = ctx.sha else {
            return Ok(GateCheckOutcome::fail("no commit sha associated with this run", Value::Null));
        };
        let status = ctx
            .platform
            .combined_status(sha)
            .await
            .map_err(|e| PipelineError::GateCheckFailed(e.to_string()))?;
        let data = serde_json::json!({"sha": sha, "state": status.state});
        if status.state == "success" {
            Ok(GateCheckOutcome::pass(format!("ci status {}", status.state), data))
        } else {
            Ok(GateCheckOutcome::fail(format!("ci status {}", status.state), data))
        }
    }
}

/// The named gate checks available to `gate` stages, keyed by `check_type`.
pub struct GateCheckRegistry<P: PlatformApi> {
    checks: HashMap<String, Box<dyn GateCheck<P>>>,
}

impl<P: PlatformApi> GateCheckRegistry<P> {
    pub fn with_builtins() -> Self {
        let mut checks: HashMap<String, Box<dyn GateCheck<P>>> = HashMap::new();
        checks.insert("command".to_string(), Box::new(CommandCheck));
        checks.insert("file_exists".to_string(), Box::new(FileExistsCheck));
        checks.insert("pr_approval".to_string(), Box::new(PrApprovalCheck));
        checks.insert("ci_status".to_string(), Box::new(CiStatusCheck));
        Self { checks }
    }

    pub fn register(&mut self, check_type: impl Into<String>, check: Box<dyn GateCheck<P>>) {
        self.checks.insert(check_type.into(), check);
    }

    pub async fn evaluate(
        &self,
        check_type: &str,
        config: &Value,
        ctx: &GateContext<'_, P>,
    ) -> Result<GateCheckOutcome, PipelineError> {
        let check = self
            .checks
            .get(check_type)
            .ok_or_else(|| PipelineError::UnknownGateCheck(check_type.to_string()))?;
        check.evaluate(config, ctx).await
    }
}

#[cfg(test)]
#[path = "gate_registry_tests.rs"]
mod tests;
