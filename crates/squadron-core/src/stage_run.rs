// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! StageRun: one attempt at executing a stage within a pipeline run.

use crate::id::{AgentId, PipelineRunId, StageRunId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    Pending,
    Running,
    Waiting,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl StageRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageRunStatus::Completed
                | StageRunStatus::Failed
                | StageRunStatus::Skipped
                | StageRunStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, StageRunStatus::Running | StageRunStatus::Waiting)
    }
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageRunStatus::Pending => "pending",
            StageRunStatus::Running => "running",
            StageRunStatus::Waiting => "waiting",
            StageRunStatus::Completed => "completed",
            StageRunStatus::Failed => "failed",
            StageRunStatus::Skipped => "skipped",
            StageRunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRun {
    pub id: StageRunId,
    pub run_id: PipelineRunId,
    pub stage_id: String,
    pub status: StageRunStatus,
    pub agent_id: Option<AgentId>,
    pub branch_id: Option<String>,
    pub parent_stage_id: Option<String>,
    pub child_pipeline_run_id: Option<PipelineRunId>,
    pub outputs: HashMap<String, serde_json::Value>,
    pub error_message: Option<String>,
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub started_at: u64,
    pub completed_at: Option<u64>,
}

impl StageRun {
    pub fn new(
        id: StageRunId,
        run_id: PipelineRunId,
        stage_id: impl Into<String>,
        max_attempts: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            run_id,
            stage_id: stage_id.into(),
            status: StageRunStatus::Pending,
            agent_id: None,
            branch_id: None,
            parent_stage_id: None,
            child_pipeline_run_id: None,
            outputs: HashMap::new(),
            error_message: None,
            attempt_number: 1,
            max_attempts,
            started_at: now_ms,
            completed_at: None,
        }
    }

    /// Build the next retry attempt as a fresh row.
    /// Retries never mutate a terminal row in place.
    pub fn retry(&self, id: StageRunId, now_ms: u64) -> Self {
        Self {
            id,
            run_id: self.run_id.clone(),
            stage_id: self.stage_id.clone(),
            status: StageRunStatus::Pending,
            agent_id: None,
            branch_id: self.branch_id.clone(),
            parent_stage_id: self.parent_stage_id.clone(),
            child_pipeline_run_id: None,
            outputs: HashMap::new(),
            error_message: None,
            attempt_number: self.attempt_number + 1,
            max_attempts: self.max_attempts,
            started_at: now_ms,
            completed_at: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempt_number < self.max_attempts
    }

    pub fn mark_running(&mut self) {
        self.status = StageRunStatus::Running;
    }

    pub fn mark_waiting(&mut self) {
        self.status = StageRunStatus::Waiting;
    }

    pub fn complete(&mut self, now_ms: u64) {
        self.status = StageRunStatus::Completed;
        self.completed_at = Some(now_ms);
    }

    pub fn fail(&mut self, message: impl Into<String>, now_ms: u64) {
        self.status = StageRunStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(now_ms);
    }

    pub fn skip(&mut self, now_ms: u64) {
        self.status = StageRunStatus::Skipped;
        self.completed_at = Some(now_ms);
    }

    pub fn cancel(&mut self, now_ms: u64) {
        self.status = StageRunStatus::Cancelled;
        self.completed_at = Some(now_ms);
    }
}

#[cfg(test)]
#[path = "stage_run_tests.rs"]
mod tests;
