// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PipelineRun: the runtime state of one pipeline trigger.

use crate::event::EventType;
use crate::id::{DeliveryId, PipelineRunId};
use crate::pipeline_def::PipelineScope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Hard cap on sub-pipeline nesting depth.
pub const MAX_NESTING_DEPTH: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Escalated,
    Cancelled,
}

impl PipelineRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineRunStatus::Completed
                | PipelineRunStatus::Failed
                | PipelineRunStatus::Escalated
                | PipelineRunStatus::Cancelled
        )
    }
}

impl fmt::Display for PipelineRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineRunStatus::Pending => "pending",
            PipelineRunStatus::Running => "running",
            PipelineRunStatus::Completed => "completed",
            PipelineRunStatus::Failed => "failed",
            PipelineRunStatus::Escalated => "escalated",
            PipelineRunStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: PipelineRunId,
    pub pipeline_name: String,
    /// Immutable JSON snapshot of the pipeline definition at trigger time.
    /// Stage advancement after creation refers only to this snapshot, never
    /// to the live definition — each run pins its own snapshot.
    pub definition_snapshot: serde_json::Value,
    pub trigger_event: EventType,
    pub trigger_delivery_id: DeliveryId,
    pub issue_id: Option<u64>,
    pub pr_id: Option<u64>,
    pub scope: PipelineScope,
    pub parent_run_id: Option<PipelineRunId>,
    pub parent_stage_id: Option<String>,
    pub nesting_depth: u8,
    pub status: PipelineRunStatus,
    pub current_stage_id: String,
    pub context: HashMap<String, serde_json::Value>,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub error_message: Option<String>,
    pub error_stage_id: Option<String>,
}

impl PipelineRun {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PipelineRunId,
        pipeline_name: impl Into<String>,
        definition_snapshot: serde_json::Value,
        trigger_event: EventType,
        trigger_delivery_id: DeliveryId,
        initial_stage_id: impl Into<String>,
        scope: PipelineScope,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            pipeline_name: pipeline_name.into(),
            definition_snapshot,
            trigger_event,
            trigger_delivery_id,
            issue_id: None,
            pr_id: None,
            scope,
            parent_run_id: None,
            parent_stage_id: None,
            nesting_depth: 0,
            status: PipelineRunStatus::Pending,
            current_stage_id: initial_stage_id.into(),
            context: HashMap::new(),
            created_at: now_ms,
            started_at: None,
            completed_at: None,
            error_message: None,
            error_stage_id: None,
        }
    }

    pub fn as_sub_pipeline(
        mut self,
        parent_run_id: PipelineRunId,
        parent_stage_id: impl Into<String>,
        parent_depth: u8,
    ) -> Self {
        self.parent_run_id = Some(parent_run_id);
        self.parent_stage_id = Some(parent_stage_id.into());
        self.nesting_depth = parent_depth + 1;
        self
    }

    pub fn start(&mut self, now_ms: u64) {
        self.status = PipelineRunStatus::Running;
        self.started_at = Some(now_ms);
    }

    pub fn advance_to(&mut self, stage_id: impl Into<String>) {
        self.current_stage_id = stage_id.into();
    }

    pub fn complete(&mut self, now_ms: u64) {
        self.status = PipelineRunStatus::Completed;
        self.completed_at = Some(now_ms);
    }

    pub fn fail(&mut self, stage_id: impl Into<String>, message: impl Into<String>, now_ms: u64) {
        self.status = PipelineRunStatus::Failed;
        self.error_stage_id = Some(stage_id.into());
        self.error_message = Some(message.into());
        self.completed_at = Some(now_ms);
    }

    pub fn escalate(&mut self, stage_id: impl Into<String>, message: impl Into<String>, now_ms: u64) {
        self.status = PipelineRunStatus::Escalated;
        self.error_stage_id = Some(stage_id.into());
        self.error_message = Some(message.into());
        self.completed_at = Some(now_ms);
    }

    pub fn cancel(&mut self, now_ms: u64) {
        self.status = PipelineRunStatus::Cancelled;
        self.completed_at = Some(now_ms);
    }

    pub fn would_exceed_nesting_cap(&self) -> bool {
        self.nesting_depth + 1 > MAX_NESTING_DEPTH
    }
}

#[cfg(test)]
#[path = "pipeline_run_tests.rs"]
mod tests;
