// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human Stage State: the audit row a `human` stage records while it waits
//! on an out-of-scope human interface to call back with a completion
//! (`pipeline_human_stage_state`).

use crate::id::StageRunId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanStageState {
    pub stage_run_id: StageRunId,
    pub entry_notified_at: u64,
    pub last_reminder_at: Option<u64>,
    pub reminder_count: u32,
    pub assigned_users: Vec<String>,
    pub completed_by: Option<String>,
    pub completed_action: Option<String>,
}

impl HumanStageState {
    pub fn new(stage_run_id: StageRunId, assigned_users: Vec<String>, now_ms: u64) -> Self {
        Self {
            stage_run_id,
            entry_notified_at: now_ms,
            last_reminder_at: None,
            reminder_count: 0,
            assigned_users,
            completed_by: None,
            completed_action: None,
        }
    }

    pub fn record_reminder(&mut self, now_ms: u64) {
        self.last_reminder_at = Some(now_ms);
        self.reminder_count += 1;
    }

    pub fn complete(&mut self, completed_by: impl Into<String>, action: impl Into<String>) {
        self.completed_by = Some(completed_by.into());
        self.completed_action = Some(action.into());
    }

    pub fn is_completed(&self) -> bool {
        self.completed_by.is_some()
    }
}

#[cfg(test)]
#[path = "human_stage_tests.rs"]
mod tests;
