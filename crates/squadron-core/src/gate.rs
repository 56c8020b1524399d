// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GateCheckRecord: per-condition evaluation audit trail for gate stages.

use crate::id::StageRunId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheckRecord {
    pub stage_run_id: StageRunId,
    pub check_type: String,
    pub check_config: serde_json::Value,
    pub passed: bool,
    pub message: String,
    pub data: serde_json::Value,
    pub checked_at: u64,
}

impl GateCheckRecord {
    pub fn new(
        stage_run_id: StageRunId,
        check_type: impl Into<String>,
        check_config: serde_json::Value,
        passed: bool,
        message: impl Into<String>,
        data: serde_json::Value,
        checked_at: u64,
    ) -> Self {
        Self {
            stage_run_id,
            check_type: check_type.into(),
            check_config,
            passed,
            message: message.into(),
            data,
            checked_at,
        }
    }
}
