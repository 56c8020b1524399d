// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PR review bookkeeping: required reviewer roles, individual approval
//! records, and an optional enforced review sequence.

use crate::id::PipelineRunId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrReviewRequirement {
    pub pr_id: u64,
    pub role: String,
    pub required_count: u32,
    pub pipeline_run_id: Option<PipelineRunId>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrApproval {
    pub pr_id: u64,
    pub role: String,
    pub approved: bool,
    pub review_id: String,
    pub stale: bool,
    pub recorded_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrSequenceState {
    pub pr_id: u64,
    pub current_role: String,
    pub sequence_index: usize,
    pub pipeline_run_id: Option<PipelineRunId>,
}

/// Result of `checkPRMergeReady`: whether every required role has enough
/// non-stale approvals, and which roles are still short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReadiness {
    pub ready: bool,
    pub missing: Vec<String>,
}

/// Evaluate merge readiness given requirements and the current approval set.
/// Pure function so both the Registry and tests can share the exact
/// counting rule (non-stale approvals per role vs `required_count`).
pub fn evaluate_merge_readiness(
    requirements: &[PrReviewRequirement],
    approvals: &[PrApproval],
) -> MergeReadiness {
    let mut missing = Vec::new();
    for req in requirements {
        let count = approvals
            .iter()
            .filter(|a| a.role == req.role && a.approved && !a.stale)
            .count() as u32;
        if count < req.required_count {
            missing.push(format!("{}: {}/{}", req.role, count, req.required_count));
        }
    }
    MergeReadiness {
        ready: missing.is_empty(),
        missing,
    }
}

#[cfg(test)]
#[path = "pr_review_tests.rs"]
mod tests;
