// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use squadron_core::PipelineRunId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("registry error: {0}")]
    Registry(#[from] squadron_registry::RegistryError),

    #[error("pipeline definition snapshot is malformed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("unknown pipeline {0}")]
    UnknownPipeline(String),

    #[error("unknown stage {stage} in pipeline run {run}")]
    UnknownStage { run: PipelineRunId, stage: String },

    #[error("unknown gate check type {0}")]
    UnknownGateCheck(String),

    #[error("unknown action {0}")]
    UnknownAction(String),

    #[error("sub-pipeline nesting depth exceeded at stage {stage} of run {run}")]
    NestingDepthExceeded { run: PipelineRunId, stage: String },

    #[error("spawn agent request rejected: {0}")]
    SpawnRejected(String),

    #[error("invalid duration literal: {0}")]
    InvalidDuration(String),

    #[error("gate check execution failed: {0}")]
    GateCheckFailed(String),

    #[error("invalid gate check config: {0}")]
    InvalidGateConfig(String),

    #[error("action execution failed: {0}")]
    ActionFailed(String),

    #[error("invalid action config: {0}")]
    InvalidActionConfig(String),
}
