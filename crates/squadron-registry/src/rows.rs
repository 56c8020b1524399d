// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row <-> domain-struct conversions. Kept apart from `registry.rs` so the
//! SQL text stays next to the statements that use it, not buried in mapping
//! boilerplate.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rusqlite::Row;
use squadron_core::{
    Agent, AgentId, AgentStatus, DeliveryId, HumanStageState, PipelineRun, PipelineRunId,
    PipelineRunStatus, PipelineScope, PrSequenceState, SessionId, StageRun, StageRunId,
    StageRunStatus,
};

pub fn agent_status_to_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Created => "created",
        AgentStatus::Active => "active",
        AgentStatus::Sleeping => "sleeping",
        AgentStatus::Completed => "completed",
        AgentStatus::Escalated => "escalated",
        AgentStatus::Failed => "failed",
    }
}

pub fn agent_status_from_str(s: &str) -> rusqlite::Result<AgentStatus> {
    Ok(match s {
        "created" => AgentStatus::Created,
        "active" => AgentStatus::Active,
        "sleeping" => AgentStatus::Sleeping,
        "completed" => AgentStatus::Completed,
        "escalated" => AgentStatus::Escalated,
        "failed" => AgentStatus::Failed,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown agent status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

pub fn agent_from_row(row: &Row<'_>, blocked_by: BTreeSet<u64>) -> rusqlite::Result<Agent> {
    let status_str: String = row.get("status")?;
    let status = agent_status_from_str(&status_str)?;
    let worktree_path: Option<String> = row.get("worktree_path")?;
    let session_id: Option<String> = row.get("session_id")?;
    let issue_id: Option<i64> = row.get("issue_id")?;
    let pr_id: Option<i64> = row.get("pr_id")?;
    let active_since: Option<i64> = row.get("active_since")?;
    let sleeping_since: Option<i64> = row.get("sleeping_since")?;

    Ok(Agent {
        id: AgentId::new(row.get::<_, String>("id")?),
        role: row.get("role")?,
        status,
        issue_id: issue_id.map(|v| v as u64),
        pr_id: pr_id.map(|v| v as u64),
        branch: row.get("branch")?,
        worktree_path: worktree_path.map(PathBuf::from),
        session_id: session_id.map(SessionId::new),
        turn_count: row.get::<_, i64>("turn_count")? as u32,
        tool_call_count: row.get::<_, i64>("tool_call_count")? as u32,
        iteration_count: row.get::<_, i64>("iteration_count")? as u32,
        active_since: active_since.map(|v| v as u64),
        sleeping_since: sleeping_since.map(|v| v as u64),
        blocked_by,
        last_updated: row.get::<_, i64>("last_updated")? as u64,
    })
}

pub fn event_type_to_str(event_type: squadron_core::EventType) -> String {
    serde_json::to_value(event_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn scope_to_str(scope: PipelineScope) -> &'static str {
    match scope {
        PipelineScope::SinglePr => "single_pr",
        PipelineScope::Other => "other",
    }
}

pub fn scope_from_str(s: &str) -> PipelineScope {
    match s {
        "single_pr" => PipelineScope::SinglePr,
        _ => PipelineScope::Other,
    }
}

pub fn run_status_to_str(status: PipelineRunStatus) -> &'static str {
    match status {
        PipelineRunStatus::Pending => "pending",
        PipelineRunStatus::Running => "running",
        PipelineRunStatus::Completed => "completed",
        PipelineRunStatus::Failed => "failed",
        PipelineRunStatus::Escalated => "escalated",
        PipelineRunStatus::Cancelled => "cancelled",
    }
}

pub fn run_status_from_str(s: &str) -> PipelineRunStatus {
    match s {
        "running" => PipelineRunStatus::Running,
        "completed" => PipelineRunStatus::Completed,
        "failed" => PipelineRunStatus::Failed,
        "escalated" => PipelineRunStatus::Escalated,
        "cancelled" => PipelineRunStatus::Cancelled,
        _ => PipelineRunStatus::Pending,
    }
}

pub fn pipeline_run_from_row(row: &Row<'_>) -> rusqlite::Result<PipelineRun> {
    let definition_snapshot: String = row.get("definition_snapshot")?;
    let context: String = row.get("context")?;
    let trigger_event: String = row.get("trigger_event")?;
    let parent_run_id: Option<String> = row.get("parent_run_id")?;
    let issue_id: Option<i64> = row.get("issue_id")?;
    let pr_id: Option<i64> = row.get("pr_id")?;
    let started_at: Option<i64> = row.get("started_at")?;
    let completed_at: Option<i64> = row.get("completed_at")?;

    Ok(PipelineRun {
        id: PipelineRunId::new(row.get::<_, String>("id")?),
        pipeline_name: row.get("pipeline_name")?,
        definition_snapshot: serde_json::from_str(&definition_snapshot)
            .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
        trigger_event: serde_json::from_str(&format!("\"{trigger_event}\""))
            .unwrap_or(squadron_core::EventType::Unknown),
        trigger_delivery_id: DeliveryId::new(row.get::<_, String>("trigger_delivery_id")?),
        issue_id: issue_id.map(|v| v as u64),
        pr_id: pr_id.map(|v| v as u64),
        scope: scope_from_str(&row.get::<_, String>("scope")?),
        parent_run_id: parent_run_id.map(PipelineRunId::new),
        parent_stage_id: row.get("parent_stage_id")?,
        nesting_depth: row.get::<_, i64>("nesting_depth")? as u8,
        status: run_status_from_str(&row.get::<_, String>("status")?),
        current_stage_id: row.get("current_stage_id")?,
        context: serde_json::from_str(&context)
            .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
        created_at: row.get::<_, i64>("created_at")? as u64,
        started_at: started_at.map(|v| v as u64),
        completed_at: completed_at.map(|v| v as u64),
        error_message: row.get("error_message")?,
        error_stage_id: row.get("error_stage_id")?,
    })
}

pub fn stage_status_to_str(status: StageRunStatus) -> &'static str {
    match status {
        StageRunStatus::Pending => "pending",
        StageRunStatus::Running => "running",
        StageRunStatus::Waiting => "waiting",
        StageRunStatus::Completed => "completed",
        StageRunStatus::Failed => "failed",
        StageRunStatus::Skipped => "skipped",
        StageRunStatus::Cancelled => "cancelled",
    }
}

pub fn stage_status_from_str(s: &str) -> StageRunStatus {
    match s {
        "running" => StageRunStatus::Running,
        "waiting" => StageRunStatus::Waiting,
        "completed" => StageRunStatus::Completed,
        "failed" => StageRunStatus::Failed,
        "skipped" => StageRunStatus::Skipped,
        "cancelled" => StageRunStatus::Cancelled,
        _ => StageRunStatus::Pending,
    }
}

pub fn stage_run_from_row(row: &Row<'_>) -> rusqlite::Result<StageRun> {
    let outputs: String = row.get("outputs")?;
    let agent_id: Option<String> = row.get("agent_id")?;
    let branch_id: Option<String> = row.get("branch_id")?;
    let child_pipeline_run_id: Option<String> = row.get("child_pipeline_run_id")?;
    let started_at: i64 = row.get("started_at")?;
    let completed_at: Option<i64> = row.get("completed_at")?;

    Ok(StageRun {
        id: StageRunId::new(row.get::<_, String>("id")?),
        run_id: PipelineRunId::new(row.get::<_, String>("run_id")?),
        stage_id: row.get("stage_id")?,
        status: stage_status_from_str(&row.get::<_, String>("status")?),
        agent_id: agent_id.map(AgentId::new),
        branch_id,
        parent_stage_id: row.get("parent_stage_id")?,
        child_pipeline_run_id: child_pipeline_run_id.map(PipelineRunId::new),
        outputs: serde_json::from_str(&outputs)
            .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
        error_message: row.get("error_message")?,
        attempt_number: row.get::<_, i64>("attempt_number")? as u32,
        max_attempts: row.get::<_, i64>("max_attempts")? as u32,
        started_at: started_at as u64,
        completed_at: completed_at.map(|v| v as u64),
    })
}

pub fn human_stage_state_from_row(row: &Row<'_>) -> rusqlite::Result<HumanStageState> {
    let assigned_users: String = row.get("assigned_users")?;
    let last_reminder_at: Option<i64> = row.get("last_reminder_at")?;
    Ok(HumanStageState {
        stage_run_id: StageRunId::new(row.get::<_, String>("stage_run_id")?),
        entry_notified_at: row.get::<_, i64>("entry_notified_at")? as u64,
        last_reminder_at: last_reminder_at.map(|v| v as u64),
        reminder_count: row.get::<_, i64>("reminder_count")? as u32,
        assigned_users: serde_json::from_str(&assigned_users).unwrap_or_default(),
        completed_by: row.get("completed_by")?,
        completed_action: row.get("completed_action")?,
    })
}

pub fn pr_sequence_state_from_row(row: &Row<'_>) -> rusqlite::Result<PrSequenceState> {
    let pipeline_run_id: Option<String> = row.get("pipeline_run_id")?;
    Ok(PrSequenceState {
        pr_id: row.get::<_, i64>("pr_id")? as u64,
        current_role: row.get("current_role")?,
        sequence_index: row.get::<_, i64>("sequence_index")? as usize,
        pipeline_run_id: pipeline_run_id.map(PipelineRunId::new),
    })
}
