// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations, tracked via SQLite's `user_version` pragma rather than
//! a migrations table — there is exactly one writer (the daemon process)
//! and no need for a separate ledger of which statements already ran.

use rusqlite::Connection;

use crate::error::RegistryError;

const CURRENT_VERSION: i64 = 2;

const V1: &str = r#"
CREATE TABLE agents (
    id TEXT PRIMARY KEY,
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    issue_id INTEGER,
    pr_id INTEGER,
    branch TEXT NOT NULL,
    worktree_path TEXT,
    session_id TEXT,
    turn_count INTEGER NOT NULL DEFAULT 0,
    tool_call_count INTEGER NOT NULL DEFAULT 0,
    iteration_count INTEGER NOT NULL DEFAULT 0,
    active_since INTEGER,
    sleeping_since INTEGER,
    last_updated INTEGER NOT NULL
);

CREATE INDEX idx_agents_issue_id ON agents(issue_id);
CREATE INDEX idx_agents_status ON agents(status);

CREATE TABLE agent_blockers (
    agent_id TEXT NOT NULL REFERENCES agents(id),
    issue_id INTEGER NOT NULL,
    PRIMARY KEY (agent_id, issue_id)
);

CREATE TABLE pipeline_runs (
    id TEXT PRIMARY KEY,
    pipeline_name TEXT NOT NULL,
    definition_snapshot TEXT NOT NULL,
    trigger_event TEXT NOT NULL,
    trigger_delivery_id TEXT NOT NULL,
    issue_id INTEGER,
    pr_id INTEGER,
    scope TEXT NOT NULL,
    parent_run_id TEXT REFERENCES pipeline_runs(id),
    parent_stage_id TEXT,
    nesting_depth INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    current_stage_id TEXT NOT NULL,
    context TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    error_message TEXT,
    error_stage_id TEXT
);

CREATE INDEX idx_pipeline_runs_pr_id ON pipeline_runs(pr_id);
CREATE INDEX idx_pipeline_runs_status ON pipeline_runs(status);

CREATE TABLE stage_runs (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
    stage_id TEXT NOT NULL,
    status TEXT NOT NULL,
    agent_id TEXT,
    branch_id TEXT,
    parent_stage_id TEXT,
    child_pipeline_run_id TEXT,
    outputs TEXT NOT NULL,
    error_message TEXT,
    attempt_number INTEGER NOT NULL DEFAULT 1,
    max_attempts INTEGER NOT NULL DEFAULT 1,
    started_at INTEGER NOT NULL,
    completed_at INTEGER
);

CREATE INDEX idx_stage_runs_run_id ON stage_runs(run_id);

CREATE TABLE gate_checks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stage_run_id TEXT NOT NULL REFERENCES stage_runs(id),
    check_type TEXT NOT NULL,
    check_config TEXT NOT NULL,
    passed INTEGER NOT NULL,
    message TEXT NOT NULL,
    data TEXT NOT NULL,
    checked_at INTEGER NOT NULL
);

CREATE INDEX idx_gate_checks_stage_run_id ON gate_checks(stage_run_id);

CREATE TABLE pr_approvals (
    pr_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    reviewer TEXT NOT NULL,
    review_id TEXT NOT NULL,
    state TEXT NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    recorded_at INTEGER NOT NULL,
    PRIMARY KEY (pr_id, role, reviewer)
);

CREATE TABLE seen_deliveries (
    delivery_id TEXT PRIMARY KEY,
    seen_at INTEGER NOT NULL
);
"#;

const V2: &str = r#"
CREATE TABLE pipeline_human_stage_state (
    stage_run_id TEXT PRIMARY KEY REFERENCES stage_runs(id),
    entry_notified_at INTEGER NOT NULL,
    last_reminder_at INTEGER,
    reminder_count INTEGER NOT NULL DEFAULT 0,
    assigned_users TEXT NOT NULL,
    completed_by TEXT,
    completed_action TEXT
);

CREATE TABLE pr_review_requirements (
    pr_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    required_count INTEGER NOT NULL,
    pipeline_run_id TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (pr_id, role)
);

CREATE TABLE pr_sequence_state (
    pr_id INTEGER PRIMARY KEY,
    current_role TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    pipeline_run_id TEXT
);
"#;

/// Bring `conn`'s schema up to `CURRENT_VERSION`, applying each numbered
/// migration script in turn — the registry must be usable by a freshly
/// started daemon against an existing file.
pub fn migrate(conn: &Connection) -> Result<(), RegistryError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        tracing::info!(from = version, to = 1, "applying registry schema migration");
        conn.execute_batch(V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    if version < 2 {
        tracing::info!(from = version.max(1), to = 2, "applying registry schema migration");
        conn.execute_batch(V2)?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    debug_assert_eq!(CURRENT_VERSION, 2, "add a migration branch above when bumping this");
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
