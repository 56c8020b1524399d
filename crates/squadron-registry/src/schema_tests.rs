// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn migrate_is_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();
    migrate(&conn).unwrap();
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
    assert_eq!(version, 2);
}

#[test]
fn migrate_creates_expected_tables() {
    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for expected in [
        "agent_blockers",
        "agents",
        "gate_checks",
        "pipeline_human_stage_state",
        "pipeline_runs",
        "pr_approvals",
        "pr_review_requirements",
        "pr_sequence_state",
        "seen_deliveries",
        "stage_runs",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }
}
