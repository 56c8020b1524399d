// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Registry: the single transactional store of record for agents,
//! pipeline runs, stage runs, gate check history, PR approvals and
//! delivery dedup.
//!
//! Backed by SQLite in WAL mode behind a [`parking_lot::Mutex`] — one
//! writer at a time, matching the single-process daemon this serves.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use squadron_core::{
    evaluate_merge_readiness, Agent, AgentId, DeliveryId, GateCheckRecord, HumanStageState,
    MergeReadiness, PipelineRun, PipelineRunId, PrApproval, PrReviewRequirement, PrSequenceState,
    ReviewState, StageRun, StageRunId,
};

use crate::error::RegistryError;
use crate::rows;

pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RegistryError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        crate::schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // ---- agents ---------------------------------------------------------

    pub fn create_agent(&self, agent: &Agent) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        Self::upsert_agent_row(&conn, agent)?;
        Self::replace_blockers(&conn, &agent.id, &agent.blocked_by)?;
        Ok(())
    }

    pub fn update_agent(&self, agent: &Agent) -> Result<(), RegistryError> {
        self.create_agent(agent)
    }

    fn upsert_agent_row(conn: &Connection, agent: &Agent) -> Result<(), RegistryError> {
        conn.execute(
            "INSERT INTO agents (
                id, role, status, issue_id, pr_id, branch, worktree_path, session_id,
                turn_count, tool_call_count, iteration_count, active_since, sleeping_since,
                last_updated
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                role = excluded.role,
                status = excluded.status,
                issue_id = excluded.issue_id,
                pr_id = excluded.pr_id,
                branch = excluded.branch,
                worktree_path = excluded.worktree_path,
                session_id = excluded.session_id,
                turn_count = excluded.turn_count,
                tool_call_count = excluded.tool_call_count,
                iteration_count = excluded.iteration_count,
                active_since = excluded.active_since,
                sleeping_since = excluded.sleeping_since,
                last_updated = excluded.last_updated",
            params![
                agent.id.as_str(),
                agent.role,
                rows::agent_status_to_str(agent.status),
                agent.issue_id.map(|v| v as i64),
                agent.pr_id.map(|v| v as i64),
                agent.branch,
                agent.worktree_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                agent.session_id.as_ref().map(|s| s.as_str().to_string()),
                agent.turn_count as i64,
                agent.tool_call_count as i64,
                agent.iteration_count as i64,
                agent.active_since.map(|v| v as i64),
                agent.sleeping_since.map(|v| v as i64),
                agent.last_updated as i64,
            ],
        )?;
        Ok(())
    }

    fn replace_blockers(conn: &Connection, agent_id: &AgentId, blockers: &BTreeSet<u64>) -> Result<(), RegistryError> {
        conn.execute("DELETE FROM agent_blockers WHERE agent_id = ?1", params![agent_id.as_str()])?;
        for issue_id in blockers {
            conn.execute(
                "INSERT INTO agent_blockers (agent_id, issue_id) VALUES (?1, ?2)",
                params![agent_id.as_str(), *issue_id as i64],
            )?;
        }
        Ok(())
    }

    pub fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, RegistryError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row("SELECT * FROM agents WHERE id = ?1", params![id.as_str()], |row| {
                rows::agent_from_row(row, BTreeSet::new())
            })
            .optional()?;
        let Some(mut agent) = row else { return Ok(None) };
        agent.blocked_by = Self::blockers_of(&conn, id)?;
        Ok(Some(agent))
    }

    pub fn get_agent_by_issue(&self, issue_id: u64) -> Result<Option<Agent>, RegistryError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT * FROM agents WHERE issue_id = ?1",
                params![issue_id as i64],
                |row| rows::agent_from_row(row, BTreeSet::new()),
            )
            .optional()?;
        let Some(mut agent) = row else { return Ok(None) };
        agent.blocked_by = Self::blockers_of(&conn, &agent.id)?;
        Ok(Some(agent))
    }

    fn blockers_of(conn: &Connection, agent_id: &AgentId) -> Result<BTreeSet<u64>, RegistryError> {
        let mut stmt = conn.prepare("SELECT issue_id FROM agent_blockers WHERE agent_id = ?1")?;
        let issues = stmt
            .query_map(params![agent_id.as_str()], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|v| v as u64))
            .collect::<Result<BTreeSet<u64>, _>>()?;
        Ok(issues)
    }

    /// Add `issue_id` as a blocker on `agent_id`, rejecting if it would
    /// create a cycle in the blocked-by graph (mirrors
    /// `AgentError::BlockerCycle`).
    pub fn add_blocker(&self, agent_id: &AgentId, issue_id: u64) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        if Self::would_create_cycle(&conn, agent_id, issue_id)? {
            tracing::warn!(%agent_id, issue_id, "rejected blocker: would create a cycle");
            return Err(RegistryError::BlockerCycle {
                agent_id: agent_id.to_string(),
                issue_id,
            });
        }
        conn.execute(
            "INSERT OR IGNORE INTO agent_blockers (agent_id, issue_id) VALUES (?1, ?2)",
            params![agent_id.as_str(), issue_id as i64],
        )?;
        Ok(())
    }

    pub fn remove_blocker(&self, agent_id: &AgentId, issue_id: u64) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM agent_blockers WHERE agent_id = ?1 AND issue_id = ?2",
            params![agent_id.as_str(), issue_id as i64],
        )?;
        Ok(())
    }

    /// Agents with `issue_id` in their blocked-by set — the wake candidates
    /// when that issue closes.
    pub fn get_agents_blocked_by(&self, issue_id: u64) -> Result<Vec<AgentId>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT agent_id FROM agent_blockers WHERE issue_id = ?1")?;
        let ids = stmt
            .query_map(params![issue_id as i64], |row| row.get::<_, String>(0))?
            .map(|r| r.map(AgentId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// BFS over the blocked-by graph: would adding `new_issue_id` to
    /// `agent_id`'s blockers let a chain of blockers loop back to an issue
    /// `agent_id` itself owns?
    fn would_create_cycle(conn: &Connection, agent_id: &AgentId, new_issue_id: u64) -> Result<bool, RegistryError> {
        let own_issue: Option<i64> = conn
            .query_row("SELECT issue_id FROM agents WHERE id = ?1", params![agent_id.as_str()], |row| row.get(0))
            .optional()?
            .flatten();
        let Some(own_issue) = own_issue else { return Ok(false) };

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(new_issue_id as i64);

        while let Some(issue) = queue.pop_front() {
            if issue == own_issue {
                return Ok(true);
            }
            if !visited.insert(issue) {
                continue;
            }
            let owner: Option<String> = conn
                .query_row("SELECT id FROM agents WHERE issue_id = ?1", params![issue], |row| row.get(0))
                .optional()?;
            let Some(owner) = owner else { continue };
            let mut stmt = conn.prepare("SELECT issue_id FROM agent_blockers WHERE agent_id = ?1")?;
            let next: Vec<i64> = stmt
                .query_map(params![owner], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            queue.extend(next);
        }
        Ok(false)
    }

    /// Remove a terminal agent's row entirely. Required before re-inserting a
    /// fresh row under the same id — terminal rows are never overwritten
    /// in place.
    pub fn delete_agent(&self, id: &AgentId) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM agent_blockers WHERE agent_id = ?1", params![id.as_str()])?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![id.as_str()])?;
        Ok(())
    }

    /// Agents not yet in a terminal status — the reconciliation loop's
    /// working set for the periodic platform-truth sweep.
    pub fn list_non_terminal_agents(&self) -> Result<Vec<Agent>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM agents WHERE status NOT IN ('completed', 'escalated', 'failed')",
        )?;
        let mut agents = stmt
            .query_map([], |row| rows::agent_from_row(row, BTreeSet::new()))?
            .collect::<Result<Vec<_>, _>>()?;
        for agent in &mut agents {
            agent.blocked_by = Self::blockers_of(&conn, &agent.id)?;
        }
        Ok(agents)
    }

    // ---- PR approvals -----------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn record_pr_approval(
        &self,
        pr_id: u64,
        role: &str,
        reviewer: &str,
        review_id: &str,
        state: ReviewState,
        now_ms: u64,
    ) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        let state_str = match state {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes_requested",
            ReviewState::Commented => "commented",
        };
        conn.execute(
            "INSERT INTO pr_approvals (pr_id, role, reviewer, review_id, state, stale, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
             ON CONFLICT(pr_id, role, reviewer) DO UPDATE SET
                review_id = excluded.review_id, state = excluded.state, stale = 0,
                recorded_at = excluded.recorded_at",
            params![pr_id as i64, role, reviewer, review_id, state_str, now_ms as i64],
        )?;
        Ok(())
    }

    /// Mark every recorded approval on `pr_id` stale on a new `synchronize`.
    pub fn invalidate_pr_approvals(&self, pr_id: u64) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE pr_approvals SET stale = 1 WHERE pr_id = ?1", params![pr_id as i64])?;
        Ok(())
    }

    /// `requirements` are `(role, required_count)` pairs, typically resolved
    /// from `ReviewPolicyConfig::requirements_for` for this PR's labels.
    pub fn check_pr_merge_ready(
        &self,
        pr_id: u64,
        requirements: &[(String, u32)],
    ) -> Result<MergeReadiness, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT role, review_id, state, stale FROM pr_approvals WHERE pr_id = ?1")?;
        let approvals = stmt
            .query_map(params![pr_id as i64], |row| {
                let role: String = row.get(0)?;
                let review_id: String = row.get(1)?;
                let state: String = row.get(2)?;
                let stale: i64 = row.get(3)?;
                Ok(PrApproval {
                    pr_id,
                    role,
                    approved: state == "approved",
                    review_id,
                    stale: stale != 0,
                    recorded_at: 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let requirements: Vec<PrReviewRequirement> = requirements
            .iter()
            .map(|(role, required_count)| PrReviewRequirement {
                pr_id,
                role: role.clone(),
                required_count: *required_count,
                pipeline_run_id: None,
                created_at: 0,
            })
            .collect();
        Ok(evaluate_merge_readiness(&requirements, &approvals))
    }

    /// Non-stale approval count for `pr_id`, optionally narrowed to one
    /// reviewer role.
    pub fn count_pr_approvals(&self, pr_id: u64, role: Option<&str>) -> Result<u32, RegistryError> {
        let conn = self.conn.lock();
        let count: i64 = match role {
            Some(role) => conn.query_row(
                "SELECT COUNT(*) FROM pr_approvals WHERE pr_id = ?1 AND role = ?2 AND state = 'approved' AND stale = 0",
                params![pr_id as i64, role],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM pr_approvals WHERE pr_id = ?1 AND state = 'approved' AND stale = 0",
                params![pr_id as i64],
                |row| row.get(0),
            )?,
        };
        Ok(count as u32)
    }

    /// Persist the reviewer-role requirements resolved for `pr_id` at the
    /// time its review pipeline was triggered.
    pub fn set_pr_review_requirements(&self, requirements: &[PrReviewRequirement]) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        for req in requirements {
            conn.execute(
                "INSERT INTO pr_review_requirements (pr_id, role, required_count, pipeline_run_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(pr_id, role) DO UPDATE SET
                    required_count = excluded.required_count,
                    pipeline_run_id = excluded.pipeline_run_id",
                params![
                    req.pr_id as i64,
                    req.role,
                    req.required_count as i64,
                    req.pipeline_run_id.as_ref().map(|id| id.as_str().to_string()),
                    req.created_at as i64,
                ],
            )?;
        }
        Ok(())
    }

    pub fn list_pr_review_requirements(&self, pr_id: u64) -> Result<Vec<PrReviewRequirement>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT pr_id, role, required_count, pipeline_run_id, created_at
             FROM pr_review_requirements WHERE pr_id = ?1",
        )?;
        let reqs = stmt
            .query_map(params![pr_id as i64], |row| {
                let pipeline_run_id: Option<String> = row.get(3)?;
                Ok(PrReviewRequirement {
                    pr_id: row.get::<_, i64>(0)? as u64,
                    role: row.get(1)?,
                    required_count: row.get::<_, i64>(2)? as u32,
                    pipeline_run_id: pipeline_run_id.map(PipelineRunId::new),
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reqs)
    }

    /// Current position in an enforced review sequence, if `pr_id` has one
    /// (an ordered review role sequence).
    pub fn get_pr_sequence_state(&self, pr_id: u64) -> Result<Option<PrSequenceState>, RegistryError> {
        let conn = self.conn.lock();
        let state = conn
            .query_row(
                "SELECT * FROM pr_sequence_state WHERE pr_id = ?1",
                params![pr_id as i64],
                rows::pr_sequence_state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    pub fn set_pr_sequence_state(&self, state: &PrSequenceState) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pr_sequence_state (pr_id, current_role, sequence_index, pipeline_run_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pr_id) DO UPDATE SET
                current_role = excluded.current_role,
                sequence_index = excluded.sequence_index,
                pipeline_run_id = excluded.pipeline_run_id",
            params![
                state.pr_id as i64,
                state.current_role,
                state.sequence_index as i64,
                state.pipeline_run_id.as_ref().map(|id| id.as_str().to_string()),
            ],
        )?;
        Ok(())
    }

    // ---- pipeline runs -----------------------------------------------------

    pub fn create_pipeline_run(&self, run: &PipelineRun) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        Self::upsert_pipeline_run_row(&conn, run)
    }

    pub fn update_pipeline_run(&self, run: &PipelineRun) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        Self::upsert_pipeline_run_row(&conn, run)
    }

    fn upsert_pipeline_run_row(conn: &Connection, run: &PipelineRun) -> Result<(), RegistryError> {
        conn.execute(
            "INSERT INTO pipeline_runs (
                id, pipeline_name, definition_snapshot, trigger_event, trigger_delivery_id,
                issue_id, pr_id, scope, parent_run_id, parent_stage_id, nesting_depth, status,
                current_stage_id, context, created_at, started_at, completed_at, error_message,
                error_stage_id
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                current_stage_id = excluded.current_stage_id,
                context = excluded.context,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                error_message = excluded.error_message,
                error_stage_id = excluded.error_stage_id",
            params![
                run.id.as_str(),
                run.pipeline_name,
                serde_json::to_string(&run.definition_snapshot)?,
                rows::event_type_to_str(run.trigger_event),
                run.trigger_delivery_id.as_str(),
                run.issue_id.map(|v| v as i64),
                run.pr_id.map(|v| v as i64),
                rows::scope_to_str(run.scope),
                run.parent_run_id.as_ref().map(|id| id.as_str().to_string()),
                run.parent_stage_id,
                run.nesting_depth as i64,
                rows::run_status_to_str(run.status),
                run.current_stage_id,
                serde_json::to_string(&run.context)?,
                run.created_at as i64,
                run.started_at.map(|v| v as i64),
                run.completed_at.map(|v| v as i64),
                run.error_message,
                run.error_stage_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_pipeline_run(&self, id: &PipelineRunId) -> Result<Option<PipelineRun>, RegistryError> {
        let conn = self.conn.lock();
        let run = conn
            .query_row("SELECT * FROM pipeline_runs WHERE id = ?1", params![id.as_str()], rows::pipeline_run_from_row)
            .optional()?;
        Ok(run)
    }

    /// Non-terminal runs scoped to `pr_id` — used to enforce `SinglePr`
    /// dedup — at most one active run per scope per PR.
    pub fn list_active_pipeline_runs_for_pr(&self, pr_id: u64) -> Result<Vec<PipelineRun>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM pipeline_runs
             WHERE pr_id = ?1 AND status IN ('pending', 'running')",
        )?;
        let runs = stmt
            .query_map(params![pr_id as i64], rows::pipeline_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// All `running` (and `pending`) runs — the engine's recovery set on
    /// daemon restart.
    pub fn list_running_pipeline_runs(&self) -> Result<Vec<PipelineRun>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM pipeline_runs WHERE status IN ('pending', 'running')",
        )?;
        let runs = stmt
            .query_map([], rows::pipeline_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ---- stage runs -----------------------------------------------------

    pub fn create_stage_run(&self, stage: &StageRun) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        Self::upsert_stage_run_row(&conn, stage)
    }

    pub fn update_stage_run(&self, stage: &StageRun) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        Self::upsert_stage_run_row(&conn, stage)
    }

    fn upsert_stage_run_row(conn: &Connection, stage: &StageRun) -> Result<(), RegistryError> {
        conn.execute(
            "INSERT INTO stage_runs (
                id, run_id, stage_id, status, agent_id, branch_id, parent_stage_id,
                child_pipeline_run_id, outputs, error_message, attempt_number, max_attempts,
                started_at, completed_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                outputs = excluded.outputs,
                error_message = excluded.error_message,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at",
            params![
                stage.id.as_str(),
                stage.run_id.as_str(),
                stage.stage_id,
                rows::stage_status_to_str(stage.status),
                stage.agent_id.as_ref().map(|id| id.as_str().to_string()),
                stage.branch_id,
                stage.parent_stage_id,
                stage.child_pipeline_run_id.as_ref().map(|id| id.as_str().to_string()),
                serde_json::to_string(&stage.outputs)?,
                stage.error_message,
                stage.attempt_number as i64,
                stage.max_attempts as i64,
                stage.started_at as i64,
                stage.completed_at.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    pub fn get_stage_run(&self, id: &StageRunId) -> Result<Option<StageRun>, RegistryError> {
        let conn = self.conn.lock();
        let stage = conn
            .query_row("SELECT * FROM stage_runs WHERE id = ?1", params![id.as_str()], rows::stage_run_from_row)
            .optional()?;
        Ok(stage)
    }

    pub fn list_stage_runs_for_run(&self, run_id: &PipelineRunId) -> Result<Vec<StageRun>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM stage_runs WHERE run_id = ?1 ORDER BY started_at")?;
        let stages = stmt
            .query_map(params![run_id.as_str()], rows::stage_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stages)
    }

    /// The stage run an active agent is fulfilling, if any — used to resume
    /// the right parallel branch when that agent reaches a terminal status
    /// for agent-stage completion routing.
    pub fn get_stage_run_by_agent_id(&self, agent_id: &AgentId) -> Result<Option<StageRun>, RegistryError> {
        let conn = self.conn.lock();
        let stage = conn
            .query_row(
                "SELECT * FROM stage_runs WHERE agent_id = ?1 ORDER BY started_at DESC LIMIT 1",
                params![agent_id.as_str()],
                rows::stage_run_from_row,
            )
            .optional()?;
        Ok(stage)
    }

    // ---- gate checks -----------------------------------------------------

    pub fn record_gate_check(&self, record: &GateCheckRecord) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO gate_checks (stage_run_id, check_type, check_config, passed, message, data, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.stage_run_id.as_str(),
                record.check_type,
                serde_json::to_string(&record.check_config)?,
                record.passed,
                record.message,
                serde_json::to_string(&record.data)?,
                record.checked_at as i64,
            ],
        )?;
        Ok(())
    }

    pub fn list_gate_checks_for_stage(&self, stage_run_id: &StageRunId) -> Result<Vec<GateCheckRecord>, RegistryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT stage_run_id, check_type, check_config, passed, message, data, checked_at
             FROM gate_checks WHERE stage_run_id = ?1 ORDER BY checked_at",
        )?;
        let records = stmt
            .query_map(params![stage_run_id.as_str()], |row| {
                let check_config: String = row.get(2)?;
                let data: String = row.get(5)?;
                Ok(GateCheckRecord {
                    stage_run_id: StageRunId::new(row.get::<_, String>(0)?),
                    check_type: row.get(1)?,
                    check_config: serde_json::from_str(&check_config).unwrap_or(serde_json::Value::Null),
                    passed: row.get(3)?,
                    message: row.get(4)?,
                    data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
                    checked_at: row.get::<_, i64>(6)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ---- human stage state -----------------------------------------------------

    pub fn upsert_human_stage_state(&self, state: &HumanStageState) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pipeline_human_stage_state (
                stage_run_id, entry_notified_at, last_reminder_at, reminder_count,
                assigned_users, completed_by, completed_action
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(stage_run_id) DO UPDATE SET
                last_reminder_at = excluded.last_reminder_at,
                reminder_count = excluded.reminder_count,
                completed_by = excluded.completed_by,
                completed_action = excluded.completed_action",
            params![
                state.stage_run_id.as_str(),
                state.entry_notified_at as i64,
                state.last_reminder_at.map(|v| v as i64),
                state.reminder_count as i64,
                serde_json::to_string(&state.assigned_users)?,
                state.completed_by,
                state.completed_action,
            ],
        )?;
        Ok(())
    }

    pub fn get_human_stage_state(&self, stage_run_id: &StageRunId) -> Result<Option<HumanStageState>, RegistryError> {
        let conn = self.conn.lock();
        let state = conn
            .query_row(
                "SELECT * FROM pipeline_human_stage_state WHERE stage_run_id = ?1",
                params![stage_run_id.as_str()],
                rows::human_stage_state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    // ---- delivery dedup -----------------------------------------------------

    /// Has this webhook delivery already been processed?
    pub fn is_delivery_seen(&self, delivery_id: &DeliveryId) -> Result<bool, RegistryError> {
        let conn = self.conn.lock();
        let seen: Option<String> = conn
            .query_row(
                "SELECT delivery_id FROM seen_deliveries WHERE delivery_id = ?1",
                params![delivery_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seen.is_some())
    }

    pub fn mark_delivery_seen(&self, delivery_id: &DeliveryId, now_ms: u64) -> Result<(), RegistryError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO seen_deliveries (delivery_id, seen_at) VALUES (?1, ?2)",
            params![delivery_id.as_str(), now_ms as i64],
        )?;
        Ok(())
    }

    /// Atomically checks and records a webhook delivery id under a single
    /// lock acquisition, returning `true` iff this call is the one that
    /// newly recorded it. The router relies on this instead of pairing
    /// `is_delivery_seen` with `mark_delivery_seen`, which would leave a
    /// window between the two calls for a redelivered webhook to race past
    /// both and dispatch it twice.
    pub fn try_mark_delivery_seen(&self, delivery_id: &DeliveryId, now_ms: u64) -> Result<bool, RegistryError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO seen_deliveries (delivery_id, seen_at) VALUES (?1, ?2)",
            params![delivery_id.as_str(), now_ms as i64],
        )?;
        Ok(inserted == 1)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
