// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure decision logic for `@bot` command routing. Kept free
//! of the Registry and of any `async` so every branch is a table-driven
//! unit test; [`crate::manager`] does the actual spawning/waking/mailing
//! this resolves to.

use squadron_core::{AgentId, AgentStatus, Command};

/// What an `@bot` command, once parsed, resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    /// `@bot help` — post the role table, no agent touched.
    Help,
    /// `@bot <role>: ...` naming a role absent from configuration.
    UnknownRole { role: String },
    /// The comment was posted by the same role it names — ignored to avoid
    /// an agent re-triggering itself.
    SelfLoop,
    /// Ephemeral role, no conflicting singleton active: spawn fresh.
    SpawnEphemeral { role: String },
    /// Persistent role with no agent yet on this issue, or its only agent
    /// there is terminal: spawn fresh.
    SpawnPersistent { role: String },
    /// Persistent role with a `SLEEPING` agent already on this issue: wake it.
    WakeSleeping { agent_id: AgentId },
    /// The target agent (ephemeral singleton, or persistent) is already
    /// `ACTIVE`: queue the command as mail for its next prompt.
    DeliverToActive { agent_id: AgentId },
}

/// Everything the resolver needs about the role named in the command and
/// any agent(s) already associated with it, gathered by the caller from
/// the Registry and role configuration before calling [`resolve_command_target`].
pub struct CommandContext<'a> {
    /// Role of the agent that authored the triggering comment, if the
    /// sender was itself a squadron agent. Used for the self-loop guard.
    pub sender_role: Option<&'a str>,
    /// Whether the named role exists in configuration at all.
    pub role_exists: bool,
    /// Whether the named role is configured as ephemeral (single-shot).
    pub is_ephemeral: bool,
    /// Whether the named role is configured as a singleton (at most one
    /// concurrently active instance). Only consulted for ephemeral roles —
    /// persistent roles are singleton-per-issue by construction.
    pub singleton: bool,
    /// An already-`ACTIVE` agent of this role, if the role is an ephemeral
    /// singleton and one is currently running (anywhere, not just this issue).
    pub active_singleton: Option<AgentId>,
    /// The existing agent of this role on this issue, if any, and its
    /// current status. Only consulted for persistent roles.
    pub existing_for_issue: Option<(AgentId, AgentStatus)>,
}

/// Resolve a parsed `@bot` [`Command`] to the action the Lifecycle Manager
/// should take, given role/agent context the caller already looked up.
pub fn resolve_command_target(command: &Command, ctx: &CommandContext<'_>) -> CommandTarget {
    let role = match command {
        Command::Help => return CommandTarget::Help,
        Command::Route { role, .. } => role.as_str(),
        Command::Named { name, .. } => name.as_str(),
    };

    if ctx.sender_role == Some(role) {
        return CommandTarget::SelfLoop;
    }

    if !ctx.role_exists {
        return CommandTarget::UnknownRole { role: role.to_string() };
    }

    if ctx.is_ephemeral {
        if ctx.singleton {
            if let Some(agent_id) = &ctx.active_singleton {
                return CommandTarget::DeliverToActive { agent_id: agent_id.clone() };
            }
        }
        return CommandTarget::SpawnEphemeral { role: role.to_string() };
    }

    match &ctx.existing_for_issue {
        Some((agent_id, AgentStatus::Sleeping)) => CommandTarget::WakeSleeping { agent_id: agent_id.clone() },
        Some((agent_id, AgentStatus::Active)) => CommandTarget::DeliverToActive { agent_id: agent_id.clone() },
        // `CREATED` is transient and not persisted mid-spawn; any terminal
        // status or no existing agent at all both mean "start fresh".
        _ => CommandTarget::SpawnPersistent { role: role.to_string() },
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
