// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op sandbox adapter for when sandbox isolation is disabled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use squadron_core::AgentId;

use super::{Sandbox, SandboxError, SandboxSession};

/// Sandbox adapter that does nothing: the agent's own worktree path is used
/// as the "sandbox" working directory, and every other operation is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpSandbox;

impl NoOpSandbox {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sandbox for NoOpSandbox {
    async fn create_session(&self, agent_id: &AgentId, working_dir: &Path) -> Result<SandboxSession, SandboxError> {
        Ok(SandboxSession { id: agent_id.to_string(), working_dir: working_dir.to_path_buf() })
    }

    async fn teardown_session(&self, _session: &SandboxSession) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn get_working_directory(&self, session: &SandboxSession) -> Result<PathBuf, SandboxError> {
        Ok(session.working_dir.clone())
    }

    async fn inspect_diff_before_push(&self, _session: &SandboxSession) -> Result<Option<String>, SandboxError> {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
