// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake sandbox adapter for testing code paths that assume a real sandbox.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use squadron_core::AgentId;

use super::{Sandbox, SandboxError, SandboxSession};

#[derive(Debug, Clone)]
pub enum SandboxCall {
    CreateSession { agent_id: String },
    TeardownSession { id: String },
    GetWorkingDirectory { id: String },
    InspectDiffBeforePush { id: String },
}

struct FakeSandboxState {
    sessions: HashMap<String, SandboxSession>,
    calls: Vec<SandboxCall>,
    scripted_diffs: HashMap<String, String>,
}

#[derive(Clone)]
pub struct FakeSandbox {
    inner: Arc<Mutex<FakeSandboxState>>,
}

impl Default for FakeSandbox {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeSandboxState {
                sessions: HashMap::new(),
                calls: Vec::new(),
                scripted_diffs: HashMap::new(),
            })),
        }
    }
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.inner.lock().calls.clone()
    }

    /// Script the diff `inspect_diff_before_push` will return for a given
    /// agent's session.
    pub fn set_diff(&self, agent_id: &str, diff: &str) {
        self.inner.lock().scripted_diffs.insert(agent_id.to_string(), diff.to_string());
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn create_session(&self, agent_id: &AgentId, working_dir: &Path) -> Result<SandboxSession, SandboxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SandboxCall::CreateSession { agent_id: agent_id.to_string() });
        let session = SandboxSession { id: agent_id.to_string(), working_dir: working_dir.to_path_buf() };
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn teardown_session(&self, session: &SandboxSession) -> Result<(), SandboxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SandboxCall::TeardownSession { id: session.id.clone() });
        inner.sessions.remove(&session.id);
        Ok(())
    }

    async fn get_working_directory(&self, session: &SandboxSession) -> Result<PathBuf, SandboxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SandboxCall::GetWorkingDirectory { id: session.id.clone() });
        inner
            .sessions
            .get(&session.id)
            .map(|s| s.working_dir.clone())
            .ok_or_else(|| SandboxError::NotFound(session.id.clone()))
    }

    async fn inspect_diff_before_push(&self, session: &SandboxSession) -> Result<Option<String>, SandboxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SandboxCall::InspectDiffBeforePush { id: session.id.clone() });
        Ok(inner.scripted_diffs.get(&session.id).cloned())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
