// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake git worktree adapter for testing.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CommandOutput, GitError, GitWorktree};

#[derive(Debug, Clone)]
pub enum GitCall {
    CreateWorktree { branch: String },
    RemoveWorktree { path: PathBuf },
    RunInWorktree { path: PathBuf, args: Vec<String>, auth_present: bool },
    Push { path: PathBuf, branch: String, force: bool },
}

struct FakeGitState {
    calls: Vec<GitCall>,
    live_worktrees: HashSet<PathBuf>,
    pushed_branches: Vec<String>,
    next_id: u64,
}

/// In-memory git worktree adapter. Worktree paths are synthetic
/// (`<worktree_base>/<branch-with-slashes-dashed>`); no filesystem I/O
/// actually happens, which keeps lifecycle/pipeline tests free of real git
/// repositories.
#[derive(Clone)]
pub struct FakeGitWorktree {
    inner: Arc<Mutex<FakeGitState>>,
}

impl Default for FakeGitWorktree {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeGitState {
                calls: Vec::new(),
                live_worktrees: HashSet::new(),
                pushed_branches: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl FakeGitWorktree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.inner.lock().calls.clone()
    }

    pub fn pushed_branches(&self) -> Vec<String> {
        self.inner.lock().pushed_branches.clone()
    }

    pub fn is_live(&self, path: &Path) -> bool {
        self.inner.lock().live_worktrees.contains(path)
    }
}

#[async_trait]
impl GitWorktree for FakeGitWorktree {
    async fn create_worktree(
        &self,
        branch: &str,
        _sparse: Option<&[String]>,
        worktree_base: &Path,
    ) -> Result<PathBuf, GitError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let path = worktree_base.join(format!("wt-{}", inner.next_id));
        inner.calls.push(GitCall::CreateWorktree { branch: branch.to_string() });
        inner.live_worktrees.insert(path.clone());
        Ok(path)
    }

    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError> {
        let mut inner = self.inner.lock();
        inner.calls.push(GitCall::RemoveWorktree { path: path.to_path_buf() });
        inner.live_worktrees.remove(path);
        Ok(())
    }

    async fn run_in_worktree(
        &self,
        path: &Path,
        args: &[String],
        auth_token: Option<&str>,
    ) -> Result<CommandOutput, GitError> {
        let mut inner = self.inner.lock();
        inner.calls.push(GitCall::RunInWorktree {
            path: path.to_path_buf(),
            args: args.to_vec(),
            auth_present: auth_token.is_some(),
        });
        if !inner.live_worktrees.contains(path) {
            return Err(GitError::CommandFailed {
                status: Some(128),
                stderr: "not a worktree".to_string(),
            });
        }
        Ok(CommandOutput { status: 0, stdout: String::new(), stderr: String::new() })
    }

    async fn push(&self, path: &Path, _auth_token: &str, branch: &str, force: bool) -> Result<(), GitError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(GitCall::Push { path: path.to_path_buf(), branch: branch.to_string(), force });
        inner.pushed_branches.push(branch.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
