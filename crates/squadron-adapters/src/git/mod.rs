// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree adapter.
//!
//! Auth tokens are injected into the ephemeral environment of the `git`
//! subprocess this adapter spawns, never into the agent's own environment —
//! the agent's subprocess session never sees a credential directly.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGitWorktree, GitCall};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from git worktree operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("worktree creation failed: {0}")]
    CreateFailed(String),
    #[error("worktree removal failed: {0}")]
    RemoveFailed(String),
    #[error("command failed with status {status:?}: {stderr}")]
    CommandFailed { status: Option<i32>, stderr: String },
    #[error("push failed: {0}")]
    PushFailed(String),
}

/// Output of a command run inside a worktree.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Adapter for creating and driving git worktrees.
#[async_trait]
pub trait GitWorktree: Clone + Send + Sync + 'static {
    /// Create a worktree for `branch` under `worktree_base`, optionally with
    /// a sparse checkout. Returns the worktree's filesystem path.
    async fn create_worktree(
        &self,
        branch: &str,
        sparse: Option<&[String]>,
        worktree_base: &Path,
    ) -> Result<PathBuf, GitError>;

    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError>;

    /// Run an arbitrary git (or git-adjacent) command inside a worktree.
    /// `auth_token`, when present, is injected into the spawned process's
    /// environment for the duration of this call only.
    async fn run_in_worktree(
        &self,
        path: &Path,
        args: &[String],
        auth_token: Option<&str>,
    ) -> Result<CommandOutput, GitError>;

    /// Push `branch` from its worktree, using `auth_token` for the remote.
    async fn push(&self, path: &Path, auth_token: &str, branch: &str, force: bool) -> Result<(), GitError>;
}

/// Shells out to the system `git` binary against a single bare/checked-out
/// source repository (`repo_root`), adding and removing worktrees from it.
/// The only concrete [`GitWorktree`] this crate ships — unlike the Platform
/// API and LLM session seams, driving `git` itself is not an external
/// collaborator the spec declines to prescribe.
#[derive(Debug, Clone)]
pub struct ProcessGitWorktree {
    repo_root: PathBuf,
}

impl ProcessGitWorktree {
    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    fn git(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("git");
        cmd.current_dir(&self.repo_root).kill_on_drop(true);
        cmd
    }

    async fn run(cmd: tokio::process::Command, description: &'static str) -> Result<std::process::Output, String> {
        crate::subprocess::run_with_timeout(cmd, crate::subprocess::GIT_WORKTREE_TIMEOUT, description).await
    }
}

impl GitError {
    fn from_status(description: &str, output: &std::process::Output) -> Self {
        GitError::CommandFailed {
            status: output.status.code(),
            stderr: format!("{description}: {}", String::from_utf8_lossy(&output.stderr)),
        }
    }
}

fn to_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

#[async_trait]
impl GitWorktree for ProcessGitWorktree {
    async fn create_worktree(&self, branch: &str, sparse: Option<&[String]>, worktree_base: &Path) -> Result<PathBuf, GitError> {
        let path = worktree_base.join(branch.replace('/', "-"));
        tokio::fs::create_dir_all(worktree_base).await.map_err(|e| GitError::CreateFailed(e.to_string()))?;

        let mut cmd = self.git();
        cmd.args(["worktree", "add", "-B", branch, &path.display().to_string(), "HEAD"]);
        let output = Self::run(cmd, "git worktree add").await.map_err(GitError::CreateFailed)?;
        if !output.status.success() {
            return Err(GitError::from_status("git worktree add", &output));
        }

        if let Some(paths) = sparse {
            if !paths.is_empty() {
                let mut sparse_cmd = tokio::process::Command::new("git");
                sparse_cmd.current_dir(&path).kill_on_drop(true).arg("sparse-checkout").arg("set").args(paths);
                let sparse_out = Self::run(sparse_cmd, "git sparse-checkout set").await.map_err(GitError::CreateFailed)?;
                if !sparse_out.status.success() {
                    return Err(GitError::from_status("git sparse-checkout set", &sparse_out));
                }
            }
        }

        Ok(path)
    }

    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError> {
        let mut cmd = self.git();
        cmd.args(["worktree", "remove", "--force", &path.display().to_string()]);
        let output = Self::run(cmd, "git worktree remove").await.map_err(GitError::RemoveFailed)?;
        if !output.status.success() {
            return Err(GitError::RemoveFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }

    async fn run_in_worktree(&self, path: &Path, args: &[String], auth_token: Option<&str>) -> Result<CommandOutput, GitError> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.current_dir(path).kill_on_drop(true).args(args);
        if let Some(token) = auth_token {
            cmd.env("GIT_ASKPASS", "echo").env("SQUADRON_GIT_TOKEN", token);
        }
        let output = Self::run(cmd, "git command").await.map_err(|e| GitError::CommandFailed { status: None, stderr: e })?;
        Ok(to_output(output))
    }

    async fn push(&self, path: &Path, auth_token: &str, branch: &str, force: bool) -> Result<(), GitError> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.current_dir(path).kill_on_drop(true).env("SQUADRON_GIT_TOKEN", auth_token);
        cmd.arg("push").arg("origin").arg(format!("{branch}:{branch}"));
        if force {
            cmd.arg("--force");
        }
        let output = Self::run(cmd, "git push").await.map_err(GitError::PushFailed)?;
        if !output.status.success() {
            return Err(GitError::PushFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod process_test_module;
