// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox adapter.
//!
//! The sandbox layer itself (namespaces, seccomp, overlay FS, the MitM
//! inference proxy, the credential broker) is out of scope here — the core
//! only needs a working directory, a sanitized environment, and a clean way
//! to tear the whole thing down. When the deployment has no sandbox
//! configured, [`NoOpSandbox`] makes every operation a no-op, exactly as the
//! core expects.

mod noop;

pub use noop::NoOpSandbox;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSandbox, SandboxCall};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use squadron_core::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox session creation failed: {0}")]
    CreateFailed(String),
    #[error("sandbox session not found: {0}")]
    NotFound(String),
}

/// A handle to an isolated agent environment. Opaque to the core beyond its
/// working directory.
#[derive(Debug, Clone)]
pub struct SandboxSession {
    pub id: String,
    pub working_dir: PathBuf,
}

#[async_trait]
pub trait Sandbox: Clone + Send + Sync + 'static {
    async fn create_session(&self, agent_id: &AgentId, working_dir: &Path) -> Result<SandboxSession, SandboxError>;
    async fn teardown_session(&self, session: &SandboxSession) -> Result<(), SandboxError>;
    async fn get_working_directory(&self, session: &SandboxSession) -> Result<PathBuf, SandboxError>;

    /// Inspect the working tree's diff before it's pushed, so a sandboxed
    /// deployment can apply policy (e.g. scanning for secrets) ahead of the
    /// git adapter's push. Returns `None` when there is nothing to inspect.
    async fn inspect_diff_before_push(&self, session: &SandboxSession) -> Result<Option<String>, SandboxError>;
}
