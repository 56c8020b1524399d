// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the forge's Platform API, the LLM session
//! protocol, git worktrees, the optional sandbox, and the append-only
//! activity logger. None of these crates know anything about agent
//! lifecycle or pipeline state — they are the seams the rest of the
//! workspace is built against.

pub mod activity_log;
pub mod git;
pub mod llm;
pub mod platform;
pub mod sandbox;
pub mod subprocess;
pub mod tool_hook;

pub use activity_log::{ActivityEvent, ActivityLogger, NoOpActivityLogger, TracingActivityLogger};
pub use git::{CommandOutput, GitError, GitWorktree, ProcessGitWorktree};
pub use llm::{LlmError, LlmSession, LlmSessionFactory, SessionConfig, TurnResult};
pub use platform::{
    CheckRunRef, CombinedStatus, CommentRef, IssueRef, PlatformApi, PlatformError, PrRef, ReviewRef,
};
pub use sandbox::{NoOpSandbox, Sandbox, SandboxError, SandboxSession};
pub use tool_hook::{AllowAllHook, Decision, HookContext, HookInput, ToolHook};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use activity_log::FakeActivityLogger;
#[cfg(any(test, feature = "test-support"))]
pub use git::{FakeGitWorktree, GitCall};
#[cfg(any(test, feature = "test-support"))]
pub use llm::{FakeLlmSession, FakeLlmSessionFactory, LlmCall};
#[cfg(any(test, feature = "test-support"))]
pub use platform::{FakePlatformApi, PlatformCall};
#[cfg(any(test, feature = "test-support"))]
pub use sandbox::{FakeSandbox, SandboxCall};
