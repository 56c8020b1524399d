// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform API adapter.
//!
//! Wraps whatever forge (GitHub, GitLab, ...) the daemon is pointed at.
//! Every call returns a structured value; the core is tolerant of missing
//! optional fields, so response types here lean on `Option` rather than
//! rejecting partial payloads.

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePlatformApi, PlatformCall};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from platform API calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct IssueRef {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct PrRef {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head_branch: String,
    pub base_branch: String,
    pub state: String,
    pub draft: bool,
}

#[derive(Debug, Clone)]
pub struct CommentRef {
    pub id: String,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRef {
    pub id: String,
    pub author: String,
    pub state: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckRunRef {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CombinedStatus {
    pub state: String,
    pub check_runs: Vec<CheckRunRef>,
}

/// Adapter for the issue-tracker/code-review forge.
///
/// All calls return structured dicts in spec terms; here that means plain
/// structs for the common shapes and a raw `serde_json::Value` for the
/// review-submission payload, which varies by forge.
#[async_trait]
pub trait PlatformApi: Clone + Send + Sync + 'static {
    async fn get_issue(&self, number: u64) -> Result<IssueRef, PlatformError>;
    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<IssueRef, PlatformError>;
    async fn update_issue(&self, number: u64, patch: Value) -> Result<IssueRef, PlatformError>;

    async fn get_pr(&self, number: u64) -> Result<PrRef, PlatformError>;
    async fn create_pr(
        &self,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PrRef, PlatformError>;
    async fn update_pr(&self, number: u64, patch: Value) -> Result<PrRef, PlatformError>;
    async fn merge_pr(&self, number: u64, method: &str) -> Result<(), PlatformError>;
    async fn list_pr_files(&self, number: u64) -> Result<Vec<String>, PlatformError>;

    async fn create_comment(&self, target: u64, body: &str) -> Result<CommentRef, PlatformError>;
    async fn list_comments(&self, target: u64) -> Result<Vec<CommentRef>, PlatformError>;

    async fn submit_review(&self, pr: u64, state: &str, body: &str) -> Result<ReviewRef, PlatformError>;
    async fn get_review(&self, pr: u64, review_id: &str) -> Result<ReviewRef, PlatformError>;

    async fn delete_branch(&self, branch: &str) -> Result<(), PlatformError>;
    async fn combined_status(&self, sha: &str) -> Result<CombinedStatus, PlatformError>;
    async fn list_check_runs(&self, sha: &str) -> Result<Vec<CheckRunRef>, PlatformError>;
}
