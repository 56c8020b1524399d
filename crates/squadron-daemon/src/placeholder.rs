// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder collaborators for two seams treated as external: a
//! Platform API client (issue/PR CRUD, merge, review submission) and the
//! LLM client itself. Neither belongs to this crate's core, so no
//! forge-specific HTTP client or model-provider subprocess protocol lives
//! in this workspace. These two types exist only so
//! `squadrond` has concrete types to monomorphize its generics with and can
//! start up; every method errors immediately, loudly, and without touching
//! the network. A real deployment links a crate that implements
//! [`PlatformApi`]/[`LlmSessionFactory`] against an actual forge and model
//! provider and wires it into `main.rs` in place of these.

use async_trait::async_trait;
use serde_json::Value;
use squadron_adapters::{
    CheckRunRef, CombinedStatus, CommentRef, IssueRef, LlmError, LlmSession, LlmSessionFactory,
    PlatformApi, PlatformError, PrRef, ReviewRef, SessionConfig,
};
use squadron_core::SessionId;

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredPlatformApi;

fn unconfigured() -> PlatformError {
    PlatformError::RequestFailed(
        "no Platform API adapter configured — squadrond was started with the placeholder; \
         supply a forge-specific PlatformApi implementation"
            .to_string(),
    )
}

#[async_trait]
impl PlatformApi for UnconfiguredPlatformApi {
    async fn get_issue(&self, _number: u64) -> Result<IssueRef, PlatformError> {
        Err(unconfigured())
    }
    async fn create_issue(&self, _title: &str, _body: &str, _labels: &[String]) -> Result<IssueRef, PlatformError> {
        Err(unconfigured())
    }
    async fn update_issue(&self, _number: u64, _patch: Value) -> Result<IssueRef, PlatformError> {
        Err(unconfigured())
    }
    async fn get_pr(&self, _number: u64) -> Result<PrRef, PlatformError> {
        Err(unconfigured())
    }
    async fn create_pr(&self, _title: &str, _body: &str, _head_branch: &str, _base_branch: &str) -> Result<PrRef, PlatformError> {
        Err(unconfigured())
    }
    async fn update_pr(&self, _number: u64, _patch: Value) -> Result<PrRef, PlatformError> {
        Err(unconfigured())
    }
    async fn merge_pr(&self, _number: u64, _method: &str) -> Result<(), PlatformError> {
        Err(unconfigured())
    }
    async fn list_pr_files(&self, _number: u64) -> Result<Vec<String>, PlatformError> {
        Err(unconfigured())
    }
    async fn create_comment(&self, _target: u64, _body: &str) -> Result<CommentRef, PlatformError> {
        Err(unconfigured())
    }
    async fn list_comments(&self, _target: u64) -> Result<Vec<CommentRef>, PlatformError> {
        Err(unconfigured())
    }
    async fn submit_review(&self, _pr: u64, _state: &str, _body: &str) -> Result<ReviewRef, PlatformError> {
        Err(unconfigured())
    }
    async fn get_review(&self, _pr: u64, _review_id: &str) -> Result<ReviewRef, PlatformError> {
        Err(unconfigured())
    }
    async fn delete_branch(&self, _branch: &str) -> Result<(), PlatformError> {
        Err(unconfigured())
    }
    async fn combined_status(&self, _sha: &str) -> Result<CombinedStatus, PlatformError> {
        Err(unconfigured())
    }
    async fn list_check_runs(&self, _sha: &str) -> Result<Vec<CheckRunRef>, PlatformError> {
        Err(unconfigured())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredLlmSessionFactory;

fn unconfigured_llm() -> LlmError {
    LlmError::Provider(
        "no LLM session adapter configured — squadrond was started with the placeholder; \
         supply a model-provider LlmSessionFactory implementation"
            .to_string(),
    )
}

#[async_trait]
impl LlmSessionFactory for UnconfiguredLlmSessionFactory {
    async fn create_session(&self, _config: SessionConfig) -> Result<std::sync::Arc<dyn LlmSession>, LlmError> {
        Err(unconfigured_llm())
    }
    async fn resume_session(&self, _id: &SessionId, _config: SessionConfig) -> Result<std::sync::Arc<dyn LlmSession>, LlmError> {
        Err(unconfigured_llm())
    }
    async fn delete_session(&self, _id: &SessionId) -> Result<(), LlmError> {
        Ok(())
    }
    async fn stop(&self) -> Result<(), LlmError> {
        Ok(())
    }
}
