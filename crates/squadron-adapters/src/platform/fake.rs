// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake platform API for testing.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    CheckRunRef, CombinedStatus, CommentRef, IssueRef, PlatformApi, PlatformError, PrRef, ReviewRef,
};

#[derive(Debug, Clone)]
pub enum PlatformCall {
    GetIssue { number: u64 },
    CreateIssue { title: String },
    UpdateIssue { number: u64, patch: Value },
    GetPr { number: u64 },
    CreatePr { title: String, head_branch: String, base_branch: String },
    UpdatePr { number: u64, patch: Value },
    MergePr { number: u64, method: String },
    ListPrFiles { number: u64 },
    CreateComment { target: u64, body: String },
    ListComments { target: u64 },
    SubmitReview { pr: u64, state: String },
    GetReview { pr: u64, review_id: String },
    DeleteBranch { branch: String },
    CombinedStatus { sha: String },
    ListCheckRuns { sha: String },
}

struct FakePlatformState {
    issues: HashMap<u64, IssueRef>,
    prs: HashMap<u64, PrRef>,
    comments: HashMap<u64, Vec<CommentRef>>,
    reviews: HashMap<(u64, String), ReviewRef>,
    pr_files: HashMap<u64, Vec<String>>,
    statuses: HashMap<String, CombinedStatus>,
    deleted_branches: Vec<String>,
    calls: Vec<PlatformCall>,
    next_id: u64,
}

/// In-memory platform API for exercising lifecycle/pipeline logic without a
/// real forge connection. Every call is recorded; seed state with the
/// `seed_*` helpers before running the code under test.
#[derive(Clone)]
pub struct FakePlatformApi {
    inner: Arc<Mutex<FakePlatformState>>,
}

impl Default for FakePlatformApi {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakePlatformState {
                issues: HashMap::new(),
                prs: HashMap::new(),
                comments: HashMap::new(),
                reviews: HashMap::new(),
                pr_files: HashMap::new(),
                statuses: HashMap::new(),
                deleted_branches: Vec::new(),
                calls: Vec::new(),
                next_id: 0,
            })),
        }
    }
}

impl FakePlatformApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.inner.lock().calls.clone()
    }

    pub fn seed_issue(&self, issue: IssueRef) {
        self.inner.lock().issues.insert(issue.number, issue);
    }

    pub fn seed_pr(&self, pr: PrRef) {
        self.inner.lock().prs.insert(pr.number, pr);
    }

    pub fn seed_pr_files(&self, pr: u64, files: Vec<String>) {
        self.inner.lock().pr_files.insert(pr, files);
    }

    pub fn seed_combined_status(&self, sha: &str, status: CombinedStatus) {
        self.inner.lock().statuses.insert(sha.to_string(), status);
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.inner.lock().deleted_branches.clone()
    }
}

#[async_trait]
impl PlatformApi for FakePlatformApi {
    async fn get_issue(&self, number: u64) -> Result<IssueRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::GetIssue { number });
        inner
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("issue {number}")))
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<IssueRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let number = inner.next_id;
        inner.calls.push(PlatformCall::CreateIssue { title: title.to_string() });
        let issue = IssueRef {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            labels: labels.to_vec(),
            state: "open".to_string(),
        };
        inner.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, number: u64, patch: Value) -> Result<IssueRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::UpdateIssue { number, patch: patch.clone() });
        let issue = inner
            .issues
            .get_mut(&number)
            .ok_or_else(|| PlatformError::NotFound(format!("issue {number}")))?;
        if let Some(state) = patch.get("state").and_then(Value::as_str) {
            issue.state = state.to_string();
        }
        if let Some(labels) = patch.get("labels").and_then(Value::as_array) {
            issue.labels = labels.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        }
        Ok(issue.clone())
    }

    async fn get_pr(&self, number: u64) -> Result<PrRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::GetPr { number });
        inner.prs.get(&number).cloned().ok_or_else(|| PlatformError::NotFound(format!("pr {number}")))
    }

    async fn create_pr(
        &self,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PrRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let number = inner.next_id;
        inner.calls.push(PlatformCall::CreatePr {
            title: title.to_string(),
            head_branch: head_branch.to_string(),
            base_branch: base_branch.to_string(),
        });
        let pr = PrRef {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            head_branch: head_branch.to_string(),
            base_branch: base_branch.to_string(),
            state: "open".to_string(),
            draft: false,
        };
        inner.prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn update_pr(&self, number: u64, patch: Value) -> Result<PrRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::UpdatePr { number, patch: patch.clone() });
        let pr = inner.prs.get_mut(&number).ok_or_else(|| PlatformError::NotFound(format!("pr {number}")))?;
        if let Some(state) = patch.get("state").and_then(Value::as_str) {
            pr.state = state.to_string();
        }
        Ok(pr.clone())
    }

    async fn merge_pr(&self, number: u64, method: &str) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::MergePr { number, method: method.to_string() });
        let pr = inner.prs.get_mut(&number).ok_or_else(|| PlatformError::NotFound(format!("pr {number}")))?;
        pr.state = "merged".to_string();
        Ok(())
    }

    async fn list_pr_files(&self, number: u64) -> Result<Vec<String>, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::ListPrFiles { number });
        Ok(inner.pr_files.get(&number).cloned().unwrap_or_default())
    }

    async fn create_comment(&self, target: u64, body: &str) -> Result<CommentRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id.to_string();
        inner.calls.push(PlatformCall::CreateComment { target, body: body.to_string() });
        let comment = CommentRef { id, author: "squadron".to_string(), body: body.to_string() };
        inner.comments.entry(target).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, target: u64) -> Result<Vec<CommentRef>, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::ListComments { target });
        Ok(inner.comments.get(&target).cloned().unwrap_or_default())
    }

    async fn submit_review(&self, pr: u64, state: &str, body: &str) -> Result<ReviewRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id.to_string();
        inner.calls.push(PlatformCall::SubmitReview { pr, state: state.to_string() });
        let review = ReviewRef {
            id: id.clone(),
            author: "squadron".to_string(),
            state: state.to_string(),
            body: Some(body.to_string()),
        };
        inner.reviews.insert((pr, id), review.clone());
        Ok(review)
    }

    async fn get_review(&self, pr: u64, review_id: &str) -> Result<ReviewRef, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::GetReview { pr, review_id: review_id.to_string() });
        inner
            .reviews
            .get(&(pr, review_id.to_string()))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("review {review_id} on pr {pr}")))
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::DeleteBranch { branch: branch.to_string() });
        inner.deleted_branches.push(branch.to_string());
        Ok(())
    }

    async fn combined_status(&self, sha: &str) -> Result<CombinedStatus, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::CombinedStatus { sha: sha.to_string() });
        Ok(inner.statuses.get(sha).cloned().unwrap_or(CombinedStatus {
            state: "pending".to_string(),
            check_runs: Vec::new(),
        }))
    }

    async fn list_check_runs(&self, sha: &str) -> Result<Vec<CheckRunRef>, PlatformError> {
        let mut inner = self.inner.lock();
        inner.calls.push(PlatformCall::ListCheckRuns { sha: sha.to_string() });
        Ok(inner.statuses.get(sha).map(|s| s.check_runs.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
