// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

async fn init_repo(repo_root: &Path) {
    let status = tokio::process::Command::new("git")
        .current_dir(repo_root)
        .args(["init", "-q", "-b", "main"])
        .status()
        .await
        .expect("git init");
    assert!(status.success());

    tokio::fs::write(repo_root.join("README.md"), b"hello\n").await.expect("write README");

    for args in [
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "test"],
        vec!["add", "README.md"],
        vec!["commit", "-q", "-m", "initial"],
    ] {
        let status = tokio::process::Command::new("git").current_dir(repo_root).args(&args).status().await.expect("git setup command");
        assert!(status.success(), "git {:?} failed", args);
    }
}

#[tokio::test]
async fn create_worktree_checks_out_a_new_branch_at_the_given_path() {
    let repo_dir = tempdir().expect("tempdir");
    init_repo(repo_dir.path()).await;
    let worktree_base = tempdir().expect("tempdir");

    let git = ProcessGitWorktree::new(repo_dir.path().to_path_buf());
    let path = git.create_worktree("feature/42", None, worktree_base.path()).await.expect("create_worktree");

    assert!(path.join("README.md").exists());
    assert!(path.starts_with(worktree_base.path()));
}

#[tokio::test]
async fn remove_worktree_deletes_the_checkout() {
    let repo_dir = tempdir().expect("tempdir");
    init_repo(repo_dir.path()).await;
    let worktree_base = tempdir().expect("tempdir");

    let git = ProcessGitWorktree::new(repo_dir.path().to_path_buf());
    let path = git.create_worktree("feature/43", None, worktree_base.path()).await.expect("create_worktree");
    git.remove_worktree(&path).await.expect("remove_worktree");

    assert!(!path.exists());
}

#[tokio::test]
async fn run_in_worktree_executes_a_git_command_in_the_checkout() {
    let repo_dir = tempdir().expect("tempdir");
    init_repo(repo_dir.path()).await;
    let worktree_base = tempdir().expect("tempdir");

    let git = ProcessGitWorktree::new(repo_dir.path().to_path_buf());
    let path = git.create_worktree("feature/44", None, worktree_base.path()).await.expect("create_worktree");

    let output = git.run_in_worktree(&path, &["status".to_string(), "--short".to_string()], None).await.expect("run_in_worktree");
    assert_eq!(output.status, 0);
}

#[tokio::test]
async fn push_without_a_remote_surfaces_as_push_failed() {
    let repo_dir = tempdir().expect("tempdir");
    init_repo(repo_dir.path()).await;
    let worktree_base = tempdir().expect("tempdir");

    let git = ProcessGitWorktree::new(repo_dir.path().to_path_buf());
    let path = git.create_worktree("feature/45", None, worktree_base.path()).await.expect("create_worktree");

    let err = git.push(&path, "token", "feature/45", false).await.unwrap_err();
    assert!(matches!(err, GitError::PushFailed(_)));
}
