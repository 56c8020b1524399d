// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::process::Command;

use super::*;

#[tokio::test]
async fn run_with_timeout_returns_the_process_output() {
    let mut cmd = Command::new("true");
    cmd.kill_on_drop(true);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "true").await.unwrap();
    assert!(output.status.success());
}

#[tokio::test]
async fn run_with_timeout_reports_a_nonzero_exit() {
    let mut cmd = Command::new("false");
    cmd.kill_on_drop(true);
    let output = run_with_timeout(cmd, Duration::from_secs(5), "false").await.unwrap();
    assert!(!output.status.success());
}

#[tokio::test]
async fn run_with_timeout_surfaces_a_missing_binary_as_an_error() {
    let mut cmd = Command::new("squadron-definitely-not-a-real-binary");
    cmd.kill_on_drop(true);
    let err = run_with_timeout(cmd, Duration::from_secs(5), "missing binary").await.unwrap_err();
    assert!(err.contains("missing binary"));
}
