// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use squadron_core::ProjectConfig;
use std::sync::Mutex;

// std::env is process-global; serialize every test that touches it.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn bare_config() -> Config {
    Config {
        project: ProjectConfig {
            name: "demo".to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            default_branch: "main".to_string(),
            bot_username: "squadron".to_string(),
        },
        runtime: None,
        circuit_breakers: Default::default(),
        agent_roles: Default::default(),
        branch_naming: None,
        review_policy: Default::default(),
        escalation: Default::default(),
        pipelines: Default::default(),
        commands: Default::default(),
    }
}

fn clear_env() {
    for key in [
        "SQUADRON_STATE_DIR",
        "XDG_STATE_HOME",
        "SQUADRON_WORKTREE_DIR",
        "SQUADRON_SANDBOX_DISABLED",
        "SQUADRON_RECONCILE_INTERVAL_SECS",
        "SQUADRON_EVENT_CHANNEL_CAPACITY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn from_config_fails_without_a_resolvable_state_dir() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::remove_var("HOME");

    let err = DaemonConfig::from_config(bare_config()).unwrap_err();
    assert!(matches!(err, ConfigError::NoStateDir));
}

#[test]
fn from_config_derives_db_and_log_paths_from_state_dir() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SQUADRON_STATE_DIR", "/tmp/squadron-test-state");

    let resolved = DaemonConfig::from_config(bare_config()).unwrap();
    assert_eq!(resolved.state_dir, PathBuf::from("/tmp/squadron-test-state"));
    assert_eq!(resolved.db_path, PathBuf::from("/tmp/squadron-test-state/widgets.sqlite3"));
    assert_eq!(resolved.log_path, PathBuf::from("/tmp/squadron-test-state/squadron.log"));
    assert_eq!(resolved.worktree_dir, PathBuf::from("/tmp/squadron-test-state/worktrees"));

    clear_env();
}

#[test]
fn from_config_prefers_runtime_worktree_dir_over_state_dir_fallback() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SQUADRON_STATE_DIR", "/tmp/squadron-test-state");

    let mut config = bare_config();
    config.runtime = Some(squadron_core::RuntimeConfig {
        max_concurrent_agents: 4,
        reconciliation_interval_secs: 60,
        sparse_checkout: false,
        worktree_dir: "/srv/squadron/worktrees".to_string(),
        default_model: "claude".to_string(),
        provider: Default::default(),
        models: Default::default(),
    });

    let resolved = DaemonConfig::from_config(config).unwrap();
    assert_eq!(resolved.worktree_dir, PathBuf::from("/srv/squadron/worktrees"));
    assert_eq!(resolved.reconciliation_interval_secs, 60);

    clear_env();
}

#[test]
fn env_override_wins_over_config_worktree_dir() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SQUADRON_STATE_DIR", "/tmp/squadron-test-state");
    std::env::set_var("SQUADRON_WORKTREE_DIR", "/override/worktrees");

    let mut config = bare_config();
    config.runtime = Some(squadron_core::RuntimeConfig {
        max_concurrent_agents: 4,
        reconciliation_interval_secs: 60,
        sparse_checkout: false,
        worktree_dir: "/srv/squadron/worktrees".to_string(),
        default_model: "claude".to_string(),
        provider: Default::default(),
        models: Default::default(),
    });

    let resolved = DaemonConfig::from_config(config).unwrap();
    assert_eq!(resolved.worktree_dir, PathBuf::from("/override/worktrees"));

    clear_env();
}

#[test]
fn sandbox_disabled_env_var_flips_sandbox_enabled_off() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SQUADRON_STATE_DIR", "/tmp/squadron-test-state");
    std::env::set_var("SQUADRON_SANDBOX_DISABLED", "1");

    let resolved = DaemonConfig::from_config(bare_config()).unwrap();
    assert!(!resolved.sandbox_enabled);

    clear_env();
}

#[test]
fn reconciliation_interval_falls_back_to_default_when_unset() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SQUADRON_STATE_DIR", "/tmp/squadron-test-state");

    let resolved = DaemonConfig::from_config(bare_config()).unwrap();
    assert_eq!(resolved.reconciliation_interval_secs, 300);
    assert_eq!(resolved.event_channel_capacity, 1024);

    clear_env();
}
