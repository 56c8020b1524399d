// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//! "Environment overrides: a small closed set may override config").

use std::path::PathBuf;

/// State directory override: `SQUADRON_STATE_DIR` > `XDG_STATE_HOME/squadron` >
/// `~/.local/state/squadron`.
pub fn state_dir() -> Result<PathBuf, crate::config::ConfigError> {
    if let Ok(dir) = std::env::var("SQUADRON_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("squadron"));
    }
    let home = std::env::var("HOME").map_err(|_| crate::config::ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/squadron"))
}

/// Worktree base directory override, falling back to `runtime.worktree_dir`.
pub fn worktree_dir() -> Option<PathBuf> {
    std::env::var("SQUADRON_WORKTREE_DIR").ok().map(PathBuf::from)
}

/// Force the sandbox off regardless of what the config says — an escape
/// hatch for local/dev runs where namespaces aren't available.
pub fn sandbox_disabled() -> bool {
    std::env::var("SQUADRON_SANDBOX_DISABLED").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Reconciliation sweep interval override, falling back to
/// `runtime.reconciliation_interval_secs`.
pub fn reconciliation_interval_secs() -> Option<u64> {
    std::env::var("SQUADRON_RECONCILE_INTERVAL_SECS").ok().and_then(|s| s.parse().ok())
}

/// Event channel capacity override.
pub fn event_channel_capacity() -> Option<usize> {
    std::env::var("SQUADRON_EVENT_CHANNEL_CAPACITY").ok().and_then(|s| s.parse().ok())
}

/// Root of the already-checked-out source repository the git worktree
/// adapter branches worktrees off of, falling back to the daemon's own
/// working directory when unset.
pub fn repo_root() -> PathBuf {
    std::env::var("SQUADRON_REPO_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
