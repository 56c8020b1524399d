// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level configuration: on-disk paths plus the closed-set
//! `squadron_core::Config` loaded from a TOML file. Loading from a file is
//! explicitly in the daemon's remit — configuration loading from files,
//! secret handling, and CLI entry points are out of scope for the *core*,
//! not for the binary that wires the core together.

use std::path::PathBuf;

use squadron_core::Config;
use thiserror::Error;

use crate::env;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a state directory: $HOME is unset")]
    NoStateDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved daemon configuration: the closed-set [`Config`] plus every
/// filesystem path the daemon binary itself owns.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub config: Config,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub worktree_dir: PathBuf,
    pub repo_root: PathBuf,
    pub log_path: PathBuf,
    pub sandbox_enabled: bool,
    pub reconciliation_interval_secs: u64,
    pub event_channel_capacity: usize,
}

impl DaemonConfig {
    /// Load `squadron.toml` from `config_path`, then resolve the rest of
    /// the daemon's paths from [`env`] overrides with state-dir-relative
    /// fallbacks.
    pub fn load(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(config_path)
            .map_err(|source| ConfigError::Read { path: config_path.to_path_buf(), source })?;
        let config: Config =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: config_path.to_path_buf(), source })?;
        Self::from_config(config)
    }

    /// Build a [`DaemonConfig`] from an already-parsed [`Config`] — used by
    /// `load` and directly by tests that construct a `Config` in memory.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;

        let worktree_dir = env::worktree_dir().unwrap_or_else(|| {
            config
                .runtime
                .as_ref()
                .map(|r| PathBuf::from(&r.worktree_dir))
                .unwrap_or_else(|| state_dir.join("worktrees"))
        });

        let sandbox_enabled = !env::sandbox_disabled();

        let reconciliation_interval_secs = env::reconciliation_interval_secs().unwrap_or_else(|| {
            config.runtime.as_ref().map(|r| r.reconciliation_interval_secs).unwrap_or(300)
        });

        Ok(Self {
            db_path: state_dir.join(format!("{}.sqlite3", config.project.repo)),
            log_path: state_dir.join("squadron.log"),
            worktree_dir,
            repo_root: env::repo_root(),
            sandbox_enabled,
            reconciliation_interval_secs,
            event_channel_capacity: env::event_channel_capacity().unwrap_or(1024),
            state_dir,
            config,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
