// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("adding issue #{issue_id} as a blocker on agent {agent_id} would create a blocker cycle")]
    BlockerCycle { agent_id: String, issue_id: u64 },

    #[error("delivery {0} already seen")]
    DuplicateDelivery(String),
}
