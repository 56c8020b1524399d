// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `squadrond` binary's supporting library: daemon-level configuration,
//! the Event Normalizer, the Event Router, the concrete [`EventHandler`]
//! wiring between the router and the Lifecycle Manager / Pipeline Engine,
//! and the Reconciliation Loop.
//!
//! Everything the core specification leaves as an external collaborator —
//! webhook ingestion, the Platform API client, the LLM client — stays out
//! of this crate too; `main.rs` wires placeholder implementations of those
//! two seams (see [`placeholder`]) so the binary links and the rest of the
//! scheduler runs, with a loud log line at startup that a real deployment
//! must replace them.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod env;
pub mod handlers;
pub mod normalizer;
pub mod placeholder;
pub mod reconciliation;
pub mod router;
pub mod trigger_eval;

pub use config::{ConfigError, DaemonConfig};
pub use handlers::{
    BlockerResolutionHandler, CommandHandler, PipelineTriggerHandler, PrReviewHandler,
    RoleTriggerHandler,
};
pub use normalizer::{detect_sender_role, normalize, RawWebhookEvent};
pub use placeholder::{UnconfiguredLlmSessionFactory, UnconfiguredPlatformApi};
pub use reconciliation::{ReconciliationLoop, ReconciliationReport};
pub use router::{EventHandler, EventRouter, EventSender};
