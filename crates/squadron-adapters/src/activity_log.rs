// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity logger.
//!
//! Append-only and never a correctness dependency: every caller fires and
//! forgets. A logger that drops events under backpressure is preferable to
//! one that blocks the lifecycle manager.

use async_trait::async_trait;
use serde_json::Value;

/// One observable thing that happened, as a free-form JSON record. Shape is
/// deliberately not fixed here — individual producers (lifecycle manager,
/// pipeline engine, daemon) decide their own event schemas.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub kind: String,
    pub data: Value,
}

#[async_trait]
pub trait ActivityLogger: Clone + Send + Sync + 'static {
    async fn log(&self, event: ActivityEvent);
}

/// Discards every event. The correct default: nothing in the core should
/// observe a difference in behavior with this swapped in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpActivityLogger;

#[async_trait]
impl ActivityLogger for NoOpActivityLogger {
    async fn log(&self, _event: ActivityEvent) {}
}

/// Forwards every activity event to `tracing` as a structured `info!` at
/// target `squadron::activity`, the concrete logger the daemon binary wires
/// by default — a real deployment can still swap in a logger that ships
/// events to a dashboard, but routing through `tracing` needs no collaborator
/// the core doesn't already carry.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingActivityLogger;

#[async_trait]
impl ActivityLogger for TracingActivityLogger {
    async fn log(&self, event: ActivityEvent) {
        tracing::info!(target: "squadron::activity", kind = %event.kind, data = %event.data, "activity");
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{ActivityEvent, ActivityLogger};

    /// Records every logged event for test assertions.
    #[derive(Clone, Default)]
    pub struct FakeActivityLogger {
        events: Arc<Mutex<Vec<ActivityEvent>>>,
    }

    impl FakeActivityLogger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ActivityEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl ActivityLogger for FakeActivityLogger {
        async fn log(&self, event: ActivityEvent) {
            self.events.lock().push(event);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeActivityLogger;

#[cfg(test)]
#[path = "activity_log_tests.rs"]
mod tests;
