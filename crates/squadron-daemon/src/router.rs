// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Router: single-consumer loop draining a bounded event channel,
//! dispatching each non-duplicate event to every registered handler whose
//! event type matches, in registration order. Handler exceptions are
//! logged and never stop the router. Delivery-id idempotency is the
//! Registry's `try_mark_delivery_seen`, not a replay log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use squadron_core::{Event, EventType};
use squadron_registry::Registry;
use tokio::sync::{mpsc, Notify};

/// One subsystem's reaction to a routed event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), String>;
}

/// The sending half, handed to whatever demultiplexes raw webhooks (out of
/// scope here) and to the Reconciliation Loop for its synthetic events.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Enqueue an event. The channel is bounded; a full
    /// channel applies backpressure to the sender rather than dropping.
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// The Event Router. Owns the receiving half of the channel and the
/// handler registry; `run` drives the single-consumer loop until told to
/// stop.
pub struct EventRouter {
    registry: Arc<Registry>,
    rx: mpsc::Receiver<Event>,
    handlers: Vec<(EventType, Arc<dyn EventHandler>)>,
    stop: Arc<Notify>,
}

impl EventRouter {
    /// Build a router with the given channel capacity ("the event
    /// channel is bounded"), returning it paired with the [`EventSender`]
    /// side.
    pub fn new(registry: Arc<Registry>, capacity: usize) -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel(capacity);
        let router = Self { registry, rx, handlers: Vec::new(), stop: Arc::new(Notify::new()) };
        (router, EventSender { tx })
    }

    /// Register a handler for `event_type`. Multiple handlers per type are
    /// invoked in registration order.
    pub fn on(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers.push((event_type, handler));
    }

    /// A [`Notify`] handle that, when notified, stops the router after the
    /// event currently being dispatched finishes; anything still queued in
    /// the channel is discarded.
    pub fn stop_handle(&self) -> Arc<Notify> {
        self.stop.clone()
    }

    /// Drive the single-consumer loop until `stop_handle` is notified or
    /// the channel closes (all senders dropped).
    pub async fn run(mut self, now_ms: impl Fn() -> u64) {
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event, now_ms()).await,
                        None => {
                            tracing::info!("event channel closed, router stopping");
                            return;
                        }
                    }
                }
                _ = self.stop.notified() => {
                    tracing::info!("router stop requested, discarding any queued events");
                    return;
                }
            }
        }
    }

    async fn dispatch(&self, event: Event, now_ms: u64) {
        if event.is_droppable() {
            tracing::debug!(delivery_id = %event.delivery_id, "dropping unrecognized event");
            return;
        }

        match self.registry.try_mark_delivery_seen(&event.delivery_id, now_ms) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(delivery_id = %event.delivery_id, "duplicate delivery, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(delivery_id = %event.delivery_id, error = %e, "delivery dedup check failed, dispatching anyway");
            }
        }

        for (event_type, handler) in &self.handlers {
            if *event_type != event.event_type {
                continue;
            }
            if let Err(e) = handler.handle(&event).await {
                tracing::error!(delivery_id = %event.delivery_id, event_type = ?event.event_type, error = %e, "event handler failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
