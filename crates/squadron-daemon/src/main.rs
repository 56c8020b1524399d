// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `squadrond` — the Squadron orchestration daemon.
//!
//! Wires the Registry, the Agent Lifecycle Manager, the Pipeline Engine,
//! the Event Router and its handlers, and the Reconciliation Loop into one
//! running process. Webhook ingestion, the Platform API client, and the
//! LLM client are external collaborators; this binary accepts
//! raw events on its [`squadron_daemon::EventSender`] handle (wherever a
//! webhook listener feeds them from) and starts with placeholder
//! Platform/LLM adapters (see [`squadron_daemon::placeholder`]) that a real
//! deployment is expected to replace.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use squadron_adapters::{NoOpSandbox, ProcessGitWorktree, TracingActivityLogger};
use squadron_core::{Clock, EventType, SystemClock, UuidIdGen};
use squadron_daemon::{
    BlockerResolutionHandler, CommandHandler, DaemonConfig, EventRouter, PipelineTriggerHandler,
    PrReviewHandler, ReconciliationLoop, RoleTriggerHandler, UnconfiguredLlmSessionFactory,
    UnconfiguredPlatformApi,
};
use squadron_lifecycle::AgentLifecycleManager;
use squadron_pipeline::spawn::{AgentOutcomeSink, SpawnAgent};
use squadron_pipeline::PipelineEngine;
use squadron_registry::Registry;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("squadron.toml"));
    let daemon_config = DaemonConfig::load(&config_path)?;

    let _log_guard = setup_logging(&daemon_config)?;
    tracing::info!(config_path = %config_path.display(), "starting squadrond");

    if let Some(parent) = daemon_config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let registry = Arc::new(Registry::open(&daemon_config.db_path)?);

    tracing::warn!(
        "started with placeholder Platform API and LLM session adapters — \
         every call to a forge or model provider will fail until a real \
         deployment replaces them"
    );

    let config = Arc::new(daemon_config.config.clone());
    let platform = UnconfiguredPlatformApi;
    let llm = UnconfiguredLlmSessionFactory;
    let git = ProcessGitWorktree::new(daemon_config.repo_root.clone());
    let sandbox = NoOpSandbox::new();
    let activity = TracingActivityLogger;
    let clock = SystemClock;
    let id_gen = UuidIdGen;

    let manager = AgentLifecycleManager::new(
        registry.clone(),
        platform.clone(),
        llm,
        git,
        sandbox,
        activity,
        clock,
        id_gen,
        config.clone(),
        daemon_config.worktree_dir.clone(),
    );

    let engine = Arc::new(PipelineEngine::new(
        registry.clone(),
        platform.clone(),
        clock,
        UuidIdGen,
        config.pipelines.clone(),
        manager.clone() as Arc<dyn SpawnAgent>,
    ));
    manager.set_outcome_sink(engine.clone() as Arc<dyn AgentOutcomeSink>);

    let (mut router, event_sender) = EventRouter::new(registry.clone(), daemon_config.event_channel_capacity);

    let command_handler = Arc::new(CommandHandler::new(manager.clone(), &config));
    let role_trigger_handler = Arc::new(RoleTriggerHandler::new(manager.clone(), registry.clone(), &config));
    let pipeline_trigger_handler = Arc::new(PipelineTriggerHandler::new(engine.clone(), registry.clone()));
    let pr_review_handler = Arc::new(PrReviewHandler::new(platform.clone(), registry.clone(), clock, &config));
    let blocker_handler = Arc::new(BlockerResolutionHandler::new(manager.clone()));

    for event_type in EventType::ALL.iter().copied() {
        router.on(event_type, command_handler.clone());
        router.on(event_type, role_trigger_handler.clone());
        router.on(event_type, pipeline_trigger_handler.clone());
        router.on(event_type, blocker_handler.clone());
        if matches!(event_type, EventType::PrReviewSubmitted | EventType::PrSynchronize) {
            router.on(event_type, pr_review_handler.clone());
        }
    }

    let stop_handle = router.stop_handle();
    let router_task = tokio::spawn(router.run(move || SystemClock.epoch_ms()));

    let reconciliation = ReconciliationLoop::new(manager, engine, registry, platform, clock, config);
    let reconciliation_interval = std::time::Duration::from_secs(daemon_config.reconciliation_interval_secs.max(1));
    let reconciliation_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reconciliation_interval);
        loop {
            ticker.tick().await;
            let report = reconciliation.run_once().await;
            tracing::info!(
                completed = report.completed.len(),
                unblocked = report.unblocked.len(),
                escalated_for_missed_watchdog = report.escalated_for_missed_watchdog.len(),
                delay_stages_resumed = report.delay_stages_resumed,
                "reconciliation sweep complete"
            );
        }
    });

    tracing::info!("squadrond ready");
    // Webhook ingestion is out of scope; a real deployment clones
    // `event_sender` into whatever listener task decodes and normalizes
    // incoming webhooks and feeds them to this channel. Keep it alive here
    // so the router's receive loop doesn't see a closed channel and return
    // before the shutdown signal arrives.
    let _event_sender = event_sender;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }

    stop_handle.notify_one();
    reconciliation_task.abort();
    let _ = router_task.await;
    tracing::info!("squadrond stopped");
    Ok(())
}

fn setup_logging(config: &DaemonConfig) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = config.log_path.file_name().ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let log_dir = config.log_path.parent().ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no parent"))?;
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
