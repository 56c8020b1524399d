// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake LLM session factory for testing.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use squadron_core::SessionId;

use super::{LlmError, LlmSession, LlmSessionFactory, SessionConfig, TurnResult};

#[derive(Debug, Clone)]
pub enum LlmCall {
    CreateSession { role: String },
    ResumeSession { id: String, role: String },
    DeleteSession { id: String },
    Stop,
    SendPrompt { id: String, prompt: String },
}

struct FakeFactoryState {
    calls: Vec<LlmCall>,
    next_id: u64,
    deleted: Vec<SessionId>,
    /// Canned turn results, consumed in order by every session's prompts.
    scripted_turns: VecDeque<TurnResult>,
}

/// Creates [`FakeLlmSession`]s that return scripted turn results in order,
/// defaulting to an empty successful turn when the script runs dry.
#[derive(Clone)]
pub struct FakeLlmSessionFactory {
    state: Arc<Mutex<FakeFactoryState>>,
}

impl Default for FakeLlmSessionFactory {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeFactoryState {
                calls: Vec::new(),
                next_id: 0,
                deleted: Vec::new(),
                scripted_turns: VecDeque::new(),
            })),
        }
    }
}

impl FakeLlmSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.state.lock().calls.clone()
    }

    pub fn deleted_sessions(&self) -> Vec<SessionId> {
        self.state.lock().deleted.clone()
    }

    /// Queue a turn result to be returned by the next `send_prompt_and_await_turn`
    /// call on any session produced by this factory.
    pub fn push_turn(&self, turn: TurnResult) {
        self.state.lock().scripted_turns.push_back(turn);
    }
}

#[async_trait]
impl LlmSessionFactory for FakeLlmSessionFactory {
    async fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn LlmSession>, LlmError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SessionId::new(format!("fake-session-{}", state.next_id));
        state.calls.push(LlmCall::CreateSession { role: config.role });
        Ok(Arc::new(FakeLlmSession { id, state: self.state.clone() }))
    }

    async fn resume_session(
        &self,
        id: &SessionId,
        config: SessionConfig,
    ) -> Result<Arc<dyn LlmSession>, LlmError> {
        let mut state = self.state.lock();
        state.calls.push(LlmCall::ResumeSession { id: id.to_string(), role: config.role });
        Ok(Arc::new(FakeLlmSession { id: id.clone(), state: self.state.clone() }))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), LlmError> {
        let mut state = self.state.lock();
        state.calls.push(LlmCall::DeleteSession { id: id.to_string() });
        state.deleted.push(id.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), LlmError> {
        self.state.lock().calls.push(LlmCall::Stop);
        Ok(())
    }
}

/// A session handed out by [`FakeLlmSessionFactory`]. Carries no state of its
/// own beyond the id; every call is recorded on the shared factory state.
pub struct FakeLlmSession {
    id: SessionId,
    state: Arc<Mutex<FakeFactoryState>>,
}

#[async_trait]
impl LlmSession for FakeLlmSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn send_prompt_and_await_turn(
        &self,
        prompt: &str,
        _timeout: Duration,
    ) -> Result<TurnResult, LlmError> {
        let mut state = self.state.lock();
        state.calls.push(LlmCall::SendPrompt { id: self.id.to_string(), prompt: prompt.to_string() });
        Ok(state.scripted_turns.pop_front().unwrap_or(TurnResult {
            output: String::new(),
            tool_calls: 0,
            stop_reason: "end_turn".to_string(),
        }))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
