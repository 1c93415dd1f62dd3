//! Mock Inference Gateway Implementation
//!
//! Used by `GatewayFactory` when provider is `"mock"` and by tests.
//! Replies are scripted in FIFO order; with no script left it echoes the
//! last message. The most recent requests are kept for assertions, and a
//! paused gateway holds each reply until the test releases it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, Semaphore};

use crate::{ContextRole, GatewayError, GenerateRequest, GenerateResponse, InferenceGateway};

/// Oldest requests are dropped past this many
const MAX_RECORDED_REQUESTS: usize = 64;

#[derive(Debug)]
struct MockState {
    replies: Mutex<VecDeque<Result<GenerateResponse, GatewayError>>>,
    requests: Mutex<VecDeque<GenerateRequest>>,
    seen: watch::Sender<usize>,
    gate: Option<Semaphore>,
}

/// Mock inference gateway for testing
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<MockState>,
}

impl MockGateway {
    /// Create a mock gateway that replies immediately
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a mock gateway whose replies wait for [`MockGateway::release`]
    pub fn paused() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        let (seen, _) = watch::channel(0);
        Self {
            state: Arc::new(MockState {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(VecDeque::new()),
                seen,
                gate,
            }),
        }
    }

    /// Queue a successful reply
    pub fn push_reply(&self, reply: GenerateResponse) {
        self.push(Ok(reply));
    }

    /// Queue a failed reply
    pub fn push_failure(&self, error: GatewayError) {
        self.push(Err(error));
    }

    fn push(&self, reply: Result<GenerateResponse, GatewayError>) {
        self.state
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Let `count` held replies through. No-op for an unpaused gateway.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(count);
        }
    }

    /// Return the recorded requests, oldest first (at most the last 64).
    pub fn recorded_requests(&self) -> Vec<GenerateRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut seen = self.state.seen.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = seen.wait_for(|n| *n >= count).await;
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InferenceGateway for MockGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        tracing::info!(
            thread_id = %request.thread_id,
            "Mock gateway processing generate request"
        );

        let echo = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == ContextRole::User)
            .and_then(|m| m.content.clone())
            .unwrap_or_else(|| "empty".to_string());

        {
            let mut requests = self
                .state
                .requests
                .lock()
                .map_err(|e| GatewayError::Request(format!("requests lock poisoned: {e}")))?;
            if requests.len() == MAX_RECORDED_REQUESTS {
                requests.pop_front();
            }
            requests.push_back(request);
        }
        self.state.seen.send_modify(|n| *n += 1);

        if let Some(gate) = &self.state.gate {
            gate.acquire()
                .await
                .map_err(|e| GatewayError::Request(format!("mock gate closed: {e}")))?
                .forget();
        }

        let scripted = self
            .state
            .replies
            .lock()
            .map_err(|e| GatewayError::Request(format!("replies lock poisoned: {e}")))?
            .pop_front();

        match scripted {
            Some(reply) => reply,
            None => Ok(GenerateResponse::answer(format!("Mock response to: {}", echo))),
        }
    }
}
