//! In-memory Remote Store
//!
//! Backs the manager when `STORE_PROVIDER=mock` and in tests.
//! Thread-safe via `Arc<Mutex<>>`. Tests can inject failures per operation
//! and hold an operation open until released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

use super::ConversationStore;
use crate::domain::entities::{Message, MessageRole, NewMessage, Thread};
use parley_common::{Error, Result};

/// Store operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListThreads,
    CreateThread,
    RenameThread,
    DeleteThread,
    ListMessages,
    InsertMessage,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListThreads => write!(f, "list_threads"),
            Self::CreateThread => write!(f, "create_thread"),
            Self::RenameThread => write!(f, "rename_thread"),
            Self::DeleteThread => write!(f, "delete_thread"),
            Self::ListMessages => write!(f, "list_messages"),
            Self::InsertMessage => write!(f, "insert_message"),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    threads: Vec<Thread>,
    messages: Vec<Message>,
    last_created_at: Option<DateTime<Utc>>,
    // (op, calls remaining until it fails)
    failures: Vec<(StoreOp, usize)>,
    gates: HashMap<StoreOp, Arc<Semaphore>>,
}

impl Tables {
    /// Strictly increasing creation time, even within one clock tick
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }

    fn take_failure(&mut self, op: StoreOp) -> bool {
        let mut fire = false;
        for (failing_op, remaining) in self.failures.iter_mut() {
            if *failing_op == op {
                *remaining -= 1;
                fire |= *remaining == 0;
            }
        }
        self.failures.retain(|(_, remaining)| *remaining > 0);
        fire
    }
}

/// In-memory conversation store
#[derive(Debug, Clone)]
pub struct MockConversationStore {
    tables: Arc<Mutex<Tables>>,
    calls: Arc<watch::Sender<HashMap<StoreOp, usize>>>,
}

impl MockConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (calls, _) = watch::channel(HashMap::new());
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            calls: Arc::new(calls),
        }
    }

    /// Tables are plain data, so a poisoned lock is still usable
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call of `op`
    pub fn fail_next(&self, op: StoreOp) {
        self.fail_on_call(op, 1);
    }

    /// Fail the `nth` call of `op` from now (1-based)
    pub fn fail_on_call(&self, op: StoreOp, nth: usize) {
        if nth == 0 {
            return;
        }
        self.tables().failures.push((op, nth));
    }

    /// Make calls of `op` wait until [`MockConversationStore::release`]
    pub fn hold(&self, op: StoreOp) {
        self.tables().gates.insert(op, Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held calls of `op` through
    pub fn release(&self, op: StoreOp, count: usize) {
        if let Some(gate) = self.tables().gates.get(&op) {
            gate.add_permits(count);
        }
    }

    /// How many times `op` has been called, successful or not
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.borrow().get(&op).copied().unwrap_or(0)
    }

    /// Wait until `op` has been called at least `count` times
    pub async fn wait_for_calls(&self, op: StoreOp, count: usize) {
        let mut rx = self.calls.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx
            .wait_for(|calls| calls.get(&op).copied().unwrap_or(0) >= count)
            .await;
    }

    /// Insert a thread directly, bypassing failure injection
    pub fn seed_thread(&self, user_id: Uuid, title: &str) -> Thread {
        let mut tables = self.tables();
        let thread = Thread {
            id: Uuid::new_v4(),
            user_id,
            title: Some(title.to_string()),
            created_at: tables.next_timestamp(),
        };
        tables.threads.push(thread.clone());
        thread
    }

    /// Insert a message directly, bypassing failure injection
    pub fn seed_message(&self, thread_id: Uuid, role: MessageRole, content: &str) -> Message {
        let mut tables = self.tables();
        let message = Message {
            id: Uuid::new_v4(),
            thread_id,
            user_id: None,
            role,
            content: Some(content.to_string()),
            created_at: tables.next_timestamp(),
            images: Vec::new(),
        };
        tables.messages.push(message.clone());
        message
    }

    /// Everything stored for a thread, in insertion order
    pub fn stored_messages(&self, thread_id: Uuid) -> Vec<Message> {
        self.tables()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect()
    }

    /// Count the call, wait on its gate if held, then apply injected failures
    async fn enter(&self, op: StoreOp) -> Result<()> {
        self.calls
            .send_modify(|calls| *calls.entry(op).or_insert(0) += 1);

        let gate = self.tables().gates.get(&op).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| Error::Internal(format!("mock store gate closed: {e}")))?
                .forget();
        }

        if self.tables().take_failure(op) {
            tracing::debug!(op = %op, "Mock store: injected failure");
            return Err(Error::Internal(format!("mock store: {} failed", op)));
        }
        Ok(())
    }
}

impl Default for MockConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MockConversationStore {
    async fn list_threads(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        self.enter(StoreOp::ListThreads).await?;
        let mut threads: Vec<Thread> = self
            .tables()
            .threads
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    async fn create_thread(&self, thread: &Thread) -> Result<Thread> {
        self.enter(StoreOp::CreateThread).await?;
        let mut tables = self.tables();
        if tables.threads.iter().any(|t| t.id == thread.id) {
            return Err(Error::Conflict(format!("Thread {} already exists", thread.id)));
        }
        let mut created = thread.clone();
        created.created_at = tables.next_timestamp();
        tables.threads.push(created.clone());
        Ok(created)
    }

    async fn rename_thread(&self, id: Uuid, title: Option<String>) -> Result<Option<Thread>> {
        self.enter(StoreOp::RenameThread).await?;
        let mut tables = self.tables();
        Ok(tables.threads.iter_mut().find(|t| t.id == id).map(|t| {
            t.title = title;
            t.clone()
        }))
    }

    async fn delete_thread(&self, id: Uuid) -> Result<bool> {
        self.enter(StoreOp::DeleteThread).await?;
        let mut tables = self.tables();
        let before = tables.threads.len();
        tables.threads.retain(|t| t.id != id);
        let deleted = tables.threads.len() < before;
        if deleted {
            tables.messages.retain(|m| m.thread_id != id);
        }
        Ok(deleted)
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        self.enter(StoreOp::ListMessages).await?;
        let mut messages: Vec<Message> = self
            .tables()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        self.enter(StoreOp::InsertMessage).await?;
        let mut tables = self.tables();
        let stored = Message {
            id: Uuid::new_v4(),
            thread_id: message.thread_id,
            user_id: message.user_id,
            role: message.role,
            content: message.content.clone(),
            created_at: tables.next_timestamp(),
            images: Vec::new(),
        };
        tables.messages.push(stored.clone());
        Ok(stored)
    }
}
