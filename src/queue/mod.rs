//! L8 — holds chat-user requests received before the pool cache (L5) is
//! ready. Dropping the request is unacceptable; blocking the request
//! handler indefinitely is also unacceptable, so requests land here and a
//! single cooperative poller drains the map once the cache is ready.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct WaitingUser {
    pub chat_user_id: String,
    pub display_name: String,
    pub wallet: String,
    pub requested_at: DateTime<Utc>,
}

/// Invoked once per waiting user when the cache becomes ready: fetch LP
/// positions, create the payment-request row, send outbound chat
/// instructions. A per-user failure is handled by the caller (send a
/// recoverable error message); it must not abort the rest of the drain.
#[async_trait]
pub trait QueueDrainHandler: Send + Sync {
    async fn handle_ready_user(&self, user: &WaitingUser) -> Result<(), EngineError>;
}

#[derive(Default)]
pub struct CacheReadyQueue {
    waiting: Mutex<HashMap<String, WaitingUser>>,
    processing_guard: Mutex<()>,
}

impl CacheReadyQueue {
    pub fn new() -> Self {
        CacheReadyQueue { waiting: Mutex::new(HashMap::new()), processing_guard: Mutex::new(()) }
    }

    /// A user present in the map has not yet received payment
    /// instructions. Re-adding an already-waiting user just refreshes
    /// their request.
    pub async fn add(&self, user: WaitingUser) {
        self.waiting.lock().await.insert(user.chat_user_id.clone(), user);
    }

    pub async fn len(&self) -> usize {
        self.waiting.lock().await.len()
    }

    pub async fn is_waiting(&self, chat_user_id: &str) -> bool {
        self.waiting.lock().await.contains_key(chat_user_id)
    }

    /// Drains the queue if non-empty, re-entrancy guarded: a second
    /// caller while a drain is already running is a no-op, not a block.
    /// The queue never retries the same user implicitly.
    pub async fn drain_if_ready<H: QueueDrainHandler>(&self, cache_is_ready: bool, handler: &H) {
        if !cache_is_ready {
            return;
        }
        let Ok(_guard) = self.processing_guard.try_lock() else {
            return;
        };

        let users: Vec<WaitingUser> = self.waiting.lock().await.values().cloned().collect();
        if users.is_empty() {
            return;
        }

        for user in users {
            match handler.handle_ready_user(&user).await {
                Ok(()) => {
                    self.waiting.lock().await.remove(&user.chat_user_id);
                }
                Err(e) => {
                    tracing::warn!(chat_user_id = %user.chat_user_id, error = %e, "failed to drain waiting user from cache-ready queue");
                    self.waiting.lock().await.remove(&user.chat_user_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl QueueDrainHandler for CountingHandler {
        async fn handle_ready_user(&self, user: &WaitingUser) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(user.chat_user_id.as_str()) {
                return Err(EngineError::Internal("boom".into()));
            }
            Ok(())
        }
    }

    fn user(id: &str) -> WaitingUser {
        WaitingUser {
            chat_user_id: id.into(),
            display_name: "Ada".into(),
            wallet: "0xabc".into(),
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn drains_all_waiting_users_when_ready() {
        let queue = CacheReadyQueue::new();
        queue.add(user("u1")).await;
        queue.add(user("u2")).await;
        let handler = CountingHandler { calls: AtomicUsize::new(0), fail_on: None };
        queue.drain_if_ready(true, &handler).await;
        assert_eq!(queue.len().await, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_drain_when_cache_not_ready() {
        let queue = CacheReadyQueue::new();
        queue.add(user("u1")).await;
        let handler = CountingHandler { calls: AtomicUsize::new(0), fail_on: None };
        queue.drain_if_ready(false, &handler).await;
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn per_user_failure_only_drops_that_user() {
        let queue = CacheReadyQueue::new();
        queue.add(user("good")).await;
        queue.add(user("bad")).await;
        let handler = CountingHandler { calls: AtomicUsize::new(0), fail_on: Some("bad".into()) };
        queue.drain_if_ready(true, &handler).await;
        assert_eq!(queue.len().await, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }
}
