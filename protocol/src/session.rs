//! Per-endpoint session and sequence context
//!
//! Every exchange on an endpoint must hold that endpoint's session lock
//! for its full duration; the sequence counter lives inside the lock so a
//! sequence number can never be advanced by two exchanges at once.
//! Sessions for distinct endpoints are independent.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::codec::SEQ_MODULUS;
use crate::Endpoint;

/// Wrapping 6-bit request sequence counter
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Take the current sequence number and advance
    pub fn advance(&mut self) -> u8 {
        let seq = self.next;
        self.next = (self.next + 1) % SEQ_MODULUS;
        seq
    }
}

/// Exchange-ordering state for one endpoint
#[derive(Debug, Default)]
pub struct Session {
    counter: Mutex<SequenceCounter>,
}

impl Session {
    /// Acquire exclusive use of this endpoint's sequence context.
    ///
    /// The returned guard must be held until the exchange has a final
    /// outcome, including all retries.
    pub async fn acquire(&self) -> MutexGuard<'_, SequenceCounter> {
        self.counter.lock().await
    }
}

/// Tracks sessions for all known endpoints, keyed by address
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for an endpoint, creating it on first use
    pub async fn session_for(&self, endpoint: &Endpoint) -> Arc<Session> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&endpoint.address) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(endpoint.address.clone())
            .or_default()
            .clone()
    }

    /// Number of endpoints with an established session
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
