//! Registry of running queries, keyed by request id, so they can be
//! cancelled from a separate request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InFlightRequests {
    tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new request. Returns `None` if `id` is already running.
    ///
    /// Dropping the guard cancels the token and forgets the request, which
    /// also covers a client that disconnects mid-request.
    pub fn register(&self, id: Uuid) -> Option<InFlightGuard> {
        let mut tokens = self.lock();
        if tokens.contains_key(&id) {
            return None;
        }
        let token = CancellationToken::new();
        tokens.insert(id, token.clone());
        Some(InFlightGuard {
            id,
            token,
            registry: self.clone(),
        })
    }

    /// Flip the cancellation flag of a running request.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.lock().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

pub struct InFlightGuard {
    id: Uuid,
    token: CancellationToken,
    registry: InFlightRequests,
}

impl InFlightGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.registry.lock().remove(&self.id);
    }
}
