//! Handle registry: maps the key stored in a host's `ClientHandle` to the live client.
//!
//! Keys start at 1 and are never reused, so a zeroed, stale or forged handle
//! simply misses and the caller gets `ClientInvalid` instead of a dangling pointer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use crate::client::Client;
use crate::error::InitError;

pub struct Registry {
    next: AtomicU64,
    clients: Mutex<HashMap<u64, Arc<Client>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<u64, Arc<Client>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a client and return its key. On allocation failure the client is
    /// dropped (and its engine shut down) before returning.
    pub fn register(&self, client: Client) -> Result<u64, InitError> {
        let mut clients = self.clients();
        clients.try_reserve(1)?;
        let key = self.next.fetch_add(1, Ordering::Relaxed);
        clients.insert(key, Arc::new(client));
        Ok(key)
    }

    pub fn get(&self, key: u64) -> Option<Arc<Client>> {
        if key == 0 {
            return None;
        }
        self.clients().get(&key).cloned()
    }

    /// Unregister. Only the first caller for a key gets the client back.
    pub fn remove(&self, key: u64) -> Option<Arc<Client>> {
        if key == 0 {
            return None;
        }
        self.clients().remove(&key)
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Process-wide registry used by the C ABI.
pub fn registry() -> &'static Registry {
    &REGISTRY
}
