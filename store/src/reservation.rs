//! Per-identifier writer exclusion.
//!
//! A writer holds the identifier's lock from its duplicate check until its
//! record is published or abandoned. A second writer of the same identifier
//! waits, then re-checks, so it only sees `DuplicateIdentifier` when the
//! first writer actually stored the record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Identifiers with an insert currently in flight.
#[derive(Debug, Default, Clone)]
pub(crate) struct Reservations {
    held: Slots,
}

impl Reservations {
    /// Claim `identifier` for writing, waiting for any writer that holds it.
    pub(crate) async fn reserve(&self, identifier: &str) -> Reservation {
        let slot = {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(held.entry(identifier.to_string()).or_default())
        };
        let guard = slot.lock_owned().await;
        Reservation {
            identifier: identifier.to_string(),
            held: Arc::clone(&self.held),
            _guard: guard,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, identifier: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identifier)
    }
}

/// Releases the identifier when dropped.
#[derive(Debug)]
pub(crate) struct Reservation {
    identifier: String,
    held: Slots,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and our guard each own one reference; more means waiters.
        let idle = held
            .get(&self.identifier)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2);
        if idle {
            held.remove(&self.identifier);
        }
    }
}
