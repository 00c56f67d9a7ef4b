//! Per-slot serialization.
//!
//! Each slot gets its own async mutex, created lazily and never removed.
//! Admission and promotion hold the slot's mutex across the whole
//! read-decide-write sequence; slots never block each other. `tokio::sync::
//! Mutex` queues waiters fairly, so contention on one slot means bounded
//! queuing, not starvation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::slot::SlotId;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, thiserror::Error)]
#[error("timed out acquiring lock for slot {slot_id} after {waited:?}")]
pub struct LockTimeout {
    pub slot_id: SlotId,
    pub waited: Duration,
}

/// Keyed mutex map: slot id -> exclusive decision scope.
pub struct SlotLocks {
    locks: DashMap<SlotId, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl Default for SlotLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl SlotLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    fn lock_for(&self, slot_id: SlotId) -> Arc<Mutex<()>> {
        self.locks
            .entry(slot_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the slot's exclusive scope, waiting at most the configured
    /// timeout. Expiry is retryable by the caller.
    pub async fn acquire(&self, slot_id: SlotId) -> Result<OwnedMutexGuard<()>, LockTimeout> {
        let lock = self.lock_for(slot_id);
        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| LockTimeout {
                slot_id,
                waited: self.timeout,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_slot_serializes() {
        let locks = SlotLocks::new(Duration::from_millis(50));
        let slot = SlotId::new();

        let guard = locks.acquire(slot).await.unwrap();
        let blocked = locks.acquire(slot).await;
        assert!(blocked.is_err());

        drop(guard);
        assert!(locks.acquire(slot).await.is_ok());
    }

    #[tokio::test]
    async fn different_slots_do_not_block() {
        let locks = SlotLocks::new(Duration::from_millis(50));

        let _a = locks.acquire(SlotId::new()).await.unwrap();
        let b = locks.acquire(SlotId::new()).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn timeout_reports_slot_and_wait() {
        let locks = SlotLocks::new(Duration::from_millis(10));
        let slot = SlotId::new();

        let _guard = locks.acquire(slot).await.unwrap();
        let err = locks.acquire(slot).await.unwrap_err();
        assert_eq!(err.slot_id, slot);
        assert_eq!(err.waited, Duration::from_millis(10));
    }
}
