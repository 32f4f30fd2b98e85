use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Remembers which comment threads already received a reply.
#[async_trait]
pub trait ThreadLedger: Send + Sync {
    async fn has_replied(&self, thread_id: &str) -> anyhow::Result<bool>;
    async fn mark_replied(&self, thread_id: &str) -> anyhow::Result<()>;
}

/// Process-lifetime ledger. Never evicts, forgets everything on restart.
#[derive(Default)]
pub struct InMemoryLedger {
    threads: Mutex<HashSet<String>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.threads
            .lock()
            .map_err(|_| anyhow!("thread ledger mutex was poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.threads.lock().unwrap().len()
    }
}

#[async_trait]
impl ThreadLedger for InMemoryLedger {
    async fn has_replied(&self, thread_id: &str) -> anyhow::Result<bool> {
        Ok(self.lock()?.contains(thread_id))
    }

    async fn mark_replied(&self, thread_id: &str) -> anyhow::Result<()> {
        self.lock()?.insert(thread_id.to_owned());
        Ok(())
    }
}

/// One async lock per thread id, so that two deliveries about the same thread can't both pass
/// the duplicate check before either marks it.
#[derive(Default)]
pub struct ThreadLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the whole pipeline run of an event. Dropping it releases the thread, and removes
/// its entry once nobody else is waiting on it.
pub struct ThreadGuard {
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn lock(&self, thread_id: &str) -> anyhow::Result<ThreadGuard> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| anyhow!("thread locks mutex was poisoned"))?;
            locks
                .entry(thread_id.to_owned())
                .or_insert_with(Default::default)
                .clone()
        };

        let guard = mutex.lock_owned().await;

        Ok(ThreadGuard {
            thread_id: thread_id.to_owned(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        })
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        // release the async lock first, then drop the map entry if we were its last user
        drop(self.guard.take());

        if let Ok(mut locks) = self.locks.lock() {
            let unused = locks
                .get(&self.thread_id)
                .map_or(false, |mutex| Arc::strong_count(mutex) == 1);
            if unused {
                locks.remove(&self.thread_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_in_memory_ledger() {
        let ledger = InMemoryLedger::new();

        assert!(!ledger.has_replied("thread-1").await.unwrap());
        ledger.mark_replied("thread-1").await.unwrap();
        ledger.mark_replied("thread-1").await.unwrap();

        assert!(ledger.has_replied("thread-1").await.unwrap());
        assert!(!ledger.has_replied("thread-2").await.unwrap());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_thread_lock_is_exclusive() {
        let locks = Arc::new(ThreadLocks::new());

        let first = locks.lock("thread-1").await.unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.lock("thread-1").await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "second lock should wait for the first");

        drop(first);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_other_threads_are_independent() {
        let locks = ThreadLocks::new();

        let _first = locks.lock("thread-1").await.unwrap();
        let _second = tokio::time::timeout(Duration::from_secs(1), locks.lock("thread-2"))
            .await
            .expect("unrelated thread shouldn't block")
            .unwrap();

        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_cleaned_up() {
        let locks = ThreadLocks::new();

        let guard = locks.lock("thread-1").await.unwrap();
        assert_eq!(locks.tracked(), 1);

        drop(guard);
        assert_eq!(locks.tracked(), 0);
    }
}
