use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Serializes lifecycle operations on the same record within one process
/// (§4.4 ordering rules, §5). Cross-process serialization is left to the
/// Record Store's optimistic-conflict retry.
#[derive(Clone, Default)]
pub struct RecordLockRegistry {
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl RecordLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: Uuid) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().unwrap();
            locks.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn serializes_access_to_the_same_id() {
        let registry = RecordLockRegistry::new();
        let id = Uuid::new_v4();
        let counter = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let counter = counter.clone();
            let overlaps = overlaps.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock(id).await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                if before != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_ids_do_not_contend() {
        let registry = RecordLockRegistry::new();
        let a = registry.lock(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), registry.lock(Uuid::new_v4())).await;
        assert!(b.is_ok());
        drop(a);
    }
}
