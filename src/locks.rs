use std::{collections::HashMap, sync::Arc};

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

/// Per volume group mutual exclusion. Creating and deleting shares in the same
/// group is serialized so that capacity checks and name collisions are not
/// raced by this process.
#[derive(Debug, Default)]
pub struct PoolLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held for as long as the group must stay locked.
pub struct PoolGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl PoolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock of `group` is available.
    pub fn lock(&self, group: &str) -> PoolGuard {
        let lock = self.entry(group);
        PoolGuard {
            _guard: lock.lock_arc(),
        }
    }

    /// Takes the lock of `group` only if nobody holds it.
    pub fn try_lock(&self, group: &str) -> Option<PoolGuard> {
        let lock = self.entry(group);
        lock.try_lock_arc().map(|guard| PoolGuard { _guard: guard })
    }

    fn entry(&self, group: &str) -> Arc<Mutex<()>> {
        self.locks.lock().entry(group.into()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    #[test]
    fn test_same_group_excludes() {
        let locks = PoolLocks::new();
        let guard = locks.lock("vg0");
        assert!(locks.try_lock("vg0").is_none());

        // Other groups are independent
        assert!(locks.try_lock("vg1").is_some());

        drop(guard);
        assert!(locks.try_lock("vg0").is_some());
    }

    #[test]
    fn test_serializes_threads() {
        let locks = Arc::new(PoolLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    let _guard = locks.lock("vg0");
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
