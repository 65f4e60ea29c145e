//! Instance storage owned by a scope.
//!
//! A [`ScopeStore`] holds the instances cached against one scope, keyed by
//! the resolving kernel and the bound type. The store lives inside the scope
//! handle, so dropping the last handle drops every instance it cached. There
//! is no kernel-side table to evict from.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::kernel::binding::Instance;

type StoreKey = (u64, TypeId);

/// Instances cached for one scope.
///
/// Several kernels may resolve into the same scope; their entries are kept
/// apart by kernel id.
#[derive(Default)]
pub struct ScopeStore {
    entries: Mutex<HashMap<StoreKey, Instance>>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, kernel: u64, type_id: TypeId) -> Option<Instance> {
        self.lock().get(&(kernel, type_id)).cloned()
    }

    /// Insert an instance unless another one won the race; returns the cached one.
    pub(crate) fn insert(&self, kernel: u64, type_id: TypeId, instance: Instance) -> Instance {
        self.lock()
            .entry((kernel, type_id))
            .or_insert(instance)
            .clone()
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StoreKey, Instance>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("instances", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn instance(value: u32) -> Instance {
        Arc::new(value)
    }

    #[test]
    fn test_hit_within_scope() {
        let store = ScopeStore::new();
        let first = store.insert(1, TypeId::of::<u32>(), instance(1));

        let hit = store.get(1, TypeId::of::<u32>()).unwrap();
        assert!(Arc::ptr_eq(&first, &hit));
    }

    #[test]
    fn test_first_insert_wins() {
        let store = ScopeStore::new();
        let first = store.insert(1, TypeId::of::<u32>(), instance(1));
        let second = store.insert(1, TypeId::of::<u32>(), instance(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second.downcast::<u32>().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_kernels_are_partitioned() {
        let store = ScopeStore::new();
        store.insert(1, TypeId::of::<u32>(), instance(1));

        assert!(store.get(2, TypeId::of::<u32>()).is_none());
    }

    #[test]
    fn test_instances_drop_with_store() {
        struct Tracked(Arc<AtomicUsize>);

        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let store = ScopeStore::new();
        store.insert(1, TypeId::of::<Tracked>(), Arc::new(Tracked(drops.clone())));
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(store);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
