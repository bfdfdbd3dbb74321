use std::sync::Arc;

use crate::record::Record;
use crate::store::MessageStore;

/// Read-only view over the store of one entity kind.
#[derive(Debug)]
pub struct EntityQuery<R> {
    store: Arc<MessageStore<R>>,
}

impl<R> Clone for EntityQuery<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<R: Record> EntityQuery<R> {
    pub fn new(store: Arc<MessageStore<R>>) -> Self {
        Self { store }
    }

    /// Every record received so far, oldest first.
    pub fn list_all(&self) -> Vec<R> {
        self.store.snapshot_all()
    }

    /// The current record for `key`, using the kind's latest policy.
    pub fn get_latest(&self, key: &str) -> Option<R> {
        self.store.latest_by_key(key, R::LATEST_POLICY)
    }
}
