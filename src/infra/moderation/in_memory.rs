// In-memory implementation of UserRecordStore.
//
// Backed by a DashMap, whose sharded locking gives the per-key atomicity the
// store contract requires. Useful for tests and token-only trial runs; the
// production deployment uses the SQLite store.

use crate::core::moderation::{ModerationError, UserRecord, UserRecordStore, UserState};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Clones share the same underlying map, so a test can keep a handle for
/// assertions after handing the store to the engine.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<DashMap<u64, UserRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRecordStore for InMemoryRecordStore {
    async fn get(&self, user_id: u64) -> Result<Option<UserRecord>, ModerationError> {
        Ok(self.records.get(&user_id).map(|r| r.clone()))
    }

    async fn try_create(&self, user_id: u64, state: UserState) -> Result<bool, ModerationError> {
        match self.records.entry(user_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(UserRecord::new(user_id, state));
                Ok(true)
            }
        }
    }

    async fn compare_and_set(
        &self,
        user_id: u64,
        expected: UserState,
        new: UserState,
    ) -> Result<bool, ModerationError> {
        match self.records.get_mut(&user_id) {
            Some(mut record) if record.state == expected => {
                record.advance(new);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
