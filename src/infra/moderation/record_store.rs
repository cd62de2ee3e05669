// Implementations of the user record store.

pub mod in_memory;
pub mod sqlite_record_store;

// Re-export for convenience
pub use in_memory::InMemoryRecordStore;
pub use sqlite_record_store::SqliteRecordStore;
