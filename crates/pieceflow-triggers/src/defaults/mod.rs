//! Default [`TriggerStore`](crate::traits::TriggerStore) implementations.
//!
//! These let the controllers run with zero external configuration. A host
//! engine normally supplies its own store.

pub mod file_store;
pub mod in_memory_store;
pub use file_store::FileTriggerStore;
pub use in_memory_store::InMemoryTriggerStore;
