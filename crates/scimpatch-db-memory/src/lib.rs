//! In-memory storage backend for scimpatch.
//!
//! This crate provides an in-memory implementation of the `UserStore` trait
//! from `scimpatch-storage`, using a papaya lock-free HashMap for committed
//! state and per-user tokio mutexes to serialise transactions.
//!
//! # Example
//!
//! ```ignore
//! use scimpatch_db_memory::InMemoryUserStore;
//! use scimpatch_storage::UserStore;
//!
//! let store = InMemoryUserStore::new();
//! let attributes = AttributeTree::from_json(json!({"userName": "bjensen"}))?;
//! let created = store.create(None, attributes).await?;
//! ```

pub mod storage;
mod transaction;

pub use scimpatch_storage::{StorageError, StoredUser, UserStore, UserTransaction};
pub use storage::InMemoryUserStore;
pub use transaction::InMemoryUserTransaction;

/// Creates a new in-memory store behind the `UserStore` trait.
pub fn create_user_store() -> scimpatch_storage::DynUserStore {
    std::sync::Arc::new(InMemoryUserStore::new())
}
