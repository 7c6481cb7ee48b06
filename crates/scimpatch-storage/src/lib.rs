//! # scimpatch-storage
//!
//! Storage abstraction for SCIM User resources.
//!
//! This crate defines the traits and types that storage backends implement.
//! It does not contain any implementations; see `scimpatch-db-memory`.
//!
//! ## Overview
//!
//! [`UserStore`] covers creation and plain reads. Every read-modify-write
//! cycle goes through a [`UserTransaction`], which the backend scopes to a
//! single resource id so that concurrent writers to the same user do not
//! interleave:
//!
//! ```ignore
//! use scimpatch_storage::{StorageError, UserStore};
//!
//! async fn rename(store: &dyn UserStore, id: &str) -> Result<(), StorageError> {
//!     let mut tx = store.begin_transaction().await?;
//!     let mut user = tx.load(id).await?;
//!     user.attributes.insert("displayName".into(), "Babs".into());
//!     tx.save(user).await?;
//!     tx.commit().await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{UserStore, UserTransaction};
pub use types::{StoredUser, USER_RESOURCE_TYPE, attributes_from_scim};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynUserStore = std::sync::Arc<dyn UserStore>;
