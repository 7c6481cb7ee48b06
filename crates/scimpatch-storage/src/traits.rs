//! Storage traits.

use async_trait::async_trait;
use scimpatch_core::AttributeTree;

use crate::error::StorageError;
use crate::types::StoredUser;

/// A store of SCIM User resources.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a new user from its attributes.
    ///
    /// If `id` is `None` the backend generates one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a user with the same ID exists.
    async fn create(
        &self,
        id: Option<String>,
        attributes: AttributeTree,
    ) -> Result<StoredUser, StorageError>;

    /// Reads the last committed state of a user.
    ///
    /// Returns `None` if the user does not exist.
    async fn read(&self, id: &str) -> Result<Option<StoredUser>, StorageError>;

    /// Begins a new transaction.
    ///
    /// The transaction must be either committed or rolled back; dropping it
    /// behaves like a rollback.
    async fn begin_transaction(&self) -> Result<Box<dyn UserTransaction>, StorageError>;

    /// Returns the name of this storage backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// A read-modify-write unit of work scoped to one user.
///
/// `load` claims the user for the lifetime of the transaction: a second
/// transaction loading the same id waits until this one ends. Writes made
/// with `save` are invisible to other readers until `commit`.
#[async_trait]
pub trait UserTransaction: Send + Sync {
    /// Loads a user and claims it for this transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    /// Returns `StorageError::TransactionError` if the transaction already
    /// holds a different user.
    async fn load(&mut self, id: &str) -> Result<StoredUser, StorageError>;

    /// Stages a new version of a user loaded by this transaction.
    ///
    /// The staged user gets the next version and a fresh `last_modified`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if `user` was not loaded by
    /// this transaction.
    async fn save(&mut self, user: StoredUser) -> Result<StoredUser, StorageError>;

    /// Publishes staged writes and releases the claim.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discards staged writes and releases the claim.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
