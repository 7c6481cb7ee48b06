use std::sync::Arc;

use async_trait::async_trait;
use scimpatch_storage::{StorageError, StoredUser, UserTransaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::storage::{LockMap, UserMap};

/// The user a transaction has claimed. Holding the guard keeps every other
/// transaction out of this id.
struct Claim {
    id: String,
    locks: LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        // Release first so the guard's handle no longer counts.
        drop(self.guard.take());
        // Only the map's own handle left means nobody holds or waits on it.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Single-user transaction over [`InMemoryUserStore`](crate::InMemoryUserStore).
///
/// The write is staged in the transaction and only published on `commit`.
/// Dropping the transaction without committing discards it and releases the
/// claim.
pub struct InMemoryUserTransaction {
    data: UserMap,
    locks: LockMap,
    claim: Option<Claim>,
    staged: Option<StoredUser>,
}

impl InMemoryUserTransaction {
    pub(crate) fn new(data: UserMap, locks: LockMap) -> Self {
        Self {
            data,
            locks,
            claim: None,
            staged: None,
        }
    }

    async fn claim(&mut self, id: &str) -> Result<(), StorageError> {
        match &self.claim {
            Some(claim) if claim.id == id => return Ok(()),
            Some(claim) => {
                return Err(StorageError::transaction_error(format!(
                    "transaction already holds user '{}'",
                    claim.id
                )));
            }
            None => {}
        }

        let lock = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        self.claim = Some(Claim {
            id: id.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        });
        Ok(())
    }

    /// Staged state if any, otherwise the committed one.
    fn current(&self, id: &str) -> Option<StoredUser> {
        match &self.staged {
            Some(user) if user.id == id => Some(user.clone()),
            _ => self.data.pin().get(id).cloned(),
        }
    }
}

#[async_trait]
impl UserTransaction for InMemoryUserTransaction {
    async fn load(&mut self, id: &str) -> Result<StoredUser, StorageError> {
        self.claim(id).await?;
        self.current(id)
            .ok_or_else(|| StorageError::not_found(id))
    }

    async fn save(&mut self, user: StoredUser) -> Result<StoredUser, StorageError> {
        let claimed = self.claim.as_ref().is_some_and(|c| c.id == user.id);
        if !claimed {
            return Err(StorageError::transaction_error(format!(
                "user '{}' was not loaded by this transaction",
                user.id
            )));
        }

        let current = self
            .current(&user.id)
            .ok_or_else(|| StorageError::not_found(&user.id))?;
        let next = current.new_version(user.attributes);
        self.staged = Some(next.clone());
        Ok(next)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        if let Some(user) = self.staged {
            tracing::debug!(user_id = %user.id, version = user.version, "committing user");
            self.data.pin().insert(user.id.clone(), user);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        if let Some(user) = &self.staged {
            tracing::debug!(user_id = %user.id, "rolling back staged user");
        }
        Ok(())
    }
}
