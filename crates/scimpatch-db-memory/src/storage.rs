use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use papaya::HashMap as PapayaHashMap;
use scimpatch_core::AttributeTree;
use scimpatch_storage::{StorageError, StoredUser, UserStore, UserTransaction};
use tokio::sync::Mutex;

use crate::transaction::InMemoryUserTransaction;

pub(crate) type UserMap = Arc<PapayaHashMap<String, StoredUser>>;
pub(crate) type LockMap = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// In-memory user store.
///
/// - Committed users live in a papaya::HashMap, so reads never block.
/// - Each user id has its own tokio mutex; a transaction holds it from
///   `load` until it ends, which serialises writers of the same user while
///   writers of different users proceed in parallel.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    pub(crate) data: UserMap,
    pub(crate) locks: LockMap,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed users.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(
        &self,
        id: Option<String>,
        attributes: AttributeTree,
    ) -> Result<StoredUser, StorageError> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let user = StoredUser::new(id.clone(), attributes);

        let guard = self.data.pin();
        if guard.try_insert(id.clone(), user.clone()).is_err() {
            return Err(StorageError::already_exists(id));
        }

        tracing::debug!(user_id = %id, "created user");
        Ok(user)
    }

    async fn read(&self, id: &str) -> Result<Option<StoredUser>, StorageError> {
        Ok(self.data.pin().get(id).cloned())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn UserTransaction>, StorageError> {
        Ok(Box::new(InMemoryUserTransaction::new(
            Arc::clone(&self.data),
            Arc::clone(&self.locks),
        )))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
