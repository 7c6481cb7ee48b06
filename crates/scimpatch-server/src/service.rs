//! User PATCH service.
//!
//! Wraps load, apply and persist in one storage transaction scoped to a
//! single user, so concurrent PATCHes of the same id never interleave.

use scimpatch_api::ApiError;
use scimpatch_core::{AttributeTree, find_key};
use scimpatch_patch::{AttributePatcher, PatchOperation};
use scimpatch_storage::{DynUserStore, StoredUser, UserTransaction};
use tracing::{debug, info, warn};

/// Result of a PATCH against a stored user.
#[derive(Debug, Clone)]
pub struct PatchResult {
    /// The user after the patch; the stored state when nothing changed.
    pub user: StoredUser,
    pub changed: bool,
}

#[derive(Clone)]
pub struct UserPatchService {
    store: DynUserStore,
    patcher: AttributePatcher,
}

impl UserPatchService {
    pub fn new(store: DynUserStore, patcher: AttributePatcher) -> Self {
        Self { store, patcher }
    }

    pub fn store(&self) -> &DynUserStore {
        &self.store
    }

    pub fn patcher(&self) -> &AttributePatcher {
        &self.patcher
    }

    /// Applies `operations` to user `id`.
    ///
    /// Nothing is written unless the patch changes the user; a failing
    /// operation leaves the stored user untouched.
    pub async fn patch(
        &self,
        id: &str,
        operations: &[PatchOperation],
    ) -> Result<PatchResult, ApiError> {
        let mut tx = self.store.begin_transaction().await?;

        let current = match tx.load(id).await {
            Ok(user) => user,
            Err(e) => {
                debug!(user_id = %id, category = %e.category(), error = %e, "load failed");
                rollback(tx, id).await;
                return Err(e.into());
            }
        };

        let outcome = match self.patcher.apply(current.attributes.clone(), operations) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(user_id = %id, error = %e, "patch rejected");
                rollback(tx, id).await;
                return Err(e.into());
            }
        };

        if !outcome.changed {
            rollback(tx, id).await;
            info!(
                user_id = %id,
                operations = operations.len(),
                changed = false,
                "patch applied"
            );
            return Ok(PatchResult {
                user: current,
                changed: false,
            });
        }

        let fields = changed_fields(&current.attributes, &outcome.tree);
        let staged = StoredUser {
            attributes: outcome.tree,
            ..current
        };
        let saved = match tx.save(staged).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %id, category = %e.category(), error = %e, "save failed");
                rollback(tx, id).await;
                return Err(e.into());
            }
        };
        tx.commit().await?;

        info!(
            user_id = %id,
            operations = operations.len(),
            changed = true,
            version = saved.version,
            fields = ?fields,
            "patch applied"
        );
        Ok(PatchResult {
            user: saved,
            changed: true,
        })
    }

    pub async fn create(&self, attributes: AttributeTree) -> Result<StoredUser, ApiError> {
        let user = self.store.create(None, attributes).await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn read(&self, id: &str) -> Result<StoredUser, ApiError> {
        self.store
            .read(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User {id} not found")))
    }
}

async fn rollback(tx: Box<dyn UserTransaction>, id: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(user_id = %id, error = %e, "rollback failed");
    }
}

/// Top-level attribute names whose value differs between `before` and
/// `after`, in `after` order followed by removed names.
fn changed_fields(before: &AttributeTree, after: &AttributeTree) -> Vec<String> {
    let mut fields: Vec<String> = after
        .iter()
        .filter(|(name, value)| {
            find_key(before, name)
                .and_then(|i| before.get_index(i))
                .is_none_or(|(_, old)| old != *value)
        })
        .map(|(name, _)| name.clone())
        .collect();
    fields.extend(
        before
            .keys()
            .filter(|name| find_key(after, name).is_none())
            .cloned(),
    );
    fields
}
