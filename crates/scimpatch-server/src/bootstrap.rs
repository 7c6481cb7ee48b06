//! Seeds the user store from a JSON file at startup.
//!
//! The file holds an array of SCIM User resources. Each resource keeps its
//! `id` when it has one; users that already exist are skipped.

use std::path::Path;

use anyhow::Context;
use scimpatch_storage::{UserStore, attributes_from_scim};
use serde_json::Value;
use tracing::{info, warn};

/// Loads the users in `path` into `store` and returns how many were created.
pub async fn seed_users(store: &dyn UserStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading users file {}", path.display()))?;
    let resources: Vec<Value> = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing users file {}", path.display()))?;

    let mut created = 0;
    for (index, resource) in resources.into_iter().enumerate() {
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let attributes = attributes_from_scim(resource)
            .with_context(|| format!("user #{index} in {}", path.display()))?;

        match store.create(id, attributes).await {
            Ok(user) => {
                created += 1;
                tracing::debug!(user_id = %user.id, "seeded user");
            }
            Err(e) if e.is_already_exists() => {
                warn!(index, error = %e, "skipping existing user");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(count = created, file = %path.display(), "seeded users");
    Ok(created)
}
