use std::sync::Arc;

use scimpatch_core::SchemaSet;
use scimpatch_storage::StoredUser;
use serde_json::Value;

use crate::service::UserPatchService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UserPatchService>,
    pub schemas: Arc<SchemaSet>,
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(service: UserPatchService, schemas: Arc<SchemaSet>, base_url: &str) -> Self {
        Self {
            service: Arc::new(service),
            schemas,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    /// SCIM representation of `user` as served by this instance.
    pub fn render(&self, user: &StoredUser) -> Value {
        user.to_scim(&self.base_url, &self.schemas)
    }

    pub fn location(&self, user: &StoredUser) -> String {
        user.location(&self.base_url)
    }
}
