//! SCIM Users PATCH server.
//!
//! Routes:
//! - `PATCH /Users/{id}`: apply RFC 7644 PATCH operations
//! - `GET /Users/{id}`, `POST /Users`
//! - `GET /healthz`

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;
pub mod service;
pub mod state;

pub use config::AppConfig;
pub use server::{ScimServer, ServerBuilder, build_app, build_state};
pub use service::{PatchResult, UserPatchService};
pub use state::AppState;
