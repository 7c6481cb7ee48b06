use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use scimpatch_core::SchemaSet;
use scimpatch_db_memory::InMemoryUserStore;
use scimpatch_patch::AttributePatcher;
use scimpatch_storage::DynUserStore;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, service::UserPatchService, state::AppState};

pub struct ScimServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_state(cfg: &AppConfig, store: DynUserStore) -> AppState {
    let schemas = Arc::new(SchemaSet::user());
    let patcher = AttributePatcher::new(Arc::clone(&schemas)).with_policy(cfg.patch);
    AppState::new(
        UserPatchService::new(store, patcher),
        schemas,
        &cfg.base_url(),
    )
}

pub fn build_app(cfg: &AppConfig, store: DynUserStore) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let state = build_state(cfg, store);

    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            latency_ms = latency.as_millis() as u64,
                            "request handled"
                        );
                    },
                ),
        )
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/Users", post(handlers::create_user))
        .route(
            "/Users/{id}",
            get(handlers::get_user).patch(handlers::patch_user),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(middleware)
        .layer(DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynUserStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Storage backend; an empty in-memory store when not set.
    pub fn with_store(mut self, store: DynUserStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> ScimServer {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryUserStore::new()));
        tracing::info!(backend = store.backend_name(), "storage backend ready");
        let app = build_app(&self.config, store);

        ScimServer {
            addr: self.addr,
            app,
        }
    }
}

impl ScimServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;

    fn app(cfg: &AppConfig) -> Router {
        build_app(cfg, Arc::new(InMemoryUserStore::new()))
    }

    #[tokio::test]
    async fn test_healthz() {
        let resp = app(&AppConfig::default())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_scim_error() {
        let resp = app(&AppConfig::default())
            .oneshot(Request::builder().uri("/Groups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/scim+json"
        );
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut cfg = AppConfig::default();
        cfg.server.body_limit_bytes = 64;
        let body = format!(
            r#"{{"schemas":["urn:ietf:params:scim:api:messages:2.0:PatchOp"],"Operations":[{{"op":"replace","path":"displayName","value":"{}"}}]}}"#,
            "x".repeat(128)
        );
        let resp = app(&cfg)
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/Users/u-1")
                    .header(header::CONTENT_TYPE, "application/scim+json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_content_type() {
        let resp = app(&AppConfig::default())
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/Users/u-1")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
