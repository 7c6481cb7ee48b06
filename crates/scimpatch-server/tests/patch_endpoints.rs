use std::sync::Arc;

use scimpatch_core::AttributeTree;
use scimpatch_db_memory::InMemoryUserStore;
use scimpatch_server::{AppConfig, build_app};
use scimpatch_storage::{DynUserStore, UserStore};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const SCIM_JSON: &str = "application/scim+json";
const PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

async fn seeded_store() -> DynUserStore {
    let store = InMemoryUserStore::new();
    let attributes = AttributeTree::from_json(json!({
        "userName": "bjensen",
        "displayName": "Babs Jensen",
        "emails": [
            {"type": "work", "value": "bjensen@example.com", "primary": true},
            {"type": "home", "value": "babs@jensen.org"}
        ]
    }))
    .unwrap();
    store
        .create(Some("2819c223".to_string()), attributes)
        .await
        .unwrap();
    Arc::new(store)
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    let mut cfg = AppConfig::default();
    cfg.server.base_url = Some(format!("http://{addr}"));
    let app = build_app(&cfg, seeded_store().await);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn patch_body(operations: Value) -> String {
    json!({"schemas": [PATCH_OP], "Operations": operations}).to_string()
}

async fn patch(client: &reqwest::Client, url: &str, body: String) -> reqwest::Response {
    client
        .patch(url)
        .header("content-type", SCIM_JSON)
        .body(body)
        .send()
        .await
        .unwrap()
}

async fn get_user(client: &reqwest::Client, url: &str) -> Value {
    let resp = client.get(url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn patch_changes_and_noops() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let user_url = format!("{base}/Users/2819c223");

    // changed: 200 with the resource and a bumped version
    let body = patch_body(json!([
        {"op": "replace", "path": "displayName", "value": "Barbara Jensen"}
    ]));
    let resp = patch(&client, &user_url, body.clone()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], SCIM_JSON);
    assert_eq!(resp.headers()["etag"], "W/\"2\"");
    let user: Value = resp.json().await.unwrap();
    assert_eq!(user["displayName"], "Barbara Jensen");
    assert_eq!(user["meta"]["version"], "W/\"2\"");
    assert_eq!(user["meta"]["location"], json!(user_url));

    // same patch again: 204, version unchanged
    let resp = patch(&client, &user_url, body).await;
    assert_eq!(resp.status(), 204);
    assert_eq!(resp.headers()["etag"], "W/\"2\"");
    let user = get_user(&client, &user_url).await;
    assert_eq!(user["meta"]["version"], "W/\"2\"");

    // removing an absent attribute is a no-op
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([{"op": "remove", "path": "nickName"}])),
    )
    .await;
    assert_eq!(resp.status(), 204);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn patch_filtered_multi_valued_attributes() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let user_url = format!("{base}/Users/2819c223");

    // operation names are case-insensitive
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "Replace", "path": "emails[type eq \"work\"].value", "value": "babs@example.com"},
            {"op": "Remove", "path": "emails[type eq \"home\"]"}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let user: Value = resp.json().await.unwrap();
    assert_eq!(
        user["emails"],
        json!([{"type": "work", "value": "babs@example.com", "primary": true}])
    );

    // add appends to the list
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "add", "path": "emails", "value": [{"type": "other", "value": "b@j.org"}]}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let user: Value = resp.json().await.unwrap();
    assert_eq!(user["emails"][1]["value"], "b@j.org");
    assert_eq!(user["meta"]["version"], "W/\"3\"");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn patch_errors_leave_resource_unchanged() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let user_url = format!("{base}/Users/2819c223");
    let before = get_user(&client, &user_url).await;

    // malformed filter
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "replace", "path": "displayName", "value": "changed"},
            {"op": "remove", "path": "emails[type eq]"}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.headers()["content-type"], SCIM_JSON);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(
        err["schemas"],
        json!(["urn:ietf:params:scim:api:messages:2.0:Error"])
    );
    assert_eq!(err["status"], "400");
    assert_eq!(err["scimType"], "invalidPath");

    // filter on an attribute the sub-attributes do not define
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "replace", "path": "emails[bogus eq \"x\"].value", "value": "y"}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["scimType"], "invalidFilter");

    // read-only attribute applied after a valid operation
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "replace", "path": "displayName", "value": "changed"},
            {"op": "replace", "path": "id", "value": "other"}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["scimType"], "mutability");

    // unknown op
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([{"op": "move", "path": "displayName"}])),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["scimType"], "invalidSyntax");

    // missing PatchOp schema
    let resp = patch(
        &client,
        &user_url,
        json!({"Operations": [{"op": "remove", "path": "displayName"}]}).to_string(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // filter on an attribute the user does not have
    let resp = patch(
        &client,
        &user_url,
        patch_body(json!([
            {"op": "add", "path": "addresses[type eq \"work\"]", "value": {"locality": "Hollywood"}}
        ])),
    )
    .await;
    assert_eq!(resp.status(), 501);

    let after = get_user(&client, &user_url).await;
    assert_eq!(after, before);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn hostile_paths_are_rejected_as_invalid_path() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();
    let user_url = format!("{base}/Users/2819c223");
    let before = get_user(&client, &user_url).await;

    let deep = format!("emails[{}type eq \"work\"]", "(".repeat(10_000));
    for path in ["displayNamé", "abcé", "日本語", "émails[type eq \"work\"]", deep.as_str()] {
        let resp = patch(
            &client,
            &user_url,
            patch_body(json!([{"op": "replace", "path": path, "value": "x"}])),
        )
        .await;
        assert_eq!(resp.status(), 400, "path {path:.40}");
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["scimType"], "invalidPath");
    }

    // the server is still up and the user untouched
    let after = get_user(&client, &user_url).await;
    assert_eq!(after, before);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn users_create_read_and_missing() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = patch(
        &client,
        &format!("{base}/Users/missing"),
        patch_body(json!([{"op": "remove", "path": "displayName"}])),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["status"], "404");

    let resp = client
        .post(format!("{base}/Users"))
        .header("content-type", SCIM_JSON)
        .body(
            json!({
                "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
                "id": "ignored",
                "userName": "jsmith",
                "password": "s3cret"
            })
            .to_string(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let location = resp.headers()["location"].to_str().unwrap().to_string();
    let created: Value = resp.json().await.unwrap();
    assert_ne!(created["id"], "ignored");
    assert!(created.get("password").is_none());
    assert_eq!(created["meta"]["location"], json!(location));

    let user = get_user(&client, &location).await;
    assert_eq!(user["userName"], "jsmith");
    assert_eq!(user["meta"]["version"], "W/\"1\"");

    let resp = client
        .post(format!("{base}/Users"))
        .header("content-type", SCIM_JSON)
        .body(json!({"displayName": "no user name"}).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
