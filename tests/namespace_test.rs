mod common;

use common::FakeFlipt;
use flipt_provider::ProviderService;
use serde_json::json;

#[tokio::test]
async fn test_namespace_create_read_update_delete() {
    let fake = FakeFlipt::start().await;
    let provider = fake.provider().await;

    let created = provider
        .create("flipt_namespace", json!({"key": "production", "name": "Production"}))
        .await
        .unwrap();
    assert_eq!(created["key"], "production");
    assert_eq!(created["name"], "Production");
    assert_eq!(created["environment_key"], "default");
    assert_eq!(created["protected"], false);
    assert_eq!(created["created_at"], "2025-01-01T00:00:00Z");

    let stored = fake.namespace("default", "production").unwrap();
    assert_eq!(stored["name"], "Production");

    let read = provider
        .read("flipt_namespace", created.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read["name"], "Production");
    assert!(read["description"].is_null());

    let mut planned = read.clone();
    planned["name"] = json!("Prod");
    planned["description"] = json!("Live traffic");
    let updated = provider
        .update("flipt_namespace", read, planned)
        .await
        .unwrap();
    assert_eq!(updated["name"], "Prod");
    assert_eq!(
        fake.namespace("default", "production").unwrap()["description"],
        "Live traffic"
    );

    provider
        .delete("flipt_namespace", updated.clone())
        .await
        .unwrap();
    assert!(fake.namespace("default", "production").is_none());
    assert!(provider
        .read("flipt_namespace", updated)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_namespace_delete_is_idempotent() {
    let fake = FakeFlipt::start().await;
    let provider = fake.provider().await;

    provider
        .delete("flipt_namespace", json!({"key": "never-existed", "name": ""}))
        .await
        .unwrap();
    assert_eq!(
        fake.requests().await,
        vec!["DELETE /api/v2/environments/default/namespaces/never-existed"]
    );
}

#[tokio::test]
async fn test_namespace_in_explicit_environment() {
    let fake = FakeFlipt::start().await;
    let provider = fake.provider().await;

    let created = provider
        .create(
            "flipt_namespace",
            json!({"environment_key": "staging", "key": "production", "name": "Production"}),
        )
        .await
        .unwrap();
    assert_eq!(created["environment_key"], "staging");
    assert!(fake.namespace("staging", "production").is_some());
    assert!(fake.namespace("default", "production").is_none());
}

#[tokio::test]
async fn test_namespace_import() {
    let fake = FakeFlipt::start().await;
    fake.seed_namespace("staging", "production", "Production");
    let provider = fake.provider().await;

    let imported = provider
        .import_resource("flipt_namespace", "staging/production")
        .await
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, "flipt_namespace");
    assert_eq!(imported[0].state["environment_key"], "staging");
    assert_eq!(imported[0].state["name"], "Production");

    let err = provider
        .import_resource("flipt_namespace", "missing")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let fake = FakeFlipt::start().await;
    let provider = fake.provider().await;

    provider
        .create("flipt_namespace", json!({"key": "production", "name": "Production"}))
        .await
        .unwrap();

    let requests = fake.server.received_requests().await.unwrap();
    let auth = requests[0]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(auth.as_deref(), Some("Bearer test-token"));
}
