//! In-memory Flipt v2 server for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use flipt_provider::testing::ProviderTester;
use flipt_provider::{FliptProvider, ProviderService};
use serde_json::{json, Map, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test-token";
const TIMESTAMP: &str = "2025-01-01T00:00:00Z";

type NamespaceId = (String, String);
type ResourceId = (String, String, String, String);

#[derive(Default)]
struct Store {
    environments: Option<Vec<Value>>,
    namespaces: BTreeMap<NamespaceId, Value>,
    resources: BTreeMap<ResourceId, Map<String, Value>>,
    revision: u64,
    next_rule_id: u64,
    failure: Option<(u16, String)>,
}

impl Store {
    fn bump(&mut self) -> String {
        self.revision += 1;
        format!("rev-{}", self.revision)
    }

    fn write_namespace(&mut self, method: &str, env: &str, body: &Value) -> ResponseTemplate {
        let key = body["key"].as_str().unwrap_or_default().to_string();
        let id = (env.to_string(), key.clone());
        let existing = self.namespaces.get(&id).cloned();
        match (method, &existing) {
            ("POST", Some(_)) => return error(409, "namespace already exists"),
            ("PUT", None) => return error(404, "namespace not found"),
            _ => {},
        }

        let namespace = json!({
            "key": key,
            "name": body["name"].as_str().unwrap_or_default(),
            "description": body["description"].as_str().unwrap_or_default(),
            "protected": body["protected"].as_bool().unwrap_or(false),
            "createdAt": existing
                .as_ref()
                .and_then(|n| n["createdAt"].as_str())
                .unwrap_or(TIMESTAMP),
            "updatedAt": TIMESTAMP,
        });
        self.namespaces.insert(id, namespace.clone());
        let revision = self.bump();
        ok(json!({"namespace": namespace, "revision": revision}))
    }

    fn write_resource(
        &mut self,
        method: &str,
        env: &str,
        ns: &str,
        body: &Value,
    ) -> ResponseTemplate {
        let key = body["key"].as_str().unwrap_or_default().to_string();
        let Some(payload) = body["payload"].as_object() else {
            return error(400, "payload is required");
        };
        let type_url = payload
            .get("@type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let id = (env.to_string(), ns.to_string(), type_url, key.clone());
        match (method, self.resources.contains_key(&id)) {
            ("POST", true) => return error(409, "resource already exists"),
            ("PUT", false) => return error(404, "resource not found"),
            _ => {},
        }

        let mut payload = payload.clone();
        if let Some(Value::Array(rules)) = payload.get_mut("rules") {
            for rule in rules.iter_mut().filter_map(Value::as_object_mut) {
                if rule.get("id").and_then(Value::as_str).map_or(true, str::is_empty) {
                    self.next_rule_id += 1;
                    rule.insert("id".to_string(), json!(format!("rule-{}", self.next_rule_id)));
                }
            }
        }
        self.resources.insert(id, payload.clone());
        let revision = self.bump();
        ok(json!({
            "resource": {"namespaceKey": ns, "key": key, "payload": payload},
            "revision": revision
        }))
    }
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"code": status, "message": message}))
}

#[derive(Clone, Default)]
struct FakeFliptResponder {
    store: Arc<Mutex<Store>>,
}

impl Respond for FakeFliptResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut store = self.store.lock().unwrap();
        if let Some((status, body)) = store.failure.take() {
            return ResponseTemplate::new(status).set_body_string(body);
        }

        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.map(str::to_string).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["api", "v2", "environments"]) => match &store.environments {
                Some(environments) => ok(json!({"environments": environments})),
                None => error(404, "not found"),
            },
            (method @ ("POST" | "PUT"), ["api", "v2", "environments", env, "namespaces"]) => {
                store.write_namespace(method, env, &body)
            },
            ("GET", ["api", "v2", "environments", env, "namespaces", key]) => {
                let id = (env.to_string(), key.to_string());
                match store.namespaces.get(&id) {
                    Some(namespace) => ok(json!({"namespace": namespace, "revision": "rev"})),
                    None => error(404, "namespace not found"),
                }
            },
            ("DELETE", ["api", "v2", "environments", env, "namespaces", key]) => {
                let id = (env.to_string(), key.to_string());
                match store.namespaces.remove(&id) {
                    Some(_) => {
                        let revision = store.bump();
                        ok(json!({"revision": revision}))
                    },
                    None => error(404, "namespace not found"),
                }
            },
            (
                method @ ("POST" | "PUT"),
                ["api", "v2", "environments", env, "namespaces", ns, "resources"],
            ) => store.write_resource(method, env, ns, &body),
            (
                "GET",
                ["api", "v2", "environments", env, "namespaces", ns, "resources", type_url, key],
            ) => {
                let id = (env.to_string(), ns.to_string(), type_url.to_string(), key.to_string());
                match store.resources.get(&id) {
                    Some(payload) => ok(json!({
                        "resource": {"namespaceKey": ns, "key": key, "payload": payload},
                        "revision": "rev"
                    })),
                    None => error(404, "resource not found"),
                }
            },
            (
                "DELETE",
                ["api", "v2", "environments", env, "namespaces", ns, "resources", type_url, key],
            ) => {
                let id = (env.to_string(), ns.to_string(), type_url.to_string(), key.to_string());
                match store.resources.remove(&id) {
                    Some(_) => {
                        let revision = store.bump();
                        ok(json!({"revision": revision}))
                    },
                    None => error(404, "resource not found"),
                }
            },
            _ => error(404, "no route"),
        }
    }
}

/// A running fake Flipt server.
pub struct FakeFlipt {
    pub server: MockServer,
    store: Arc<Mutex<Store>>,
}

impl FakeFlipt {
    /// Start a server that knows the `default` and `staging` environments.
    pub async fn start() -> Self {
        let fake = Self::without_environment_listing().await;
        fake.store.lock().unwrap().environments = Some(vec![
            json!({"key": "default", "name": "Default", "default": true}),
            json!({"key": "staging", "name": ""}),
        ]);
        fake
    }

    /// Start a server whose environment listing endpoint returns 404.
    pub async fn without_environment_listing() -> Self {
        let server = MockServer::start().await;
        let responder = FakeFliptResponder::default();
        let store = responder.store.clone();
        Mock::given(any()).respond_with(responder).mount(&server).await;
        Self { server, store }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn provider_config(&self) -> Value {
        json!({"endpoint": self.uri(), "token": TOKEN})
    }

    /// A provider configured against this server.
    pub async fn provider(&self) -> FliptProvider {
        let provider = FliptProvider::new();
        let diagnostics = provider.configure(self.provider_config()).await.unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        provider
    }

    /// A tester around a provider configured against this server.
    pub async fn tester(&self) -> ProviderTester<FliptProvider> {
        ProviderTester::new(self.provider().await)
    }

    pub fn seed_namespace(&self, env: &str, key: &str, name: &str) {
        self.store.lock().unwrap().namespaces.insert(
            (env.to_string(), key.to_string()),
            json!({"key": key, "name": name, "description": "", "protected": false}),
        );
    }

    /// Store a flag or segment document as-is.
    pub fn seed_resource(&self, env: &str, ns: &str, payload: Value) {
        let payload = payload.as_object().cloned().unwrap_or_default();
        let type_url = payload["@type"].as_str().unwrap_or_default().to_string();
        let key = payload["key"].as_str().unwrap_or_default().to_string();
        self.store
            .lock()
            .unwrap()
            .resources
            .insert((env.to_string(), ns.to_string(), type_url, key), payload);
    }

    pub fn namespace(&self, env: &str, key: &str) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .namespaces
            .get(&(env.to_string(), key.to_string()))
            .cloned()
    }

    pub fn flag(&self, env: &str, ns: &str, key: &str) -> Option<Value> {
        self.resource(env, ns, "flipt.core.Flag", key)
    }

    pub fn segment(&self, env: &str, ns: &str, key: &str) -> Option<Value> {
        self.resource(env, ns, "flipt.core.Segment", key)
    }

    fn resource(&self, env: &str, ns: &str, type_url: &str, key: &str) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .resources
            .get(&(env.to_string(), ns.to_string(), type_url.to_string(), key.to_string()))
            .cloned()
            .map(Value::Object)
    }

    /// Make the next request fail with the given status and raw body.
    pub fn fail_next(&self, status: u16, body: &str) {
        self.store.lock().unwrap().failure = Some((status, body.to_string()));
    }

    /// `METHOD path` of every request received so far.
    pub async fn requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }

    /// Number of writes (POST/PUT/DELETE) received so far.
    pub async fn write_count(&self) -> usize {
        self.requests()
            .await
            .iter()
            .filter(|r| !r.starts_with("GET "))
            .count()
    }
}

/// A flag document in the stored shape.
pub fn flag_payload(key: &str, variants: Value, rules: Value) -> Value {
    json!({
        "@type": "flipt.core.Flag",
        "key": key,
        "name": key,
        "description": "",
        "enabled": true,
        "type": "VARIANT_FLAG_TYPE",
        "metadata": {},
        "variants": variants,
        "rules": rules
    })
}

/// A segment document in the stored shape.
pub fn segment_payload(key: &str, constraints: Value) -> Value {
    json!({
        "@type": "flipt.core.Segment",
        "key": key,
        "name": key,
        "description": "",
        "matchType": "ALL_MATCH_TYPE",
        "constraints": constraints
    })
}
