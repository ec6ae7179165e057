#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test, panics are the assertion mechanism")]

use std::sync::Arc;
use std::time::Duration;
use tempid_core::{HttpTransport, ResolutionEngine, ResolutionEngineBuilder};
use tempid_types::{DefaultResolverKind, EngineConfig, Subject, TempKey, TransportConfig};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pair(subject: &str, key: &str) -> (Subject, TempKey) {
    (Subject::from(subject), TempKey::from(key))
}

fn batched_config(server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.transport.base_url = Some(format!("{}/", server.uri()));
    config
}

fn engine_with(config: &EngineConfig, transport: HttpTransport) -> ResolutionEngine {
    ResolutionEngineBuilder::from_config(config, Arc::new(transport)).expect("builder").build()
}

#[tokio::test]
async fn test_batched_resolution_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolveTempIds"))
        .and(query_param("data", r#"{"subjects":{"name":["t1","t2"]}}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"name": {"t1": "Alice", "t2": "Bea"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = ResolutionEngine::from_config(&batched_config(&server)).expect("engine");
    let resolved =
        engine.resolve_all([pair("name", "t1"), pair("name", "t2"), pair("name", "t1")]).await;

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved.get(&pair("name", "t1")), Some(&serde_json::json!("Alice")));
    assert_eq!(resolved.get(&pair("name", "t2")), Some(&serde_json::json!("Bea")));
    assert_eq!(engine.cached_items(), 2);
}

#[tokio::test]
async fn test_base_path_without_slash_and_extra_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ctx/resolveTempIds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": {"t1": "Alice"},
            "status": "ok",
            "dob": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = EngineConfig::default();
    config.transport.base_url = Some(format!("{}/ctx", server.uri()));
    let engine = ResolutionEngine::from_config(&config).expect("engine");

    let resolved = engine.resolve_all([pair("name", "t1"), pair("dob", "t1")]).await;

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.get(&pair("name", "t1")), Some(&serde_json::json!("Alice")));
}

#[tokio::test]
async fn test_batches_split_at_configured_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolveTempIds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = batched_config(&server);
    config.batch.max_ids_per_request = 2;
    let engine = ResolutionEngine::from_config(&config).expect("engine");

    let pairs: Vec<_> = (0..5).map(|i| pair("name", &format!("t{}", i))).collect();
    let resolved = engine.resolve_all(pairs).await;

    assert!(resolved.is_empty());
}

#[tokio::test]
async fn test_session_params_ride_along() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolveTempIds"))
        .and(query_param("sessionToken", "s-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": {"t1": "Alice"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = batched_config(&server);
    let transport = HttpTransport::new(&config.transport).expect("transport");
    transport.add_param("sessionToken", "s-123");
    let engine = engine_with(&config, transport);

    let resolved = engine.resolve_all([pair("name", "t1")]).await;
    assert_eq!(resolved.len(), 1);
}

#[tokio::test]
async fn test_failures_are_silent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("data", r#"{"subjects":{"name":["boom"]}}"#))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("data", r#"{"subjects":{"name":["envelope"]}}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "__HTTP_ERROR__": {
                "msg": "Session expired",
                "httpStatusCode": 401,
                "httpStatusMsg": "Unauthorized"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("data", r#"{"subjects":{"name":["garbage"]}}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let engine = ResolutionEngine::from_config(&batched_config(&server)).expect("engine");
    for key in ["boom", "envelope", "garbage"] {
        let completed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = completed.clone();
        let mut session = engine.start_input(Some(Box::new(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        })));
        session.resolve("name", key, |_| panic!("failed lookup must not call back"));
        session.end_input().join().await;

        assert!(!completed.load(std::sync::atomic::Ordering::SeqCst), "{} completed", key);
    }
    assert_eq!(engine.cached_items(), 0);
}

#[tokio::test]
async fn test_timeout_drops_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"name": {"t1": "late"}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = batched_config(&server);
    config.transport.timeout_secs = 1;
    let engine = ResolutionEngine::from_config(&config).expect("engine");

    let resolved = engine.resolve_all([pair("name", "t1")]).await;
    assert!(resolved.is_empty());
}

#[tokio::test]
async fn test_per_key_resolution_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ml/patients"))
        .and(query_param("tokenId", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "fields": {"vorname": "Anna"},
            "ids": [{"idType": "pid", "idString": "PID-1"}]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = EngineConfig::default();
    config.default_resolver = DefaultResolverKind::PerKey;
    config.per_key.base_url = Some(format!("{}/ml", server.uri()));
    let engine = ResolutionEngine::from_config(&config).expect("engine");

    let resolved = engine
        .resolve_all([pair("vorname", "tok1"), pair("pid", "tok1"), pair("missing", "tok1")])
        .await;

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved.get(&pair("vorname", "tok1")), Some(&serde_json::json!("Anna")));
    assert_eq!(resolved.get(&pair("pid", "tok1")), Some(&serde_json::json!("PID-1")));
}

#[tokio::test]
async fn test_per_key_legacy_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patients/tokenId/tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "fields": {},
            "ids": [{"idType": "name", "idString": "Bob"}]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = EngineConfig::default();
    config.default_resolver = DefaultResolverKind::PerKey;
    config.per_key.base_url = Some(server.uri());
    let transport =
        HttpTransport::new(&TransportConfig::default()).expect("transport").without_credentials();
    let engine = engine_with(&config, transport);

    let resolved = engine.resolve_all([pair("name", "tok1")]).await;
    assert_eq!(resolved.get(&pair("name", "tok1")), Some(&serde_json::json!("Bob")));
}
