//! End-to-end HTTP tests against a mock database node.

use std::sync::atomic::Ordering;

use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn dql_query_returns_data_and_extensions() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/query"))
        .header("content-type", "application/dql")
        .body("{ q(func: has(name)) { uid name } }")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["q"][0]["name"], "Julian");
    assert_eq!(body["extensions"]["txn"]["start_ts"], 11);
    assert_eq!(body["extensions"]["server_latency"]["total_ns"], 35);
    assert_eq!(proxy.node.log.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn schema_reply_hides_internal_predicates() {
    let proxy = common::start_proxy(|_| {}).await;
    let body: Value = common::http_client()
        .post(proxy.url("/query"))
        .json(&json!({"query": "schema {}"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let schema = body["data"]["schema"].as_array().unwrap();
    assert_eq!(schema.len(), 1);
    assert_eq!(schema[0]["predicate"], "name");
    assert!(body["data"]["types"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn non_dql_query_goes_to_graphql() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/query"))
        .json(&json!({"query": "query { getUser(id: 1) { name } }"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert!(body["data"]["echo"].as_str().unwrap().contains("getUser"));
    assert_eq!(proxy.node.log.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn graphql_forwarding_can_be_disabled() {
    let proxy = common::start_proxy(|config| config.features.graphql = false).await;
    let res = common::http_client()
        .post(proxy.url("/query"))
        .json(&json!({"query": "{ q(uid: 0x1) { name } }"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(proxy.node.log.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn json_mutation_reports_assigned_uids() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/mutate"))
        .json(&json!({"set": {"uid": "_:a", "name": "Julian"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["uids"]["a"], "0x2a");

    let bodies = proxy.node.log.bodies.lock().unwrap();
    let sent: Value = serde_json::from_str(bodies.last().unwrap()).unwrap();
    assert_eq!(sent["set"]["name"], "Julian");
}

#[tokio::test]
async fn upsert_blocks_all_run() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/mutate"))
        .json(&json!({"upsert": [
            {"query": "query { u as var(func: eq(email, \"a@a.com\")) }",
             "mutation": "uid(u) <name> \"A\" .",
             "cond": "@if(eq(len(u), 1))"},
            {"query": "query { v as var(func: eq(email, \"b@b.com\")) }",
             "mutation": "uid(v) <name> \"B\" ."}
        ]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(proxy.node.log.mutations.load(Ordering::SeqCst), 2);
    let bodies = proxy.node.log.bodies.lock().unwrap();
    assert!(bodies.iter().any(|b| b.starts_with("upsert") && b.contains("@if(eq(len(u), 1))")));
}

#[tokio::test]
async fn failing_upsert_block_fails_whole_request() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/mutate"))
        .json(&json!({"upsert": [
            {"query": "query { u as var(func: eq(email, \"a@a.com\")) }", "mutation": "uid(u) <name> \"A\" ."},
            {"query": "query { v as var(func: eq(email, \"b@b.com\")) }", "mutation": "uid(v) <name> \"reject-me\" ."}
        ]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("some upserts failed"));
    assert!(message.contains("mutation rejected by engine"));
}

#[tokio::test]
async fn unsupported_content_type_never_reaches_backend() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .post(proxy.url("/mutate"))
        .header("content-type", "text/plain")
        .body("<_:a> <name> \"x\" .")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 415);
    assert_eq!(proxy.node.log.calls(), 0);
}

#[tokio::test]
async fn health_is_passed_through() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client().get(proxy.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body[0]["status"], "healthy");
    assert_eq!(proxy.node.log.admin_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_purpose_group_is_unavailable() {
    let proxy = common::start_proxy(|config| {
        let address = config.backend.endpoints[0].clone();
        config.groups.insert("mutation".to_string(), vec![address]);
    })
    .await;

    let res = common::http_client()
        .post(proxy.url("/query"))
        .header("content-type", "application/dql")
        .body("{ q(func: has(name)) { uid } }")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("query"));
    assert_eq!(proxy.node.log.calls(), 0);
}

#[tokio::test]
async fn preflight_is_answered_by_proxy() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client()
        .request(reqwest::Method::OPTIONS, proxy.url("/mutate"))
        .header("origin", "http://ratel.local")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "http://ratel.local");
    assert_eq!(proxy.node.log.calls(), 0);
}

#[tokio::test]
async fn catch_all_without_frontend_is_not_found() {
    let proxy = common::start_proxy(|_| {}).await;
    let res = common::http_client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 404);
}
