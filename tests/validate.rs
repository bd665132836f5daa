//! Offline validation routes; none of these may reach the backend.

use serde_json::{json, Value};

mod common;

async fn post_dql(proxy: &common::TestProxy, path: &str, body: &'static str) -> (u16, Value) {
    let res = common::http_client()
        .post(proxy.url(path))
        .header("content-type", "application/dql")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn valid_query() {
    let proxy = common::start_proxy(|_| {}).await;
    let (status, body) = post_dql(&proxy, "/validate/dql", "{ me(func: has(name)) { uid name } }").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "valid", "type": "dql"}));
    assert_eq!(proxy.node.log.calls(), 0);
}

#[tokio::test]
async fn valid_mutation() {
    let proxy = common::start_proxy(|_| {}).await;
    let (status, body) = post_dql(
        &proxy,
        "/validate/dql",
        r#"{ set { _:alice <name> "Alice" . } }"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["type"], "mutation");
}

#[tokio::test]
async fn malformed_dql() {
    let proxy = common::start_proxy(|_| {}).await;
    let (status, body) = post_dql(&proxy, "/validate/dql", r#"<0x1> name = "bad syntax""#).await;
    assert_eq!(status, 400);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Query error"));
    assert!(message.contains("Mutation error"));
}

#[tokio::test]
async fn wrong_method_and_content_type() {
    let proxy = common::start_proxy(|_| {}).await;
    let client = common::http_client();

    let res = client.get(proxy.url("/validate/dql")).send().await.unwrap();
    assert_eq!(res.status(), 405);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    let res = client
        .post(proxy.url("/validate/schema"))
        .header("content-type", "application/json")
        .body("name: string .")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 415);
}

#[tokio::test]
async fn schema_validation() {
    let proxy = common::start_proxy(|_| {}).await;

    let (status, body) = post_dql(
        &proxy,
        "/validate/schema",
        "name: string @index(exact) .\nfriend: [uid] @reverse .\ntype Person { name friend }",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "valid", "type": "schema"}));

    let (status, _) = post_dql(&proxy, "/validate/schema", "type Person { name }").await;
    assert_eq!(status, 400);

    let (status, _) = post_dql(&proxy, "/validate/schema", "name: strng .").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn deeply_nested_query_is_rejected() {
    let proxy = common::start_proxy(|_| {}).await;
    let depth = 100_000;
    let body = format!("{{ q(func: has(a)) {}{} }}", "{ a ".repeat(depth), "} ".repeat(depth));

    let res = common::http_client()
        .post(proxy.url("/validate/dql"))
        .header("content-type", "application/dql")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nesting too deep"));

    let (status, _) = post_dql(&proxy, "/validate/dql", "{ me(func: has(name)) { uid } }").await;
    assert_eq!(status, 200);
}
