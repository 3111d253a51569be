//! Request shape tests against a mock backend

use pingfeed_client::{BackendClient, BackendConfig, ClientError, Filter, Query, UploadOptions};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(BackendConfig {
        base_url: server.uri(),
        anon_key: "anon-key".into(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_select_sends_filters_and_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/likes"))
        .and(query_param("select", "likes"))
        .and(query_param("ping", "eq.ping-1"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"likes": ["alice"]}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let row: Option<Value> = client
        .select_maybe_single("likes", &Query::new().select("likes").eq("ping", "ping-1"))
        .await
        .unwrap();

    assert_eq!(row.unwrap()["likes"], json!(["alice"]));
}

#[tokio::test]
async fn test_maybe_single_empty_and_multiple() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/comments"))
        .and(query_param("ping", "eq.none"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/comments"))
        .and(query_param("ping", "eq.dup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}, {}])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    let none: Option<Value> = client
        .select_maybe_single("comments", &Query::new().eq("ping", "none"))
        .await
        .unwrap();
    assert!(none.is_none());

    let dup = client
        .select_maybe_single::<Value>("comments", &Query::new().eq("ping", "dup"))
        .await;
    assert!(matches!(dup, Err(ClientError::InvalidResponse(_))));

    let single = client
        .select_single::<Value>("comments", &Query::new().eq("ping", "none"))
        .await;
    assert!(matches!(single, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn test_upsert_uses_on_conflict_and_merge_preference() {
    let server = MockServer::start().await;
    let row = json!({"ping": "ping-1", "likes": ["alice"]});

    Mock::given(method("POST"))
        .and(path("/rest/v1/likes"))
        .and(query_param("on_conflict", "ping"))
        .and(body_json(&row))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row.clone()])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let written = client.upsert("likes", &row, "ping").await.unwrap();
    assert_eq!(written, vec![row]);

    let requests = server.received_requests().await.unwrap();
    let prefer = requests[0].headers.get("prefer").unwrap().to_str().unwrap();
    assert!(prefer.contains("resolution=merge-duplicates"));
    assert!(prefer.contains("return=representation"));
}

#[tokio::test]
async fn test_update_with_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .and(query_param("version", "eq.3"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await.with_access_token("session-token");
    let updated = client
        .update(
            "profiles",
            &json!({"followed": ["Expo"], "version": 4}),
            &[Filter::eq("id", "user-1"), Filter::eq("version", "3")],
        )
        .await
        .unwrap();

    // Stale version: nothing matched
    assert!(updated.is_empty());
}

#[tokio::test]
async fn test_unfiltered_update_is_refused() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    let result = client.update("profiles", &json!({"followed": []}), &[]).await;
    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[tokio::test]
async fn test_insert_conflict_maps_to_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/communitys"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client
        .insert("communitys", &json!({"title": "Expo"}))
        .await;

    assert!(matches!(result, Err(ClientError::Conflict(msg)) if msg == "duplicate key"));
}

#[tokio::test]
async fn test_get_user_requires_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "user-1", "email": "alice@example.com", "aud": "authenticated"})),
        )
        .mount(&server)
        .await;

    let anonymous = client_for(&server).await;
    assert!(matches!(anonymous.get_user().await, Err(ClientError::Unauthorized(_))));

    let user = anonymous.with_access_token("tok").get_user().await.unwrap();
    assert_eq!(user.id, "user-1");
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn test_upload_base64_decodes_before_sending() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/ping_pics/Expo/1.jpg"))
        .and(header("content-type", "image/jpeg"))
        .and(header("x-upsert", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "ping_pics/Expo/1.jpg"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    // "hello" in base64
    let response = client
        .upload_base64("ping_pics", "Expo/1.jpg", "aGVsbG8=", &UploadOptions::jpeg())
        .await
        .unwrap();
    assert_eq!(response.key.as_deref(), Some("ping_pics/Expo/1.jpg"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"hello".to_vec());

    let bad = client
        .upload_base64("ping_pics", "Expo/2.jpg", "not base64!", &UploadOptions::jpeg())
        .await;
    assert!(matches!(bad, Err(ClientError::Base64(_))));
}
