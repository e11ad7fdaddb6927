//! Contract tests for `PostgrestBackend` against a mock PostgREST server.

use std::sync::Arc;

use ideaboard_votes::client::{BackendConfig, PostgrestBackend, Session};
use ideaboard_votes::core::{
    BackendErrorKind, UserId, VoteBackend, VoteCounts, VoteDirection, VoteKey, VoteMutation,
    VoteTarget, VoteValue,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> PostgrestBackend {
    let config = BackendConfig::new(server.uri().parse().unwrap())
        .anon_key("anon")
        .max_retries(0);
    let session = Arc::new(Session::signed_in(UserId::new("u1"), "jwt-u1"));
    PostgrestBackend::new(&config, session).unwrap()
}

fn key(target: VoteTarget) -> VoteKey {
    VoteKey {
        user: UserId::new("u1"),
        target,
    }
}

#[tokio::test]
async fn upsert_merges_on_user_and_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/votes"))
        .and(query_param("on_conflict", "user_id,post_id"))
        .and(header("apikey", "anon"))
        .and(header("authorization", "Bearer jwt-u1"))
        .and(header("prefer", "resolution=merge-duplicates"))
        .and(body_json(serde_json::json!({
            "user_id": "u1",
            "post_id": "p1",
            "value": 1
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mutation = VoteMutation {
        key: key(VoteTarget::post("p1").unwrap()),
        direction: VoteDirection::Up,
    };
    backend(&server).upsert_vote(&mutation).await.unwrap();
}

#[tokio::test]
async fn upsert_comment_conflict_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/votes"))
        .and(query_param("on_conflict", "user_id,comment_id"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mutation = VoteMutation {
        key: key(VoteTarget::comment("c1").unwrap()),
        direction: VoteDirection::Down,
    };
    backend(&server).upsert_vote(&mutation).await.unwrap();
}

#[tokio::test]
async fn upsert_rejected_by_row_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/votes"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mutation = VoteMutation {
        key: key(VoteTarget::post("p1").unwrap()),
        direction: VoteDirection::Up,
    };
    let err = backend(&server).upsert_vote(&mutation).await.unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::Forbidden);
    assert!(err.message.contains("row-level security"));
}

#[tokio::test]
async fn delete_filters_by_user_and_target() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/votes"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("post_id", "eq.p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server)
        .delete_vote(&key(VoteTarget::post("p1").unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_counts_selects_count_columns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/comments"))
        .and(query_param("id", "eq.c1"))
        .and(query_param("select", "up_count,down_count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "up_count": 4, "down_count": 1 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = backend(&server)
        .fetch_counts(&VoteTarget::comment("c1").unwrap())
        .await
        .unwrap();
    assert_eq!(snapshot.counts, VoteCounts::new(4, 1));
}

#[tokio::test]
async fn fetch_counts_empty_result_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch_counts(&VoteTarget::post("p404").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::NotFound);
}

#[tokio::test]
async fn viewer_vote_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/votes"))
        .and(query_param("post_id", "eq.voted"))
        .and(query_param("select", "value"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "value": 1 }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/votes"))
        .and(query_param("post_id", "eq.fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let postgrest = backend(&server);
    assert_eq!(
        postgrest
            .fetch_viewer_vote(&key(VoteTarget::post("voted").unwrap()))
            .await
            .unwrap(),
        VoteValue::Up
    );
    assert_eq!(
        postgrest
            .fetch_viewer_vote(&key(VoteTarget::post("fresh").unwrap()))
            .await
            .unwrap(),
        VoteValue::None
    );
}
