//! End-to-end vote flows: reconciler over the REST backend, plus realtime pushes.

use std::sync::Arc;

use ideaboard_votes::client::{ApiBackend, BackendConfig, Session};
use ideaboard_votes::core::{
    AuthContext, MSG_FORBIDDEN, MSG_SIGN_IN, UserId, VoteCounts, VoteDirection, VoteError,
    VoteTarget, VoteValue,
};
use ideaboard_votes::realtime::{PumpExit, RealtimeHub, spawn_pump};
use ideaboard_votes::sync::{CastAction, Phase, VoteReconciler, VoteState};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    session: Arc<Session>,
    reconciler: Arc<VoteReconciler>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(server: &MockServer, seed: VoteState) -> Fixture {
    init_tracing();
    let session = Arc::new(Session::signed_in(UserId::new("u1"), "jwt-u1"));
    let config = BackendConfig::new(server.uri().parse().unwrap()).max_retries(0);
    let backend = Arc::new(ApiBackend::new(&config, session.clone()).unwrap());
    let auth: Arc<dyn AuthContext> = session.clone();
    Fixture {
        session,
        reconciler: Arc::new(VoteReconciler::new(seed, backend, auth)),
    }
}

fn post_seed(up: u64, down: u64, vote: VoteValue) -> VoteState {
    VoteState::new(VoteTarget::post("p1").unwrap(), VoteCounts::new(up, down)).with_vote(vote)
}

async fn mount_counts(server: &MockServer, up: u64, down: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v1/posts/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "up_count": up,
            "down_count": down
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn cast_then_refetch_absorbs_other_voters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/votes"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    // Two other users voted while ours was in flight.
    mount_counts(&server, 8, 2).await;

    let fx = fixture(&server, post_seed(5, 2, VoteValue::None));
    let outcome = fx.reconciler.cast_vote(VoteDirection::Up).await.unwrap();

    assert!(outcome.refreshed);
    assert_eq!(outcome.action, CastAction::Upsert(VoteDirection::Up));
    assert_eq!(outcome.state.counts(), VoteCounts::new(8, 2));
    assert_eq!(outcome.state.current(), VoteValue::Up);
    assert_eq!(fx.reconciler.phase().await, Phase::Idle);
}

#[tokio::test]
async fn toggle_off_sends_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/votes"))
        .and(query_param("post_id", "p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_counts(&server, 4, 2).await;

    let fx = fixture(&server, post_seed(5, 2, VoteValue::Up));
    let outcome = fx.reconciler.cast_vote(VoteDirection::Up).await.unwrap();

    assert_eq!(outcome.action, CastAction::Remove);
    assert_eq!(outcome.state.counts(), VoteCounts::new(4, 2));
    assert_eq!(outcome.state.current(), VoteValue::None);
}

#[tokio::test]
async fn forbidden_mutation_rolls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/votes"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fx = fixture(&server, post_seed(5, 2, VoteValue::Up));
    let err = fx
        .reconciler
        .cast_vote(VoteDirection::Down)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), Some(MSG_FORBIDDEN));
    assert!(!err.is_retryable());
    assert_eq!(fx.reconciler.state().await, post_seed(5, 2, VoteValue::Up));
}

#[tokio::test]
async fn server_error_rolls_back_and_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/votes"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, post_seed(5, 2, VoteValue::None));
    let err = fx.reconciler.cast_vote(VoteDirection::Up).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(fx.reconciler.state().await, post_seed(5, 2, VoteValue::None));
}

#[tokio::test]
async fn signed_out_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let fx = fixture(&server, post_seed(5, 2, VoteValue::None));
    fx.session.sign_out();

    let err = fx.reconciler.cast_vote(VoteDirection::Up).await.unwrap_err();
    assert_eq!(err, VoteError::Unauthenticated);
    assert_eq!(err.user_message(), Some(MSG_SIGN_IN));
    assert_eq!(fx.reconciler.state().await, post_seed(5, 2, VoteValue::None));
}

#[tokio::test]
async fn viewer_vote_loaded_from_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/votes/me"))
        .and(query_param("post_id", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture(&server, post_seed(6, 2, VoteValue::None));
    assert_eq!(
        fx.reconciler.load_viewer_vote().await.unwrap(),
        Some(VoteValue::Up)
    );
    assert_eq!(fx.reconciler.state().await.current(), VoteValue::Up);
}

#[tokio::test]
async fn realtime_push_overwrites_and_delete_detaches() {
    let server = MockServer::start().await;
    let fx = fixture(&server, post_seed(5, 2, VoteValue::None));
    let hub = RealtimeHub::new();
    let pump = spawn_pump(hub.subscribe(VoteTarget::post("p1").unwrap()), fx.reconciler.clone());

    let delivered = hub
        .publish_raw(
            r#"{ "eventType": "UPDATE", "table": "posts",
                 "commit_timestamp": "2024-05-01T12:00:00Z",
                 "new": { "id": "p1", "up_count": 20, "down_count": 7 } }"#,
        )
        .unwrap();
    assert_eq!(delivered, 1);
    hub.publish_raw(r#"{ "eventType": "DELETE", "table": "posts", "old": { "id": "p1" } }"#)
        .unwrap();

    assert_eq!(pump.await.unwrap(), PumpExit::Removed);
    assert_eq!(fx.reconciler.state().await.counts(), VoteCounts::new(20, 7));
    assert!(matches!(
        fx.reconciler.cast_vote(VoteDirection::Up).await,
        Err(VoteError::StaleRead { .. })
    ));
}
