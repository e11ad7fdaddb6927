//! Backend speaking the IdeaBoard REST API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/v1/votes` | Upsert vote, body `{post_id \| comment_id, value}` |
//! | DELETE | `/api/v1/votes?post_id=..` | Remove vote |
//! | GET    | `/api/v1/posts/{id}` | Post with `up_count`, `down_count` |
//! | GET    | `/api/v1/comments/{id}` | Comment with `up_count`, `down_count` |
//! | GET    | `/api/v1/votes/me?post_id=..` | Viewer's vote, `{ "value": 1 \| -1 \| null }` |

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use super::config::BackendConfig;
use super::http::{CountsRow, HttpCore, ValueRow, decode_json};
use super::session::Session;
use crate::core::{
    API_COMMENTS_PATH, API_POSTS_PATH, API_VIEWER_VOTE_PATH, API_VOTES_PATH, BackendError,
    CountSnapshot, TargetKind, VoteBackend, VoteKey, VoteMutation, VoteTarget, VoteValue,
};

/// Upsert body. Exactly one of the ids is set.
#[derive(Debug, Serialize)]
struct VoteBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<&'a str>,
    value: i64,
}

impl<'a> VoteBody<'a> {
    fn new(target: &'a VoteTarget, value: i64) -> Self {
        let id = target.id().as_str();
        match target.kind() {
            TargetKind::Post => Self {
                post_id: Some(id),
                comment_id: None,
                value,
            },
            TargetKind::Comment => Self {
                post_id: None,
                comment_id: Some(id),
                value,
            },
        }
    }
}

fn target_query(target: &VoteTarget) -> [(&'static str, &str); 1] {
    [(target.kind().id_column(), target.id().as_str())]
}

/// [`VoteBackend`] over the REST API. The server derives the voter from the
/// bearer token.
#[derive(Debug, Clone)]
pub struct ApiBackend {
    core: HttpCore,
}

impl ApiBackend {
    /// Create a backend from configuration and a shared session.
    pub fn new(config: &BackendConfig, session: Arc<Session>) -> Result<Self, BackendError> {
        Ok(Self {
            core: HttpCore::new(config, session)?,
        })
    }
}

#[async_trait]
impl VoteBackend for ApiBackend {
    async fn upsert_vote(&self, mutation: &VoteMutation) -> Result<(), BackendError> {
        let endpoint = "POST /api/v1/votes";
        let url = self.core.url(API_VOTES_PATH, &[], &[])?;
        let body = VoteBody::new(&mutation.key.target, mutation.direction.to_wire());
        self.core
            .send_once(endpoint, self.core.post(url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_vote(&self, key: &VoteKey) -> Result<(), BackendError> {
        let endpoint = "DELETE /api/v1/votes";
        let url = self.core.url(API_VOTES_PATH, &[], &target_query(&key.target))?;
        self.core.send_once(endpoint, self.core.delete(url)).await?;
        Ok(())
    }

    async fn fetch_counts(&self, target: &VoteTarget) -> Result<CountSnapshot, BackendError> {
        let base = match target.kind() {
            TargetKind::Post => API_POSTS_PATH,
            TargetKind::Comment => API_COMMENTS_PATH,
        };
        let endpoint = format!("GET {base}/{}", target.id());
        let url = self.core.url(base, &[target.id().as_str()], &[])?;

        let resp = self
            .core
            .send_read(&endpoint, false, || self.core.get(url.clone()))
            .await?;
        let row: CountsRow = decode_json(&endpoint, resp).await?;
        Ok(CountSnapshot::new(target.clone(), row.counts()))
    }

    async fn fetch_viewer_vote(&self, key: &VoteKey) -> Result<VoteValue, BackendError> {
        let endpoint = "GET /api/v1/votes/me";
        let url = self
            .core
            .url(API_VIEWER_VOTE_PATH, &[], &target_query(&key.target))?;

        let resp = self
            .core
            .send_read(endpoint, true, || self.core.get(url.clone()))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(VoteValue::None);
        }
        let row: ValueRow = decode_json(endpoint, resp).await?;
        Ok(VoteValue::from_wire(row.value)?)
    }
}
