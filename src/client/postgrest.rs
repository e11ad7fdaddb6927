//! Backend talking to the PostgREST tables directly.
//!
//! The voter is sent explicitly as `user_id`; row-level policies on the
//! server reject rows that do not belong to the bearer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::config::BackendConfig;
use super::http::{CountsRow, HttpCore, ValueRow, decode_json};
use super::session::Session;
use crate::core::{
    BackendError, BackendErrorKind, CountSnapshot, POSTGREST_ROOT, TABLE_COMMENTS, TABLE_POSTS,
    TABLE_VOTES, TargetKind, VoteBackend, VoteKey, VoteMutation, VoteTarget, VoteValue,
};

const PREFER_UPSERT: &str = "resolution=merge-duplicates";
const PREFER_MINIMAL: &str = "return=minimal";

fn table_path(table: &str) -> String {
    format!("{POSTGREST_ROOT}/{table}")
}

fn target_table(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Post => TABLE_POSTS,
        TargetKind::Comment => TABLE_COMMENTS,
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Votes table row.
#[derive(Debug, Serialize)]
struct VoteRow<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<&'a str>,
    value: i64,
}

impl<'a> From<&'a VoteMutation> for VoteRow<'a> {
    fn from(mutation: &'a VoteMutation) -> Self {
        let target = &mutation.key.target;
        let id = Some(target.id().as_str());
        let (post_id, comment_id) = match target.kind() {
            TargetKind::Post => (id, None),
            TargetKind::Comment => (None, id),
        };
        Self {
            user_id: mutation.key.user.as_str(),
            post_id,
            comment_id,
            value: mutation.direction.to_wire(),
        }
    }
}

/// [`VoteBackend`] over PostgREST.
#[derive(Debug, Clone)]
pub struct PostgrestBackend {
    core: HttpCore,
}

impl PostgrestBackend {
    /// Create a backend from configuration and a shared session.
    ///
    /// PostgREST refuses requests without an anon key, so one must be set.
    pub fn new(config: &BackendConfig, session: Arc<Session>) -> Result<Self, BackendError> {
        if config.anon_key.is_none() {
            return Err(BackendError::new(
                BackendErrorKind::Unauthorized,
                "PostgREST backend requires an anon key",
            ));
        }
        Ok(Self {
            core: HttpCore::new(config, session)?,
        })
    }
}

#[async_trait]
impl VoteBackend for PostgrestBackend {
    async fn upsert_vote(&self, mutation: &VoteMutation) -> Result<(), BackendError> {
        let endpoint = "POST /rest/v1/votes";
        let column = mutation.key.target.kind().id_column();
        let on_conflict = format!("user_id,{column}");
        let url = self.core.url(
            &table_path(TABLE_VOTES),
            &[],
            &[("on_conflict", on_conflict.as_str())],
        )?;

        let req = self
            .core
            .post(url)
            .header("Prefer", PREFER_UPSERT)
            .json(&VoteRow::from(mutation));
        self.core.send_once(endpoint, req).await?;
        Ok(())
    }

    async fn delete_vote(&self, key: &VoteKey) -> Result<(), BackendError> {
        let endpoint = "DELETE /rest/v1/votes";
        let user = eq(key.user.as_str());
        let target = eq(key.target.id().as_str());
        let url = self.core.url(
            &table_path(TABLE_VOTES),
            &[],
            &[("user_id", user.as_str()), (key.target.kind().id_column(), target.as_str())],
        )?;

        let req = self.core.delete(url).header("Prefer", PREFER_MINIMAL);
        self.core.send_once(endpoint, req).await?;
        Ok(())
    }

    async fn fetch_counts(&self, target: &VoteTarget) -> Result<CountSnapshot, BackendError> {
        let table = target_table(target.kind());
        let endpoint = format!("GET /rest/v1/{table}");
        let id = eq(target.id().as_str());
        let url = self.core.url(
            &table_path(table),
            &[],
            &[("id", id.as_str()), ("select", "up_count,down_count")],
        )?;

        let resp = self
            .core
            .send_read(&endpoint, false, || self.core.get(url.clone()))
            .await?;
        let rows: Vec<CountsRow> = decode_json(&endpoint, resp).await?;
        let row = rows.first().ok_or_else(|| {
            BackendError::new(
                BackendErrorKind::NotFound,
                format!("{endpoint}: no row for {target}"),
            )
        })?;
        Ok(CountSnapshot::new(target.clone(), row.counts()))
    }

    async fn fetch_viewer_vote(&self, key: &VoteKey) -> Result<VoteValue, BackendError> {
        let endpoint = "GET /rest/v1/votes";
        let user = eq(key.user.as_str());
        let target = eq(key.target.id().as_str());
        let url = self.core.url(
            &table_path(TABLE_VOTES),
            &[],
            &[
                ("user_id", user.as_str()),
                (key.target.kind().id_column(), target.as_str()),
                ("select", "value"),
            ],
        )?;

        let resp = self
            .core
            .send_read(endpoint, false, || self.core.get(url.clone()))
            .await?;
        let rows: Vec<ValueRow> = decode_json(endpoint, resp).await?;
        match rows.first() {
            Some(row) => Ok(VoteValue::from_wire(row.value)?),
            None => Ok(VoteValue::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{UserId, VoteDirection};

    #[test]
    fn test_vote_row_shape() {
        let mutation = VoteMutation {
            key: VoteKey {
                user: UserId::new("u1"),
                target: VoteTarget::comment("c1").unwrap(),
            },
            direction: VoteDirection::Down,
        };
        let row = serde_json::to_value(VoteRow::from(&mutation)).unwrap();
        assert_eq!(
            row,
            serde_json::json!({ "user_id": "u1", "comment_id": "c1", "value": -1 })
        );
    }

    #[test]
    fn test_requires_anon_key() {
        let config = BackendConfig::local(9000).unwrap();
        let err = PostgrestBackend::new(&config, Arc::new(Session::new())).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Unauthorized);

        assert!(PostgrestBackend::new(&config.anon_key("anon"), Arc::new(Session::new())).is_ok());
    }
}
