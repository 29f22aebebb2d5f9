//! Remote synchronization: one-way push of local aggregates plus a live pull
//! of the campus ranking. Local state is always the source of truth; nothing
//! here writes back into the local store.

mod gate;
mod ranking;
mod worker;

pub use gate::{should_upload, UploadCheckpoint, UPLOAD_THRESHOLD_STEPS};
pub use ranking::{decode_rank_doc, order_entries, RankEntry, RankingFeed};
pub use worker::{spawn_upload_worker, UploadHandle, UploadJob};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("document {doc_id} is missing field '{field}'")]
    MissingField { doc_id: String, field: &'static str },
    #[error("document {doc_id} has an invalid value for field '{field}'")]
    InvalidField { doc_id: String, field: &'static str },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote request failed: {0}")]
    Network(String),
    #[error("operation requires a signed-in session")]
    AuthRequired,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RankScope {
    College,
    Department,
}

/// Raw document from the schemaless remote store. Field access goes through
/// an explicit decode step that fails closed; missing fields are an error,
/// never a silent zero.
#[derive(Debug, Clone)]
pub struct RemoteDoc {
    pub id: String,
    pub data: Value,
}

/// Identity attached to remote writes. `None` in the auth watch channel means
/// signed out, and every remote operation silently no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub display_name: String,
    pub college: String,
    pub department: String,
}

/// Backend document-store contract. Implementations wrap the managed SDK;
/// uploads are idempotent last-write-wins merges keyed by user id (and date),
/// so a dropped push is repaired by the next one.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload_daily(&self, user_id: &str, date: NaiveDate, steps: u64)
        -> Result<(), SyncError>;

    async fn upload_total(&self, user_id: &str, total: u64) -> Result<(), SyncError>;

    /// Server-side atomic increments backing the leaderboards. Must not be
    /// read-then-write: concurrent writers from many users are expected.
    async fn increment_group_counters(
        &self,
        college: &str,
        department: &str,
        amount: u64,
    ) -> Result<(), SyncError>;

    /// One page of ranking documents for the scope, largest counters first as
    /// stored. Implementations return an empty page when signed out.
    async fn fetch_ranking(
        &self,
        scope: RankScope,
        limit: usize,
    ) -> Result<Vec<RemoteDoc>, SyncError>;
}
