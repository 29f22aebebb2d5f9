use std::sync::Arc;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{DecodeError, RankScope, RemoteDoc, RemoteStore, SyncError};

/// One row of the campus leaderboard. `rank` is the 1-based position in the
/// current page, recomputed on every snapshot and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub id: String,
    pub name: String,
    pub walk_count: u64,
    pub rank: u32,
}

/// Decode a schemaless ranking document into a typed entry. Fails closed:
/// a missing or mistyped field is an error, never a defaulted zero.
pub fn decode_rank_doc(doc: &RemoteDoc) -> Result<RankEntry, DecodeError> {
    let name = field(doc, "name")?
        .as_str()
        .ok_or(DecodeError::InvalidField {
            doc_id: doc.id.clone(),
            field: "name",
        })?
        .to_string();

    let walk_count = field(doc, "walkCount")?
        .as_u64()
        .ok_or(DecodeError::InvalidField {
            doc_id: doc.id.clone(),
            field: "walkCount",
        })?;

    Ok(RankEntry {
        id: doc.id.clone(),
        name,
        walk_count,
        rank: 0,
    })
}

fn field<'a>(doc: &'a RemoteDoc, name: &'static str) -> Result<&'a Value, DecodeError> {
    doc.data.get(name).ok_or(DecodeError::MissingField {
        doc_id: doc.id.clone(),
        field: name,
    })
}

/// Order by walk count descending; equal counts fall back to id order so the
/// page is deterministic across refreshes. Assigns 1-based ranks.
pub fn order_entries(mut entries: Vec<RankEntry>) -> Vec<RankEntry> {
    entries.sort_by(|a, b| {
        b.walk_count
            .cmp(&a.walk_count)
            .then_with(|| a.id.cmp(&b.id))
    });

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as u32 + 1;
    }

    entries
}

/// Live leaderboard for one scope, published through a watch channel.
///
/// The managed backend's snapshot listeners are not modeled here; the feed
/// polls `fetch_ranking` on an interval instead. A signed-out store returns
/// an empty page, which simply publishes an empty board.
pub struct RankingFeed {
    store: Arc<dyn RemoteStore>,
    scope: RankScope,
    limit: usize,
    tx: watch::Sender<Vec<RankEntry>>,
}

impl RankingFeed {
    pub fn new(store: Arc<dyn RemoteStore>, scope: RankScope, limit: usize) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            store,
            scope,
            limit,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<RankEntry>> {
        self.tx.subscribe()
    }

    /// Pull one snapshot, decode and publish it. Malformed documents are
    /// skipped with a warning so one bad row cannot blank the whole board.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let docs = self.store.fetch_ranking(self.scope, self.limit).await?;
        self.tx.send_replace(order_entries(decode_page(&docs)));
        Ok(())
    }

    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.refresh().await {
                        warn!("ranking refresh failed: {err}");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }
}

fn decode_page(docs: &[RemoteDoc]) -> Vec<RankEntry> {
    docs.iter()
        .filter_map(|doc| match decode_rank_doc(doc) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping malformed ranking document: {err}");
                None
            }
        })
        .collect()
}
