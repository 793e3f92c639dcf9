//! Best-effort play writes
//!
//! Callers hand writes to `WriteSender::send`, which never blocks and never
//! fails. A single writer task applies them to the store in order and logs
//! failures. Local state is never rolled back: the next write carries a
//! superset of whatever a failed write lost.
//!
//! The writer keeps each session's start row with every later update applied.
//! An update that finds no row (the start upsert failed) upserts that row
//! instead, so a lost start is recreated by the next write.

use crate::geo::GeoLocator;
use crate::store::PlayStore;
use listen_common::db::{PlayRow, PlayUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A write destined for the play store
#[derive(Debug, Clone)]
pub enum PlayWrite {
    /// Session start, upserted by session id
    Start(PlayRow),
    /// Metrics flush (periodic, pause, or unmount)
    Metrics { session_id: String, update: PlayUpdate },
    /// Session end with completion
    End { session_id: String, update: PlayUpdate },
}

impl PlayWrite {
    fn kind(&self) -> &'static str {
        match self {
            PlayWrite::Start(_) => "start",
            PlayWrite::Metrics { .. } => "metrics",
            PlayWrite::End { .. } => "end",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            PlayWrite::Start(row) => &row.session_id,
            PlayWrite::Metrics { session_id, .. } | PlayWrite::End { session_id, .. } => session_id,
        }
    }
}

/// Outcome counters returned when the writer stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    /// Writes the store accepted
    pub applied: u64,
    /// Writes that failed and were dropped
    pub failed: u64,
    /// Updates that matched no row
    pub missing: u64,
}

/// Fire-and-forget handle to the writer task
#[derive(Debug, Clone)]
pub struct WriteSender {
    tx: mpsc::UnboundedSender<PlayWrite>,
}

impl WriteSender {
    pub fn send(&self, write: PlayWrite) {
        if let Err(e) = self.tx.send(write) {
            warn!(
                kind = e.0.kind(),
                session_id = %e.0.session_id(),
                "Play writer stopped, dropping write"
            );
        }
    }
}

/// Start the writer task
///
/// The task exits once every `WriteSender` clone is dropped and the queue is
/// drained; awaiting the handle then yields the stats.
pub fn spawn_writer(
    store: Arc<dyn PlayStore>,
    locator: Arc<dyn GeoLocator>,
) -> (WriteSender, JoinHandle<WriterStats>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(writer_loop(rx, store, locator));
    (WriteSender { tx }, handle)
}

async fn writer_loop(
    mut rx: mpsc::UnboundedReceiver<PlayWrite>,
    store: Arc<dyn PlayStore>,
    locator: Arc<dyn GeoLocator>,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut start_rows: HashMap<String, PlayRow> = HashMap::new();

    while let Some(write) = rx.recv().await {
        let kind = write.kind();
        let session_id = write.session_id().to_string();

        let result = match write {
            PlayWrite::Start(mut row) => {
                if row.listener_country.is_none() && row.listener_city.is_none() {
                    let location = locator.locate().await;
                    row.listener_country = location.country;
                    row.listener_city = location.city;
                }
                let result = store.upsert_play(&row).await.map(|_| 1);
                start_rows.insert(row.session_id.clone(), row);
                result
            }
            PlayWrite::Metrics { session_id, update } | PlayWrite::End { session_id, update } => {
                if let Some(row) = start_rows.get_mut(&session_id) {
                    row.apply(&update);
                }
                match store.update_play(&session_id, &update).await {
                    Ok(0) => match start_rows.get(&session_id) {
                        Some(row) => {
                            info!(kind, session_id = %session_id, "Session row missing, recreating it");
                            store.upsert_play(row).await.map(|_| 1)
                        }
                        None => Ok(0),
                    },
                    other => other,
                }
            }
        };

        match result {
            Ok(0) => {
                stats.missing += 1;
                warn!(kind, session_id = %session_id, "Session not found in play store");
            }
            Ok(_) => {
                stats.applied += 1;
                debug!(kind, session_id = %session_id, "Play write applied");
            }
            Err(e) => {
                stats.failed += 1;
                error!(kind, session_id = %session_id, "Play write failed: {}", e);
            }
        }
    }

    info!(
        applied = stats.applied,
        failed = stats.failed,
        missing = stats.missing,
        "Play writer stopped"
    );
    stats
}
