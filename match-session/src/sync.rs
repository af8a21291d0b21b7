use crate::session_manager::SessionManager;
use log::*;
use match_common::{
    config::Game as GameConfig,
    period::{Period, PeriodBundle},
    roster::MatchId,
    store::{MatchStore, Registry, SaveRequest, StoreError},
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot, watch,
    },
    task::{self, JoinHandle},
};

const WORKER_CHANNEL_LEN: usize = 8;

/// Outcome of the latest write of one period
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PeriodSave {
    #[default]
    Unsaved,
    Saved,
    /// An automatic save was lost. The period's latest changes only exist in memory.
    AutosaveFailed(String),
    SaveFailed(String),
}

impl PeriodSave {
    pub fn at_risk(&self) -> bool {
        matches!(self, Self::AutosaveFailed(_) | Self::SaveFailed(_))
    }
}

/// Write state of both periods, as seen by the driver. A failure stays recorded against its
/// period until that same period is written successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    /// The period written or attempted most recently
    pub last: Option<Period>,
    pub periods: PeriodBundle<PeriodSave>,
    /// Queue position of the newest failed write of each period
    failed_seq: PeriodBundle<u64>,
}

impl SaveStatus {
    /// True while the store may be behind the in-memory state because of a failed write
    pub fn at_risk(&self) -> bool {
        self.periods.iter().any(|(_, save)| save.at_risk())
    }

    pub fn periods_at_risk(&self) -> Vec<Period> {
        self.periods
            .iter()
            .filter(|(_, save)| save.at_risk())
            .map(|(period, _)| period)
            .collect()
    }

    /// Writes are numbered in queue order. A success only clears a failure if it was queued
    /// after the failed write.
    fn record(&mut self, period: Period, seq: u64, save: PeriodSave) {
        self.last = Some(period);
        if save.at_risk() {
            self.failed_seq[period] = self.failed_seq[period].max(seq);
        } else if self.periods[period].at_risk() && seq < self.failed_seq[period] {
            return;
        }
        self.periods[period] = save;
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Too many saves are waiting to be written")]
    QueueFull,
    #[error("The sync worker has stopped")]
    WorkerStopped,
}

#[derive(Debug)]
enum WorkerMessage {
    Save {
        seq: u64,
        request: Box<SaveRequest>,
        reply: Option<oneshot::Sender<Result<(), StoreError>>>,
    },
    Flush(oneshot::Sender<()>),
    Stop,
}

/// Queues period-scoped writes to the store and applies them in order on a background task
#[derive(Debug)]
pub struct SyncHandle {
    tx: mpsc::Sender<WorkerMessage>,
    status: Arc<watch::Sender<SaveStatus>>,
    next_seq: AtomicU64,
    worker_join: JoinHandle<()>,
}

impl SyncHandle {
    /// Must be called from within a tokio runtime
    pub fn new<S: MatchStore>(store: S) -> Self {
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_LEN);
        let (status, _) = watch::channel(SaveStatus::default());
        let status = Arc::new(status);

        let worker_join = task::spawn(worker_loop(store, rx, status.clone()));

        Self {
            tx,
            status,
            next_seq: AtomicU64::new(1),
            worker_join,
        }
    }

    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Periods whose latest write failed, in period order
    pub fn periods_at_risk(&self) -> Vec<Period> {
        self.status.borrow().periods_at_risk()
    }

    /// Queues a best-effort save without waiting for it. If it can't be queued the failure is
    /// recorded against the period as `PeriodSave::AutosaveFailed` as well as returned.
    pub fn autosave(&self, request: SaveRequest) -> Result<(), SyncError> {
        let period = request.period;
        let seq = self.next_seq();
        let msg = WorkerMessage::Save {
            seq,
            request: Box::new(request),
            reply: None,
        };
        self.tx.try_send(msg).map_err(|e| {
            let err = match e {
                TrySendError::Full(_) => SyncError::QueueFull,
                TrySendError::Closed(_) => SyncError::WorkerStopped,
            };
            warn!("Autosave of the {period} was dropped: {err}");
            self.status.send_modify(|status| {
                status.record(period, seq, PeriodSave::AutosaveFailed(err.to_string()))
            });
            err
        })
    }

    /// Queues a save and waits until it has been written. On failure nothing in memory is
    /// affected and the same request can be saved again.
    pub async fn save(&self, request: SaveRequest) -> Result<(), SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Save {
                seq: self.next_seq(),
                request: Box::new(request),
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| SyncError::WorkerStopped)?;
        reply_rx.await.map_err(|_| SyncError::WorkerStopped)??;
        Ok(())
    }

    /// Waits until every save queued before this call has been attempted
    pub async fn flush(&self) -> Result<(), SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Flush(reply_tx))
            .await
            .map_err(|_| SyncError::WorkerStopped)?;
        reply_rx.await.map_err(|_| SyncError::WorkerStopped)
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if self.tx.try_send(WorkerMessage::Stop).is_err() {
            self.worker_join.abort();
        }
    }
}

async fn worker_loop<S: MatchStore>(
    store: S,
    mut rx: mpsc::Receiver<WorkerMessage>,
    status: Arc<watch::Sender<SaveStatus>>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WorkerMessage::Save {
                seq,
                request,
                reply,
            } => {
                let period = request.period;
                let result = write(&store, &request).await;
                let save = match (&result, reply.is_some()) {
                    (Ok(()), _) => {
                        debug!("Saved the {period} of match {}", request.match_id);
                        PeriodSave::Saved
                    }
                    (Err(e), true) => {
                        error!("Saving the {period} of match {} failed: {e}", request.match_id);
                        PeriodSave::SaveFailed(e.to_string())
                    }
                    (Err(e), false) => {
                        warn!(
                            "Autosave of the {period} of match {} failed: {e}",
                            request.match_id
                        );
                        PeriodSave::AutosaveFailed(e.to_string())
                    }
                };
                status.send_modify(|status| status.record(period, seq, save));
                if let Some(reply) = reply {
                    if reply.send(result).is_err() {
                        warn!("Nobody was waiting for the result of a manual save");
                    }
                }
            }
            WorkerMessage::Flush(reply) => {
                let _ = reply.send(());
            }
            WorkerMessage::Stop => break,
        }
    }
    debug!("Sync worker stopped");
}

async fn write<S: MatchStore>(store: &S, request: &SaveRequest) -> Result<(), StoreError> {
    let updates = request.field_updates()?;
    debug!(
        "Writing {:?} for match {}",
        updates.iter().map(|u| u.path.as_str()).collect::<Vec<_>>(),
        request.match_id
    );
    store.update(&request.match_id, updates).await
}

/// Loads the match document and its squad in one request each, and builds the session from them
pub async fn load_session<S: MatchStore + Registry>(
    store: &S,
    id: &MatchId,
    config: GameConfig,
) -> Result<SessionManager, SyncError> {
    let document = store.load(id).await?;
    let roster = if document.info.squad.is_empty() {
        warn!("Match {id} has an empty squad");
        Vec::new()
    } else {
        store.fetch_players(&document.info.squad).await?
    };
    info!(
        "Loaded match {id}, {} of {} squad players found",
        roster.len(),
        document.info.squad.len()
    );
    Ok(SessionManager::new(config, document, roster))
}
