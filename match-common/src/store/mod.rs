//! The persisted match document and the stores that hold it.
//!
//! Writes are always partial: a save produces a list of [`FieldUpdate`]s addressed by dotted
//! field paths, scoped to a single period, so that saving one period can never clobber the
//! other period's stored data.

use crate::{
    events::MatchEvent,
    period::{Period, PeriodBundle},
    roster::{MatchId, MatchInfo, Player, PlayerId},
    side::{Side, SideBundle},
    stats::{OpponentStat, PlayerStat},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, future::Future};
use thiserror::Error;

pub mod memory;
pub mod portal;

pub use memory::MemoryStore;
pub use portal::PortalClient;

/// Everything stored for one period
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PeriodSnapshot {
    pub player_stats: BTreeMap<PlayerId, PlayerStat>,
    pub opponent_stats: OpponentStat,
    /// Number of timeouts used by each side
    pub timeouts: SideBundle<u16>,
    pub events: Vec<MatchEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDocument {
    #[serde(flatten)]
    pub info: MatchInfo,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub local_score: u32,
    #[serde(default)]
    pub visitor_score: u32,
    #[serde(default)]
    pub player_stats: PeriodBundle<BTreeMap<PlayerId, PlayerStat>>,
    #[serde(default)]
    pub opponent_stats: PeriodBundle<OpponentStat>,
    #[serde(default)]
    pub timeouts: PeriodBundle<SideBundle<u16>>,
    #[serde(default)]
    pub events: PeriodBundle<Vec<MatchEvent>>,
}

impl MatchDocument {
    pub fn new(info: MatchInfo) -> Self {
        Self {
            info,
            is_finished: false,
            local_score: 0,
            visitor_score: 0,
            player_stats: Default::default(),
            opponent_stats: Default::default(),
            timeouts: Default::default(),
            events: Default::default(),
        }
    }

    pub fn period_snapshot(&self, period: Period) -> PeriodSnapshot {
        PeriodSnapshot {
            player_stats: self.player_stats[period].clone(),
            opponent_stats: self.opponent_stats[period],
            timeouts: self.timeouts[period],
            events: self.events[period].clone(),
        }
    }

    pub fn cached_scores(&self) -> SideBundle<u32> {
        SideBundle::new(self.local_score, self.visitor_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: String,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new<S: ToString>(path: S, value: Value) -> Self {
        Self {
            path: path.to_string(),
            value,
        }
    }
}

/// A partial write of one period's slice of the match document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub match_id: MatchId,
    pub period: Period,
    pub snapshot: PeriodSnapshot,
    /// Denormalised copy of the score derived from the event log
    pub scores: SideBundle<u32>,
    pub is_finished: bool,
}

impl SaveRequest {
    pub fn field_updates(&self) -> Result<Vec<FieldUpdate>, serde_json::Error> {
        let period = self.period.key();
        let mut updates = vec![
            FieldUpdate::new(
                format!("playerStats.{period}"),
                serde_json::to_value(&self.snapshot.player_stats)?,
            ),
            FieldUpdate::new(
                format!("opponentStats.{period}"),
                serde_json::to_value(self.snapshot.opponent_stats)?,
            ),
        ];
        for (side, used) in self.snapshot.timeouts.iter() {
            updates.push(FieldUpdate::new(
                format!("timeouts.{period}.{}", side.key()),
                Value::from(*used),
            ));
        }
        updates.push(FieldUpdate::new(
            format!("events.{period}"),
            serde_json::to_value(&self.snapshot.events)?,
        ));
        updates.push(FieldUpdate::new(
            "localScore",
            Value::from(self.scores[Side::Local]),
        ));
        updates.push(FieldUpdate::new(
            "visitorScore",
            Value::from(self.scores[Side::Visitor]),
        ));
        updates.push(FieldUpdate::new("isFinished", Value::from(self.is_finished)));
        Ok(updates)
    }
}

/// Applies `updates` to a JSON document, creating intermediate objects as needed. Fields not
/// named by a path are left untouched. Either every update is applied or, on error, none is.
pub fn apply_field_updates(
    document: &mut Value,
    updates: &[FieldUpdate],
) -> Result<(), StoreError> {
    if let Some(bad) = updates
        .iter()
        .find(|u| u.path.split('.').any(str::is_empty))
    {
        return Err(StoreError::InvalidPath(bad.path.clone()));
    }

    let mut staged = document.clone();
    for update in updates {
        let mut target = &mut staged;
        let mut segments = update.path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let object = target
                .as_object_mut()
                .ok_or_else(|| StoreError::InvalidPath(update.path.clone()))?;
            if segments.peek().is_none() {
                object.insert(segment.to_string(), update.value.clone());
                break;
            }
            target = object
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
    }
    *document = staged;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The store denied access")]
    PermissionDenied,
    #[error("Match {0} was not found")]
    NotFound(MatchId),
    #[error("The store is unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("The store responded with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Malformed document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid field path `{0}`")]
    InvalidPath(String),
}

/// Document store holding match records, addressed by match id
pub trait MatchStore: Send + Sync + 'static {
    fn load(
        &self,
        id: &MatchId,
    ) -> impl Future<Output = Result<MatchDocument, StoreError>> + Send + 'static;

    /// Writes each field path independently. Never replaces the whole document.
    fn update(
        &self,
        id: &MatchId,
        updates: Vec<FieldUpdate>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send + 'static;
}

/// Read-only source of player records
pub trait Registry: Send + Sync + 'static {
    /// Fetches every requested player in a single request
    fn fetch_players(
        &self,
        ids: &[PlayerId],
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send + 'static;
}
