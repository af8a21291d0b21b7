use super::{FieldUpdate, MatchDocument, MatchStore, Registry, StoreError, apply_field_updates};
use crate::roster::{MatchId, Player, PlayerId};
use log::debug;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    future::{Future, ready},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Online,
    Offline,
    ReadOnly,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<MatchId, Value>,
    players: BTreeMap<PlayerId, Player>,
    availability: Availability,
    write_log: Vec<(MatchId, Vec<String>)>,
}

/// A store kept entirely in memory. Used when running offline and in tests; it can be switched
/// offline or read-only to exercise failure handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-write, the map is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_match(&self, document: &MatchDocument) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)?;
        self.lock()
            .documents
            .insert(document.info.id.clone(), value);
        Ok(())
    }

    pub fn insert_players<I: IntoIterator<Item = Player>>(&self, players: I) {
        let mut inner = self.lock();
        for player in players {
            inner.players.insert(player.id.clone(), player);
        }
    }

    pub fn set_availability(&self, availability: Availability) {
        self.lock().availability = availability;
    }

    pub fn document(&self, id: &MatchId) -> Option<MatchDocument> {
        self.lock()
            .documents
            .get(id)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn raw_document(&self, id: &MatchId) -> Option<Value> {
        self.lock().documents.get(id).cloned()
    }

    /// Field paths of every successful write, oldest first
    pub fn write_log(&self) -> Vec<(MatchId, Vec<String>)> {
        self.lock().write_log.clone()
    }

    fn check_readable(&self) -> Result<(), StoreError> {
        match self.lock().availability {
            Availability::Offline => Err(StoreError::Unavailable("store is offline".to_string())),
            Availability::Online | Availability::ReadOnly => Ok(()),
        }
    }
}

impl MatchStore for MemoryStore {
    fn load(
        &self,
        id: &MatchId,
    ) -> impl Future<Output = Result<MatchDocument, StoreError>> + Send + 'static {
        let result = self.check_readable().and_then(|()| {
            let value = self
                .lock()
                .documents
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            Ok(serde_json::from_value(value)?)
        });
        ready(result)
    }

    fn update(
        &self,
        id: &MatchId,
        updates: Vec<FieldUpdate>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send + 'static {
        let mut inner = self.lock();
        let result = match inner.availability {
            Availability::Offline => Err(StoreError::Unavailable("store is offline".to_string())),
            Availability::ReadOnly => Err(StoreError::PermissionDenied),
            Availability::Online => {
                let Inner {
                    documents,
                    write_log,
                    ..
                } = &mut *inner;
                match documents.get_mut(id) {
                    None => Err(StoreError::NotFound(id.clone())),
                    Some(document) => apply_field_updates(document, &updates).map(|()| {
                        debug!("Applied {} field updates to match {id}", updates.len());
                        write_log.push((id.clone(), updates.into_iter().map(|u| u.path).collect()));
                    }),
                }
            }
        };
        ready(result)
    }
}

impl Registry for MemoryStore {
    fn fetch_players(
        &self,
        ids: &[PlayerId],
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send + 'static {
        let result = self.check_readable().map(|()| {
            let inner = self.lock();
            ids.iter()
                .filter_map(|id| inner.players.get(id).cloned())
                .collect()
        });
        ready(result)
    }
}
