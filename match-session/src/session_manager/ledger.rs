use match_common::{
    roster::PlayerId,
    stats::{OpponentStat, PlayerStat, StatKind, StatLine},
};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Who a stat change applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Player(PlayerId),
    Opponent,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player {id}"),
            Self::Opponent => write!(f, "opponent"),
        }
    }
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Missing entity".to_string()),
            s if s.eq_ignore_ascii_case("opponent") => Ok(Self::Opponent),
            s => Ok(Self::Player(s.into())),
        }
    }
}

/// Per-period counters for every player and the opponent aggregate
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct StatLedger {
    players: BTreeMap<PlayerId, PlayerStat>,
    opponent: OpponentStat,
}

impl StatLedger {
    pub(crate) fn new(players: BTreeMap<PlayerId, PlayerStat>, opponent: OpponentStat) -> Self {
        Self { players, opponent }
    }

    /// Adds a zeroed line for `id` if the ledger doesn't have one yet
    pub(crate) fn ensure_player(&mut self, id: &PlayerId) {
        if !self.players.contains_key(id) {
            self.players.insert(id.clone(), PlayerStat::default());
        }
    }

    pub(crate) fn player(&self, id: &PlayerId) -> Option<&PlayerStat> {
        self.players.get(id)
    }

    pub(crate) fn players(&self) -> &BTreeMap<PlayerId, PlayerStat> {
        &self.players
    }

    pub(crate) fn opponent(&self) -> &OpponentStat {
        &self.opponent
    }

    fn counter_mut(&mut self, entity: &Entity, kind: StatKind) -> Option<&mut u32> {
        match entity {
            Entity::Player(id) => self
                .players
                .entry(id.clone())
                .or_default()
                .counter_mut(kind),
            Entity::Opponent => self.opponent.counter_mut(kind),
        }
    }

    /// Returns the new value, or `None` if the entity doesn't keep this counter
    pub(crate) fn increment(&mut self, entity: &Entity, kind: StatKind) -> Option<u32> {
        self.counter_mut(entity, kind).map(|value| {
            *value = value.saturating_add(1);
            *value
        })
    }

    /// Never goes below zero. Returns the new value, or `None` if the entity doesn't keep this
    /// counter.
    pub(crate) fn decrement(&mut self, entity: &Entity, kind: StatKind) -> Option<u32> {
        self.counter_mut(entity, kind).map(|value| {
            *value = value.saturating_sub(1);
            *value
        })
    }

    /// Adds `secs` of playing time to each of `ids`
    pub(crate) fn accrue<'a, I>(&mut self, ids: I, secs: u32)
    where
        I: IntoIterator<Item = &'a PlayerId>,
    {
        for id in ids {
            let stat = self.players.entry(id.clone()).or_default();
            stat.minutes_played = stat.minutes_played.saturating_add(secs);
        }
    }
}
