use super::{event_log::EventLog, ledger::StatLedger};
use match_common::{roster::PlayerId, side::SideBundle, store::PeriodSnapshot};

/// Everything a single period accumulates
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct PeriodState {
    pub(crate) ledger: StatLedger,
    pub(crate) log: EventLog,
    pub(crate) timeouts: SideBundle<u16>,
}

impl PeriodState {
    /// Builds the state from a stored snapshot, giving every squad player without a stored line
    /// a zeroed one
    pub(crate) fn from_snapshot<'a, I>(snapshot: PeriodSnapshot, squad: I) -> Self
    where
        I: IntoIterator<Item = &'a PlayerId>,
    {
        let PeriodSnapshot {
            player_stats,
            opponent_stats,
            timeouts,
            events,
        } = snapshot;
        let mut state = Self {
            ledger: StatLedger::new(player_stats, opponent_stats),
            log: EventLog::new(events),
            timeouts,
        };
        state.fill_squad(squad);
        state
    }

    pub(crate) fn fill_squad<'a, I>(&mut self, squad: I)
    where
        I: IntoIterator<Item = &'a PlayerId>,
    {
        for id in squad {
            self.ledger.ensure_player(id);
        }
    }

    pub(crate) fn to_snapshot(&self) -> PeriodSnapshot {
        PeriodSnapshot {
            player_stats: self.ledger.players().clone(),
            opponent_stats: *self.ledger.opponent(),
            timeouts: self.timeouts,
            events: self.log.events().to_vec(),
        }
    }
}
