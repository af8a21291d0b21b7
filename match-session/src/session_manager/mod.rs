use log::*;
use match_common::{
    config::Game as GameConfig,
    events::{CardColor, MatchEvent, event_minute},
    period::{Period, PeriodBundle},
    roster::{MatchInfo, Player, PlayerId},
    side::{Side, SideBundle},
    stats::{OpponentStat, PlayerStat, StatKind},
    store::{MatchDocument, SaveRequest},
};
use std::collections::BTreeMap;
use thiserror::Error;

mod clock;
pub use clock::{ClockToken, TickOutcome};
use clock::Clock;

mod event_log;

mod ledger;
pub use ledger::Entity;

mod on_court;
use on_court::{OnCourt, Toggled};

mod period_state;
use period_state::PeriodState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    InProgress,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Set when the running clock has covered the configured autosave interval
    pub autosave: Option<SaveRequest>,
}

/// Owns the live state of one match: the clock, who is on court, and the stats, events and
/// timeouts of both periods.
#[derive(Debug)]
pub struct SessionManager {
    config: GameConfig,
    info: MatchInfo,
    tracked_side: Side,
    players: BTreeMap<PlayerId, Player>,
    current_period: Period,
    periods: PeriodBundle<PeriodState>,
    clock: Clock,
    on_court: OnCourt,
    status: MatchStatus,
    secs_since_autosave: u32,
}

impl SessionManager {
    /// Builds a session from the stored match document. `roster` is the result of the squad
    /// lookup; players not in the squad or not on the tracked team are ignored.
    pub fn new(config: GameConfig, document: MatchDocument, roster: Vec<Player>) -> Self {
        let (tracked_side, players) = resolve_squad(&document.info, roster);

        let periods = PeriodBundle {
            first: PeriodState::from_snapshot(
                document.period_snapshot(Period::FirstHalf),
                players.keys(),
            ),
            second: PeriodState::from_snapshot(
                document.period_snapshot(Period::SecondHalf),
                players.keys(),
            ),
        };

        let status = if document.is_finished {
            MatchStatus::Finished
        } else {
            MatchStatus::InProgress
        };

        let session = Self {
            clock: Clock::new(config.period_duration),
            on_court: OnCourt::new(config.max_on_court),
            config,
            tracked_side,
            players,
            current_period: Period::FirstHalf,
            periods,
            status,
            secs_since_autosave: 0,
            info: document.info.clone(),
        };
        session.reconcile_cached_score(document.cached_scores());
        info!(
            "{} Session ready for match {} with {} squad players, tracking the {} side",
            session.status_string(),
            session.info.id,
            session.players.len(),
            session.tracked_side
        );
        session
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn info(&self) -> &MatchInfo {
        &self.info
    }

    pub fn tracked_side(&self) -> Side {
        self.tracked_side
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn current_period(&self) -> Period {
        self.current_period
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn clock_is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Seconds left in the current period
    pub fn clock_time(&self) -> u32 {
        self.clock.clock_time()
    }

    pub fn on_court(&self) -> impl Iterator<Item = &PlayerId> {
        self.on_court.iter()
    }

    pub fn is_on_court(&self, id: &PlayerId) -> bool {
        self.on_court.contains(id)
    }

    /// The player's line for the current period
    pub fn player_stat(&self, id: &PlayerId) -> Option<&PlayerStat> {
        self.periods[self.current_period].ledger.player(id)
    }

    pub fn opponent_stat(&self) -> &OpponentStat {
        self.periods[self.current_period].ledger.opponent()
    }

    pub fn events(&self, period: Period) -> &[MatchEvent] {
        self.periods[period].log.events()
    }

    pub fn timeouts_used(&self, side: Side) -> u16 {
        self.periods[self.current_period].timeouts[side]
    }

    fn check_unlocked(&self) -> Result<()> {
        match self.status {
            MatchStatus::InProgress => Ok(()),
            MatchStatus::Finished => Err(SessionError::Locked),
        }
    }

    fn check_entity(&self, entity: &Entity, kind: StatKind) -> Result<()> {
        match entity {
            Entity::Player(id) if !self.players.contains_key(id) => {
                Err(SessionError::UnknownEntity(id.clone()))
            }
            Entity::Opponent if !kind.tracked_for_opponent() => {
                Err(SessionError::NotTrackedForOpponent(kind))
            }
            _ => Ok(()),
        }
    }

    /// Returns the token that ticks for this run must carry, or `None` if the clock was already
    /// running or has run out
    pub fn start_clock(&mut self) -> Result<Option<ClockToken>> {
        self.check_unlocked()?;
        let token = self.clock.start();
        if token.is_some() {
            info!("{} Starting the clock", self.status_string());
        }
        Ok(token)
    }

    pub fn pause_clock(&mut self) -> bool {
        let stopped = self.clock.pause();
        if stopped {
            info!("{} Stopping the clock", self.status_string());
        }
        stopped
    }

    pub fn reset_clock(&mut self) -> Result<()> {
        self.check_unlocked()?;
        self.clock.reset(self.config.period_duration);
        info!("{} Clock reset", self.status_string());
        Ok(())
    }

    /// Advances the clock by one second and credits that second to everyone on court
    pub fn tick(&mut self, token: ClockToken) -> TickReport {
        let outcome = self.clock.tick(token);
        let mut autosave = None;

        if outcome.counted() {
            let period = self.current_period;
            self.periods[period].ledger.accrue(self.on_court.iter(), 1);
            trace!(
                "{} Tick, {} players on court",
                self.status_string(),
                self.on_court.len()
            );

            self.secs_since_autosave += 1;
            let interval = self.config.autosave_interval;
            if interval > 0 && self.secs_since_autosave >= interval {
                self.secs_since_autosave = 0;
                autosave = Some(self.save_request());
            }
        }

        if outcome == TickOutcome::PeriodEnded {
            info!(
                "{} The clock ran out for the {}",
                self.status_string(),
                self.current_period
            );
        }

        TickReport { outcome, autosave }
    }

    /// Puts a player on court, or takes them off. Returns `true` if the player is now on court.
    pub fn toggle_on_court(&mut self, id: &PlayerId) -> Result<bool> {
        self.check_unlocked()?;
        if !self.players.contains_key(id) {
            return Err(SessionError::UnknownEntity(id.clone()));
        }

        match self.on_court.toggle(id) {
            Some(Toggled::On) => {
                let period = self.current_period;
                self.periods[period].ledger.ensure_player(id);
                info!("{} Player {id} on court", self.status_string());
                Ok(true)
            }
            Some(Toggled::Off) => {
                info!("{} Player {id} off court", self.status_string());
                Ok(false)
            }
            None => {
                warn!(
                    "{} Can't put player {id} on court, already {} on court",
                    self.status_string(),
                    self.on_court.max()
                );
                Err(SessionError::CapacityExceeded(self.on_court.max()))
            }
        }
    }

    pub fn increment(&mut self, entity: &Entity, kind: StatKind) -> Result<u32> {
        self.check_unlocked()?;
        self.check_entity(entity, kind)?;

        let period = self.current_period;
        let value = self.periods[period]
            .ledger
            .increment(entity, kind)
            .ok_or(SessionError::NotTrackedForOpponent(kind))?;
        info!("{} {entity} {kind} is now {value}", self.status_string());

        let event = match kind {
            StatKind::Goals => Some(self.build_event(entity, None)),
            StatKind::YellowCards => Some(self.build_event(entity, Some(CardColor::Yellow))),
            StatKind::RedCards => Some(self.build_event(entity, Some(CardColor::Red))),
            _ => None,
        };
        if let Some(event) = event {
            info!(
                "{} Logging a {:?} for the {} side at minute {}",
                self.status_string(),
                event.kind,
                event.team,
                event.minute
            );
            self.periods[period].log.append(event);
        }

        Ok(value)
    }

    /// Lowers a counter, stopping at zero. Logged events are not touched.
    pub fn decrement(&mut self, entity: &Entity, kind: StatKind) -> Result<u32> {
        self.check_unlocked()?;
        self.check_entity(entity, kind)?;

        let period = self.current_period;
        let value = self.periods[period]
            .ledger
            .decrement(entity, kind)
            .ok_or(SessionError::NotTrackedForOpponent(kind))?;
        info!("{} {entity} {kind} is now {value}", self.status_string());
        Ok(value)
    }

    fn build_event(&self, entity: &Entity, card: Option<CardColor>) -> MatchEvent {
        let minute = event_minute(self.clock.duration(), self.clock.clock_time());
        let (team, name, id) = match entity {
            Entity::Player(id) => (
                self.tracked_side,
                self.players
                    .get(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| id.to_string()),
                Some(id.clone()),
            ),
            Entity::Opponent => {
                let side = self.tracked_side.other();
                (side, self.info.team(side).name.clone(), None)
            }
        };
        match card {
            Some(color) => MatchEvent::card(minute, team, name, id, color),
            None => MatchEvent::goal(minute, team, name, id),
        }
    }

    /// Returns the number of timeouts the side has now used this period
    pub fn use_timeout(&mut self, side: Side) -> Result<u16> {
        self.check_unlocked()?;
        let period = self.current_period;
        let used = &mut self.periods[period].timeouts[side];
        if *used >= self.config.timeouts_per_period {
            return Err(SessionError::TooManyTimeouts(side));
        }
        *used += 1;
        let used = *used;
        info!("{} {side} timeout used", self.status_string());
        Ok(used)
    }

    pub fn clear_timeout(&mut self, side: Side) -> Result<u16> {
        self.check_unlocked()?;
        let period = self.current_period;
        let used = &mut self.periods[period].timeouts[side];
        *used = used.saturating_sub(1);
        let used = *used;
        info!("{} {side} timeout cleared", self.status_string());
        Ok(used)
    }

    /// Makes `period` the active one. The outgoing period's save request is handed to
    /// `autosave` before anything about the target period becomes active. Returns `false` if
    /// `period` was already active.
    pub fn switch_period<F: FnOnce(SaveRequest)>(
        &mut self,
        period: Period,
        autosave: F,
    ) -> Result<bool> {
        self.check_unlocked()?;
        if period == self.current_period {
            debug!("{} Already in the {period}", self.status_string());
            return Ok(false);
        }

        info!("{} Switching to the {period}", self.status_string());
        autosave(self.save_request());

        self.current_period = period;
        self.periods[period].fill_squad(self.players.keys());
        self.clock.reset(self.config.period_duration);
        self.on_court.clear();
        self.secs_since_autosave = 0;
        Ok(true)
    }

    /// Locks the match. Returns the save request that records the finished state.
    pub fn finish(&mut self) -> Result<SaveRequest> {
        if self.status == MatchStatus::Finished {
            return Err(SessionError::AlreadyFinished);
        }
        self.pause_clock();
        self.status = MatchStatus::Finished;
        let scores = self.score();
        info!("{} Match finished, final score {scores}", self.status_string());
        Ok(self.save_request())
    }

    /// Unlocks a finished match. Nothing recorded before finishing is rolled back.
    pub fn reopen(&mut self) -> Result<SaveRequest> {
        if self.status == MatchStatus::InProgress {
            return Err(SessionError::NotFinished);
        }
        self.status = MatchStatus::InProgress;
        info!("{} Match reopened", self.status_string());
        Ok(self.save_request())
    }

    /// The partial write for the current period
    pub fn save_request(&self) -> SaveRequest {
        self.period_save_request(self.current_period)
    }

    /// The partial write for any period, active or not
    pub fn period_save_request(&self, period: Period) -> SaveRequest {
        SaveRequest {
            match_id: self.info.id.clone(),
            period,
            snapshot: self.periods[period].to_snapshot(),
            scores: self.score(),
            is_finished: self.is_finished(),
        }
    }

    /// The score according to the goal events of both periods
    pub fn score(&self) -> SideBundle<u32> {
        let mut score = SideBundle::default();
        for (_, state) in self.periods.iter() {
            for side in [Side::Local, Side::Visitor] {
                score[side] += state.log.goals(side);
            }
        }
        score
    }

    /// Compares a cached score against the event log and returns the event log's count
    pub fn reconcile_cached_score(&self, cached: SideBundle<u32>) -> SideBundle<u32> {
        let derived = self.score();
        if cached != derived {
            warn!(
                "{} Cached score ({cached}) disagrees with the event log ({derived}), using the \
                 event log",
                self.status_string()
            );
        }
        derived
    }

    /// Sum of both periods for one player, `None` if the player has no line in either
    pub fn player_totals(&self, id: &PlayerId) -> Option<PlayerStat> {
        self.periods
            .iter()
            .filter_map(|(_, state)| state.ledger.player(id).copied())
            .reduce(|a, b| a + b)
    }

    pub fn opponent_totals(&self) -> OpponentStat {
        self.periods
            .iter()
            .map(|(_, state)| *state.ledger.opponent())
            .fold(OpponentStat::default(), |a, b| a + b)
    }

    pub fn status_string(&self) -> String {
        let time = self.clock.clock_time();
        format!(
            "[{:02}:{:02} {}]",
            time / 60,
            time % 60,
            self.current_period.key()
        )
    }
}

/// Picks the squad players out of `roster` and works out which side they play for. The side is
/// taken from team ids once here, not from names on every action.
fn resolve_squad(info: &MatchInfo, roster: Vec<Player>) -> (Side, BTreeMap<PlayerId, Player>) {
    let in_squad: Vec<Player> = roster
        .into_iter()
        .filter(|p| {
            let listed = info.squad.contains(&p.id);
            if !listed {
                warn!("Player {} is not in the squad for match {}", p.id, info.id);
            }
            listed
        })
        .collect();

    let tracked_side = match in_squad.iter().find_map(|p| info.side_of(&p.team)) {
        Some(side) => side,
        None => {
            warn!(
                "No squad player belongs to either team of match {}, tracking the local side",
                info.id
            );
            Side::Local
        }
    };

    let players = in_squad
        .into_iter()
        .filter(|p| {
            let on_side = info.side_of(&p.team) == Some(tracked_side);
            if !on_side {
                warn!(
                    "Player {} ({}) is not on the {tracked_side} team, leaving them out",
                    p.id, p.name
                );
            }
            on_side
        })
        .map(|p| (p.id.clone(), p))
        .collect();

    (tracked_side, players)
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Only {0} players can be on court at once")]
    CapacityExceeded(usize),
    #[error("The match is finished, reopen it to make changes")]
    Locked,
    #[error("No squad player with id {0}")]
    UnknownEntity(PlayerId),
    #[error("The opponent line doesn't track {0}")]
    NotTrackedForOpponent(StatKind),
    #[error("The {0} team has no more timeouts to use")]
    TooManyTimeouts(Side),
    #[error("The match is already finished")]
    AlreadyFinished,
    #[error("The match isn't finished")]
    NotFinished,
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
pub(crate) mod test {
    use super::SessionError as SMErr;
    use super::*;
    use enum_iterator::all;
    use match_common::{
        events::EventKind,
        roster::{MatchKind, TeamRef},
        stats::StatLine,
    };
    use more_asserts::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::sync::Once;
    use time::macros::date;

    static INIT: Once = Once::new();

    pub fn initialize() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    pub(crate) fn test_info() -> MatchInfo {
        MatchInfo {
            id: "match-1".into(),
            teams: SideBundle::new(
                TeamRef {
                    id: "sharks".into(),
                    name: "Sharks".to_string(),
                },
                TeamRef {
                    id: "rays".into(),
                    name: "Rays".to_string(),
                },
            ),
            date: date!(2026 - 10 - 18),
            kind: MatchKind::League,
            squad: (1..=7).map(|n| PlayerId::new(format!("p{n}"))).collect(),
        }
    }

    pub(crate) fn test_roster() -> Vec<Player> {
        (1..=7)
            .map(|n| Player {
                id: PlayerId::new(format!("p{n}")),
                name: format!("Player {n}"),
                number: n,
                team: "sharks".into(),
            })
            .collect()
    }

    pub(crate) fn new_session(config: GameConfig) -> SessionManager {
        initialize();
        SessionManager::new(config, MatchDocument::new(test_info()), test_roster())
    }

    fn p(n: u8) -> PlayerId {
        PlayerId::new(format!("p{n}"))
    }

    fn player(n: u8) -> Entity {
        Entity::Player(p(n))
    }

    #[test]
    fn test_minutes_accrue_only_on_court() {
        let mut sm = new_session(GameConfig {
            period_duration: 1500,
            ..Default::default()
        });
        sm.toggle_on_court(&p(1)).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        for _ in 0..3 {
            assert_eq!(sm.tick(token).outcome, TickOutcome::Counted);
        }
        assert_eq!(sm.player_stat(&p(1)).unwrap().minutes_played, 3);
        assert_eq!(sm.player_stat(&p(2)).unwrap().minutes_played, 0);
        assert_eq!(sm.clock_time(), 1497);
    }

    #[test]
    fn test_no_minutes_while_paused() {
        let mut sm = new_session(Default::default());
        sm.toggle_on_court(&p(1)).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        sm.tick(token);
        assert!(sm.pause_clock());
        assert_eq!(sm.tick(token).outcome, TickOutcome::Ignored);
        assert_eq!(sm.player_stat(&p(1)).unwrap().minutes_played, 1);

        // A tick from the earlier run is ignored after a restart
        let token_2 = sm.start_clock().unwrap().unwrap();
        assert_eq!(sm.tick(token).outcome, TickOutcome::Ignored);
        sm.tick(token_2);
        assert_eq!(sm.player_stat(&p(1)).unwrap().minutes_played, 2);

        // Taken off court, no more time
        sm.toggle_on_court(&p(1)).unwrap();
        sm.tick(token_2);
        assert_eq!(sm.player_stat(&p(1)).unwrap().minutes_played, 2);
    }

    #[test]
    fn test_clock_runs_out() {
        let mut sm = new_session(GameConfig {
            period_duration: 3,
            ..Default::default()
        });
        sm.toggle_on_court(&p(4)).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        assert_eq!(sm.tick(token).outcome, TickOutcome::Counted);
        assert_eq!(sm.tick(token).outcome, TickOutcome::Counted);
        assert_eq!(sm.tick(token).outcome, TickOutcome::PeriodEnded);
        assert!(!sm.clock_is_running());
        assert_eq!(sm.tick(token).outcome, TickOutcome::Ignored);
        assert_eq!(sm.player_stat(&p(4)).unwrap().minutes_played, 3);
        // Running out doesn't move to the next period or finish the match
        assert_eq!(sm.current_period(), Period::FirstHalf);
        assert_eq!(sm.status(), MatchStatus::InProgress);
        assert_eq!(sm.start_clock(), Ok(None));
        sm.reset_clock().unwrap();
        assert_eq!(sm.clock_time(), 3);
    }

    #[test]
    fn test_goal_increments_score_and_logs_event() {
        let mut sm = new_session(Default::default());
        let token = sm.start_clock().unwrap().unwrap();
        for _ in 0..61 {
            sm.tick(token);
        }
        let before = sm.score();
        assert_eq!(sm.increment(&player(3), StatKind::Goals), Ok(1));

        let events = sm.events(Period::FirstHalf);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Goal);
        assert_eq!(events[0].team, Side::Local);
        assert_eq!(events[0].player_name, "Player 3");
        assert_eq!(events[0].player_id, Some(p(3)));
        assert_eq!(events[0].minute, 2);
        assert_eq!(sm.score()[Side::Local], before[Side::Local] + 1);
        assert_eq!(sm.score()[Side::Visitor], 0);
        assert_eq!(sm.player_stat(&p(3)).unwrap().goals, 1);
    }

    #[test]
    fn test_visitor_squad_scores_for_visitor() {
        initialize();
        let mut roster = test_roster();
        for player in roster.iter_mut() {
            player.team = "rays".into();
        }
        let mut sm = SessionManager::new(
            Default::default(),
            MatchDocument::new(test_info()),
            roster,
        );
        assert_eq!(sm.tracked_side(), Side::Visitor);
        sm.increment(&player(1), StatKind::Goals).unwrap();
        sm.increment(&Entity::Opponent, StatKind::Goals).unwrap();
        assert_eq!(sm.score(), SideBundle::new(1, 1));
        let events = sm.events(Period::FirstHalf);
        assert_eq!(events[0].team, Side::Visitor);
        assert_eq!(events[1].team, Side::Local);
        assert_eq!(events[1].player_name, "Sharks");
        assert_eq!(events[1].player_id, None);
    }

    #[test]
    fn test_players_from_other_team_are_left_out() {
        initialize();
        let mut roster = test_roster();
        roster[6].team = "rays".into();
        roster.push(Player {
            id: "stranger".into(),
            name: "Stranger".to_string(),
            number: 99,
            team: "sharks".into(),
        });
        let mut sm = SessionManager::new(
            Default::default(),
            MatchDocument::new(test_info()),
            roster,
        );
        assert_eq!(sm.players().count(), 6);
        assert_eq!(
            sm.toggle_on_court(&p(7)),
            Err(SMErr::UnknownEntity(p(7)))
        );
        assert_eq!(
            sm.increment(&Entity::Player("stranger".into()), StatKind::Goals),
            Err(SMErr::UnknownEntity("stranger".into()))
        );
        assert!(sm.events(Period::FirstHalf).is_empty());
    }

    #[test]
    fn test_decrement_at_zero() {
        let mut sm = new_session(Default::default());
        assert_eq!(sm.decrement(&player(2), StatKind::Fouls), Ok(0));
        assert_eq!(sm.player_stat(&p(2)).unwrap().fouls, 0);
        assert!(sm.events(Period::FirstHalf).is_empty());

        // Taking a goal back leaves the event log alone
        sm.increment(&player(2), StatKind::Goals).unwrap();
        assert_eq!(sm.decrement(&player(2), StatKind::Goals), Ok(0));
        assert_eq!(sm.events(Period::FirstHalf).len(), 1);
        assert_eq!(sm.score()[Side::Local], 1);
    }

    #[test]
    fn test_cards_log_events() {
        let mut sm = new_session(Default::default());
        sm.increment(&player(5), StatKind::YellowCards).unwrap();
        sm.increment(&Entity::Opponent, StatKind::RedCards).unwrap();
        sm.increment(&player(5), StatKind::Assists).unwrap();

        let events = sm.events(Period::FirstHalf);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Card);
        assert_eq!(events[0].card, Some(CardColor::Yellow));
        assert_eq!(events[1].card, Some(CardColor::Red));
        assert_eq!(events[1].team, Side::Visitor);
        assert_eq!(sm.score(), SideBundle::new(0, 0));
        assert_eq!(sm.opponent_stat().red_cards, 1);
    }

    #[test]
    fn test_opponent_stat_kinds() {
        let mut sm = new_session(Default::default());
        assert_eq!(
            sm.increment(&Entity::Opponent, StatKind::Saves),
            Err(SMErr::NotTrackedForOpponent(StatKind::Saves))
        );
        assert_eq!(
            sm.decrement(&Entity::Opponent, StatKind::OneVsOne),
            Err(SMErr::NotTrackedForOpponent(StatKind::OneVsOne))
        );
        assert_eq!(sm.increment(&Entity::Opponent, StatKind::ShotsOnTarget), Ok(1));
        assert_eq!(sm.opponent_stat().shots_on_target, 1);
    }

    #[test]
    fn test_stats_never_negative() {
        let mut sm = new_session(Default::default());
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let kinds: Vec<StatKind> = all::<StatKind>().collect();
        let mut expected: BTreeMap<(u8, usize), u32> = BTreeMap::new();

        for _ in 0..2000 {
            let n = rng.random_range(1..=7u8);
            let k = rng.random_range(0..kinds.len());
            let entry = expected.entry((n, k)).or_default();
            let value = if rng.random_bool(0.45) {
                *entry += 1;
                sm.increment(&player(n), kinds[k]).unwrap()
            } else {
                *entry = entry.saturating_sub(1);
                sm.decrement(&player(n), kinds[k]).unwrap()
            };
            assert_eq!(value, *entry);
        }

        for ((n, k), value) in expected {
            let stat = sm.player_stat(&p(n)).unwrap();
            assert_eq!(stat.counter(kinds[k]), Some(value));
        }
    }

    #[test]
    fn test_on_court_never_over_capacity() {
        let mut sm = new_session(Default::default());
        let mut rng = StdRng::seed_from_u64(42);
        let mut rejected = 0;
        for _ in 0..500 {
            let n = rng.random_range(1..=7u8);
            let was_on = sm.is_on_court(&p(n));
            match sm.toggle_on_court(&p(n)) {
                Ok(now_on) => assert_eq!(now_on, !was_on),
                Err(e) => {
                    assert_eq!(e, SMErr::CapacityExceeded(5));
                    assert!(!was_on);
                    rejected += 1;
                }
            }
            assert_le!(sm.on_court().count(), 5);
        }
        assert_gt!(rejected, 0);
    }

    #[test]
    fn test_sixth_player_rejected() {
        let mut sm = new_session(Default::default());
        for n in 1..=5 {
            assert_eq!(sm.toggle_on_court(&p(n)), Ok(true));
        }
        assert_eq!(sm.toggle_on_court(&p(6)), Err(SMErr::CapacityExceeded(5)));
        assert!(!sm.is_on_court(&p(6)));
        assert_eq!(sm.toggle_on_court(&p(1)), Ok(false));
        assert_eq!(sm.toggle_on_court(&p(6)), Ok(true));
    }

    #[test]
    fn test_switch_saves_outgoing_before_loading() {
        let mut sm = new_session(Default::default());
        sm.toggle_on_court(&p(1)).unwrap();
        sm.increment(&player(1), StatKind::Goals).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        sm.tick(token);

        let mut saved = vec![];
        assert_eq!(
            sm.switch_period(Period::SecondHalf, |req| saved.push(req)),
            Ok(true)
        );

        assert_eq!(saved.len(), 1);
        let req = &saved[0];
        assert_eq!(req.period, Period::FirstHalf);
        assert_eq!(req.snapshot.player_stats[&p(1)].goals, 1);
        assert_eq!(req.snapshot.player_stats[&p(1)].minutes_played, 1);
        assert_eq!(req.snapshot.events.len(), 1);
        assert_eq!(req.scores, SideBundle::new(1, 0));
        assert!(!req.is_finished);

        // Second half starts fresh
        assert_eq!(sm.current_period(), Period::SecondHalf);
        assert_eq!(sm.player_stat(&p(1)), Some(&PlayerStat::default()));
        assert!(!sm.clock_is_running());
        assert_eq!(sm.clock_time(), 1500);
        assert_eq!(sm.on_court().count(), 0);
        // The old run's ticks no longer count
        assert_eq!(sm.tick(token).outcome, TickOutcome::Ignored);
        // Score still counts both periods
        assert_eq!(sm.score(), SideBundle::new(1, 0));
    }

    #[test]
    fn test_switch_to_same_period_is_noop() {
        let mut sm = new_session(Default::default());
        sm.toggle_on_court(&p(2)).unwrap();
        let mut saves = 0;
        assert_eq!(sm.switch_period(Period::FirstHalf, |_| saves += 1), Ok(false));
        assert_eq!(saves, 0);
        assert!(sm.is_on_court(&p(2)));
    }

    #[test]
    fn test_switch_round_trip_restores_period() {
        let mut sm = new_session(Default::default());
        sm.increment(&player(3), StatKind::Recoveries).unwrap();
        sm.increment(&Entity::Opponent, StatKind::Fouls).unwrap();
        sm.use_timeout(Side::Visitor).unwrap();
        let before = sm.save_request().snapshot;

        sm.switch_period(Period::SecondHalf, |_| {}).unwrap();
        sm.switch_period(Period::FirstHalf, |_| {}).unwrap();

        assert_eq!(sm.save_request().snapshot, before);
        assert_eq!(sm.period_save_request(Period::FirstHalf).snapshot, before);
        assert_eq!(
            sm.period_save_request(Period::SecondHalf).period,
            Period::SecondHalf
        );
        assert_eq!(sm.timeouts_used(Side::Visitor), 1);

        // Revisiting resumes accumulated stats rather than resetting them
        sm.increment(&player(3), StatKind::Recoveries).unwrap();
        assert_eq!(sm.player_stat(&p(3)).unwrap().recoveries, 2);
    }

    #[test]
    fn test_finish_locks_mutations() {
        let mut sm = new_session(Default::default());
        sm.toggle_on_court(&p(1)).unwrap();
        sm.increment(&player(1), StatKind::Goals).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        sm.tick(token);

        let req = sm.finish().unwrap();
        assert!(req.is_finished);
        assert_eq!(req.scores, SideBundle::new(1, 0));
        assert!(!sm.clock_is_running());
        assert_eq!(sm.finish(), Err(SMErr::AlreadyFinished));

        let before = sm.save_request();
        assert_eq!(sm.increment(&player(1), StatKind::Goals), Err(SMErr::Locked));
        assert_eq!(sm.decrement(&player(1), StatKind::Goals), Err(SMErr::Locked));
        assert_eq!(sm.toggle_on_court(&p(2)), Err(SMErr::Locked));
        assert_eq!(sm.use_timeout(Side::Local), Err(SMErr::Locked));
        assert_eq!(sm.clear_timeout(Side::Local), Err(SMErr::Locked));
        assert_eq!(sm.start_clock(), Err(SMErr::Locked));
        assert_eq!(sm.reset_clock(), Err(SMErr::Locked));
        assert_eq!(sm.tick(token).outcome, TickOutcome::Ignored);
        assert_eq!(sm.save_request(), before);

        let req = sm.reopen().unwrap();
        assert!(!req.is_finished);
        assert_eq!(sm.reopen(), Err(SMErr::NotFinished));
        // Nothing from before finishing was rolled back
        assert_eq!(sm.player_stat(&p(1)).unwrap().goals, 1);
        assert_eq!(sm.increment(&player(1), StatKind::Goals), Ok(2));
        assert_eq!(sm.score(), SideBundle::new(2, 0));
    }

    #[test]
    fn test_finished_match_keeps_period_and_court() {
        let mut sm = new_session(Default::default());
        sm.toggle_on_court(&p(1)).unwrap();
        sm.toggle_on_court(&p(2)).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        sm.tick(token);
        sm.finish().unwrap();

        let mut saves = 0;
        assert_eq!(
            sm.switch_period(Period::SecondHalf, |_| saves += 1),
            Err(SMErr::Locked)
        );
        assert_eq!(saves, 0);
        assert_eq!(sm.current_period(), Period::FirstHalf);
        assert_eq!(sm.on_court().count(), 2);
        assert_eq!(sm.clock_time(), 1499);

        sm.reopen().unwrap();
        assert_eq!(
            sm.switch_period(Period::SecondHalf, |_| saves += 1),
            Ok(true)
        );
        assert_eq!(saves, 1);
        assert_eq!(sm.on_court().count(), 0);
    }

    #[test]
    fn test_timeouts_per_period() {
        let mut sm = new_session(GameConfig {
            timeouts_per_period: 2,
            ..Default::default()
        });
        assert_eq!(sm.use_timeout(Side::Local), Ok(1));
        assert_eq!(sm.use_timeout(Side::Local), Ok(2));
        assert_eq!(
            sm.use_timeout(Side::Local),
            Err(SMErr::TooManyTimeouts(Side::Local))
        );
        assert_eq!(sm.use_timeout(Side::Visitor), Ok(1));
        assert_eq!(sm.clear_timeout(Side::Local), Ok(1));
        assert_eq!(sm.clear_timeout(Side::Visitor), Ok(0));
        assert_eq!(sm.clear_timeout(Side::Visitor), Ok(0));

        sm.switch_period(Period::SecondHalf, |_| {}).unwrap();
        assert_eq!(sm.timeouts_used(Side::Local), 0);
        assert_eq!(sm.use_timeout(Side::Local), Ok(1));
    }

    #[test]
    fn test_hydrate_from_document() {
        initialize();
        let mut doc = MatchDocument::new(test_info());
        doc.player_stats.second.insert(
            p(2),
            PlayerStat {
                goals: 1,
                minutes_played: 400,
                ..Default::default()
            },
        );
        doc.events.second.push(MatchEvent::goal(
            5,
            Side::Local,
            "Player 2".to_string(),
            Some(p(2)),
        ));
        doc.events.first.push(MatchEvent::goal(7, Side::Visitor, "Rays".to_string(), None));
        doc.opponent_stats.first.goals = 1;
        doc.is_finished = true;
        // Cache is stale; the event log wins
        doc.local_score = 4;

        let sm = SessionManager::new(Default::default(), doc, test_roster());
        assert!(sm.is_finished());
        assert_eq!(sm.score(), SideBundle::new(1, 1));
        assert_eq!(
            sm.reconcile_cached_score(SideBundle::new(4, 1)),
            SideBundle::new(1, 1)
        );
        // Squad players without a stored line start at zero
        assert_eq!(sm.player_stat(&p(7)), Some(&PlayerStat::default()));

        let totals = sm.player_totals(&p(2)).unwrap();
        assert_eq!(totals.goals, 1);
        assert_eq!(totals.minutes_played, 400);
        assert_eq!(sm.opponent_totals().goals, 1);
        assert_eq!(sm.player_totals(&"nobody".into()), None);
    }

    #[test]
    fn test_event_minutes_follow_clock() {
        let mut sm = new_session(GameConfig {
            period_duration: 300,
            ..Default::default()
        });
        sm.increment(&player(1), StatKind::Goals).unwrap();
        let token = sm.start_clock().unwrap().unwrap();
        for _ in 0..59 {
            sm.tick(token);
        }
        sm.increment(&player(1), StatKind::Goals).unwrap();
        sm.tick(token);
        sm.increment(&Entity::Opponent, StatKind::Goals).unwrap();
        for _ in 0..120 {
            sm.tick(token);
        }
        sm.increment(&player(2), StatKind::YellowCards).unwrap();

        let minutes: Vec<u16> = sm
            .events(Period::FirstHalf)
            .iter()
            .map(|e| e.minute)
            .collect();
        assert_eq!(minutes, vec![0, 1, 1, 3]);
        for pair in minutes.windows(2) {
            assert_le!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_periodic_autosave() {
        let mut sm = new_session(GameConfig {
            autosave_interval: 2,
            ..Default::default()
        });
        let token = sm.start_clock().unwrap().unwrap();
        assert_eq!(sm.tick(token).autosave, None);
        let report = sm.tick(token);
        let req = report.autosave.unwrap();
        assert_eq!(req.period, Period::FirstHalf);
        assert_eq!(sm.tick(token).autosave, None);
        sm.pause_clock();
        assert_eq!(sm.tick(token).autosave, None);
    }

    #[test]
    fn test_status_string() {
        let mut sm = new_session(GameConfig {
            period_duration: 125,
            ..Default::default()
        });
        assert_eq!(sm.status_string(), "[02:05 1H]");
        sm.switch_period(Period::SecondHalf, |_| {}).unwrap();
        assert_eq!(sm.status_string(), "[02:05 2H]");
    }
}
