use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    ops::Add,
    str::FromStr,
};

/// The counters that can be bumped by hand. Playing time is not in this list, it only grows
/// with the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Sequence)]
#[serde(rename_all = "camelCase")]
pub enum StatKind {
    Goals,
    Assists,
    Fouls,
    ShotsOnTarget,
    ShotsOffTarget,
    Recoveries,
    Turnovers,
    Saves,
    GoalsConceded,
    OneVsOne,
    YellowCards,
    RedCards,
}

impl StatKind {
    pub fn key(self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Assists => "assists",
            Self::Fouls => "fouls",
            Self::ShotsOnTarget => "shotsOnTarget",
            Self::ShotsOffTarget => "shotsOffTarget",
            Self::Recoveries => "recoveries",
            Self::Turnovers => "turnovers",
            Self::Saves => "saves",
            Self::GoalsConceded => "goalsConceded",
            Self::OneVsOne => "oneVsOne",
            Self::YellowCards => "yellowCards",
            Self::RedCards => "redCards",
        }
    }

    /// Whether the aggregate opponent line keeps this counter
    pub fn tracked_for_opponent(self) -> bool {
        matches!(
            self,
            Self::Goals
                | Self::ShotsOnTarget
                | Self::ShotsOffTarget
                | Self::Fouls
                | Self::Recoveries
                | Self::Turnovers
                | Self::YellowCards
                | Self::RedCards
        )
    }
}

impl Display for StatKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for StatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        enum_iterator::all::<StatKind>()
            .find(|kind| kind.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown stat `{s}`"))
    }
}

/// Read/write access to the counters of a stat line by kind
pub trait StatLine {
    /// Returns `None` when the line does not keep that counter
    fn counter(&self, kind: StatKind) -> Option<u32>;

    fn counter_mut(&mut self, kind: StatKind) -> Option<&mut u32>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStat {
    /// Seconds on court
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub fouls: u32,
    pub shots_on_target: u32,
    pub shots_off_target: u32,
    pub recoveries: u32,
    pub turnovers: u32,
    pub saves: u32,
    pub goals_conceded: u32,
    pub one_vs_one: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

impl StatLine for PlayerStat {
    fn counter(&self, kind: StatKind) -> Option<u32> {
        Some(match kind {
            StatKind::Goals => self.goals,
            StatKind::Assists => self.assists,
            StatKind::Fouls => self.fouls,
            StatKind::ShotsOnTarget => self.shots_on_target,
            StatKind::ShotsOffTarget => self.shots_off_target,
            StatKind::Recoveries => self.recoveries,
            StatKind::Turnovers => self.turnovers,
            StatKind::Saves => self.saves,
            StatKind::GoalsConceded => self.goals_conceded,
            StatKind::OneVsOne => self.one_vs_one,
            StatKind::YellowCards => self.yellow_cards,
            StatKind::RedCards => self.red_cards,
        })
    }

    fn counter_mut(&mut self, kind: StatKind) -> Option<&mut u32> {
        Some(match kind {
            StatKind::Goals => &mut self.goals,
            StatKind::Assists => &mut self.assists,
            StatKind::Fouls => &mut self.fouls,
            StatKind::ShotsOnTarget => &mut self.shots_on_target,
            StatKind::ShotsOffTarget => &mut self.shots_off_target,
            StatKind::Recoveries => &mut self.recoveries,
            StatKind::Turnovers => &mut self.turnovers,
            StatKind::Saves => &mut self.saves,
            StatKind::GoalsConceded => &mut self.goals_conceded,
            StatKind::OneVsOne => &mut self.one_vs_one,
            StatKind::YellowCards => &mut self.yellow_cards,
            StatKind::RedCards => &mut self.red_cards,
        })
    }
}

impl Add for PlayerStat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            minutes_played: self.minutes_played.saturating_add(rhs.minutes_played),
            goals: self.goals.saturating_add(rhs.goals),
            assists: self.assists.saturating_add(rhs.assists),
            fouls: self.fouls.saturating_add(rhs.fouls),
            shots_on_target: self.shots_on_target.saturating_add(rhs.shots_on_target),
            shots_off_target: self.shots_off_target.saturating_add(rhs.shots_off_target),
            recoveries: self.recoveries.saturating_add(rhs.recoveries),
            turnovers: self.turnovers.saturating_add(rhs.turnovers),
            saves: self.saves.saturating_add(rhs.saves),
            goals_conceded: self.goals_conceded.saturating_add(rhs.goals_conceded),
            one_vs_one: self.one_vs_one.saturating_add(rhs.one_vs_one),
            yellow_cards: self.yellow_cards.saturating_add(rhs.yellow_cards),
            red_cards: self.red_cards.saturating_add(rhs.red_cards),
        }
    }
}

/// Aggregate line for the team that is not being tracked player by player
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpponentStat {
    pub goals: u32,
    pub shots_on_target: u32,
    pub shots_off_target: u32,
    pub fouls: u32,
    pub recoveries: u32,
    pub turnovers: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

impl StatLine for OpponentStat {
    fn counter(&self, kind: StatKind) -> Option<u32> {
        match kind {
            StatKind::Goals => Some(self.goals),
            StatKind::ShotsOnTarget => Some(self.shots_on_target),
            StatKind::ShotsOffTarget => Some(self.shots_off_target),
            StatKind::Fouls => Some(self.fouls),
            StatKind::Recoveries => Some(self.recoveries),
            StatKind::Turnovers => Some(self.turnovers),
            StatKind::YellowCards => Some(self.yellow_cards),
            StatKind::RedCards => Some(self.red_cards),
            _ => None,
        }
    }

    fn counter_mut(&mut self, kind: StatKind) -> Option<&mut u32> {
        match kind {
            StatKind::Goals => Some(&mut self.goals),
            StatKind::ShotsOnTarget => Some(&mut self.shots_on_target),
            StatKind::ShotsOffTarget => Some(&mut self.shots_off_target),
            StatKind::Fouls => Some(&mut self.fouls),
            StatKind::Recoveries => Some(&mut self.recoveries),
            StatKind::Turnovers => Some(&mut self.turnovers),
            StatKind::YellowCards => Some(&mut self.yellow_cards),
            StatKind::RedCards => Some(&mut self.red_cards),
            _ => None,
        }
    }
}

impl Add for OpponentStat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            goals: self.goals.saturating_add(rhs.goals),
            shots_on_target: self.shots_on_target.saturating_add(rhs.shots_on_target),
            shots_off_target: self.shots_off_target.saturating_add(rhs.shots_off_target),
            fouls: self.fouls.saturating_add(rhs.fouls),
            recoveries: self.recoveries.saturating_add(rhs.recoveries),
            turnovers: self.turnovers.saturating_add(rhs.turnovers),
            yellow_cards: self.yellow_cards.saturating_add(rhs.yellow_cards),
            red_cards: self.red_cards.saturating_add(rhs.red_cards),
        }
    }
}
