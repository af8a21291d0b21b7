use crate::{roster::PlayerId, side::Side};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Goal,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Yellow,
    Red,
}

impl fmt::Display for CardColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yellow => write!(f, "yellow"),
            Self::Red => write!(f, "red"),
        }
    }
}

/// A scoring or disciplinary event. Never edited once appended to a log.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub minute: u16,
    pub team: Side,
    pub player_name: String,
    pub player_id: Option<PlayerId>,
    pub card: Option<CardColor>,
}

impl MatchEvent {
    pub fn goal(minute: u16, team: Side, player_name: String, player_id: Option<PlayerId>) -> Self {
        Self {
            kind: EventKind::Goal,
            minute,
            team,
            player_name,
            player_id,
            card: None,
        }
    }

    pub fn card(
        minute: u16,
        team: Side,
        player_name: String,
        player_id: Option<PlayerId>,
        color: CardColor,
    ) -> Self {
        Self {
            kind: EventKind::Card,
            minute,
            team,
            player_name,
            player_id,
            card: Some(color),
        }
    }

    pub fn is_goal_for(&self, side: Side) -> bool {
        self.kind == EventKind::Goal && self.team == side
    }
}

/// The match minute shown for an event logged with `remaining_secs` left on a clock that
/// started at `duration_secs`
pub fn event_minute(duration_secs: u32, remaining_secs: u32) -> u16 {
    let minute = (duration_secs / 60).saturating_sub(remaining_secs / 60);
    minute.try_into().unwrap_or(u16::MAX)
}

/// Counts the goal events for `side`. This count is the authoritative score.
pub fn count_goals<'a, I>(events: I, side: Side) -> u32
where
    I: IntoIterator<Item = &'a MatchEvent>,
{
    events
        .into_iter()
        .filter(|event| event.is_goal_for(side))
        .count() as u32
}
