use crate::side::{Side, SideBundle};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::Date;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: ToString>(id: S) -> Self {
                Self(id.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(MatchId);
string_id!(PlayerId);
string_id!(TeamId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub number: u8,
    pub team: TeamId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: TeamId,
    pub name: String,
}

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[derivative(Default)]
    League,
    Cup,
    Tournament,
    Friendly,
}

/// Identity of a match, as created by the surrounding application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub id: MatchId,
    pub teams: SideBundle<TeamRef>,
    pub date: Date,
    pub kind: MatchKind,
    pub squad: Vec<PlayerId>,
}

impl MatchInfo {
    /// Which side the given team plays on, compared by id rather than by display name
    pub fn side_of(&self, team: &TeamId) -> Option<Side> {
        self.teams
            .iter()
            .find(|(_, t)| &t.id == team)
            .map(|(side, _)| side)
    }

    pub fn team(&self, side: Side) -> &TeamRef {
        &self.teams[side]
    }
}
