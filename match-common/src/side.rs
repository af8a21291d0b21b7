use core::ops::{Index, IndexMut};
use derivative::Derivative;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(
    Derivative, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    Sequence,
)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[derivative(Default)]
    Local,
    Visitor,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Local => Self::Visitor,
            Self::Visitor => Self::Local,
        }
    }

    /// The key used for this side in persisted field paths
    pub fn key(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Visitor => "visitor",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "local" => Some(Self::Local),
            "visitor" => Some(Self::Visitor),
            _ => None,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            Self::Local => write!(f, "Local"),
            Self::Visitor => write!(f, "Visitor"),
        }
    }
}

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct SideBundle<T> {
    pub local: T,
    pub visitor: T,
}

impl<T> SideBundle<T> {
    pub fn new(local: T, visitor: T) -> Self {
        Self { local, visitor }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        self.into_iter()
    }
}

impl<T> Index<Side> for SideBundle<T> {
    type Output = T;

    fn index(&self, side: Side) -> &Self::Output {
        match side {
            Side::Local => &self.local,
            Side::Visitor => &self.visitor,
        }
    }
}

impl<T> IndexMut<Side> for SideBundle<T> {
    fn index_mut(&mut self, side: Side) -> &mut Self::Output {
        match side {
            Side::Local => &mut self.local,
            Side::Visitor => &mut self.visitor,
        }
    }
}

/// Scoreboard form, local first: `2-1`
impl<T: Display> Display for SideBundle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.local, self.visitor)
    }
}

impl<'a, T> IntoIterator for &'a SideBundle<T> {
    type Item = (Side, &'a T);
    type IntoIter = std::array::IntoIter<Self::Item, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [(Side::Local, &self.local), (Side::Visitor, &self.visitor)].into_iter()
    }
}

impl<T> IntoIterator for SideBundle<T> {
    type Item = (Side, T);
    type IntoIter = std::array::IntoIter<Self::Item, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [(Side::Local, self.local), (Side::Visitor, self.visitor)].into_iter()
    }
}

impl<T: Default> FromIterator<(Side, T)> for SideBundle<T> {
    fn from_iter<I: IntoIterator<Item = (Side, T)>>(iter: I) -> Self {
        let mut bundle = SideBundle::default();
        for (side, value) in iter {
            bundle[side] = value;
        }
        bundle
    }
}
