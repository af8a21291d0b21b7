use core::ops::{Index, IndexMut};
use derivative::Derivative;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// One of the two halves of a match. Each half owns an independent snapshot of stats, events
/// and timeouts.
#[derive(
    Derivative, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    Sequence,
)]
#[derivative(Default)]
pub enum Period {
    #[derivative(Default)]
    #[serde(rename = "1H")]
    FirstHalf,
    #[serde(rename = "2H")]
    SecondHalf,
}

impl Period {
    /// The key used for this period in persisted field paths
    pub fn key(self) -> &'static str {
        match self {
            Self::FirstHalf => "1H",
            Self::SecondHalf => "2H",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1H" | "1" => Ok(Self::FirstHalf),
            "2H" | "2" => Ok(Self::SecondHalf),
            other => Err(format!("Unknown period `{other}`")),
        }
    }
}

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, PartialEq, Eq)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PeriodBundle<T> {
    #[serde(rename = "1H")]
    pub first: T,
    #[serde(rename = "2H")]
    pub second: T,
}

impl<T> PeriodBundle<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Period, &T)> {
        [(Period::FirstHalf, &self.first), (Period::SecondHalf, &self.second)].into_iter()
    }
}

impl<T> Index<Period> for PeriodBundle<T> {
    type Output = T;

    fn index(&self, period: Period) -> &Self::Output {
        match period {
            Period::FirstHalf => &self.first,
            Period::SecondHalf => &self.second,
        }
    }
}

impl<T> IndexMut<Period> for PeriodBundle<T> {
    fn index_mut(&mut self, period: Period) -> &mut Self::Output {
        match period {
            Period::FirstHalf => &mut self.first,
            Period::SecondHalf => &mut self.second,
        }
    }
}
