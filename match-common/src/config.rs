use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Game {
    /// Length of each period in seconds
    pub period_duration: u32,
    pub max_on_court: u8,
    pub timeouts_per_period: u16,
    /// Seconds of running clock between automatic saves, 0 disables them
    pub autosave_interval: u32,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            period_duration: 1500,
            max_on_court: 5,
            timeouts_per_period: 1,
            autosave_interval: 0,
        }
    }
}
