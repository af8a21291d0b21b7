/// Identifies one run of the clock, from a start until the next pause or reset. Ticks carrying
/// a stale token are ignored, so a tick already queued when the clock stopped can't count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClockState {
    Stopped { clock_time: u32 },
    CountingDown { clock_time: u32, token: ClockToken },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a run that is no longer active
    Ignored,
    Counted,
    /// The clock reached zero on this tick and has stopped itself
    PeriodEnded,
}

impl TickOutcome {
    pub fn counted(self) -> bool {
        matches!(self, Self::Counted | Self::PeriodEnded)
    }
}

/// A one second resolution countdown clock
#[derive(Debug, Clone)]
pub struct Clock {
    duration: u32,
    state: ClockState,
    next_token: u64,
}

impl Clock {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            state: ClockState::Stopped {
                clock_time: duration,
            },
            next_token: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.token().is_some()
    }

    /// Seconds left on the clock
    pub fn clock_time(&self) -> u32 {
        match self.state {
            ClockState::Stopped { clock_time } | ClockState::CountingDown { clock_time, .. } => {
                clock_time
            }
        }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn token(&self) -> Option<ClockToken> {
        match self.state {
            ClockState::CountingDown { token, .. } => Some(token),
            ClockState::Stopped { .. } => None,
        }
    }

    /// Returns the token for the new run, or `None` if the clock was already running or has no
    /// time left
    pub fn start(&mut self) -> Option<ClockToken> {
        match self.state {
            ClockState::Stopped { clock_time } if clock_time > 0 => {
                let token = ClockToken(self.next_token);
                self.next_token += 1;
                self.state = ClockState::CountingDown { clock_time, token };
                Some(token)
            }
            _ => None,
        }
    }

    // Returns true if the clock was stopped, false if it was already stopped
    pub fn pause(&mut self) -> bool {
        match self.state {
            ClockState::CountingDown { clock_time, .. } => {
                self.state = ClockState::Stopped { clock_time };
                true
            }
            ClockState::Stopped { .. } => false,
        }
    }

    /// Stops the clock and puts the full `duration` back on it
    pub fn reset(&mut self, duration: u32) {
        self.duration = duration;
        self.state = ClockState::Stopped {
            clock_time: duration,
        };
    }

    pub fn tick(&mut self, token: ClockToken) -> TickOutcome {
        match self.state {
            ClockState::CountingDown {
                clock_time,
                token: current,
            } if current == token => {
                let clock_time = clock_time.saturating_sub(1);
                if clock_time == 0 {
                    self.state = ClockState::Stopped { clock_time };
                    TickOutcome::PeriodEnded
                } else {
                    self.state = ClockState::CountingDown { clock_time, token };
                    TickOutcome::Counted
                }
            }
            _ => TickOutcome::Ignored,
        }
    }
}
