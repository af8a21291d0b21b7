use match_common::{
    events::{MatchEvent, count_goals},
    side::Side,
};

/// Events logged during one period, in the order they happened. There is no way to remove or
/// edit an entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct EventLog {
    events: Vec<MatchEvent>,
}

impl EventLog {
    pub(crate) fn new(events: Vec<MatchEvent>) -> Self {
        Self { events }
    }

    pub(crate) fn append(&mut self, event: MatchEvent) {
        self.events.push(event);
    }

    pub(crate) fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub(crate) fn goals(&self, side: Side) -> u32 {
        count_goals(&self.events, side)
    }
}
