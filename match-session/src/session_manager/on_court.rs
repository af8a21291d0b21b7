use indexmap::IndexSet;
use match_common::roster::PlayerId;

/// The players currently accruing playing time, in the order they were put on court
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OnCourt {
    players: IndexSet<PlayerId>,
    max: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Toggled {
    On,
    Off,
}

impl OnCourt {
    pub(crate) fn new(max: u8) -> Self {
        Self {
            players: IndexSet::new(),
            max: max.into(),
        }
    }

    pub(crate) fn max(&self) -> usize {
        self.max
    }

    /// Returns `None` when adding would go over the limit; the selection is left unchanged
    pub(crate) fn toggle(&mut self, id: &PlayerId) -> Option<Toggled> {
        if self.players.shift_remove(id) {
            Some(Toggled::Off)
        } else if self.players.len() < self.max {
            self.players.insert(id.clone());
            Some(Toggled::On)
        } else {
            None
        }
    }

    pub(crate) fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains(id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.players.len()
    }

    pub(crate) fn clear(&mut self) {
        self.players.clear();
    }
}
