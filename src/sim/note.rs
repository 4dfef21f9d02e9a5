//! Runtime note records
//!
//! A note is created `Unhit` and resolves exactly once, either to `Hit`
//! or to `Missed`. Resolution never reverts until the timeline is reset.

use serde::{Deserialize, Serialize};

use super::judge::Grade;
use crate::beatmap::Note;

/// Stable handle for a note: its index in the sorted note list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum NoteState {
    #[default]
    Unhit,
    Hit {
        grade: Grade,
        /// Note time minus press time (positive = pressed early)
        offset: f64,
    },
    Missed,
}

impl NoteState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, NoteState::Unhit)
    }
}

/// A note plus its lifecycle bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedNote {
    pub note: Note,
    pub state: NoteState,
    /// Has entered the lookahead window
    pub spawned: bool,
}

impl TrackedNote {
    pub fn new(note: Note) -> Self {
        Self {
            note,
            state: NoteState::Unhit,
            spawned: false,
        }
    }

    /// Spawned and not yet consumed
    #[inline]
    pub fn is_hittable(&self) -> bool {
        self.spawned && self.state == NoteState::Unhit
    }

    /// Move to a terminal state. Returns false (and changes nothing) if the
    /// note was already resolved.
    pub fn resolve(&mut self, state: NoteState) -> bool {
        if self.state.is_resolved() || !state.is_resolved() {
            return false;
        }
        self.state = state;
        true
    }
}
