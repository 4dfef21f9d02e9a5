//! Keyboard to grid mapping
//!
//! Eight keys, one per active cell, laid out so each hand covers one side
//! of the grid. Holding a key fires once; it must be released before it
//! can press again.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::beatmap::GridCell;
use crate::error::{GameError, Result};

/// Key name (lowercase `KeyboardEvent.key`) to grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBindings(pub BTreeMap<String, GridCell>);

impl Default for KeyBindings {
    fn default() -> Self {
        let table = [
            ("g", 1, 0),
            ("k", 2, 0),
            ("f", 0, 1),
            ("l", 3, 1),
            ("r", 0, 2),
            ("o", 3, 2),
            ("t", 1, 3),
            ("i", 2, 3),
        ];
        Self(
            table
                .into_iter()
                .map(|(key, x, y)| (key.to_string(), GridCell { x, y }))
                .collect(),
        )
    }
}

impl KeyBindings {
    pub fn cell_for(&self, key: &str) -> Option<GridCell> {
        self.0.get(&key.to_lowercase()).copied()
    }

    /// Every binding must target a cell notes can land on
    pub fn validate(&self) -> Result<()> {
        match self.0.iter().find(|(_, cell)| !cell.is_active()) {
            Some((key, cell)) => Err(GameError::Configuration(format!(
                "key '{key}' bound to inactive cell {cell}"
            ))),
            None => Ok(()),
        }
    }
}

/// Turns raw key events into grid presses, suppressing auto-repeat
#[derive(Debug, Clone, Default)]
pub struct KeyTracker {
    bindings: KeyBindings,
    held: HashSet<String>,
}

impl KeyTracker {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
        }
    }

    /// A key went down. Returns the cell for a fresh press of a bound key.
    pub fn key_down(&mut self, key: &str) -> Option<GridCell> {
        let key = key.to_lowercase();
        let cell = self.bindings.cell_for(&key)?;
        if !self.held.insert(key) {
            return None;
        }
        Some(cell)
    }

    pub fn key_up(&mut self, key: &str) {
        self.held.remove(&key.to_lowercase());
    }

    /// Forget held keys (focus lost; key-ups will never arrive)
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}
