//! Summary difficulty figures for map selection screens

use serde::{Deserialize, Serialize};

use super::normalize::Note;
use crate::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultyStats {
    /// Time of the last note (seconds)
    pub duration: f64,
    pub note_count: usize,
    pub obstacle_count: usize,
    /// Notes per minute, one decimal
    pub density: f64,
    /// Percentage of consecutive notes that change cut direction, one decimal
    pub complexity: f64,
    /// 0-10 rating, one decimal
    pub estimated_difficulty: f64,
}

impl DifficultyStats {
    /// Compute from time-sorted notes
    pub fn compute(notes: &[Note], obstacle_count: usize) -> Self {
        if notes.is_empty() {
            return Self {
                obstacle_count,
                ..Default::default()
            };
        }

        let count = notes.len() as f64;
        let duration = notes.iter().map(|n| n.time_seconds).fold(f64::MIN, f64::max);
        // All notes at t=0 would divide by zero
        let density = if duration > 0.0 { count / (duration / 60.0) } else { 0.0 };

        let direction_changes = notes
            .windows(2)
            .filter(|pair| pair[0].direction != pair[1].direction)
            .count();
        let complexity = direction_changes as f64 / count * 100.0;

        Self {
            duration,
            note_count: notes.len(),
            obstacle_count,
            density: round_to(density, 1),
            complexity: round_to(complexity, 1),
            estimated_difficulty: round_to(density * 0.1 + complexity * 0.02, 1).min(10.0),
        }
    }

    /// Stats for notes only
    pub fn from_notes(notes: &[Note]) -> Self {
        Self::compute(notes, 0)
    }
}
