//! Beat-domain records to playable, time-sorted notes

use serde::{Deserialize, Serialize};

use super::grid::{GridCell, remap};
use super::raw::{RawBeatmap, RawNote};
use super::stats::DifficultyStats;
use crate::beats_to_seconds;
use crate::error::{GameError, Result};

/// Saber colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorType {
    /// Left hand (red)
    A,
    /// Right hand (blue)
    B,
}

impl ColorType {
    fn from_raw(value: i32) -> Self {
        if value == 0 { ColorType::A } else { ColorType::B }
    }
}

/// A playable note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// When the note should be hit, in song seconds
    pub time_seconds: f64,
    pub cell: GridCell,
    pub color: ColorType,
    /// Cut direction, passed through untouched for the renderer
    pub direction: i32,
    /// Original authoring position (lineIndex, lineLayer)
    pub authoring: (i32, i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bomb {
    pub time_seconds: f64,
    pub cell: GridCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub time_seconds: f64,
    pub duration_seconds: f64,
    pub cell: GridCell,
    pub width: i32,
    pub height: i32,
}

/// Everything the gameplay core needs from one difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMap {
    pub bpm: f64,
    /// Sorted ascending by `time_seconds`, ties in file order
    pub notes: Vec<Note>,
    pub bombs: Vec<Bomb>,
    pub obstacles: Vec<Obstacle>,
    pub stats: DifficultyStats,
}

fn check_bpm(bpm: f64) -> Result<f64> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(GameError::InvalidMap(format!("invalid BPM {bpm}")))
    }
}

fn convert_note(note: &RawNote, bpm: f64) -> Result<Note> {
    Ok(Note {
        time_seconds: beats_to_seconds(note.beat, bpm),
        cell: remap(note.line_index, note.line_layer)?,
        color: ColorType::from_raw(note.color),
        direction: note.direction,
        authoring: (note.line_index, note.line_layer),
    })
}

/// Convert a decoded difficulty into seconds on the play grid
pub fn normalize(raw: &RawBeatmap, bpm: f64) -> Result<NormalizedMap> {
    let bpm = check_bpm(bpm)?;

    let mut notes = raw
        .notes
        .iter()
        .map(|n| convert_note(n, bpm))
        .collect::<Result<Vec<_>>>()?;
    // Stable: simultaneous notes keep their file order
    notes.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

    let mut bombs = raw
        .bombs
        .iter()
        .map(|b| {
            Ok(Bomb {
                time_seconds: beats_to_seconds(b.beat, bpm),
                cell: remap(b.line_index, b.line_layer)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    bombs.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

    let mut obstacles = raw
        .obstacles
        .iter()
        .map(|o| {
            Ok(Obstacle {
                time_seconds: beats_to_seconds(o.beat, bpm),
                duration_seconds: beats_to_seconds(o.duration_beats, bpm),
                cell: remap(o.line_index, o.line_layer)?,
                width: o.width,
                height: o.height,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    obstacles.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

    let stats = DifficultyStats::compute(&notes, obstacles.len());

    log::info!(
        "Normalized {:?} map v{} at {} BPM: {} notes, {} bombs, {} obstacles, {:.1}s",
        raw.schema,
        raw.version,
        bpm,
        notes.len(),
        bombs.len(),
        obstacles.len(),
        stats.duration
    );
    for (i, note) in notes.iter().take(5).enumerate() {
        log::debug!(
            "  note {}: t={:.3}s {:?} -> {} {:?}",
            i,
            note.time_seconds,
            note.authoring,
            note.cell,
            note.color
        );
    }

    Ok(NormalizedMap {
        bpm,
        notes,
        bombs,
        obstacles,
        stats,
    })
}

/// Decode and normalize a difficulty file in one step
pub fn normalize_json(text: &str, bpm: f64) -> Result<NormalizedMap> {
    let bpm = check_bpm(bpm)?;
    let raw = RawBeatmap::from_json(text)?;
    normalize(&raw, bpm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::raw::Schema;
    use proptest::prelude::*;

    fn raw_with(notes: Vec<RawNote>) -> RawBeatmap {
        RawBeatmap {
            version: "3.0.0".to_string(),
            schema: Schema::V3,
            notes,
            bombs: Vec::new(),
            obstacles: Vec::new(),
        }
    }

    fn raw_note(beat: f64, x: i32, y: i32) -> RawNote {
        RawNote {
            beat,
            line_index: x,
            line_layer: y,
            color: 0,
            direction: 1,
        }
    }

    #[test]
    fn test_v2_and_v3_normalize_identically() {
        let v2 = r#"{"_version": "2.0.0", "_notes": [
            {"_time": 4, "_lineIndex": 1, "_lineLayer": 0, "_type": 0, "_cutDirection": 1},
            {"_time": 2, "_lineIndex": 3, "_lineLayer": 1, "_type": 1, "_cutDirection": 0}
        ]}"#;
        let v3 = r#"{"version": "3.2.0", "colorNotes": [
            {"b": 4, "x": 1, "y": 0, "c": 0, "d": 1},
            {"b": 2, "x": 3, "y": 1, "c": 1, "d": 0}
        ]}"#;

        let a = normalize_json(v2, 120.0).unwrap();
        let b = normalize_json(v3, 120.0).unwrap();
        assert_eq!(a.notes, b.notes);
        assert_eq!(a.notes[0].time_seconds, 1.0);
        assert_eq!(a.notes[0].cell, GridCell { x: 3, y: 2 });
        assert_eq!(a.notes[0].color, ColorType::B);
        assert_eq!(a.notes[1].time_seconds, 2.0);
        assert_eq!(a.notes[1].cell, GridCell { x: 1, y: 0 });
    }

    #[test]
    fn test_single_bottom_note_at_beat_four() {
        let map = normalize(&raw_with(vec![raw_note(4.0, 1, 0)]), 120.0).unwrap();
        assert_eq!(map.notes.len(), 1);
        assert_eq!(map.notes[0].time_seconds, 2.0);
        assert_eq!(map.notes[0].cell, GridCell { x: 1, y: 0 });
    }

    #[test]
    fn test_stable_sort_keeps_file_order_for_ties() {
        let map = normalize(
            &raw_with(vec![raw_note(2.0, 3, 2), raw_note(1.0, 0, 0), raw_note(2.0, 0, 2)]),
            60.0,
        )
        .unwrap();
        let cells: Vec<_> = map.notes.iter().map(|n| n.authoring).collect();
        assert_eq!(cells, vec![(0, 0), (3, 2), (0, 2)]);
    }

    #[test]
    fn test_bpm_must_be_positive() {
        let raw = raw_with(vec![raw_note(1.0, 0, 0)]);
        assert!(matches!(normalize(&raw, 0.0), Err(GameError::InvalidMap(_))));
        assert!(matches!(normalize(&raw, -120.0), Err(GameError::InvalidMap(_))));
        assert!(matches!(normalize(&raw, f64::NAN), Err(GameError::InvalidMap(_))));
    }

    #[test]
    fn test_out_of_domain_note_fails_loudly() {
        let raw = raw_with(vec![raw_note(1.0, 5, 0)]);
        assert!(matches!(normalize(&raw, 120.0), Err(GameError::Configuration(_))));
    }

    #[test]
    fn test_empty_map() {
        let map = normalize_json(r#"{"version": "3.0.0"}"#, 100.0).unwrap();
        assert!(map.notes.is_empty());
        assert_eq!(map.stats, DifficultyStats::default());
    }

    #[test]
    fn test_obstacles_and_bombs_converted() {
        let map = normalize_json(
            r#"{"_version": "2.0.0",
                "_notes": [{"_time": 2, "_lineIndex": 2, "_lineLayer": 2, "_type": 3, "_cutDirection": 0}],
                "_obstacles": [{"_time": 4, "_lineIndex": 3, "_type": 0, "_duration": 2, "_width": 1}]}"#,
            120.0,
        )
        .unwrap();
        assert!(map.notes.is_empty());
        assert_eq!(map.bombs[0].time_seconds, 1.0);
        assert_eq!(map.bombs[0].cell, GridCell { x: 2, y: 3 });
        assert_eq!(map.obstacles[0].time_seconds, 2.0);
        assert_eq!(map.obstacles[0].duration_seconds, 1.0);
        assert_eq!(map.obstacles[0].cell, GridCell { x: 2, y: 0 });
        assert_eq!(map.obstacles[0].height, 4);
    }

    proptest! {
        #[test]
        fn prop_normalized_notes_sorted_and_in_range(
            beats in prop::collection::vec((0.0f64..1000.0, 0i32..4, 0i32..3), 0..200),
            bpm in 30.0f64..400.0,
        ) {
            let raw = raw_with(beats.iter().map(|&(b, x, y)| raw_note(b, x, y)).collect());
            let map = normalize(&raw, bpm).unwrap();
            prop_assert_eq!(map.notes.len(), beats.len());
            for pair in map.notes.windows(2) {
                prop_assert!(pair[0].time_seconds <= pair[1].time_seconds);
            }
            for note in &map.notes {
                prop_assert!(note.cell.is_active());
                prop_assert!(note.time_seconds >= 0.0);
            }
        }
    }
}
