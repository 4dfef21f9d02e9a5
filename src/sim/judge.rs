//! Judgement engine
//!
//! Turns a press on a grid cell into at most one hit. Candidates are the
//! live notes on that cell, scanned earliest first; the first whose offset
//! is inside the hit window is consumed and graded.

use serde::{Deserialize, Serialize};

use super::note::{NoteId, NoteState};
use super::timeline::Timeline;
use crate::beatmap::GridCell;
use crate::consts::{GOOD_WINDOW, GREAT_WINDOW, PERFECT_WINDOW};
use crate::error::{GameError, Result};

/// Hit quality, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Perfect,
    Great,
    Good,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Perfect => "PERFECT",
            Grade::Great => "GREAT",
            Grade::Good => "GOOD",
        }
    }
}

/// Absolute-offset thresholds (seconds, inclusive). `good` is the hit window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingWindows {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self {
            perfect: PERFECT_WINDOW,
            great: GREAT_WINDOW,
            good: GOOD_WINDOW,
        }
    }
}

impl TimingWindows {
    /// Outer window: anything later than this is a miss
    #[inline]
    pub fn hit_window(&self) -> f64 {
        self.good
    }

    /// Grade for an absolute offset, or None outside the hit window
    pub fn classify(&self, abs_offset: f64) -> Option<Grade> {
        if abs_offset <= self.perfect {
            Some(Grade::Perfect)
        } else if abs_offset <= self.great {
            Some(Grade::Great)
        } else if abs_offset <= self.good {
            Some(Grade::Good)
        } else {
            None
        }
    }

    /// All three windows multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            perfect: self.perfect * factor,
            great: self.great * factor,
            good: self.good * factor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = self.perfect > 0.0 && self.perfect <= self.great && self.great <= self.good;
        if ordered && self.good.is_finite() {
            Ok(())
        } else {
            Err(GameError::Configuration(format!(
                "timing windows must satisfy 0 < perfect <= great <= good, got {:.3}/{:.3}/{:.3}",
                self.perfect, self.great, self.good
            )))
        }
    }
}

/// Which side of the note a press landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    Early,
    Late,
}

impl Timing {
    /// Classify a note-minus-press offset; dead on counts as late
    pub fn from_offset(offset: f64) -> Self {
        if offset > 0.0 { Timing::Early } else { Timing::Late }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Early => "EARLY",
            Timing::Late => "LATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub note: NoteId,
    pub grade: Grade,
    /// Note time minus press time
    pub offset: f64,
}

impl HitResult {
    pub fn timing(&self) -> Timing {
        Timing::from_offset(self.offset)
    }
}

/// Why a press consumed nothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoHit {
    /// No live note on that cell
    NoNote,
    /// Notes exist on the cell but none inside the window
    OutOfWindow { nearest_offset: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Judgement {
    Hit(HitResult),
    NoHit(NoHit),
}

#[derive(Debug, Clone, Default)]
pub struct Judge {
    windows: TimingWindows,
}

impl Judge {
    pub fn new(windows: TimingWindows) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &TimingWindows {
        &self.windows
    }

    /// Judge a press on `cell` at song time `now`, consuming at most one note
    pub fn judge(&self, timeline: &mut Timeline, cell: GridCell, now: f64) -> Judgement {
        let mut nearest: Option<f64> = None;
        let mut found = None;

        for (id, tracked) in timeline.hittable_notes_at(cell) {
            let offset = tracked.note.time_seconds - now;
            if let Some(grade) = self.windows.classify(offset.abs()) {
                found = Some(HitResult { note: id, grade, offset });
                break;
            }
            if nearest.is_none_or(|n| offset.abs() < n.abs()) {
                nearest = Some(offset);
            }
        }

        match found {
            Some(hit) => {
                let consumed = timeline.mark(hit.note, NoteState::Hit { grade: hit.grade, offset: hit.offset });
                debug_assert!(consumed, "hittable note {:?} was already resolved", hit.note);
                Judgement::Hit(hit)
            }
            None => Judgement::NoHit(match nearest {
                Some(nearest_offset) => NoHit::OutOfWindow { nearest_offset },
                None => NoHit::NoNote,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::{ColorType, Note};
    use crate::sim::timeline::TimelineConfig;
    use proptest::prelude::*;

    fn note_at(t: f64, x: u8, y: u8) -> Note {
        Note {
            time_seconds: t,
            cell: GridCell { x, y },
            color: ColorType::A,
            direction: 1,
            authoring: (0, 0),
        }
    }

    fn timeline(notes: Vec<Note>) -> Timeline {
        Timeline::with_notes(TimelineConfig::default(), notes)
    }

    #[test]
    fn test_classify_boundaries_inclusive() {
        let w = TimingWindows {
            perfect: 0.0625,
            great: 0.125,
            good: 0.25,
        };
        assert_eq!(w.classify(0.0), Some(Grade::Perfect));
        assert_eq!(w.classify(0.0625), Some(Grade::Perfect));
        assert_eq!(w.classify(0.125), Some(Grade::Great));
        assert_eq!(w.classify(0.25), Some(Grade::Good));
        assert_eq!(w.classify(0.2500001), None);
    }

    #[test]
    fn test_default_windows() {
        let w = TimingWindows::default();
        assert_eq!(w.classify(0.05), Some(Grade::Perfect));
        assert_eq!(w.classify(0.10), Some(Grade::Great));
        assert_eq!(w.classify(0.15), Some(Grade::Good));
        assert_eq!(w.hit_window(), 0.15);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let w = TimingWindows {
            perfect: 0.1,
            great: 0.05,
            good: 0.15,
        };
        assert!(matches!(w.validate(), Err(GameError::Configuration(_))));
        assert!(TimingWindows::default().scaled(0.0).validate().is_err());
    }

    #[test]
    fn test_press_slightly_late_is_perfect() {
        let mut tl = timeline(vec![note_at(2.0, 1, 0)]);
        tl.tick(2.04);
        let judge = Judge::default();
        match judge.judge(&mut tl, GridCell { x: 1, y: 0 }, 2.04) {
            Judgement::Hit(hit) => {
                assert_eq!(hit.grade, Grade::Perfect);
                assert_eq!(hit.note, NoteId(0));
                assert_eq!(hit.timing(), Timing::Late);
            }
            other => panic!("expected hit, got {:?}", other),
        }
        // Consumed
        assert_eq!(
            judge.judge(&mut tl, GridCell { x: 1, y: 0 }, 2.04),
            Judgement::NoHit(NoHit::NoNote)
        );
    }

    #[test]
    fn test_early_press_grades() {
        let mut tl = timeline(vec![note_at(3.0, 0, 1)]);
        tl.tick(2.88);
        match Judge::default().judge(&mut tl, GridCell { x: 0, y: 1 }, 2.88) {
            Judgement::Hit(hit) => {
                assert_eq!(hit.grade, Grade::Good);
                assert_eq!(hit.timing(), Timing::Early);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_cell_is_no_note() {
        let mut tl = timeline(vec![note_at(2.0, 1, 0)]);
        tl.tick(2.0);
        assert_eq!(
            Judge::default().judge(&mut tl, GridCell { x: 2, y: 0 }, 2.0),
            Judgement::NoHit(NoHit::NoNote)
        );
    }

    #[test]
    fn test_too_early_is_out_of_window() {
        let mut tl = timeline(vec![note_at(2.0, 1, 0)]);
        tl.tick(1.0);
        match Judge::default().judge(&mut tl, GridCell { x: 1, y: 0 }, 1.0) {
            Judgement::NoHit(NoHit::OutOfWindow { nearest_offset }) => assert_eq!(nearest_offset, 1.0),
            other => panic!("expected out of window, got {:?}", other),
        }
        // Still hittable later
        assert_eq!(tl.hittable_notes_at(GridCell { x: 1, y: 0 }).count(), 1);
    }

    #[test]
    fn test_earliest_in_window_note_wins() {
        let mut tl = timeline(vec![note_at(2.0, 1, 0), note_at(2.1, 1, 0)]);
        tl.tick(2.05);
        match Judge::default().judge(&mut tl, GridCell { x: 1, y: 0 }, 2.05) {
            Judgement::Hit(hit) => assert_eq!(hit.note, NoteId(0)),
            other => panic!("expected hit, got {:?}", other),
        }
        match Judge::default().judge(&mut tl, GridCell { x: 1, y: 0 }, 2.05) {
            Judgement::Hit(hit) => assert_eq!(hit.note, NoteId(1)),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_each_note_hit_at_most_once(
            times in prop::collection::vec(0.0f64..20.0, 1..40),
            presses in prop::collection::vec(0.0f64..21.0, 1..80),
        ) {
            let mut sorted = times.clone();
            sorted.sort_by(f64::total_cmp);
            let mut tl = timeline(sorted.iter().map(|&t| note_at(t, 2, 3)).collect());
            let judge = Judge::default();
            let mut presses = presses;
            presses.sort_by(f64::total_cmp);

            let mut hits = Vec::new();
            for t in presses {
                tl.tick(t);
                if let Judgement::Hit(hit) = judge.judge(&mut tl, GridCell { x: 2, y: 3 }, t) {
                    hits.push(hit.note);
                }
            }
            let total = hits.len();
            hits.sort();
            hits.dedup();
            prop_assert_eq!(hits.len(), total);
        }
    }
}
