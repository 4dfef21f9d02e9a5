//! Note timeline
//!
//! Owns the sorted notes and their lifecycle. Two cursors bound the live
//! window: `next_index` is the first note not yet spawned and only ever
//! moves forward; `window_start` trails it past notes that no longer need
//! per-frame work. Each tick touches only the notes between the two.

use serde::{Deserialize, Serialize};

use super::note::{NoteId, NoteState, TrackedNote};
use crate::beatmap::{ColorType, GridCell, Note};
use crate::consts::{DESPAWN_TIME, HIT_WINDOW, LOOKAHEAD_TIME};
use crate::error::{GameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Spawn notes this many seconds before their hit time
    pub lookahead: f64,
    /// Unhit notes this many seconds late are missed
    pub hit_window: f64,
    /// Missed notes stay in the presentation this much longer
    pub despawn_grace: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            lookahead: LOOKAHEAD_TIME,
            hit_window: HIT_WINDOW,
            despawn_grace: DESPAWN_TIME,
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.lookahead > 0.0 && self.lookahead.is_finite()) {
            return Err(GameError::Configuration(format!("lookahead must be positive, got {}", self.lookahead)));
        }
        if !(self.hit_window > 0.0 && self.hit_window < self.lookahead) {
            return Err(GameError::Configuration(format!(
                "hit window must be positive and shorter than lookahead, got {}",
                self.hit_window
            )));
        }
        if !(self.despawn_grace >= 0.0) {
            return Err(GameError::Configuration(format!(
                "despawn grace must not be negative, got {}",
                self.despawn_grace
            )));
        }
        Ok(())
    }
}

/// Lifecycle changes produced by one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineTick {
    pub spawned: Vec<NoteId>,
    pub missed: Vec<NoteId>,
}

/// Presentation record for one live note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteView {
    pub id: NoteId,
    pub cell: GridCell,
    pub color: ColorType,
    pub direction: i32,
    /// Seconds until the note reaches the hit line (negative once passed)
    pub time_until_hit: f64,
    pub visible: bool,
    pub state: NoteState,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    config: TimelineConfig,
    notes: Vec<TrackedNote>,
    next_index: usize,
    window_start: usize,
    resolved: usize,
}

impl Timeline {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_notes(config: TimelineConfig, notes: Vec<Note>) -> Self {
        let mut timeline = Self::new(config);
        timeline.set_notes(notes);
        timeline
    }

    /// Replace the note list and rewind both cursors
    pub fn set_notes(&mut self, mut notes: Vec<Note>) {
        if !notes.is_sorted_by(|a, b| a.time_seconds <= b.time_seconds) {
            log::warn!("Timeline received unsorted notes; sorting");
            notes.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        }
        self.notes = notes.into_iter().map(TrackedNote::new).collect();
        self.next_index = 0;
        self.window_start = 0;
        self.resolved = 0;
        log::debug!("Timeline loaded {} notes", self.notes.len());
    }

    /// Put every note back to unspawned/unhit (restart or explicit seek to 0)
    pub fn reset(&mut self) {
        for tracked in &mut self.notes {
            tracked.state = NoteState::Unhit;
            tracked.spawned = false;
        }
        self.next_index = 0;
        self.window_start = 0;
        self.resolved = 0;
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Advance to song time `now`: spawn notes entering the lookahead and
    /// miss notes that fell out of the hit window.
    pub fn tick(&mut self, now: f64) -> TimelineTick {
        let mut report = TimelineTick::default();

        while let Some(tracked) = self.notes.get_mut(self.next_index) {
            if tracked.note.time_seconds - now > self.config.lookahead {
                break;
            }
            tracked.spawned = true;
            report.spawned.push(NoteId(self.next_index));
            self.next_index += 1;
        }

        for index in self.window_start..self.next_index {
            let tracked = &mut self.notes[index];
            // Sorted: nothing after this is late yet
            if now - tracked.note.time_seconds <= self.config.hit_window {
                break;
            }
            if tracked.resolve(NoteState::Missed) {
                self.resolved += 1;
                report.missed.push(NoteId(index));
            }
        }

        let expiry = self.config.hit_window + self.config.despawn_grace;
        while let Some(tracked) = self.notes.get(self.window_start) {
            let done = match tracked.state {
                NoteState::Unhit => false,
                NoteState::Hit { .. } => true,
                NoteState::Missed => now - tracked.note.time_seconds > expiry,
            };
            if !done || self.window_start >= self.next_index {
                break;
            }
            self.window_start += 1;
        }

        report
    }

    /// Live, unconsumed notes on `cell`, earliest first
    pub fn hittable_notes_at(&self, cell: GridCell) -> impl Iterator<Item = (NoteId, &TrackedNote)> + '_ {
        self.live()
            .filter(move |(_, tracked)| tracked.note.cell == cell && tracked.is_hittable())
    }

    /// Resolve a note. Returns false if it was unspawned or already resolved.
    pub fn mark(&mut self, id: NoteId, state: NoteState) -> bool {
        let Some(tracked) = self.notes.get_mut(id.0) else {
            return false;
        };
        if !tracked.spawned {
            return false;
        }
        let changed = tracked.resolve(state);
        if changed {
            self.resolved += 1;
        }
        changed
    }

    /// Miss every note still unresolved, spawned or not. Used when the song
    /// ends before the map does.
    pub fn miss_remaining(&mut self) -> Vec<NoteId> {
        let mut missed = Vec::new();
        for (index, tracked) in self.notes.iter_mut().enumerate().skip(self.window_start) {
            tracked.spawned = true;
            if tracked.resolve(NoteState::Missed) {
                missed.push(NoteId(index));
            }
        }
        self.resolved += missed.len();
        self.next_index = self.notes.len();
        missed
    }

    /// Presentation records for every live note at song time `now`
    pub fn views(&self, now: f64) -> Vec<NoteView> {
        self.live()
            .map(|(id, tracked)| NoteView {
                id,
                cell: tracked.note.cell,
                color: tracked.note.color,
                direction: tracked.note.direction,
                time_until_hit: tracked.note.time_seconds - now,
                visible: !matches!(tracked.state, NoteState::Hit { .. }),
                state: tracked.state,
            })
            .collect()
    }

    fn live(&self) -> impl Iterator<Item = (NoteId, &TrackedNote)> + '_ {
        self.notes[self.window_start..self.next_index]
            .iter()
            .enumerate()
            .map(|(offset, tracked)| (NoteId(self.window_start + offset), tracked))
    }

    pub fn get(&self, id: NoteId) -> Option<&TrackedNote> {
        self.notes.get(id.0)
    }

    pub fn notes(&self) -> &[TrackedNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn window_start(&self) -> usize {
        self.window_start
    }

    /// Every note has been hit or missed
    pub fn is_complete(&self) -> bool {
        self.resolved == self.notes.len()
    }

    /// Hit time of the final note, if any
    pub fn last_note_time(&self) -> Option<f64> {
        self.notes.last().map(|t| t.note.time_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::judge::Grade;
    use proptest::prelude::*;

    fn note_at(t: f64, x: u8, y: u8) -> Note {
        Note {
            time_seconds: t,
            cell: GridCell { x, y },
            color: ColorType::B,
            direction: 0,
            authoring: (0, 0),
        }
    }

    fn timeline(times: &[f64]) -> Timeline {
        Timeline::with_notes(
            TimelineConfig::default(),
            times.iter().map(|&t| note_at(t, 1, 0)).collect(),
        )
    }

    #[test]
    fn test_spawn_within_lookahead() {
        let mut tl = timeline(&[5.0, 7.0, 20.0]);
        let report = tl.tick(0.0);
        assert_eq!(report.spawned, vec![NoteId(0)]);
        assert!(report.missed.is_empty());
        assert_eq!(tl.next_index(), 1);

        let report = tl.tick(1.0);
        assert_eq!(report.spawned, vec![NoteId(1)]);
        assert_eq!(tl.next_index(), 2);
    }

    #[test]
    fn test_spawn_during_preroll() {
        let mut tl = timeline(&[1.0]);
        assert_eq!(tl.tick(-3.0).spawned, vec![NoteId(0)]);
    }

    #[test]
    fn test_late_note_missed_exactly_once() {
        let mut tl = timeline(&[5.0]);
        tl.tick(4.0);
        assert!(tl.tick(5.0 + HIT_WINDOW - 0.001).missed.is_empty());

        let report = tl.tick(5.0 + HIT_WINDOW + 0.001);
        assert_eq!(report.missed, vec![NoteId(0)]);
        assert_eq!(tl.get(NoteId(0)).unwrap().state, NoteState::Missed);

        for i in 0..10 {
            assert!(tl.tick(5.2 + i as f64).missed.is_empty());
        }
        assert!(tl.is_complete());
    }

    #[test]
    fn test_frame_gap_spawns_and_misses_same_tick() {
        let mut tl = timeline(&[1.0, 2.0, 30.0]);
        let report = tl.tick(10.0);
        assert_eq!(report.spawned, vec![NoteId(0), NoteId(1)]);
        assert_eq!(report.missed, vec![NoteId(0), NoteId(1)]);
    }

    #[test]
    fn test_hit_note_not_missed() {
        let mut tl = timeline(&[2.0]);
        tl.tick(2.0);
        assert!(tl.mark(NoteId(0), NoteState::Hit { grade: Grade::Perfect, offset: 0.0 }));
        assert!(tl.tick(3.0).missed.is_empty());
        assert!(!tl.mark(NoteId(0), NoteState::Missed));
        assert!(tl.is_complete());
    }

    #[test]
    fn test_cannot_mark_unspawned() {
        let mut tl = timeline(&[50.0]);
        tl.tick(0.0);
        assert!(!tl.mark(NoteId(0), NoteState::Missed));
        assert!(!tl.mark(NoteId(9), NoteState::Missed));
    }

    #[test]
    fn test_hittable_notes_filtered_by_cell_and_state() {
        let mut tl = Timeline::with_notes(
            TimelineConfig::default(),
            vec![note_at(1.0, 1, 0), note_at(1.5, 2, 0), note_at(2.0, 1, 0)],
        );
        tl.tick(1.0);
        let ids: Vec<_> = tl.hittable_notes_at(GridCell { x: 1, y: 0 }).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![NoteId(0), NoteId(2)]);

        tl.mark(NoteId(0), NoteState::Hit { grade: Grade::Good, offset: 0.1 });
        let ids: Vec<_> = tl.hittable_notes_at(GridCell { x: 1, y: 0 }).map(|(id, _)| id).collect();
        assert_eq!(ids, vec![NoteId(2)]);
    }

    #[test]
    fn test_window_start_trails_resolved_notes() {
        let mut tl = timeline(&[1.0, 2.0, 3.0]);
        tl.tick(1.0);
        tl.mark(NoteId(0), NoteState::Hit { grade: Grade::Perfect, offset: 0.0 });
        tl.tick(1.01);
        assert_eq!(tl.window_start(), 1);

        // Missed note lingers for the despawn grace
        tl.tick(2.0 + HIT_WINDOW + 0.01);
        assert_eq!(tl.window_start(), 1);
        let views = tl.views(2.0 + HIT_WINDOW + 0.01);
        assert_eq!(views[0].state, NoteState::Missed);
        assert!(views[0].visible);

        tl.tick(2.0 + HIT_WINDOW + DESPAWN_TIME + 0.01);
        assert_eq!(tl.window_start(), 2);
    }

    #[test]
    fn test_views_report_time_until_hit() {
        let mut tl = timeline(&[4.0]);
        tl.tick(1.0);
        let views = tl.views(1.0);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].time_until_hit, 3.0);
        assert!(views[0].visible);
    }

    #[test]
    fn test_miss_remaining() {
        let mut tl = timeline(&[1.0, 2.0, 100.0]);
        tl.tick(1.0);
        tl.mark(NoteId(0), NoteState::Hit { grade: Grade::Great, offset: 0.08 });
        assert_eq!(tl.miss_remaining(), vec![NoteId(1), NoteId(2)]);
        assert!(tl.is_complete());
        assert_eq!(tl.next_index(), 3);
    }

    #[test]
    fn test_reset() {
        let mut tl = timeline(&[1.0]);
        tl.tick(5.0);
        assert!(tl.is_complete());
        tl.reset();
        assert_eq!(tl.next_index(), 0);
        assert!(!tl.is_complete());
        assert_eq!(tl.get(NoteId(0)).unwrap().state, NoteState::Unhit);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let tl = timeline(&[3.0, 1.0, 2.0]);
        let times: Vec<_> = tl.notes().iter().map(|t| t.note.time_seconds).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_config_validation() {
        assert!(TimelineConfig::default().validate().is_ok());
        let bad = TimelineConfig {
            lookahead: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_cursor_never_retreats(
            times in prop::collection::vec(0.0f64..60.0, 0..100),
            steps in prop::collection::vec(-1.0f64..2.0, 1..200),
        ) {
            let mut sorted = times;
            sorted.sort_by(f64::total_cmp);
            let mut tl = timeline(&sorted);
            let mut now = -3.0;
            let mut last_next = 0;
            let mut last_start = 0;
            for step in steps {
                now += step;
                tl.tick(now);
                prop_assert!(tl.next_index() >= last_next);
                prop_assert!(tl.window_start() >= last_start);
                prop_assert!(tl.window_start() <= tl.next_index());
                last_next = tl.next_index();
                last_start = tl.window_start();
            }
        }

        #[test]
        fn prop_every_note_resolves_once(times in prop::collection::vec(0.0f64..30.0, 0..60)) {
            let mut sorted = times;
            sorted.sort_by(f64::total_cmp);
            let mut tl = timeline(&sorted);
            let mut missed = 0;
            let mut now = -3.0;
            while now < 40.0 {
                missed += tl.tick(now).missed.len();
                now += 1.0 / 60.0;
            }
            prop_assert_eq!(missed, sorted.len());
            prop_assert!(tl.is_complete());
        }
    }
}
