//! Per-frame orchestration
//!
//! One `tick` per frame: advance the timeline to the current song time,
//! charge its misses to the ledger, then judge the frame's presses. Misses
//! are always settled before presses so a press can never consume a note
//! that is already too late.

use serde::{Deserialize, Serialize};

use super::judge::{Grade, Judge, Judgement, NoHit, TimingWindows};
use super::note::NoteId;
use super::score::{ScoreLedger, ScoreStats, ScoringConfig};
use super::timeline::{NoteView, Timeline, TimelineConfig};
use crate::beatmap::{GridCell, Note};
use crate::consts::{DESPAWN_TIME, LOOKAHEAD_TIME};
use crate::error::Result;

/// Current phase of a play session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Pre-roll; song time is still negative
    Countdown,
    Playing,
    Paused,
    /// Song over or every note resolved
    Finished,
}

/// Input for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Cells pressed since the last frame, in arrival order
    pub presses: Vec<GridCell>,
    /// Pause toggle
    pub pause: bool,
    /// The song has played to the end
    pub media_ended: bool,
}

/// Things the UI may want to react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    NoteSpawned {
        note: NoteId,
        cell: GridCell,
    },
    NoteHit {
        note: NoteId,
        cell: GridCell,
        grade: Grade,
        offset: f64,
        points: u64,
        multiplier: f64,
        combo: u32,
        score: u64,
    },
    NoteMissed {
        note: NoteId,
        cell: GridCell,
    },
    ComboBroken {
        previous: u32,
    },
    /// A press that consumed nothing
    EmptyPress {
        cell: GridCell,
        reason: NoHit,
    },
    Paused,
    Resumed,
    Finished {
        stats: ScoreStats,
    },
}

/// Tuning for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub lookahead: f64,
    pub despawn_grace: f64,
    pub windows: TimingWindows,
    pub scoring: ScoringConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lookahead: LOOKAHEAD_TIME,
            despawn_grace: DESPAWN_TIME,
            windows: TimingWindows::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Timeline settings; the miss threshold is always the outer timing window
    pub fn timeline(&self) -> TimelineConfig {
        TimelineConfig {
            lookahead: self.lookahead,
            hit_window: self.windows.hit_window(),
            despawn_grace: self.despawn_grace,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.windows.validate()?;
        self.timeline().validate()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    timeline: Timeline,
    judge: Judge,
    ledger: ScoreLedger,
    phase: GamePhase,
    /// Song time of the last tick
    now: f64,
}

impl Session {
    pub fn new(notes: Vec<Note>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            timeline: Timeline::with_notes(config.timeline(), notes),
            judge: Judge::new(config.windows),
            ledger: ScoreLedger::new(config.scoring),
            phase: GamePhase::Countdown,
            now: f64::NEG_INFINITY,
        })
    }

    /// Advance one frame at song time `now`
    pub fn tick(&mut self, input: &TickInput, now: f64) -> Vec<GameEvent> {
        let mut events = Vec::new();

        if input.pause {
            match self.phase {
                GamePhase::Countdown | GamePhase::Playing => {
                    self.phase = GamePhase::Paused;
                    events.push(GameEvent::Paused);
                    return events;
                }
                GamePhase::Paused => {
                    self.phase = if now < 0.0 { GamePhase::Countdown } else { GamePhase::Playing };
                    events.push(GameEvent::Resumed);
                }
                GamePhase::Finished => {}
            }
        }

        if matches!(self.phase, GamePhase::Paused | GamePhase::Finished) {
            return events;
        }

        self.now = now;
        self.phase = if now < 0.0 { GamePhase::Countdown } else { GamePhase::Playing };

        let report = self.timeline.tick(now);
        for id in report.spawned {
            if let Some(cell) = self.cell_of(id) {
                events.push(GameEvent::NoteSpawned { note: id, cell });
            }
        }
        self.charge_misses(&report.missed, &mut events);

        for &cell in &input.presses {
            self.judge_press(cell, now, &mut events);
        }

        if input.media_ended {
            let missed = self.timeline.miss_remaining();
            if !missed.is_empty() {
                log::info!("Song ended with {} notes unplayed", missed.len());
            }
            self.charge_misses(&missed, &mut events);
            self.finish(&mut events);
        } else if self.all_notes_played(now) {
            self.finish(&mut events);
        }

        events
    }

    /// Judge a press immediately against the current frame's state
    pub fn press(&mut self, cell: GridCell, now: f64) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !matches!(self.phase, GamePhase::Paused | GamePhase::Finished) {
            self.judge_press(cell, now, &mut events);
            if self.all_notes_played(now) {
                self.finish(&mut events);
            }
        }
        events
    }

    /// Every note resolved. A map without notes is over once the
    /// countdown ends, so silent play (no media end) still finishes.
    fn all_notes_played(&self, now: f64) -> bool {
        self.timeline.is_complete() && (now >= 0.0 || !self.timeline.is_empty())
    }

    fn judge_press(&mut self, cell: GridCell, now: f64, events: &mut Vec<GameEvent>) {
        match self.judge.judge(&mut self.timeline, cell, now) {
            Judgement::Hit(hit) => {
                let scored = self.ledger.register_hit(hit.grade);
                log::debug!(
                    "{} on {} ({:+.0} ms) +{} x{}",
                    hit.grade.as_str(),
                    cell,
                    hit.offset * 1000.0,
                    scored.points,
                    scored.multiplier
                );
                events.push(GameEvent::NoteHit {
                    note: hit.note,
                    cell,
                    grade: hit.grade,
                    offset: hit.offset,
                    points: scored.points,
                    multiplier: scored.multiplier,
                    combo: scored.combo,
                    score: scored.score,
                });
            }
            Judgement::NoHit(reason) => events.push(GameEvent::EmptyPress { cell, reason }),
        }
    }

    fn charge_misses(&mut self, missed: &[NoteId], events: &mut Vec<GameEvent>) {
        for &id in missed {
            if let Some(cell) = self.cell_of(id) {
                events.push(GameEvent::NoteMissed { note: id, cell });
            }
            if let Some(previous) = self.ledger.register_miss() {
                events.push(GameEvent::ComboBroken { previous });
            }
        }
    }

    fn finish(&mut self, events: &mut Vec<GameEvent>) {
        self.phase = GamePhase::Finished;
        let stats = self.ledger.stats();
        log::info!(
            "Session finished: score {} rank {} accuracy {:.2}% max combo {}",
            stats.score,
            stats.rank.as_str(),
            stats.accuracy,
            stats.max_combo
        );
        events.push(GameEvent::Finished { stats });
    }

    fn cell_of(&self, id: NoteId) -> Option<GridCell> {
        self.timeline.get(id).map(|t| t.note.cell)
    }

    /// Rewind to the start with a clean ledger
    pub fn restart(&mut self) {
        self.timeline.reset();
        self.ledger.reset();
        self.phase = GamePhase::Countdown;
        self.now = f64::NEG_INFINITY;
    }

    /// Presentation records at the last ticked time
    pub fn views(&self) -> Vec<NoteView> {
        self.timeline.views(self.now)
    }

    pub fn stats(&self) -> ScoreStats {
        self.ledger.stats()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }
}
