//! Audio-synchronized song clock
//!
//! Song time is the music's playback position plus a calibration offset.
//! Before the music starts there is a pre-roll countdown during which song
//! time runs from `-duration` up to zero on the wall clock, so notes can
//! approach before the first beat. The music only starts once the media
//! reports it can play through without stalling.
//!
//! Without media (load failed, fallback policy allows it) the clock keeps
//! running on wall time alone, continuous with the countdown.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{GameError, Result};

/// Monotonic time source in seconds
pub trait WallClock {
    fn now(&self) -> f64;
}

impl<T: WallClock + ?Sized> WallClock for Rc<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Externally advanced wall clock for headless runs and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Playable music source (an `<audio>` element in the browser)
pub trait MediaElement {
    /// Playback position in seconds
    fn position(&self) -> f64;
    /// Enough data is buffered to play to the end without stalling
    fn can_play_through(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn has_ended(&self) -> bool;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_volume(&mut self, volume: f64);
    /// A failure reported after the fact (a playback request the browser
    /// rejected asynchronously). Returned once.
    fn take_error(&mut self) -> Option<GameError> {
        None
    }
}

/// Media type for clocks that never have music
#[derive(Debug, Clone, Copy)]
pub enum NoMedia {}

impl MediaElement for NoMedia {
    fn position(&self) -> f64 {
        match *self {}
    }
    fn can_play_through(&self) -> bool {
        match *self {}
    }
    fn is_paused(&self) -> bool {
        match *self {}
    }
    fn has_ended(&self) -> bool {
        match *self {}
    }
    fn play(&mut self) -> Result<()> {
        match *self {}
    }
    fn pause(&mut self) {
        match *self {}
    }
    fn seek(&mut self, _position: f64) {
        match *self {}
    }
    fn set_volume(&mut self, _volume: f64) {
        match *self {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resume {
    Preroll { duration: f64 },
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Preroll { started_at: f64, duration: f64 },
    /// Countdown over, media not yet buffered
    AwaitingBuffer,
    /// `origin` is the wall time at song position zero (read only when silent)
    Running { origin: f64 },
    Paused { frozen: f64, resume: Resume },
}

pub struct AudioClock<M, W> {
    media: Option<M>,
    wall: W,
    offset: f64,
    phase: Phase,
    /// Highest time handed out since the last explicit seek/offset change
    high_water: Cell<f64>,
}

impl<M: MediaElement, W: WallClock> AudioClock<M, W> {
    pub fn new(media: Option<M>, wall: W) -> Self {
        Self {
            media,
            wall,
            offset: 0.0,
            phase: Phase::Idle,
            high_water: Cell::new(f64::NEG_INFINITY),
        }
    }

    /// Clock driven by `media`
    pub fn with_media(media: M, wall: W) -> Self {
        Self::new(Some(media), wall)
    }

    /// Silent clock driven by wall time only
    pub fn silent(wall: W) -> Self {
        Self::new(None, wall)
    }

    pub fn is_silent(&self) -> bool {
        self.media.is_none()
    }

    pub fn media(&self) -> Option<&M> {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> Option<&mut M> {
        self.media.as_mut()
    }

    /// Drop the media and continue on wall time from the current position
    pub fn detach_media(&mut self) -> Option<M> {
        let position = self.raw_time();
        let mut media = self.media.take()?;
        media.pause();
        if let Phase::Running { .. } = self.phase {
            self.phase = Phase::Running {
                origin: self.wall.now() - position,
            };
        }
        log::warn!("Music detached at {:.3}s; continuing silently on wall clock", position);
        Some(media)
    }

    /// Begin the countdown. Song time reads `-duration` now and reaches zero
    /// when the countdown ends.
    pub fn start_preroll(&mut self, duration: f64) {
        let duration = duration.max(0.0);
        if let Some(media) = self.media.as_mut() {
            media.pause();
            media.seek(0.0);
        }
        self.phase = Phase::Preroll {
            started_at: self.wall.now(),
            duration,
        };
        self.high_water.set(f64::NEG_INFINITY);
        log::info!("Pre-roll started ({:.1}s)", duration);
    }

    /// Per-frame housekeeping: leave the countdown and start the music once
    /// it is buffered. Surfaces media failures reported since the last call;
    /// the caller decides whether to `detach_media` or stop.
    pub fn update(&mut self) -> Result<()> {
        if let Some(err) = self.media.as_mut().and_then(|m| m.take_error()) {
            return Err(err);
        }
        match self.phase {
            Phase::Preroll { started_at, duration } if self.wall.now() - started_at >= duration => {
                self.begin_playback(started_at + duration)
            }
            Phase::AwaitingBuffer => self.begin_playback(self.wall.now()),
            _ => Ok(()),
        }
    }

    fn begin_playback(&mut self, origin: f64) -> Result<()> {
        match self.media.as_mut() {
            None => {
                if !matches!(self.phase, Phase::Running { .. }) {
                    log::warn!("No music loaded; song clock running on wall time");
                }
                self.phase = Phase::Running { origin };
            }
            Some(media) if media.can_play_through() => {
                media.play()?;
                self.phase = Phase::Running { origin };
                log::info!("Music playback started (offset {:+.3}s)", self.offset);
            }
            Some(_) => {
                if self.phase != Phase::AwaitingBuffer {
                    log::info!("Countdown finished; waiting for music to buffer");
                }
                self.phase = Phase::AwaitingBuffer;
            }
        }
        Ok(())
    }

    /// Music position without the calibration offset
    pub fn raw_time(&self) -> f64 {
        if let Some(media) = &self.media {
            return media.position();
        }
        match self.phase {
            Phase::Running { origin } => (self.wall.now() - origin).max(0.0),
            Phase::Paused {
                frozen,
                resume: Resume::Running,
            } => (frozen - self.offset).max(0.0),
            _ => 0.0,
        }
    }

    fn reading(&self) -> f64 {
        match self.phase {
            Phase::Idle | Phase::AwaitingBuffer => 0.0,
            Phase::Preroll { started_at, duration } => {
                let elapsed = self.wall.now() - started_at;
                (elapsed - duration).min(0.0)
            }
            Phase::Running { .. } => self.raw_time() + self.offset,
            Phase::Paused { frozen, .. } => frozen,
        }
    }

    /// Authoritative song time in seconds. Negative during the countdown;
    /// never moves backwards between explicit seeks.
    pub fn current_time(&self) -> f64 {
        let time = self.reading().max(self.high_water.get());
        self.high_water.set(time);
        time
    }

    /// The music is actually advancing (or the silent clock is running)
    pub fn is_playing(&self) -> bool {
        match self.phase {
            Phase::Running { .. } => self.media.as_ref().is_none_or(|m| !m.is_paused()),
            _ => false,
        }
    }

    pub fn is_counting_down(&self) -> bool {
        matches!(self.phase, Phase::Preroll { .. } | Phase::AwaitingBuffer)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused { .. })
    }

    pub fn has_ended(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.has_ended())
    }

    pub fn pause(&mut self) {
        let frozen = self.current_time();
        let resume = match self.phase {
            Phase::Preroll { duration, .. } => Resume::Preroll { duration },
            // Resume as a zero-length countdown so the buffer gate is re-checked
            Phase::AwaitingBuffer => Resume::Preroll { duration: 0.0 },
            Phase::Running { .. } => {
                if let Some(media) = self.media.as_mut() {
                    media.pause();
                }
                Resume::Running
            }
            Phase::Idle | Phase::Paused { .. } => return,
        };
        self.phase = Phase::Paused { frozen, resume };
        log::info!("Song clock paused at {:.3}s", frozen);
    }

    pub fn resume(&mut self) -> Result<()> {
        let Phase::Paused { frozen, resume } = self.phase else {
            return Ok(());
        };
        let now = self.wall.now();
        match resume {
            Resume::Preroll { duration } => {
                self.phase = Phase::Preroll {
                    started_at: now - (duration + frozen),
                    duration,
                };
            }
            Resume::Running => {
                if let Some(media) = self.media.as_mut() {
                    media.play()?;
                }
                self.phase = Phase::Running {
                    origin: now - (frozen - self.offset),
                };
            }
        }
        log::info!("Song clock resumed at {:.3}s", frozen);
        Ok(())
    }

    /// Calibration offset in seconds (positive delays the notes)
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        let delta = offset - self.offset;
        self.offset = offset;
        if let Phase::Paused {
            frozen,
            resume: Resume::Running,
        } = self.phase
        {
            self.phase = Phase::Paused {
                frozen: frozen + delta,
                resume: Resume::Running,
            };
        }
        self.high_water.set(f64::NEG_INFINITY);
        log::info!("Audio offset set to {:+.3}s", offset);
    }

    /// Jump the music to `position` (seconds, without offset)
    pub fn seek(&mut self, position: f64) {
        if let Some(media) = self.media.as_mut() {
            media.seek(position);
        }
        match self.phase {
            Phase::Running { .. } => {
                self.phase = Phase::Running {
                    origin: self.wall.now() - position,
                };
            }
            Phase::Paused {
                resume: Resume::Running,
                ..
            } => {
                self.phase = Phase::Paused {
                    frozen: position + self.offset,
                    resume: Resume::Running,
                };
            }
            _ => {}
        }
        self.high_water.set(f64::NEG_INFINITY);
    }

    /// Stop the music and return to idle at position zero
    pub fn stop(&mut self) {
        if let Some(media) = self.media.as_mut() {
            media.pause();
            media.seek(0.0);
        }
        self.phase = Phase::Idle;
        self.high_water.set(f64::NEG_INFINITY);
    }
}
