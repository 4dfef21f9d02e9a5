//! Beat Borner - a browser rhythm game on a 4x4 grid
//!
//! Core modules:
//! - `beatmap`: Map decoding and normalization (schema detection, grid remap, difficulty stats)
//! - `sim`: Deterministic gameplay (note timeline, judgement, score/combo ledger, session)
//! - `clock`: Audio-synchronized song clock with pre-roll countdown
//! - `audio`: Browser music playback (wasm only)
//! - `media`: Song source selection and the no-audio fallback policy
//! - `input`: Key table mapping keys to grid cells
//! - `settings` / `highscores`: Player preferences and results, kept in LocalStorage
//! - `platform`: Browser/native platform abstraction

pub mod beatmap;
pub mod clock;
pub mod error;
pub mod highscores;
pub mod input;
pub mod media;
pub mod platform;
pub mod settings;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod audio;

pub use error::{GameError, Result};
pub use highscores::HighScores;
pub use settings::{AudioFallback, JudgePreset, Settings};

/// Game configuration constants
pub mod consts {
    /// How far ahead of its hit time a note becomes visible (seconds)
    pub const LOOKAHEAD_TIME: f64 = 6.0;
    /// Outer judgement window; a note later than this is missed (seconds)
    pub const HIT_WINDOW: f64 = 0.15;
    /// How long a missed note stays in the presentation after its miss (seconds)
    pub const DESPAWN_TIME: f64 = 0.05;

    /// Timing windows (absolute offset, inclusive)
    pub const PERFECT_WINDOW: f64 = 0.050;
    pub const GREAT_WINDOW: f64 = 0.100;
    pub const GOOD_WINDOW: f64 = HIT_WINDOW;

    /// Base points per grade
    pub const PERFECT_POINTS: u32 = 100;
    pub const GREAT_POINTS: u32 = 70;
    pub const GOOD_POINTS: u32 = 40;
    pub const MISS_POINTS: u32 = 0;

    /// Combo multiplier tiers: (minimum combo, multiplier)
    pub const COMBO_TIERS: [(u32, f64); 5] = [(0, 1.0), (10, 1.2), (20, 1.5), (50, 2.0), (100, 2.5)];

    /// Accuracy weight per grade, in percent
    pub const PERFECT_WEIGHT: f64 = 100.0;
    pub const GREAT_WEIGHT: f64 = 70.0;
    pub const GOOD_WEIGHT: f64 = 40.0;

    /// Countdown before the song starts (seconds)
    pub const AUDIO_START_DELAY: f64 = 3.0;
    /// Default calibration offset (seconds, positive = notes later)
    pub const DEFAULT_AUDIO_OFFSET: f64 = 0.0;
    pub const DEFAULT_VOLUME: f64 = 0.5;
    /// Give up waiting for the song to buffer after this long (seconds)
    pub const MEDIA_LOAD_TIMEOUT: f64 = 30.0;

    /// Play grid dimensions
    pub const GRID_COLUMNS: u8 = 4;
    pub const GRID_ROWS: u8 = 4;
    /// Authoring grid dimensions (lineIndex x lineLayer)
    pub const AUTHORING_COLUMNS: u8 = 4;
    pub const AUTHORING_ROWS: u8 = 3;

    /// Cell centre positions in world units
    pub const CELL_X: [f32; 4] = [-1.5, -0.5, 0.5, 1.5];
    pub const CELL_Y: [f32; 4] = [0.5, 1.5, 2.5, 3.5];
}

/// Convert a beat position to seconds at a constant tempo
#[inline]
pub fn beats_to_seconds(beats: f64, bpm: f64) -> f64 {
    beats * (60.0 / bpm)
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
