//! Beatmap decoding and normalization
//!
//! Turns a raw difficulty file (either schema) plus the song tempo into a
//! time-sorted list of notes on the 4x4 play grid. Pure: no clock, no
//! rendering, no network.

pub mod grid;
pub mod info;
pub mod normalize;
pub mod raw;
pub mod stats;

pub use grid::{ACTIVE_CELLS, GridCell, remap};
pub use info::{DifficultyBeatmap, DifficultyBeatmapSet, MapInfo};
pub use normalize::{Bomb, ColorType, NormalizedMap, Note, Obstacle, normalize, normalize_json};
pub use raw::{RawBeatmap, RawBomb, RawNote, RawObstacle, Schema};
pub use stats::DifficultyStats;
