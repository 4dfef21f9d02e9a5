//! Deterministic gameplay module
//!
//! All judgement and scoring lives here. This module must be pure and deterministic:
//! - Song time is an input, never read from a clock
//! - Notes are processed in time order, ties in file order
//! - No rendering, audio, or platform dependencies

pub mod judge;
pub mod note;
pub mod score;
pub mod session;
pub mod timeline;

pub use judge::{Grade, HitResult, Judge, Judgement, NoHit, Timing, TimingWindows};
pub use note::{NoteId, NoteState, TrackedNote};
pub use score::{ComboTier, GradeCounts, HitScore, Rank, ScoreLedger, ScoreStats, ScoringConfig};
pub use session::{GameEvent, GamePhase, Session, SessionConfig, TickInput};
pub use timeline::{NoteView, Timeline, TimelineConfig, TimelineTick};
