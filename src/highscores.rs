//! Results leaderboard
//!
//! Top 10 finished runs across all maps, persisted to LocalStorage.

use serde::{Deserialize, Serialize};

use crate::sim::{Rank, ScoreStats};

/// Maximum number of results to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// One finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Song title as shown in the map info
    pub song: String,
    /// Difficulty name ("Expert", ...)
    pub difficulty: String,
    pub score: u64,
    pub accuracy: f64,
    pub rank: Rank,
    pub max_combo: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

impl HighScoreEntry {
    pub fn from_stats(song: &str, difficulty: &str, stats: &ScoreStats, timestamp: f64) -> Self {
        Self {
            song: song.to_string(),
            difficulty: difficulty.to_string(),
            score: stats.score,
            accuracy: stats.accuracy,
            rank: stats.rank,
            max_combo: stats.max_combo,
            timestamp,
        }
    }
}

/// Leaderboard, sorted by score descending
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "beat_borner_highscores";

    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Check if a score would make the board
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries.last().is_none_or(|e| score > e.score)
    }

    /// Rank a score would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert a finished run. Returns the rank achieved (1-indexed) or None.
    pub fn add_result(&mut self, entry: HighScoreEntry) -> Option<usize> {
        if !self.qualifies(entry.score) {
            return None;
        }

        let pos = self.entries.iter().position(|e| entry.score > e.score);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };
        self.entries.truncate(MAX_HIGH_SCORES);

        Some(rank)
    }

    /// Best kept run for a song, any difficulty
    pub fn best_for(&self, song: &str) -> Option<&HighScoreEntry> {
        self.entries.iter().find(|e| e.song == song)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    pub fn load() -> Self {
        match crate::platform::load_json::<HighScores>(Self::STORAGE_KEY) {
            Some(scores) => {
                log::info!("Loaded {} high scores", scores.entries.len());
                scores
            }
            None => {
                log::info!("No high scores found, starting fresh");
                Self::new()
            }
        }
    }

    pub fn save(&self) {
        if crate::platform::save_json(Self::STORAGE_KEY, self) {
            log::info!("High scores saved ({} entries)", self.entries.len());
        }
    }
}

/// Relative age of a timestamp ("3 mins ago"), both in Unix ms
pub fn format_age(now: f64, timestamp: f64) -> String {
    let mins = ((now - timestamp) / 60_000.0).max(0.0);
    let hours = mins / 60.0;
    let days = hours / 24.0;

    if days >= 1.0 {
        match days.floor() as u32 {
            1 => "Yesterday".to_string(),
            d => format!("{} days ago", d),
        }
    } else if hours >= 1.0 {
        match hours.floor() as u32 {
            1 => "1 hour ago".to_string(),
            h => format!("{} hours ago", h),
        }
    } else if mins >= 1.0 {
        match mins.floor() as u32 {
            1 => "1 min ago".to_string(),
            m => format!("{} mins ago", m),
        }
    } else {
        "Just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::GradeCounts;

    fn entry(song: &str, score: u64) -> HighScoreEntry {
        HighScoreEntry {
            song: song.to_string(),
            difficulty: "Expert".to_string(),
            score,
            accuracy: 90.0,
            rank: Rank::A,
            max_combo: 10,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_insert_sorted_and_ranked() {
        let mut board = HighScores::new();
        assert_eq!(board.add_result(entry("a", 500)), Some(1));
        assert_eq!(board.add_result(entry("b", 900)), Some(1));
        assert_eq!(board.add_result(entry("c", 700)), Some(2));
        let scores: Vec<_> = board.entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![900, 700, 500]);
        assert_eq!(board.top_score(), Some(900));
    }

    #[test]
    fn test_zero_never_qualifies() {
        let mut board = HighScores::new();
        assert!(!board.qualifies(0));
        assert_eq!(board.add_result(entry("a", 0)), None);
        assert!(board.is_empty());
    }

    #[test]
    fn test_full_board_truncates() {
        let mut board = HighScores::new();
        for i in 1..=MAX_HIGH_SCORES as u64 {
            board.add_result(entry("x", i * 100));
        }
        assert!(!board.qualifies(100));
        assert_eq!(board.potential_rank(50), None);
        assert_eq!(board.potential_rank(150), Some(10));
        assert_eq!(board.add_result(entry("y", 2000)), Some(1));
        assert_eq!(board.entries.len(), MAX_HIGH_SCORES);
        assert_eq!(board.entries.last().map(|e| e.score), Some(200));
    }

    #[test]
    fn test_best_for_song() {
        let mut board = HighScores::new();
        board.add_result(entry("song", 300));
        board.add_result(entry("other", 800));
        board.add_result(entry("song", 600));
        assert_eq!(board.best_for("song").map(|e| e.score), Some(600));
        assert!(board.best_for("missing").is_none());
    }

    #[test]
    fn test_entry_from_stats() {
        let stats = ScoreStats {
            score: 1234,
            combo: 3,
            max_combo: 40,
            accuracy: 97.5,
            rank: Rank::S,
            counts: GradeCounts::default(),
        };
        let e = HighScoreEntry::from_stats("Song", "Hard", &stats, 42.0);
        assert_eq!(e.score, 1234);
        assert_eq!(e.max_combo, 40);
        assert_eq!(e.rank, Rank::S);
        assert_eq!(e.difficulty, "Hard");
    }

    #[test]
    fn test_format_age() {
        let min = 60_000.0;
        assert_eq!(format_age(10.0 * min, 10.0 * min), "Just now");
        assert_eq!(format_age(min, 0.0), "1 min ago");
        assert_eq!(format_age(5.0 * min, 0.0), "5 mins ago");
        assert_eq!(format_age(60.0 * min, 0.0), "1 hour ago");
        assert_eq!(format_age(180.0 * min, 0.0), "3 hours ago");
        assert_eq!(format_age(24.0 * 60.0 * min, 0.0), "Yesterday");
        assert_eq!(format_age(72.0 * 60.0 * min, 0.0), "3 days ago");
    }
}
