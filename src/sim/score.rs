//! Score and combo ledger

use serde::{Deserialize, Serialize};

use super::judge::Grade;
use crate::consts::*;
use crate::round_to;

/// Multiplier applied once the combo reaches `min_combo`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboTier {
    pub min_combo: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub perfect_points: u32,
    pub great_points: u32,
    pub good_points: u32,
    pub miss_points: u32,
    /// Ascending by `min_combo`
    pub combo_tiers: Vec<ComboTier>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_points: PERFECT_POINTS,
            great_points: GREAT_POINTS,
            good_points: GOOD_POINTS,
            miss_points: MISS_POINTS,
            combo_tiers: COMBO_TIERS
                .iter()
                .map(|&(min_combo, multiplier)| ComboTier { min_combo, multiplier })
                .collect(),
        }
    }
}

impl ScoringConfig {
    pub fn base_points(&self, grade: Grade) -> u32 {
        match grade {
            Grade::Perfect => self.perfect_points,
            Grade::Great => self.great_points,
            Grade::Good => self.good_points,
        }
    }

    /// Multiplier of the highest tier reached by `combo`
    pub fn multiplier_for(&self, combo: u32) -> f64 {
        self.combo_tiers
            .iter()
            .rev()
            .find(|tier| combo >= tier.min_combo)
            .map(|tier| tier.multiplier)
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradeCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl GradeCounts {
    pub fn total(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }
}

/// Letter rank derived from accuracy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::F => "F",
        }
    }
}

/// Outcome of scoring one hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitScore {
    pub points: u64,
    pub multiplier: f64,
    pub combo: u32,
    pub score: u64,
}

/// Snapshot for the HUD and results screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    /// Weighted accuracy percentage, two decimals
    pub accuracy: f64,
    pub rank: Rank,
    pub counts: GradeCounts,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    config: ScoringConfig,
    score: u64,
    combo: u32,
    max_combo: u32,
    counts: GradeCounts,
}

impl ScoreLedger {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Count a hit, extend the combo, and add multiplied points
    pub fn register_hit(&mut self, grade: Grade) -> HitScore {
        match grade {
            Grade::Perfect => self.counts.perfect += 1,
            Grade::Great => self.counts.great += 1,
            Grade::Good => self.counts.good += 1,
        }

        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);

        let multiplier = self.config.multiplier_for(self.combo);
        let points = (self.config.base_points(grade) as f64 * multiplier).floor() as u64;
        self.score += points;

        HitScore {
            points,
            multiplier,
            combo: self.combo,
            score: self.score,
        }
    }

    /// Count a miss and reset the combo. Returns the broken combo if there
    /// was one to break.
    pub fn register_miss(&mut self) -> Option<u32> {
        self.counts.miss += 1;
        self.score += self.config.miss_points as u64;

        let previous = std::mem::take(&mut self.combo);
        if previous > 0 {
            log::debug!("Combo broken at {}", previous);
            Some(previous)
        } else {
            None
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn counts(&self) -> GradeCounts {
        self.counts
    }

    /// Multiplier the current combo earns
    pub fn combo_multiplier(&self) -> f64 {
        self.config.multiplier_for(self.combo)
    }

    /// Weighted accuracy in percent; 100 before anything is judged
    pub fn accuracy(&self) -> f64 {
        let total = self.counts.total();
        if total == 0 {
            return 100.0;
        }
        let weighted = self.counts.perfect as f64 * PERFECT_WEIGHT
            + self.counts.great as f64 * GREAT_WEIGHT
            + self.counts.good as f64 * GOOD_WEIGHT;
        round_to(weighted / total as f64, 2)
    }

    pub fn rank(&self) -> Rank {
        let accuracy = self.accuracy();
        if accuracy >= 95.0 && self.counts.miss == 0 {
            Rank::S
        } else if accuracy >= 90.0 {
            Rank::A
        } else if accuracy >= 80.0 {
            Rank::B
        } else if accuracy >= 70.0 {
            Rank::C
        } else if accuracy >= 60.0 {
            Rank::D
        } else {
            Rank::F
        }
    }

    pub fn stats(&self) -> ScoreStats {
        ScoreStats {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            accuracy: self.accuracy(),
            rank: self.rank(),
            counts: self.counts,
        }
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.combo = 0;
        self.max_combo = 0;
        self.counts = GradeCounts::default();
    }
}
