//! `info.dat` metadata
//!
//! Song identity, tempo, map-level audio offset, and the list of
//! difficulty files shipped with the map.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

fn default_preview_start() -> f64 {
    12.0
}

fn default_preview_duration() -> f64 {
    10.0
}

fn default_environment() -> String {
    "DefaultEnvironment".to_string()
}

/// One playable difficulty file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBeatmap {
    #[serde(rename = "_difficulty")]
    pub difficulty: String,
    #[serde(rename = "_difficultyRank", default)]
    pub difficulty_rank: u32,
    /// File name of the difficulty JSON inside the map archive
    #[serde(rename = "_beatmapFilename")]
    pub beatmap_filename: String,
    #[serde(rename = "_noteJumpMovementSpeed", default)]
    pub note_jump_movement_speed: f64,
    #[serde(rename = "_noteJumpStartBeatOffset", default)]
    pub note_jump_start_beat_offset: f64,
}

/// Difficulties grouped by characteristic (Standard, OneSaber, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBeatmapSet {
    #[serde(rename = "_beatmapCharacteristicName")]
    pub characteristic: String,
    #[serde(rename = "_difficultyBeatmaps", default)]
    pub difficulties: Vec<DifficultyBeatmap>,
}

/// Parsed `info.dat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    #[serde(rename = "_version", default)]
    pub version: Option<String>,
    #[serde(rename = "_songName", default)]
    pub song_name: String,
    #[serde(rename = "_songSubName", default)]
    pub song_sub_name: String,
    #[serde(rename = "_songAuthorName", default)]
    pub song_author_name: String,
    #[serde(rename = "_levelAuthorName", default)]
    pub level_author_name: String,
    #[serde(rename = "_beatsPerMinute", default)]
    pub bpm: Option<f64>,
    /// Map-level audio offset in milliseconds
    #[serde(rename = "_songTimeOffset", default)]
    pub song_time_offset_ms: f64,
    #[serde(rename = "_previewStartTime", default = "default_preview_start")]
    pub preview_start_time: f64,
    #[serde(rename = "_previewDuration", default = "default_preview_duration")]
    pub preview_duration: f64,
    #[serde(rename = "_songFilename", default)]
    pub song_filename: String,
    #[serde(rename = "_coverImageFilename", default)]
    pub cover_image_filename: String,
    #[serde(rename = "_environmentName", default = "default_environment")]
    pub environment_name: String,
    #[serde(rename = "_difficultyBeatmapSets", default)]
    pub difficulty_sets: Vec<DifficultyBeatmapSet>,
}

impl MapInfo {
    /// Decode `info.dat`, requiring a positive tempo
    pub fn from_json(text: &str) -> Result<Self> {
        let info: MapInfo = serde_json::from_str(text)?;
        info.bpm()?;
        log::info!(
            "Map info: '{}' by {} (mapped by {}), {} BPM, {} difficulty set(s)",
            info.song_name,
            info.song_author_name,
            info.level_author_name,
            info.bpm.unwrap_or_default(),
            info.difficulty_sets.len()
        );
        Ok(info)
    }

    /// Song tempo, rejecting a missing or non-positive value
    pub fn bpm(&self) -> Result<f64> {
        match self.bpm {
            Some(bpm) if bpm.is_finite() && bpm > 0.0 => Ok(bpm),
            Some(bpm) => Err(GameError::InvalidMap(format!("invalid BPM {bpm}"))),
            None => Err(GameError::InvalidMap("missing _beatsPerMinute".to_string())),
        }
    }

    /// Map-level audio offset converted to seconds
    pub fn song_time_offset_seconds(&self) -> f64 {
        self.song_time_offset_ms / 1000.0
    }

    /// First difficulty of the first set; what the game plays by default
    pub fn first_difficulty(&self) -> Result<&DifficultyBeatmap> {
        self.difficulty_sets
            .first()
            .and_then(|set| set.difficulties.first())
            .ok_or_else(|| GameError::InvalidMap("map has no difficulties".to_string()))
    }

    /// Look up a difficulty by characteristic and name (case-insensitive)
    pub fn find_difficulty(&self, characteristic: &str, difficulty: &str) -> Option<&DifficultyBeatmap> {
        self.difficulty_sets
            .iter()
            .filter(|set| set.characteristic.eq_ignore_ascii_case(characteristic))
            .flat_map(|set| set.difficulties.iter())
            .find(|d| d.difficulty.eq_ignore_ascii_case(difficulty))
    }

    /// Display title: "Name - Sub Name" or just the name
    pub fn title(&self) -> String {
        if self.song_sub_name.is_empty() {
            self.song_name.clone()
        } else {
            format!("{} - {}", self.song_name, self.song_sub_name)
        }
    }
}
