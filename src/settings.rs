//! Game settings and preferences
//!
//! Persisted in LocalStorage, separately from the leaderboard.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{GameError, Result};
use crate::input::KeyBindings;
use crate::sim::{ScoringConfig, SessionConfig, TimingWindows};

/// Timing strictness presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JudgePreset {
    /// 100 ms hit window
    Hard,
    /// 150 ms hit window
    #[default]
    Normal,
    /// 200 ms hit window
    Easy,
}

impl JudgePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            JudgePreset::Hard => "Hard",
            JudgePreset::Normal => "Normal",
            JudgePreset::Easy => "Easy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hard" | "strict" => Some(JudgePreset::Hard),
            "normal" => Some(JudgePreset::Normal),
            "easy" | "lenient" => Some(JudgePreset::Easy),
            _ => None,
        }
    }

    /// Timing windows, all scaled together from the normal set
    pub fn windows(&self) -> TimingWindows {
        let normal = TimingWindows::default();
        match self {
            JudgePreset::Hard => normal.scaled(2.0 / 3.0),
            JudgePreset::Normal => normal,
            JudgePreset::Easy => normal.scaled(4.0 / 3.0),
        }
    }
}

/// What to do when the song cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioFallback {
    /// Play silently on the wall clock
    #[default]
    WallClock,
    /// Refuse to start
    Disable,
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Judgement ===
    pub judge_preset: JudgePreset,
    /// Explicit windows; overrides the preset when set
    pub custom_windows: Option<TimingWindows>,

    // === Timing ===
    /// Calibration offset added to the music position (seconds)
    pub audio_offset: f64,
    /// Countdown before the music starts (seconds)
    pub preroll: f64,
    /// How early notes appear (seconds)
    pub lookahead: f64,
    /// How long missed notes linger on screen (seconds)
    pub despawn_grace: f64,

    // === Audio ===
    /// Music volume (0.0 - 1.0)
    pub volume: f64,
    pub muted: bool,
    /// Give up loading the song after this long (seconds)
    pub media_load_timeout: f64,
    pub audio_fallback: AudioFallback,
    /// Pause when the window loses focus
    pub pause_on_blur: bool,

    // === Input ===
    pub key_bindings: KeyBindings,

    // === HUD ===
    /// Draw the 4x4 guide grid
    pub show_grid_guides: bool,
    /// Show EARLY/LATE next to the grade
    pub show_timing_feedback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            judge_preset: JudgePreset::Normal,
            custom_windows: None,

            audio_offset: DEFAULT_AUDIO_OFFSET,
            preroll: AUDIO_START_DELAY,
            lookahead: LOOKAHEAD_TIME,
            despawn_grace: DESPAWN_TIME,

            volume: DEFAULT_VOLUME,
            muted: false,
            media_load_timeout: MEDIA_LOAD_TIMEOUT,
            audio_fallback: AudioFallback::WallClock,
            pause_on_blur: true,

            key_bindings: KeyBindings::default(),

            show_grid_guides: true,
            show_timing_feedback: false,
        }
    }
}

impl Settings {
    /// Create settings from a judge preset
    pub fn from_preset(preset: JudgePreset) -> Self {
        Self {
            judge_preset: preset,
            ..Default::default()
        }
    }

    /// Timing windows in effect
    pub fn windows(&self) -> TimingWindows {
        self.custom_windows.unwrap_or_else(|| self.judge_preset.windows())
    }

    /// Effective music volume (respects mute, clamped)
    pub fn effective_volume(&self) -> f64 {
        if self.muted { 0.0 } else { self.volume.clamp(0.0, 1.0) }
    }

    /// Tuning for a play session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lookahead: self.lookahead,
            despawn_grace: self.despawn_grace,
            windows: self.windows(),
            scoring: ScoringConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.session_config().validate()?;
        self.key_bindings.validate()?;
        if !(self.preroll >= 0.0 && self.preroll.is_finite()) {
            return Err(GameError::Configuration(format!("pre-roll must be >= 0, got {}", self.preroll)));
        }
        if !(self.media_load_timeout > 0.0) {
            return Err(GameError::Configuration(format!(
                "media load timeout must be positive, got {}",
                self.media_load_timeout
            )));
        }
        if !self.audio_offset.is_finite() {
            return Err(GameError::Configuration("audio offset must be finite".to_string()));
        }
        Ok(())
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "beat_borner_settings";

    /// Load settings, falling back to defaults when missing or invalid
    pub fn load() -> Self {
        match crate::platform::load_json::<Settings>(Self::STORAGE_KEY) {
            Some(settings) => match settings.validate() {
                Ok(()) => {
                    log::info!("Loaded settings from LocalStorage");
                    settings
                }
                Err(e) => {
                    log::warn!("Stored settings rejected ({}); using defaults", e);
                    Self::default()
                }
            },
            None => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        if crate::platform::save_json(Self::STORAGE_KEY, self) {
            log::info!("Settings saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.windows(), TimingWindows::default());
        assert_eq!(settings.effective_volume(), 0.5);
        assert_eq!(settings.session_config().timeline().hit_window, HIT_WINDOW);
    }

    #[test]
    fn test_presets() {
        assert_eq!(JudgePreset::from_str("HARD"), Some(JudgePreset::Hard));
        assert_eq!(JudgePreset::from_str("lenient"), Some(JudgePreset::Easy));
        assert_eq!(JudgePreset::from_str("nope"), None);

        let hard = Settings::from_preset(JudgePreset::Hard).windows();
        let easy = Settings::from_preset(JudgePreset::Easy).windows();
        assert!((hard.hit_window() - 0.10).abs() < 1e-9);
        assert!((easy.hit_window() - 0.20).abs() < 1e-9);
        assert!(hard.validate().is_ok());
        assert!(easy.validate().is_ok());
    }

    #[test]
    fn test_custom_windows_override_preset() {
        let windows = TimingWindows {
            perfect: 0.02,
            great: 0.04,
            good: 0.08,
        };
        let settings = Settings {
            custom_windows: Some(windows),
            ..Settings::from_preset(JudgePreset::Easy)
        };
        assert_eq!(settings.windows(), windows);
        assert_eq!(settings.session_config().timeline().hit_window, 0.08);
    }

    #[test]
    fn test_validation_failures() {
        let bad = [
            Settings {
                lookahead: 0.0,
                ..Default::default()
            },
            Settings {
                preroll: -1.0,
                ..Default::default()
            },
            Settings {
                media_load_timeout: 0.0,
                ..Default::default()
            },
            Settings {
                audio_offset: f64::NAN,
                ..Default::default()
            },
            Settings {
                custom_windows: Some(TimingWindows {
                    perfect: 0.2,
                    great: 0.1,
                    good: 0.15,
                }),
                ..Default::default()
            },
        ];
        for settings in bad {
            assert!(matches!(settings.validate(), Err(GameError::Configuration(_))));
        }
    }

    #[test]
    fn test_muted_volume() {
        let settings = Settings {
            muted: true,
            ..Default::default()
        };
        assert_eq!(settings.effective_volume(), 0.0);
        let loud = Settings {
            volume: 3.0,
            ..Default::default()
        };
        assert_eq!(loud.effective_volume(), 1.0);
    }

    #[test]
    fn test_serde_round_trip_with_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"audio_offset": 0.12, "judge_preset": "Hard"}"#).unwrap();
        assert_eq!(settings.audio_offset, 0.12);
        assert_eq!(settings.judge_preset, JudgePreset::Hard);
        assert_eq!(settings.key_bindings, KeyBindings::default());
    }

    #[test]
    fn test_native_load_is_default() {
        assert_eq!(Settings::load(), Settings::default());
    }
}
