//! Difficulty file decoding
//!
//! Two on-disk schemas exist. Version 2 files use underscore-prefixed
//! keys (`_notes`, `_time`, `_lineIndex`, ...) and encode bombs as notes of
//! type 3. Version 3 files use terse keys (`colorNotes`, `b`, `x`, `y`, ...)
//! with bombs in their own array. Both decode into the same beat-domain
//! records; conversion to seconds happens in `normalize`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GameError, Result};

/// Note type used by version 2 files for bombs
const V2_BOMB_TYPE: i32 = 3;

/// Which on-disk layout a difficulty file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `_version` 2.x: `_notes` / `_obstacles`
    V2,
    /// `version` 3.x: `colorNotes` / `bombNotes` / `obstacles`
    V3,
}

impl Schema {
    /// A version beginning with "3." is V3; anything else is read as V2
    pub fn detect(version: &str) -> Self {
        if version.starts_with("3.") {
            Schema::V3
        } else {
            Schema::V2
        }
    }
}

/// Colour note in beat time and authoring coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawNote {
    pub beat: f64,
    pub line_index: i32,
    pub line_layer: i32,
    pub color: i32,
    pub direction: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBomb {
    pub beat: f64,
    pub line_index: i32,
    pub line_layer: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawObstacle {
    pub beat: f64,
    pub duration_beats: f64,
    pub line_index: i32,
    pub line_layer: i32,
    pub width: i32,
    pub height: i32,
}

/// A decoded difficulty file, still in beats
#[derive(Debug, Clone, PartialEq)]
pub struct RawBeatmap {
    pub version: String,
    pub schema: Schema,
    pub notes: Vec<RawNote>,
    pub bombs: Vec<RawBomb>,
    pub obstacles: Vec<RawObstacle>,
}

#[derive(Deserialize)]
struct V2Note {
    #[serde(rename = "_time")]
    time: f64,
    #[serde(rename = "_lineIndex")]
    line_index: i32,
    #[serde(rename = "_lineLayer")]
    line_layer: i32,
    #[serde(rename = "_type")]
    kind: i32,
    #[serde(rename = "_cutDirection", default)]
    cut_direction: i32,
}

#[derive(Deserialize)]
struct V2Obstacle {
    #[serde(rename = "_time")]
    time: f64,
    #[serde(rename = "_lineIndex")]
    line_index: i32,
    /// 0 = full height wall, 1 = crouch wall
    #[serde(rename = "_type", default)]
    kind: i32,
    #[serde(rename = "_duration", default)]
    duration: f64,
    #[serde(rename = "_width", default)]
    width: i32,
}

#[derive(Deserialize)]
struct V3ColorNote {
    b: f64,
    x: i32,
    y: i32,
    c: i32,
    #[serde(default)]
    d: i32,
}

#[derive(Deserialize)]
struct V3Bomb {
    b: f64,
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct V3Obstacle {
    b: f64,
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default)]
    d: f64,
    #[serde(default)]
    w: i32,
    #[serde(default)]
    h: i32,
}

/// Decode an optional array. An absent or non-array value reads as empty;
/// malformed records are skipped one by one.
fn lenient_list<T: DeserializeOwned>(doc: &Value, key: &str) -> Vec<T> {
    let items = match doc.get(key) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            log::warn!("Ignoring '{}': expected an array, got {}", key, other);
            return Vec::new();
        }
    };

    let mut decoded = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match T::deserialize(item) {
            Ok(record) => decoded.push(record),
            Err(e) => log::warn!("Skipping malformed '{}' record {}: {}", key, index, e),
        }
    }
    decoded
}

impl RawBeatmap {
    /// Decode a difficulty file from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text)?;
        Self::from_value(&doc)
    }

    /// Decode an already-parsed difficulty document
    pub fn from_value(doc: &Value) -> Result<Self> {
        if !doc.is_object() {
            return Err(GameError::InvalidMap("difficulty file is not a JSON object".to_string()));
        }

        let version = doc
            .get("version")
            .or_else(|| doc.get("_version"))
            .and_then(Value::as_str)
            .ok_or_else(|| GameError::InvalidMap("missing version".to_string()))?
            .to_string();

        let schema = Schema::detect(&version);
        log::debug!("Difficulty version {} decoded as {:?}", version, schema);

        let map = match schema {
            Schema::V2 => Self::decode_v2(doc, version),
            Schema::V3 => Self::decode_v3(doc, version),
        };
        Ok(map)
    }

    fn decode_v2(doc: &Value, version: String) -> Self {
        let mut notes = Vec::new();
        let mut bombs = Vec::new();

        for note in lenient_list::<V2Note>(doc, "_notes") {
            match note.kind {
                0 | 1 => notes.push(RawNote {
                    beat: note.time,
                    line_index: note.line_index,
                    line_layer: note.line_layer,
                    color: note.kind,
                    direction: note.cut_direction,
                }),
                V2_BOMB_TYPE => bombs.push(RawBomb {
                    beat: note.time,
                    line_index: note.line_index,
                    line_layer: note.line_layer,
                }),
                other => log::warn!("Skipping note at beat {} with unknown type {}", note.time, other),
            }
        }

        let obstacles = lenient_list::<V2Obstacle>(doc, "_obstacles")
            .into_iter()
            .map(|o| RawObstacle {
                beat: o.time,
                duration_beats: o.duration,
                line_index: o.line_index,
                line_layer: 0,
                width: o.width,
                height: if o.kind == 0 { 4 } else { 1 },
            })
            .collect();

        Self {
            version,
            schema: Schema::V2,
            notes,
            bombs,
            obstacles,
        }
    }

    fn decode_v3(doc: &Value, version: String) -> Self {
        let notes = lenient_list::<V3ColorNote>(doc, "colorNotes")
            .into_iter()
            .filter_map(|n| {
                if n.c == 0 || n.c == 1 {
                    Some(RawNote {
                        beat: n.b,
                        line_index: n.x,
                        line_layer: n.y,
                        color: n.c,
                        direction: n.d,
                    })
                } else {
                    log::warn!("Skipping note at beat {} with unknown color {}", n.b, n.c);
                    None
                }
            })
            .collect();

        let bombs = lenient_list::<V3Bomb>(doc, "bombNotes")
            .into_iter()
            .map(|b| RawBomb {
                beat: b.b,
                line_index: b.x,
                line_layer: b.y,
            })
            .collect();

        let obstacles = lenient_list::<V3Obstacle>(doc, "obstacles")
            .into_iter()
            .map(|o| RawObstacle {
                beat: o.b,
                duration_beats: o.d,
                line_index: o.x,
                line_layer: o.y,
                width: o.w,
                height: o.h,
            })
            .collect();

        Self {
            version,
            schema: Schema::V3,
            notes,
            bombs,
            obstacles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_detection() {
        assert_eq!(Schema::detect("3.3.0"), Schema::V3);
        assert_eq!(Schema::detect("3.0.0"), Schema::V3);
        assert_eq!(Schema::detect("2.6.0"), Schema::V2);
        assert_eq!(Schema::detect("30.0"), Schema::V2);
    }

    #[test]
    fn test_decode_v2() {
        let map = RawBeatmap::from_json(
            r#"{
                "_version": "2.2.0",
                "_notes": [
                    {"_time": 4, "_lineIndex": 1, "_lineLayer": 0, "_type": 0, "_cutDirection": 1},
                    {"_time": 5, "_lineIndex": 2, "_lineLayer": 2, "_type": 3, "_cutDirection": 0},
                    {"_time": 6, "_lineIndex": 3, "_lineLayer": 1, "_type": 1, "_cutDirection": 8}
                ],
                "_obstacles": [
                    {"_time": 8, "_lineIndex": 0, "_type": 1, "_duration": 2, "_width": 2}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(map.schema, Schema::V2);
        assert_eq!(map.notes.len(), 2);
        assert_eq!(map.bombs.len(), 1);
        assert_eq!(map.notes[1].color, 1);
        assert_eq!(map.notes[1].direction, 8);
        assert_eq!(map.obstacles[0].height, 1);
        assert_eq!(map.obstacles[0].duration_beats, 2.0);
    }

    #[test]
    fn test_decode_v3() {
        let map = RawBeatmap::from_json(
            r#"{
                "version": "3.3.0",
                "colorNotes": [{"b": 2.5, "x": 0, "y": 1, "c": 1, "d": 3, "a": 0}],
                "bombNotes": [{"b": 3, "x": 1, "y": 0}],
                "obstacles": [{"b": 4, "x": 0, "y": 2, "d": 1, "w": 1, "h": 3}]
            }"#,
        )
        .unwrap();

        assert_eq!(map.schema, Schema::V3);
        assert_eq!(
            map.notes,
            vec![RawNote {
                beat: 2.5,
                line_index: 0,
                line_layer: 1,
                color: 1,
                direction: 3
            }]
        );
        assert_eq!(map.bombs.len(), 1);
        assert_eq!(map.obstacles[0].height, 3);
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let err = RawBeatmap::from_json(r#"{"_notes": []}"#).unwrap_err();
        assert!(matches!(err, GameError::InvalidMap(_)));
    }

    #[test]
    fn test_unparseable_is_invalid() {
        assert!(matches!(RawBeatmap::from_json("{oops"), Err(GameError::InvalidMap(_))));
        assert!(matches!(RawBeatmap::from_json("[]"), Err(GameError::InvalidMap(_))));
    }

    #[test]
    fn test_missing_or_malformed_arrays_are_empty() {
        let map = RawBeatmap::from_json(r#"{"version": "3.0.0"}"#).unwrap();
        assert!(map.notes.is_empty());
        assert!(map.bombs.is_empty());

        let map = RawBeatmap::from_json(r#"{"_version": "2.0.0", "_notes": "nope"}"#).unwrap();
        assert!(map.notes.is_empty());
    }

    #[test]
    fn test_bad_record_skipped_not_whole_array() {
        let map = RawBeatmap::from_json(
            r#"{
                "_version": "2.2.0",
                "_notes": [
                    {"_time": 1, "_lineIndex": 0, "_lineLayer": 0, "_type": 0, "_cutDirection": 1},
                    {"_time": 2, "_lineIndex": 1, "_lineLayer": null, "_type": 1, "_cutDirection": 1},
                    {"_time": 3, "_lineIndex": 2, "_lineLayer": 2, "_type": 1, "_cutDirection": 0}
                ]
            }"#,
        )
        .unwrap();
        let beats: Vec<_> = map.notes.iter().map(|n| n.beat).collect();
        assert_eq!(beats, vec![1.0, 3.0]);

        let map = RawBeatmap::from_json(
            r#"{
                "version": "3.0.0",
                "colorNotes": [{"b": 1, "x": 0, "y": 0, "c": 0}, "junk", {"b": 2, "x": 3, "y": 1, "c": 1}],
                "bombNotes": [{"b": 1}, {"b": 4, "x": 1, "y": 0}]
            }"#,
        )
        .unwrap();
        assert_eq!(map.notes.len(), 2);
        assert_eq!(map.bombs.len(), 1);
        assert_eq!(map.bombs[0].beat, 4.0);
    }
}
