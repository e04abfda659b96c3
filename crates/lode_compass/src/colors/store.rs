//! Where the lodestone colors are kept between runs.
//!
//! The file is a json object with a single `lodestones` map. Keys are `<dimension>|<x>|<y>|<z>` and values are
//! the color as an integer.
//! ```json
//! { "lodestones": { "minecraft:overworld|10|64|10": 16729156 } }
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use cap_std::fs_utf8::Dir;
use glam::IVec3;
use lodelink::{Dimension, LandmarkPos, Rgb};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_COLORS_FILE_NAME: &str = "lodestone_colors.json";

#[derive(Diagnostic, Debug, Error)]
pub enum ColorStoreError {
    #[error("failed to read or write the color file")]
    #[diagnostic(code(color_store::io))]
    Io(#[from] std::io::Error),
    #[error("color file is not valid json")]
    #[diagnostic(code(color_store::json))]
    Json(#[from] serde_json::Error),
}

#[derive(Diagnostic, Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreKeyError {
    #[error("expected 4 `|` separated parts, found {0}")]
    #[diagnostic(code(color_store::key_parts))]
    PartCount(usize),
    #[error("dimension is empty")]
    #[diagnostic(code(color_store::key_dimension))]
    EmptyDimension,
    #[error("invalid coordinate: {0:?}")]
    #[diagnostic(code(color_store::key_coordinate))]
    Coordinate(String),
}

pub fn store_key(pos: &LandmarkPos) -> String {
    format!(
        "{}|{}|{}|{}",
        pos.dimension, pos.pos.x, pos.pos.y, pos.pos.z
    )
}

pub fn parse_store_key(key: &str) -> Result<LandmarkPos, StoreKeyError> {
    let parts: Vec<&str> = key.split('|').collect();
    let [dimension, x, y, z] = parts.as_slice() else {
        return Err(StoreKeyError::PartCount(parts.len()));
    };
    if dimension.is_empty() {
        return Err(StoreKeyError::EmptyDimension);
    }
    let coordinate = |s: &str| {
        s.parse::<i32>()
            .map_err(|_| StoreKeyError::Coordinate(s.to_string()))
    };
    Ok(LandmarkPos::new(
        Dimension::new(dimension),
        IVec3::new(coordinate(x)?, coordinate(y)?, coordinate(z)?),
    ))
}

/// The on-disk document. Values are kept as raw json so one bad entry doesn't fail the whole file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorFile {
    #[serde(default)]
    pub lodestones: BTreeMap<String, Value>,
}

impl ColorFile {
    pub fn from_colors(colors: &HashMap<LandmarkPos, Rgb>) -> Self {
        Self {
            lodestones: colors
                .iter()
                .map(|(pos, color)| (store_key(pos), Value::from(color.value())))
                .collect(),
        }
    }
    /// malformed entries are logged and skipped
    pub fn into_colors(self) -> HashMap<LandmarkPos, Rgb> {
        let mut colors = HashMap::with_capacity(self.lodestones.len());
        for (key, value) in self.lodestones {
            let pos = match parse_store_key(&key) {
                Ok(pos) => pos,
                Err(e) => {
                    warn!(?e, key, "skipping lodestone entry with a malformed key");
                    continue;
                }
            };
            let Some(color) = value.as_u64().and_then(|c| u32::try_from(c).ok()) else {
                warn!(key, %value, "skipping lodestone entry with a malformed color");
                continue;
            };
            colors.insert(pos, Rgb::new(color));
        }
        colors
    }
}

pub trait ColorStore: Send + Sync {
    /// `None` if nothing was saved yet
    fn load(&self) -> Result<Option<ColorFile>, ColorStoreError>;
    /// replaces whatever was saved before
    fn save(&self, file: &ColorFile) -> Result<(), ColorStoreError>;
}

/// a json file inside the lodebar data dir
pub struct DirColorStore {
    dir: Dir,
    file_name: String,
}

impl DirColorStore {
    pub fn new(dir: Dir, file_name: impl Into<String>) -> Self {
        Self {
            dir,
            file_name: file_name.into(),
        }
    }
}

impl ColorStore for DirColorStore {
    fn load(&self) -> Result<Option<ColorFile>, ColorStoreError> {
        if !self.dir.try_exists(&self.file_name)? {
            return Ok(None);
        }
        let json = self.dir.read_to_string(&self.file_name)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&self, file: &ColorFile) -> Result<(), ColorStoreError> {
        let json = serde_json::to_string_pretty(file)?;
        self.dir.write(&self.file_name, json)?;
        Ok(())
    }
}

/// Keeps the document in memory and counts the writes.
#[derive(Debug, Default)]
pub struct MemoryColorStore {
    file: Mutex<Option<ColorFile>>,
    saves: AtomicUsize,
}

impl MemoryColorStore {
    pub fn with_file(file: ColorFile) -> Self {
        Self {
            file: Mutex::new(Some(file)),
            saves: AtomicUsize::new(0),
        }
    }
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
    pub fn file(&self) -> Option<ColorFile> {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ColorStore for MemoryColorStore {
    fn load(&self) -> Result<Option<ColorFile>, ColorStoreError> {
        Ok(self.file())
    }

    fn save(&self, file: &ColorFile) -> Result<(), ColorStoreError> {
        *self.file.lock().unwrap_or_else(|e| e.into_inner()) = Some(file.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T: ColorStore> ColorStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<ColorFile>, ColorStoreError> {
        self.as_ref().load()
    }
    fn save(&self, file: &ColorFile) -> Result<(), ColorStoreError> {
        self.as_ref().save(file)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use similar_asserts::assert_eq;

    #[rstest]
    #[case("minecraft:overworld|10|64|10", Ok(LandmarkPos::new(Dimension::overworld(), IVec3::new(10, 64, 10))))]
    #[case("minecraft:the_nether|-5|0|-70000", Ok(LandmarkPos::new(Dimension::new(Dimension::NETHER), IVec3::new(-5, 0, -70000))))]
    #[case("minecraft:overworld|10|64", Err(StoreKeyError::PartCount(3)))]
    #[case("|1|2|3", Err(StoreKeyError::EmptyDimension))]
    #[case("minecraft:overworld|1|two|3", Err(StoreKeyError::Coordinate("two".to_string())))]
    fn parse_keys(#[case] key: &str, #[case] expected: Result<LandmarkPos, StoreKeyError>) {
        assert_eq!(parse_store_key(key), expected);
    }

    #[rstest]
    fn key_survives_a_trip_through_the_file() {
        let pos = LandmarkPos::new(Dimension::new("custom:mining"), IVec3::new(-1, -64, 3));
        assert_eq!(parse_store_key(&store_key(&pos)), Ok(pos));
    }

    #[rstest]
    fn bad_entries_are_skipped() {
        let file: ColorFile = serde_json::from_str(
            r#"{"lodestones": {
                "minecraft:overworld|10|64|10": 16729156,
                "minecraft:overworld|oops": 4521796,
                "minecraft:overworld|1|2|3": "red",
                "minecraft:overworld|4|5|6": -1
            }}"#,
        )
        .expect("valid json");
        let colors = file.into_colors();
        assert_eq!(colors.len(), 1);
        assert_eq!(
            colors.get(&LandmarkPos::new(Dimension::overworld(), IVec3::new(10, 64, 10))),
            Some(&Rgb::new(0xFF4444))
        );
    }
}
