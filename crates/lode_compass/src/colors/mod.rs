//! Every lodestone gets a color the first time someone asks for it, and keeps it until the block is broken.
//!
//! Colors are picked so that lodestones close to each other look different. Each colored neighbor within
//! 1000 blocks in the same dimension adds a weight to its color, closer neighbors weigh more, and the
//! palette color with the smallest total wins.

mod store;

use std::{
    collections::HashMap,
    sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use lode_core::prelude::*;
use lodelink::{LandmarkPos, Rgb};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub use store::{
    parse_store_key, store_key, ColorFile, ColorStore, ColorStoreError, DirColorStore,
    MemoryColorStore, StoreKeyError, DEFAULT_COLORS_FILE_NAME,
};

/// red, green, blue, yellow, magenta, cyan, orange, purple, light green, pink,
/// lime, light blue, light red, pale green, pale blue, gold, violet, sky blue, peach, mint
pub const PALETTE: [Rgb; 20] = [
    Rgb::new(0xFF4444),
    Rgb::new(0x44FF44),
    Rgb::new(0x4444FF),
    Rgb::new(0xFFFF44),
    Rgb::new(0xFF44FF),
    Rgb::new(0x44FFFF),
    Rgb::new(0xFF8844),
    Rgb::new(0x8844FF),
    Rgb::new(0x44FF88),
    Rgb::new(0xFF4488),
    Rgb::new(0x88FF44),
    Rgb::new(0x4488FF),
    Rgb::new(0xFF8888),
    Rgb::new(0x88FF88),
    Rgb::new(0x8888FF),
    Rgb::new(0xFFAA44),
    Rgb::new(0xAA44FF),
    Rgb::new(0x44AAFF),
    Rgb::new(0xFFAA88),
    Rgb::new(0xAAFFAA),
];

/// neighbors at this squared distance or further don't count
pub const NEIGHBOR_DISTANCE_SQUARED: i64 = 1_000_000;

/// `max(1, trunc(10 - d² / 100000))` for neighbors in range, 0 otherwise.
pub fn proximity_weight(distance_squared: i64) -> u32 {
    if !(0..NEIGHBOR_DISTANCE_SQUARED).contains(&distance_squared) {
        return 0;
    }
    // trunc(10 - d / 100000) == 10 - ceil(d / 100000) for 0 <= d < 1_000_000
    let steps = (distance_squared + 99_999) / 100_000;
    (10 - steps).max(1) as u32
}

/// Summed proximity weight per color, for every colored landmark near `pos`. `pos` itself is skipped.
pub fn color_usage(colors: &HashMap<LandmarkPos, Rgb>, pos: &LandmarkPos) -> HashMap<Rgb, u32> {
    let mut usage: HashMap<Rgb, u32> = HashMap::new();
    for (other, color) in colors.iter() {
        if other == pos {
            continue;
        }
        let Some(distance_squared) = pos.distance_squared(other) else {
            continue;
        };
        let weight = proximity_weight(distance_squared);
        if weight > 0 {
            *usage.entry(*color).or_default() += weight;
        }
    }
    usage
}

/// The least used palette color, earliest in the palette on ties. `None` when nothing is nearby.
pub fn least_used_color(usage: &HashMap<Rgb, u32>) -> Option<Rgb> {
    if usage.is_empty() {
        return None;
    }
    PALETTE
        .iter()
        .copied()
        .min_by_key(|color| usage.get(color).copied().unwrap_or_default())
}

/// Thread safe landmark to color map backed by a [ColorStore].
/// Create one per session and share it behind an `Arc`.
pub struct ColorRegistry {
    colors: RwLock<HashMap<LandmarkPos, Rgb>>,
    store: Box<dyn ColorStore>,
    rng: Mutex<StdRng>,
}

impl ColorRegistry {
    /// Loads everything the store has. A store that fails to load is logged and we start empty.
    pub fn open(store: impl ColorStore + 'static) -> Self {
        let colors = match store.load() {
            Ok(Some(file)) => file.into_colors(),
            Ok(None) => {
                info!("no saved lodestone colors yet");
                HashMap::new()
            }
            Err(e) => {
                error!(?e, "failed to load lodestone colors, starting empty");
                HashMap::new()
            }
        };
        info!(count = colors.len(), "loaded lodestone colors");
        Self {
            colors: RwLock::new(colors),
            store: Box::new(store),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// fixes the rng used when a lodestone has no neighbors
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<LandmarkPos, Rgb>> {
        self.colors.read().unwrap_or_else(|e| e.into_inner())
    }
    fn write(&self) -> RwLockWriteGuard<'_, HashMap<LandmarkPos, Rgb>> {
        self.colors.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the color of `pos`, picking and saving one if it has none yet.
    pub fn assign_color(&self, pos: &LandmarkPos) -> Rgb {
        if let Some(color) = self.color(pos) {
            return color;
        }
        let mut colors = self.write();
        // someone else might have assigned it between the two locks
        if let Some(color) = colors.get(pos) {
            return *color;
        }
        let usage = color_usage(&colors, pos);
        let color = least_used_color(&usage).unwrap_or_else(|| self.random_color());
        colors.insert(pos.clone(), color);
        self.save(&colors);
        info!(%pos, %color, neighbors = usage.len(), "assigned lodestone color");
        color
    }

    pub fn color(&self, pos: &LandmarkPos) -> Option<Rgb> {
        self.read().get(pos).copied()
    }

    /// Forgets the color of `pos`. Only writes the store if there was something to forget.
    pub fn remove(&self, pos: &LandmarkPos) -> Option<Rgb> {
        let mut colors = self.write();
        let removed = colors.remove(pos)?;
        self.save(&colors);
        info!(%pos, color = %removed, "removed lodestone color");
        Some(removed)
    }

    /// every registered lodestone, sorted by dimension and then position
    pub fn landmarks(&self) -> Vec<(LandmarkPos, Rgb)> {
        self.read()
            .iter()
            .map(|(pos, color)| (pos.clone(), *color))
            .sorted_by_key(|(pos, _)| (pos.dimension.clone(), pos.pos.to_array()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn random_color(&self) -> Rgb {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        PALETTE.choose(&mut *rng).copied().unwrap_or(PALETTE[0])
    }

    fn save(&self, colors: &HashMap<LandmarkPos, Rgb>) {
        if let Err(e) = self.store.save(&ColorFile::from_colors(colors)) {
            error!(?e, "failed to save lodestone colors");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lodelink::Dimension;
    use rstest::*;
    use similar_asserts::assert_eq;

    fn overworld(x: i32, z: i32) -> LandmarkPos {
        LandmarkPos::new(Dimension::overworld(), IVec3::new(x, 64, z))
    }

    #[rstest]
    #[case(0, 10)]
    #[case(1, 9)]
    #[case(100_000, 9)]
    #[case(150_000, 8)]
    #[case(850_000, 1)]
    #[case(950_000, 1)]
    #[case(999_999, 1)]
    #[case(1_000_000, 0)]
    #[case(25_000_000, 0)]
    fn weight_drops_with_distance(#[case] distance_squared: i64, #[case] weight: u32) {
        assert_eq!(proximity_weight(distance_squared), weight);
    }

    #[rstest]
    fn usage_ignores_other_dimensions_and_far_landmarks() {
        let colors = HashMap::from([
            (overworld(10, 0), PALETTE[0]),
            (overworld(2000, 0), PALETTE[1]),
            (
                LandmarkPos::new(Dimension::new(Dimension::NETHER), IVec3::new(0, 64, 0)),
                PALETTE[2],
            ),
        ]);
        let usage = color_usage(&colors, &overworld(0, 0));
        assert_eq!(usage, HashMap::from([(PALETTE[0], 9)]));
    }

    #[rstest]
    fn least_used_prefers_palette_order_on_ties() {
        let usage = HashMap::from([(PALETTE[0], 10), (PALETTE[1], 3)]);
        // everything from index 2 onwards is unused
        assert_eq!(least_used_color(&usage), Some(PALETTE[2]));
        let crowded: HashMap<Rgb, u32> = PALETTE.iter().map(|c| (*c, 2)).collect();
        assert_eq!(least_used_color(&crowded), Some(PALETTE[0]));
        assert_eq!(least_used_color(&HashMap::new()), None);
    }

    #[rstest]
    fn lone_lodestones_get_a_palette_color() {
        let registry = ColorRegistry::open(MemoryColorStore::default()).with_seed(7);
        let color = registry.assign_color(&overworld(0, 0));
        assert!(PALETTE.contains(&color));
    }

    #[rstest]
    fn landmarks_are_sorted() {
        let registry = ColorRegistry::open(MemoryColorStore::default()).with_seed(1);
        registry.assign_color(&overworld(5000, 0));
        registry.assign_color(&overworld(-5000, 0));
        let positions: Vec<_> = registry.landmarks().into_iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![overworld(-5000, 0), overworld(5000, 0)]);
        assert_eq!(registry.len(), 2);
    }
}
