use std::fmt;

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

/// Namespaced id of a world/level. eg: `minecraft:overworld`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(SmolStr);

impl Dimension {
    pub const OVERWORLD: &'static str = "minecraft:overworld";
    pub const NETHER: &'static str = "minecraft:the_nether";
    pub const END: &'static str = "minecraft:the_end";

    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }
    pub fn overworld() -> Self {
        Self::new(Self::OVERWORLD)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A block position inside a specific dimension. This is the identity of a lodestone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LandmarkPos {
    pub dimension: Dimension,
    pub pos: IVec3,
}

impl LandmarkPos {
    pub fn new(dimension: Dimension, pos: IVec3) -> Self {
        Self { dimension, pos }
    }
    /// squared block distance. `None` if the positions are in different dimensions.
    /// computed in i64 because world coordinates go up to 30 million and i32 would overflow.
    pub fn distance_squared(&self, other: &Self) -> Option<i64> {
        if self.dimension != other.dimension {
            return None;
        }
        let dx = self.pos.x as i64 - other.pos.x as i64;
        let dy = self.pos.y as i64 - other.pos.y as i64;
        let dz = self.pos.z as i64 - other.pos.z as i64;
        Some(dx * dx + dy * dy + dz * dz)
    }
    /// center of the block
    pub fn center(&self) -> DVec3 {
        self.pos.as_dvec3() + DVec3::splat(0.5)
    }
}

impl fmt::Display for LandmarkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.dimension, self.pos.x, self.pos.y, self.pos.z
        )
    }
}

/// 24 bit rgb color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(u32);

impl Rgb {
    pub const fn new(rgb: u32) -> Self {
        Self(rgb & 0xFF_FF_FF)
    }
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointId(pub Uuid);

impl WaypointId {
    pub const NAME_PREFIX: &'static str = "lodestone_";
    const NAMESPACE: Uuid = Uuid::from_u128(0x6c6f_6465_6261_7200_9e1f_3a55_8c0d_2b47);

    /// Same owner and target always give the same id, so a waypoint that is torn down and recreated
    /// replaces the old one on the receiver instead of showing up twice.
    pub fn for_landmark(owner: ActorId, target: &LandmarkPos) -> Self {
        let name = format!("{}{}_{}", Self::NAME_PREFIX, owner, target);
        Self(Uuid::new_v5(&Self::NAMESPACE, name.as_bytes()))
    }
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The item slots we care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    MainHand,
    OffHand,
    /// hotbar and main inventory. `0..INVENTORY_SLOTS`
    Inventory(u8),
}

impl Slot {
    pub const INVENTORY_SLOTS: u8 = 36;

    /// main hand, off hand and then every inventory slot in order.
    pub fn scan_order() -> impl Iterator<Item = Slot> {
        [Slot::MainHand, Slot::OffHand]
            .into_iter()
            .chain((0..Self::INVENTORY_SLOTS).map(Slot::Inventory))
    }
}

/// one line of item lore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreLine {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl LoreLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }
    pub fn colored(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

/// A compass item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Marker {
    /// lodestone this compass was bound to
    #[serde(default)]
    pub target: Option<LandmarkPos>,
    /// item model override. dyed compasses from other mods use this
    #[serde(default)]
    pub item_model: Option<SmolStr>,
    #[serde(default)]
    pub lore: Vec<LoreLine>,
}

impl Marker {
    pub fn pointing_at(target: LandmarkPos) -> Self {
        Self {
            target: Some(target),
            ..Default::default()
        }
    }
    pub fn is_pointing_at(&self, pos: &LandmarkPos) -> bool {
        self.target.as_ref() == Some(pos)
    }
}

/// A compass together with where it sits in the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompassStack {
    pub slot: Slot,
    pub marker: Marker,
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use similar_asserts::assert_eq;

    fn pos(dim: &str, x: i32, y: i32, z: i32) -> LandmarkPos {
        LandmarkPos::new(Dimension::new(dim), IVec3::new(x, y, z))
    }

    #[rstest]
    #[case(pos(Dimension::OVERWORLD, 0, 0, 0), pos(Dimension::OVERWORLD, 3, 4, 0), Some(25))]
    #[case(pos(Dimension::OVERWORLD, 0, 0, 0), pos(Dimension::NETHER, 0, 0, 0), None)]
    #[case(
        pos(Dimension::OVERWORLD, -30_000_000, 0, 0),
        pos(Dimension::OVERWORLD, 30_000_000, 0, 0),
        Some(3_600_000_000_000_000)
    )]
    fn distance_squared(#[case] a: LandmarkPos, #[case] b: LandmarkPos, #[case] expected: Option<i64>) {
        assert_eq!(a.distance_squared(&b), expected);
    }

    #[rstest]
    fn waypoint_id_is_stable_per_owner_and_target() {
        let owner = ActorId(Uuid::from_u128(1));
        let other = ActorId(Uuid::from_u128(2));
        let target = pos(Dimension::OVERWORLD, 10, 64, 10);
        assert_eq!(
            WaypointId::for_landmark(owner, &target),
            WaypointId::for_landmark(owner, &target)
        );
        assert_ne!(
            WaypointId::for_landmark(owner, &target),
            WaypointId::for_landmark(other, &target)
        );
        assert_ne!(
            WaypointId::for_landmark(owner, &target),
            WaypointId::for_landmark(owner, &pos(Dimension::NETHER, 10, 64, 10))
        );
    }

    #[rstest]
    fn rgb_is_masked_to_24_bits() {
        assert_eq!(Rgb::new(0xAAFF4444).value(), 0xFF4444);
        assert_eq!(Rgb::new(0x55FFFF).to_string(), "#55FFFF");
    }

    #[rstest]
    fn scan_order_covers_hands_then_inventory() {
        let slots: Vec<_> = Slot::scan_order().collect();
        assert_eq!(slots.len(), 38);
        assert_eq!(slots[0], Slot::MainHand);
        assert_eq!(slots[1], Slot::OffHand);
        assert_eq!(slots[37], Slot::Inventory(35));
    }
}
