//! Keeps every actor's waypoints in sync with the lodestone compasses they carry.
//!
//! Each actor is scanned once every [TrackerConfig::scan_interval_ticks] ticks and right away on join.
//! A scan looks at every compass, checks that its lodestone still stands, rewrites the coordinate line and then
//! diffs the set of valid targets against the waypoints the actor already has.
//! Breaking or placing a lodestone doesn't wait for the next scan, see [CompassTracker::update_compasses_for_broken_landmark]
//! and [CompassTracker::refresh_waypoints_for_landmark].

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use indexmap::IndexMap;
use lode_core::prelude::*;
use lodelink::{
    ActorId, CompassStack, Icon, LandmarkPos, Marker, ModdedPeers, Rgb, Waypoint, WaypointId,
    WaypointTransmitter, World,
};

use crate::{
    colors::ColorRegistry,
    marker::{coordinate_line, dye_override, replace_coordinate_line},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub scan_interval_ticks: u32,
    /// in blocks
    pub waypoint_range: u32,
    /// coordinate line color of a valid target without a registry or dye color
    pub default_color: Rgb,
    /// coordinate line color once the lodestone is gone
    pub invalid_color: Rgb,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ticks: 20,
            waypoint_range: 60_000_000,
            default_color: Rgb::new(0x55FFFF),
            invalid_color: Rgb::new(0x555555),
        }
    }
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanChanges {
    /// at least one coordinate line was rewritten
    Annotations = 1 << 0,
    WaypointsAdded = 1 << 1,
    WaypointsRemoved = 1 << 2,
    /// the inventory could not be read, nothing was touched
    Skipped = 1 << 3,
}

/// what one scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub changes: BitFlags<ScanChanges>,
    /// distinct lodestones that still stand
    pub valid_targets: usize,
    pub annotations_rewritten: usize,
    pub waypoints_added: usize,
    pub waypoints_removed: usize,
}

pub struct CompassTracker {
    config: TrackerConfig,
    colors: Arc<ColorRegistry>,
    peers: Arc<ModdedPeers>,
    /// per actor, in the order the targets were first seen
    waypoints: DashMap<ActorId, IndexMap<LandmarkPos, Arc<WaypointTransmitter>>>,
    /// also the set of online actors
    tick_counters: DashMap<ActorId, u32>,
    /// targets whose compasses were already rewritten to the invalid line
    cleaned: DashMap<ActorId, HashSet<LandmarkPos>>,
}

impl CompassTracker {
    pub fn new(config: TrackerConfig, colors: Arc<ColorRegistry>, peers: Arc<ModdedPeers>) -> Self {
        Self {
            config,
            colors,
            peers,
            waypoints: Default::default(),
            tick_counters: Default::default(),
            cleaned: Default::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Counts the tick and scans if the actor is due.
    /// Ticks of actors that never joined, or already left, are ignored.
    pub fn on_actor_tick(&self, world: &dyn World, actor: ActorId) -> Option<ScanReport> {
        let due = {
            let Some(mut counter) = self.tick_counters.get_mut(&actor) else {
                trace!(%actor, "tick for an actor that is not online");
                return None;
            };
            *counter += 1;
            if *counter >= self.config.scan_interval_ticks {
                *counter = 0;
                true
            } else {
                false
            }
        };
        due.then(|| self.process_actor_compasses(world, actor))
    }

    pub fn on_actor_join(&self, world: &dyn World, actor: ActorId) -> ScanReport {
        info!(%actor, "actor joined");
        self.cleaned.remove(&actor);
        self.tick_counters.insert(actor, 0);
        self.process_actor_compasses(world, actor)
    }

    /// Untracks every waypoint of the actor and forgets about it. Returns the number of waypoints dropped.
    pub fn on_actor_leave(&self, world: &dyn World, actor: ActorId) -> usize {
        let dropped = match self.waypoints.remove(&actor) {
            Some((_, table)) => {
                for transmitter in table.values() {
                    self.remove_waypoint(world, transmitter);
                }
                table.len()
            }
            None => 0,
        };
        self.tick_counters.remove(&actor);
        self.cleaned.remove(&actor);
        info!(%actor, dropped, "actor left");
        dropped
    }

    /// One full scan of the actor's compasses followed by a waypoint diff.
    pub fn process_actor_compasses(&self, world: &dyn World, actor: ActorId) -> ScanReport {
        let _span = debug_span!("scan", %actor).entered();
        let mut report = ScanReport::default();
        let stacks = match world.compasses(actor) {
            Ok(stacks) => stacks,
            Err(e) => {
                warn!(?e, "failed to read compasses, skipping scan");
                report.changes |= ScanChanges::Skipped;
                return report;
            }
        };

        let mut existence: HashMap<LandmarkPos, Option<bool>> = HashMap::new();
        let mut valid: IndexMap<LandmarkPos, Marker> = IndexMap::new();
        for CompassStack { slot, marker } in stacks.iter() {
            let Some(target) = marker.target.as_ref() else {
                continue;
            };
            let exists = *existence
                .entry(target.clone())
                .or_insert_with(|| match world.landmark_exists(target) {
                    Ok(exists) => Some(exists),
                    Err(e) => {
                        warn!(?e, %target, "failed to check lodestone, leaving compass alone");
                        None
                    }
                });
            let line = match exists {
                Some(true) => {
                    if let Some(mut cleaned) = self.cleaned.get_mut(&actor) {
                        cleaned.remove(target);
                    }
                    valid
                        .entry(target.clone())
                        .or_insert_with(|| marker.clone());
                    coordinate_line(target.pos, self.marker_color(marker, target))
                }
                Some(false) => {
                    self.mark_cleaned(actor, target);
                    coordinate_line(target.pos, self.config.invalid_color)
                }
                None => {
                    // keep whatever waypoint we have until we know better
                    if self.is_tracking(actor, target) {
                        valid
                            .entry(target.clone())
                            .or_insert_with(|| marker.clone());
                    }
                    continue;
                }
            };
            if let Some(lore) = replace_coordinate_line(&marker.lore, line) {
                match world.set_lore(actor, *slot, lore) {
                    Ok(()) => report.annotations_rewritten += 1,
                    Err(e) => warn!(?e, ?slot, "failed to rewrite compass lore"),
                }
            }
        }
        report.valid_targets = existence.values().filter(|e| **e == Some(true)).count();

        if report.annotations_rewritten > 0 {
            report.changes |= ScanChanges::Annotations;
            if let Err(e) = world.resync_inventory(actor) {
                warn!(?e, "failed to resync inventory");
            }
        }

        let (added, removed) = self.update_actor_waypoints(world, actor, &valid);
        report.waypoints_added = added;
        report.waypoints_removed = removed;
        if added > 0 {
            report.changes |= ScanChanges::WaypointsAdded;
        }
        if removed > 0 {
            report.changes |= ScanChanges::WaypointsRemoved;
        }
        if !report.changes.is_empty() {
            debug!(?report, "scan changed something");
        }
        report
    }

    /// Creates waypoints for new targets in `valid` and removes the ones whose target is not in `valid` anymore.
    /// Existing waypoints for targets that are still valid are left alone. Returns (added, removed).
    pub fn update_actor_waypoints(
        &self,
        world: &dyn World,
        actor: ActorId,
        valid: &IndexMap<LandmarkPos, Marker>,
    ) -> (usize, usize) {
        let mut added = 0;
        let mut removed = 0;
        {
            let mut table = self.waypoints.entry(actor).or_default();
            let stale = table
                .keys()
                .filter(|target| !valid.contains_key(*target))
                .cloned()
                .collect_vec();
            for target in stale {
                let Some(transmitter) = table.get(&target).cloned() else {
                    continue;
                };
                // a failed untrack stays in the table so the next scan tries again
                if self.remove_waypoint(world, &transmitter) {
                    table.shift_remove(&target);
                    removed += 1;
                }
            }
            for (target, marker) in valid.iter() {
                if table.contains_key(target) {
                    continue;
                }
                if let Some(transmitter) = self.create_waypoint(world, actor, target, marker) {
                    table.insert(target.clone(), transmitter);
                    added += 1;
                }
            }
        }
        self.waypoints.remove_if(&actor, |_, table| table.is_empty());
        (added, removed)
    }

    /// Recreates every tracked waypoint that points at `pos`, for every actor.
    /// Use after the lodestone's color changed. Returns how many were recreated.
    pub fn refresh_waypoints_for_landmark(&self, world: &dyn World, pos: &LandmarkPos) -> usize {
        let owners = self
            .waypoints
            .iter()
            .filter(|entry| entry.value().contains_key(pos))
            .map(|entry| *entry.key())
            .collect_vec();
        let refreshed = owners
            .into_iter()
            .filter(|actor| self.recreate_waypoint(world, *actor, pos))
            .count();
        if refreshed > 0 {
            info!(%pos, refreshed, "refreshed waypoints");
        }
        refreshed
    }

    /// Recreates the waypoints of `actor` only. Other actors tracking the same lodestones are not touched.
    /// Use after the actor's capability changed. Returns how many were recreated.
    pub fn refresh_actor_waypoints(&self, world: &dyn World, actor: ActorId) -> usize {
        let targets = self
            .waypoints
            .get(&actor)
            .map(|table| table.keys().cloned().collect_vec())
            .unwrap_or_default();
        let refreshed = targets
            .iter()
            .filter(|target| self.recreate_waypoint(world, actor, target))
            .count();
        if refreshed > 0 {
            info!(%actor, refreshed, "refreshed waypoints of actor");
        }
        refreshed
    }

    /// Rewrites every compass pointing at `pos` to the invalid line, for every online actor, right now.
    /// The waypoints themselves go away on each actor's next scan. Returns the number of compasses rewritten.
    pub fn update_compasses_for_broken_landmark(
        &self,
        world: &dyn World,
        pos: &LandmarkPos,
    ) -> usize {
        let line = coordinate_line(pos.pos, self.config.invalid_color);
        let mut rewritten = 0;
        for actor in self.online_actors() {
            let stacks = match world.compasses(actor) {
                Ok(stacks) => stacks,
                Err(e) => {
                    warn!(?e, %actor, "failed to read compasses of actor");
                    continue;
                }
            };
            let mut changed = false;
            for stack in stacks.iter().filter(|s| s.marker.is_pointing_at(pos)) {
                self.mark_cleaned(actor, pos);
                let Some(lore) = replace_coordinate_line(&stack.marker.lore, line.clone()) else {
                    continue;
                };
                match world.set_lore(actor, stack.slot, lore) {
                    Ok(()) => {
                        changed = true;
                        rewritten += 1;
                    }
                    Err(e) => warn!(?e, %actor, slot = ?stack.slot, "failed to rewrite compass lore"),
                }
            }
            if changed {
                if let Err(e) = world.resync_inventory(actor) {
                    warn!(?e, %actor, "failed to resync inventory");
                }
            }
        }
        info!(%pos, rewritten, "invalidated compasses of broken lodestone");
        rewritten
    }

    pub fn online_actors(&self) -> Vec<ActorId> {
        self.tick_counters
            .iter()
            .map(|entry| *entry.key())
            .sorted()
            .collect()
    }

    pub fn is_online(&self, actor: ActorId) -> bool {
        self.tick_counters.contains_key(&actor)
    }

    /// the actor's waypoints in the order their targets were first seen
    pub fn waypoints_of(&self, actor: ActorId) -> Vec<Arc<WaypointTransmitter>> {
        self.waypoints
            .get(&actor)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn waypoint_ids(&self, actor: ActorId) -> Vec<WaypointId> {
        self.waypoints_of(actor).iter().map(|w| w.id()).collect()
    }

    pub fn is_tracking(&self, actor: ActorId, target: &LandmarkPos) -> bool {
        self.waypoints
            .get(&actor)
            .map(|table| table.contains_key(target))
            .unwrap_or_default()
    }

    /// lodestones this actor's compasses were already marked invalid for
    pub fn cleaned_targets(&self, actor: ActorId) -> HashSet<LandmarkPos> {
        self.cleaned
            .get(&actor)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// dye > registry > default
    fn marker_color(&self, marker: &Marker, target: &LandmarkPos) -> Rgb {
        dye_override(marker)
            .or_else(|| self.colors.color(target))
            .unwrap_or(self.config.default_color)
    }

    fn mark_cleaned(&self, actor: ActorId, target: &LandmarkPos) {
        if self.cleaned.entry(actor).or_default().insert(target.clone()) {
            info!(%actor, %target, "lodestone is gone, compass marked invalid");
        }
    }

    /// untrack + track of one waypoint with the current color and capability
    fn recreate_waypoint(&self, world: &dyn World, actor: ActorId, pos: &LandmarkPos) -> bool {
        // inventory is read before the table is locked
        let marker = self
            .find_compass(world, actor, pos)
            .unwrap_or_else(|| Marker::pointing_at(pos.clone()));
        let Some(mut table) = self.waypoints.get_mut(&actor) else {
            return false;
        };
        let Some(old) = table.get(pos).cloned() else {
            return false;
        };
        if !self.remove_waypoint(world, &old) {
            return false;
        }
        match self.create_waypoint(world, actor, pos, &marker) {
            Some(transmitter) => {
                table.insert(pos.clone(), transmitter);
                true
            }
            // the next scan creates it again
            None => {
                table.shift_remove(pos);
                false
            }
        }
    }

    fn find_compass(&self, world: &dyn World, actor: ActorId, pos: &LandmarkPos) -> Option<Marker> {
        world
            .compasses(actor)
            .ok()?
            .into_iter()
            .find(|stack| stack.marker.is_pointing_at(pos))
            .map(|stack| stack.marker)
    }

    fn create_waypoint(
        &self,
        world: &dyn World,
        actor: ActorId,
        target: &LandmarkPos,
        marker: &Marker,
    ) -> Option<Arc<WaypointTransmitter>> {
        let color = self.marker_color(marker, target);
        let waypoint = Waypoint {
            id: WaypointId::for_landmark(actor, target),
            target: target.clone(),
            icon: Icon::lodestone(color),
            range: self.config.waypoint_range,
            owner: actor,
        };
        let transmitter = Arc::new(WaypointTransmitter::new(waypoint, self.peers.clone()));
        match world.track_waypoint(actor, transmitter.clone()) {
            Ok(()) => {
                debug!(%actor, %target, %color, id = %transmitter.id(), "created waypoint");
                Some(transmitter)
            }
            Err(e) => {
                warn!(?e, %actor, %target, "failed to create waypoint");
                None
            }
        }
    }

    fn remove_waypoint(&self, world: &dyn World, transmitter: &WaypointTransmitter) -> bool {
        match world.untrack_waypoint(transmitter.owner(), transmitter.id()) {
            Ok(()) => {
                debug!(actor = %transmitter.owner(), target = %transmitter.target(), "removed waypoint");
                true
            }
            Err(e) => {
                warn!(?e, actor = %transmitter.owner(), target = %transmitter.target(), "failed to remove waypoint");
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_matches_the_documented_values() {
        let config: TrackerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.scan_interval_ticks, 20);
        assert_eq!(config.default_color, Rgb::new(0x55FFFF));
        assert_eq!(config.invalid_color, Rgb::new(0x555555));
    }

    #[test]
    fn partial_config_keeps_the_other_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{"scan_interval_ticks": 5}"#).unwrap();
        assert_eq!(config.scan_interval_ticks, 5);
        assert_eq!(config.waypoint_range, 60_000_000);
    }
}
