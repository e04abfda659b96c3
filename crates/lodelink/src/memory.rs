//! An in-memory host.
//!
//! Holds lodestone blocks, actors with their compass slots and a small waypoint manager that opens and closes
//! connections the way a real server would: connect when the owner is in range, disconnect when it leaves the range
//! or when the waypoint is untracked. Used by tests and by the scenario simulator.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
};

use glam::DVec3;
use tracing::{debug, trace};

use crate::{
    ActorId, ClientboundWaypoint, CompassStack, Dimension, HostError, Inventory, LandmarkPos,
    Landmarks, LoreLine, Marker, Receiver, Slot, WaypointBroadcast, WaypointConnection,
    WaypointId, WaypointTransmitter,
};

pub const DEFAULT_RECEIVE_RANGE: f64 = 60_000_000.0;

#[derive(Debug)]
pub struct SimActor {
    pub dimension: Dimension,
    pub position: DVec3,
    pub receive_range: f64,
    pub slots: BTreeMap<Slot, Marker>,
    /// number of full inventory resyncs requested for this actor
    pub resyncs: usize,
    outbox: Arc<Mutex<Vec<ClientboundWaypoint>>>,
}

impl SimActor {
    pub fn new(dimension: Dimension, position: DVec3) -> Self {
        Self {
            dimension,
            position,
            receive_range: DEFAULT_RECEIVE_RANGE,
            slots: Default::default(),
            resyncs: 0,
            outbox: Default::default(),
        }
    }
}

/// a handle given to transmitters. packets land in the actor's outbox
struct SimReceiver {
    id: ActorId,
    position: DVec3,
    receive_range: f64,
    outbox: Arc<Mutex<Vec<ClientboundWaypoint>>>,
}

impl Receiver for SimReceiver {
    fn actor_id(&self) -> ActorId {
        self.id
    }
    fn position(&self) -> DVec3 {
        self.position
    }
    fn receive_range(&self) -> f64 {
        self.receive_range
    }
    fn send(&self, packet: ClientboundWaypoint) -> Result<(), HostError> {
        self.outbox
            .lock()
            .map_err(|_| HostError::ConnectionClosed(self.id))?
            .push(packet);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    available: bool,
    landmarks: HashSet<LandmarkPos>,
    actors: BTreeMap<ActorId, SimActor>,
    tracked: BTreeMap<WaypointId, Arc<WaypointTransmitter>>,
    connections: HashMap<(WaypointId, ActorId), WaypointConnection>,
    track_calls: usize,
    untrack_calls: usize,
}

impl MemoryState {
    fn check_available(&self) -> Result<(), HostError> {
        if self.available {
            Ok(())
        } else {
            Err(HostError::WorldUnavailable)
        }
    }
    fn actor(&self, actor: ActorId) -> Result<&SimActor, HostError> {
        self.check_available()?;
        self.actors.get(&actor).ok_or(HostError::ActorOffline(actor))
    }
    fn actor_mut(&mut self, actor: ActorId) -> Result<&mut SimActor, HostError> {
        self.check_available()?;
        self.actors
            .get_mut(&actor)
            .ok_or(HostError::ActorOffline(actor))
    }
    fn receiver(&self, actor: ActorId) -> Option<SimReceiver> {
        self.actors.get(&actor).map(|a| SimReceiver {
            id: actor,
            position: a.position,
            receive_range: a.receive_range,
            outbox: a.outbox.clone(),
        })
    }
    /// open connections that should exist, close the ones whose receiver went out of range
    fn reconcile_connections(&mut self) {
        let receivers: Vec<SimReceiver> = self
            .actors
            .keys()
            .filter_map(|id| self.receiver(*id))
            .collect();
        for transmitter in self.tracked.values() {
            for receiver in receivers.iter() {
                let key = (transmitter.id(), receiver.id);
                match self.connections.get(&key) {
                    Some(connection) => {
                        if connection.is_broken(receiver) {
                            trace!(id = %key.0, receiver = %key.1, "connection out of range");
                            connection.disconnect(receiver);
                            self.connections.remove(&key);
                        }
                    }
                    None => {
                        if let Some(connection) = transmitter.make_connection(receiver) {
                            if !connection.is_broken(receiver) {
                                connection.connect(receiver);
                                self.connections.insert(key, connection);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// see module docs
pub struct MemoryWorld {
    state: RwLock<MemoryState>,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                available: true,
                ..Default::default()
            }),
        }
    }
}

impl MemoryWorld {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// while unavailable every host call fails with [HostError::WorldUnavailable]
    pub fn set_available(&self, available: bool) {
        self.write().available = available;
    }
    pub fn place_landmark(&self, pos: LandmarkPos) {
        self.write().landmarks.insert(pos);
    }
    pub fn break_landmark(&self, pos: &LandmarkPos) {
        self.write().landmarks.remove(pos);
    }
    pub fn add_actor(&self, id: ActorId, actor: SimActor) {
        self.write().actors.insert(id, actor);
    }
    /// drops the actor and all connections to it without sending anything, like a closed socket
    pub fn remove_actor(&self, id: ActorId) -> Option<SimActor> {
        let mut state = self.write();
        state.connections.retain(|(_, receiver), _| *receiver != id);
        state.actors.remove(&id)
    }
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.read().actors.keys().copied().collect()
    }
    pub fn move_actor(&self, id: ActorId, position: DVec3) {
        if let Some(actor) = self.write().actors.get_mut(&id) {
            actor.position = position;
        }
    }
    pub fn set_receive_range(&self, id: ActorId, range: f64) {
        if let Some(actor) = self.write().actors.get_mut(&id) {
            actor.receive_range = range;
        }
    }
    pub fn set_slot(&self, id: ActorId, slot: Slot, marker: Marker) {
        if let Some(actor) = self.write().actors.get_mut(&id) {
            actor.slots.insert(slot, marker);
        }
    }
    pub fn clear_slot(&self, id: ActorId, slot: Slot) -> Option<Marker> {
        self.write()
            .actors
            .get_mut(&id)
            .and_then(|actor| actor.slots.remove(&slot))
    }
    pub fn marker(&self, id: ActorId, slot: Slot) -> Option<Marker> {
        self.read()
            .actors
            .get(&id)
            .and_then(|actor| actor.slots.get(&slot).cloned())
    }
    pub fn resyncs(&self, id: ActorId) -> usize {
        self.read()
            .actors
            .get(&id)
            .map(|actor| actor.resyncs)
            .unwrap_or_default()
    }
    /// takes all packets delivered to the actor so far
    pub fn drain_packets(&self, id: ActorId) -> Vec<ClientboundWaypoint> {
        self.read()
            .actors
            .get(&id)
            .map(|actor| std::mem::take(&mut *actor.outbox.lock().unwrap_or_else(|e| e.into_inner())))
            .unwrap_or_default()
    }
    pub fn tracked_waypoints(&self) -> Vec<Arc<WaypointTransmitter>> {
        self.read().tracked.values().cloned().collect()
    }
    pub fn is_connected(&self, id: WaypointId, receiver: ActorId) -> bool {
        self.read().connections.contains_key(&(id, receiver))
    }
    /// (track, untrack) calls received so far
    pub fn broadcast_calls(&self) -> (usize, usize) {
        let state = self.read();
        (state.track_calls, state.untrack_calls)
    }
    /// The waypoint manager's own tick. Opens and closes connections as actors move around.
    pub fn tick_broadcast(&self) {
        self.write().reconcile_connections();
    }
}

impl Inventory for MemoryWorld {
    fn compasses(&self, actor: ActorId) -> Result<Vec<CompassStack>, HostError> {
        let state = self.read();
        let actor = state.actor(actor)?;
        Ok(Slot::scan_order()
            .filter_map(|slot| {
                actor.slots.get(&slot).map(|marker| CompassStack {
                    slot,
                    marker: marker.clone(),
                })
            })
            .collect())
    }

    fn set_lore(&self, actor: ActorId, slot: Slot, lore: Vec<LoreLine>) -> Result<(), HostError> {
        let mut state = self.write();
        let sim_actor = state.actor_mut(actor)?;
        let marker = sim_actor
            .slots
            .get_mut(&slot)
            .ok_or(HostError::EmptySlot { actor, slot })?;
        marker.lore = lore;
        Ok(())
    }

    fn resync_inventory(&self, actor: ActorId) -> Result<(), HostError> {
        let mut state = self.write();
        state.actor_mut(actor)?.resyncs += 1;
        Ok(())
    }
}

impl Landmarks for MemoryWorld {
    fn landmark_exists(&self, pos: &LandmarkPos) -> Result<bool, HostError> {
        let state = self.read();
        state.check_available()?;
        Ok(state.landmarks.contains(pos))
    }
}

impl WaypointBroadcast for MemoryWorld {
    fn track_waypoint(
        &self,
        owner: ActorId,
        waypoint: Arc<WaypointTransmitter>,
    ) -> Result<(), HostError> {
        let mut state = self.write();
        state.check_available()?;
        state.track_calls += 1;
        let id = waypoint.id();
        debug!(%owner, %id, target = %waypoint.target(), "tracking waypoint");
        // a re-tracked id replaces the old transmitter, its connections are stale
        if state.tracked.insert(id, waypoint).is_some() {
            state.connections.retain(|(wid, _), _| *wid != id);
        }
        state.reconcile_connections();
        Ok(())
    }

    fn untrack_waypoint(&self, owner: ActorId, id: WaypointId) -> Result<(), HostError> {
        let mut state = self.write();
        state.check_available()?;
        state.untrack_calls += 1;
        debug!(%owner, %id, "untracking waypoint");
        state.tracked.remove(&id);
        let keys: Vec<_> = state
            .connections
            .keys()
            .filter(|(wid, _)| *wid == id)
            .copied()
            .collect();
        for key in keys {
            if let Some(connection) = state.connections.remove(&key) {
                if let Some(receiver) = state.receiver(key.1) {
                    connection.disconnect(&receiver);
                }
            }
        }
        Ok(())
    }
}
