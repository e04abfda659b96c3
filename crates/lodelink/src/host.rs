//! What the tracker needs from the host world.
//!
//! The host owns inventories, blocks, players and the network. The tracker only talks to it through these traits,
//! one call at a time. Implementations must not call back into the tracker from inside these methods.

use std::sync::Arc;

use glam::DVec3;

use crate::{
    ActorId, ClientboundWaypoint, CompassStack, HostError, LandmarkPos, LoreLine, Slot,
    WaypointId, WaypointTransmitter,
};

pub trait Inventory {
    /// every compass in the relevant slots of the actor, in [Slot::scan_order]
    fn compasses(&self, actor: ActorId) -> Result<Vec<CompassStack>, HostError>;
    /// replaces the whole lore of the item in `slot`
    fn set_lore(&self, actor: ActorId, slot: Slot, lore: Vec<LoreLine>) -> Result<(), HostError>;
    /// ask the host to send the full inventory to the client, so that lore changes become visible
    fn resync_inventory(&self, actor: ActorId) -> Result<(), HostError>;
}

pub trait Landmarks {
    /// whether a lodestone block currently sits at `pos`
    fn landmark_exists(&self, pos: &LandmarkPos) -> Result<bool, HostError>;
}

/// The host's waypoint manager. It decides when to open/close connections to receivers and calls
/// [WaypointTransmitter::make_connection] to do so.
pub trait WaypointBroadcast {
    fn track_waypoint(
        &self,
        owner: ActorId,
        waypoint: Arc<WaypointTransmitter>,
    ) -> Result<(), HostError>;
    fn untrack_waypoint(&self, owner: ActorId, id: WaypointId) -> Result<(), HostError>;
}

/// A connected client that waypoint packets can be sent to.
pub trait Receiver {
    fn actor_id(&self) -> ActorId;
    fn position(&self) -> DVec3;
    /// the receiver's own waypoint receive range attribute, in blocks
    fn receive_range(&self) -> f64;
    fn send(&self, packet: ClientboundWaypoint) -> Result<(), HostError>;
}

/// Everything the compass tracker needs, as one bound.
pub trait World: Inventory + Landmarks + WaypointBroadcast + Send + Sync {}

impl<T> World for T where T: Inventory + Landmarks + WaypointBroadcast + Send + Sync {}
