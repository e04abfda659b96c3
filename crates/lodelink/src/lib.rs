//! Lodelink is the boundary between the compass tracker and the game server that hosts it.
//!
//! It has the value types shared by both sides, the waypoint wire messages, the registry of clients that
//! completed the presence handshake, the traits through which the tracker reads and writes the host world,
//! and the waypoint transmitter that the host's waypoint manager drives.
//!
//! [memory::MemoryWorld] is a complete in-memory host, good enough to run the tracker without a game server.

mod error;
mod host;
pub mod memory;
mod peers;
mod protocol;
mod transmitter;
mod types;

pub use error::HostError;
pub use host::{Inventory, Landmarks, Receiver, WaypointBroadcast, World};
pub use peers::{Capability, ModdedPeers};
pub use protocol::{
    ClientboundWaypoint, Icon, IconStyle, PresenceHandshake, PRESENCE_CHANNEL, PROTOCOL_VERSION,
};
pub use transmitter::{is_out_of_range, Waypoint, WaypointConnection, WaypointTransmitter};
pub use types::*;
