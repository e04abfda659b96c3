use miette::Diagnostic;
use thiserror::Error;

use crate::{ActorId, Slot};

/// Failures reported by the host world while we read inventories, look up blocks or register waypoints.
/// These are all considered transient. The caller logs them and retries on the next scan.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("world is not available right now")]
    #[diagnostic(code(host_error::world_unavailable))]
    WorldUnavailable,
    #[error("actor is not online: {0}")]
    #[diagnostic(code(host_error::actor_offline))]
    ActorOffline(ActorId),
    #[error("slot {slot:?} of actor {actor} is empty")]
    #[diagnostic(code(host_error::empty_slot))]
    EmptySlot { actor: ActorId, slot: Slot },
    #[error("connection to {0} is closed")]
    #[diagnostic(code(host_error::connection_closed))]
    ConnectionClosed(ActorId),
}
