use dashmap::DashSet;
use tracing::debug;

use crate::ActorId;

/// What a receiving client can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// client sent the presence handshake and knows our icon style
    Extended,
    /// stock client. only gets bare icons
    Vanilla,
}

/// Actors whose client completed the presence handshake on the current connection.
/// Written from network handlers, read from the tick thread.
#[derive(Debug, Default)]
pub struct ModdedPeers {
    peers: DashSet<ActorId>,
}

impl ModdedPeers {
    /// returns true if this is the first handshake of the actor's session
    pub fn mark_extended(&self, actor: ActorId) -> bool {
        let new = self.peers.insert(actor);
        if new {
            debug!(%actor, "actor announced extension support");
        }
        new
    }
    pub fn capability(&self, actor: ActorId) -> Capability {
        if self.peers.contains(&actor) {
            Capability::Extended
        } else {
            Capability::Vanilla
        }
    }
    /// The handshake is per connection, so it has to be forgotten when the actor leaves.
    pub fn forget(&self, actor: ActorId) {
        self.peers.remove(&actor);
    }
    pub fn len(&self) -> usize {
        self.peers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
