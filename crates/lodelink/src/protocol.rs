//! Messages exchanged with the receiving client.
//!
//! Framing and transport belong to the host. We only decide *what* is sent and to *whom*.
//! Everything here is serde-serializable so the host can pick whatever encoding it uses.

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::{Rgb, WaypointId};

pub const PROTOCOL_VERSION: &str = "1.0";
/// Channel on which a client announces that it understands lodestone icons.
pub const PRESENCE_CHANNEL: &str = "lodebar:mod_present";

/// Which sprite set the client should use for the waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconStyle {
    /// the stock style every client ships with
    #[default]
    Default,
    /// our own style. Only clients with the extension have the sprites for it.
    Lodestone,
}

impl IconStyle {
    pub fn resource_key(self) -> &'static str {
        match self {
            IconStyle::Default => "minecraft:default",
            IconStyle::Lodestone => "lodebar:lodestone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Icon {
    pub style: IconStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl Icon {
    pub fn lodestone(color: Rgb) -> Self {
        Self {
            style: IconStyle::Lodestone,
            color: Some(color),
        }
    }
    /// what unmodded clients get. no style, no color.
    pub fn bare() -> Self {
        Self::default()
    }
}

/// server -> client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientboundWaypoint {
    /// add the waypoint, or replace it if the id is already known
    Track {
        id: WaypointId,
        icon: Icon,
        pos: IVec3,
    },
    Untrack {
        id: WaypointId,
    },
}

impl ClientboundWaypoint {
    pub fn id(&self) -> WaypointId {
        match self {
            ClientboundWaypoint::Track { id, .. } | ClientboundWaypoint::Untrack { id } => *id,
        }
    }
}

/// client -> server. sent once per connection, has no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceHandshake;
