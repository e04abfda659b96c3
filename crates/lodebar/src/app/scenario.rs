//! Replays a json scenario against [MemoryWorld] so the whole stack can be watched without a game server.
//!
//! ```json
//! { "steps": [
//!     { "step": "place", "landmark": { "dimension": "minecraft:overworld", "pos": [10, 64, 10] } },
//!     { "step": "join", "actor": "alice" },
//!     { "step": "give", "actor": "alice", "slot": "main_hand",
//!       "marker": { "target": { "dimension": "minecraft:overworld", "pos": [10, 64, 10] } } },
//!     { "step": "tick", "count": 20 }
//! ] }
//! ```

use std::collections::BTreeMap;

use glam::DVec3;
use lodelink::{
    memory::{MemoryWorld, SimActor},
    ActorId, ClientboundWaypoint, Dimension, LandmarkPos, Marker, PresenceHandshake, Slot,
};
use miette::{bail, Result};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use super::Session;

/// Actors are named in scenarios. The id is derived from the name so it is the same in every run.
pub fn actor_id(name: &str) -> ActorId {
    ActorId(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Join {
        actor: SmolStr,
        #[serde(default = "Dimension::overworld")]
        dimension: Dimension,
        #[serde(default)]
        position: DVec3,
    },
    Leave {
        actor: SmolStr,
    },
    /// the actor's client sends the presence handshake
    Handshake {
        actor: SmolStr,
    },
    Give {
        actor: SmolStr,
        slot: Slot,
        marker: Marker,
    },
    Take {
        actor: SmolStr,
        slot: Slot,
    },
    Move {
        actor: SmolStr,
        position: DVec3,
    },
    Place {
        landmark: LandmarkPos,
    },
    Break {
        landmark: LandmarkPos,
    },
    /// advance the server by `count` ticks
    Tick {
        #[serde(default = "one_tick")]
        count: u32,
    },
}

fn one_tick() -> u32 {
    1
}

/// packets every actor received, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationLog {
    pub packets: BTreeMap<SmolStr, Vec<ClientboundWaypoint>>,
}

impl SimulationLog {
    pub fn packet_count(&self) -> usize {
        self.packets.values().map(Vec::len).sum()
    }
}

pub struct Simulator {
    world: MemoryWorld,
    session: Session,
    names: BTreeMap<ActorId, SmolStr>,
    log: SimulationLog,
}

impl Simulator {
    pub fn new(session: Session) -> Self {
        Self {
            world: MemoryWorld::default(),
            session,
            names: Default::default(),
            log: Default::default(),
        }
    }

    pub fn world(&self) -> &MemoryWorld {
        &self.world
    }
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs every step and returns the packets delivered during this run.
    pub fn run(&mut self, scenario: &Scenario) -> Result<SimulationLog> {
        for (index, step) in scenario.steps.iter().enumerate() {
            let _span = info_span!("step", index).entered();
            self.apply(step)?;
        }
        Ok(std::mem::take(&mut self.log))
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        debug!(?step, "applying step");
        match step {
            Step::Join {
                actor,
                dimension,
                position,
            } => {
                let id = actor_id(actor);
                if self.names.contains_key(&id) {
                    bail!("{actor} already joined");
                }
                self.world
                    .add_actor(id, SimActor::new(dimension.clone(), *position));
                self.names.insert(id, actor.clone());
                self.session.actor_join(&self.world, id);
            }
            Step::Leave { actor } => {
                let id = self.online(actor)?;
                self.session.actor_leave(&self.world, id);
                // the untrack packets are the last thing the client hears
                self.flush_packets();
                self.world.remove_actor(id);
                self.names.remove(&id);
            }
            Step::Handshake { actor } => {
                let id = self.online(actor)?;
                self.session
                    .presence_handshake(&self.world, id, PresenceHandshake);
            }
            Step::Give {
                actor,
                slot,
                marker,
            } => {
                let id = self.online(actor)?;
                self.world.set_slot(id, *slot, marker.clone());
            }
            Step::Take { actor, slot } => {
                let id = self.online(actor)?;
                self.world.clear_slot(id, *slot);
            }
            Step::Move { actor, position } => {
                let id = self.online(actor)?;
                self.world.move_actor(id, *position);
            }
            Step::Place { landmark } => {
                self.world.place_landmark(landmark.clone());
                let color = self.session.landmark_placed(&self.world, landmark);
                info!(%landmark, %color, "lodestone placed");
            }
            Step::Break { landmark } => {
                self.world.break_landmark(landmark);
                let invalidated = self.session.landmark_broken(&self.world, landmark);
                info!(%landmark, invalidated, "lodestone broken");
            }
            Step::Tick { count } => {
                for _ in 0..*count {
                    self.session.tick(&self.world);
                    self.world.tick_broadcast();
                    self.flush_packets();
                }
            }
        }
        self.flush_packets();
        Ok(())
    }

    fn online(&self, name: &str) -> Result<ActorId> {
        let id = actor_id(name);
        if !self.names.contains_key(&id) {
            bail!("{name} is not online");
        }
        Ok(id)
    }

    fn flush_packets(&mut self) {
        for (id, name) in self.names.iter() {
            for packet in self.world.drain_packets(*id) {
                info!(actor = %name, ?packet, "packet delivered");
                self.log.packets.entry(name.clone()).or_default().push(packet);
            }
        }
    }
}
