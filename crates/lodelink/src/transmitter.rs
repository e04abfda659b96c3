use std::sync::Arc;

use tracing::{trace, warn};

use crate::{
    ActorId, Capability, ClientboundWaypoint, Icon, LandmarkPos, ModdedPeers, Receiver,
    WaypointId,
};

/// Everything a connection needs to know about the waypoint it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waypoint {
    pub id: WaypointId,
    pub target: LandmarkPos,
    pub icon: Icon,
    /// maximum visible range in blocks
    pub range: u32,
    /// the only actor that will ever see this waypoint
    pub owner: ActorId,
}

/// A waypoint registered with the host's broadcast facility.
/// It only ever opens a connection to its owner.
#[derive(Debug)]
pub struct WaypointTransmitter {
    waypoint: Waypoint,
    peers: Arc<ModdedPeers>,
}

impl WaypointTransmitter {
    pub fn new(waypoint: Waypoint, peers: Arc<ModdedPeers>) -> Self {
        Self { waypoint, peers }
    }
    pub fn is_transmitting(&self) -> bool {
        true
    }
    pub fn make_connection(&self, receiver: &dyn Receiver) -> Option<WaypointConnection> {
        if receiver.actor_id() != self.waypoint.owner {
            return None;
        }
        Some(WaypointConnection {
            waypoint: self.waypoint.clone(),
            receiver: receiver.actor_id(),
            peers: self.peers.clone(),
        })
    }
    pub fn icon(&self) -> Icon {
        self.waypoint.icon
    }
    pub fn id(&self) -> WaypointId {
        self.waypoint.id
    }
    pub fn target(&self) -> &LandmarkPos {
        &self.waypoint.target
    }
    pub fn owner(&self) -> ActorId {
        self.waypoint.owner
    }
    pub fn waypoint(&self) -> &Waypoint {
        &self.waypoint
    }
}

/// One open connection between a waypoint and its receiver.
/// The host recreates these whenever the receiver moves in and out of range, so nothing here outlives a tick.
#[derive(Debug, Clone)]
pub struct WaypointConnection {
    waypoint: Waypoint,
    receiver: ActorId,
    peers: Arc<ModdedPeers>,
}

impl WaypointConnection {
    pub fn receiver(&self) -> ActorId {
        self.receiver
    }
    pub fn waypoint(&self) -> &Waypoint {
        &self.waypoint
    }
    pub fn connect(&self, receiver: &dyn Receiver) {
        send_track(&self.waypoint, self.peers.capability(self.receiver), receiver);
    }
    pub fn update(&self, receiver: &dyn Receiver) {
        send_track(&self.waypoint, self.peers.capability(self.receiver), receiver);
    }
    pub fn disconnect(&self, receiver: &dyn Receiver) {
        send(
            receiver,
            ClientboundWaypoint::Untrack {
                id: self.waypoint.id,
            },
        );
    }
    /// the receiver moved out of the smaller of our range and its own receive range
    pub fn is_broken(&self, receiver: &dyn Receiver) -> bool {
        is_out_of_range(&self.waypoint, receiver)
    }
}

pub fn is_out_of_range(waypoint: &Waypoint, receiver: &dyn Receiver) -> bool {
    let range = (waypoint.range as f64).min(receiver.receive_range());
    receiver
        .position()
        .distance_squared(waypoint.target.center())
        >= range * range
}

fn send_track(waypoint: &Waypoint, capability: Capability, receiver: &dyn Receiver) {
    let icon = match capability {
        Capability::Extended => waypoint.icon,
        Capability::Vanilla => Icon::bare(),
    };
    send(
        receiver,
        ClientboundWaypoint::Track {
            id: waypoint.id,
            icon,
            pos: waypoint.target.pos,
        },
    );
}

fn send(receiver: &dyn Receiver, packet: ClientboundWaypoint) {
    trace!(receiver = %receiver.actor_id(), ?packet, "sending waypoint packet");
    if let Err(e) = receiver.send(packet) {
        // the broadcast facility will reconnect when it notices
        warn!(?e, receiver = %receiver.actor_id(), "failed to send waypoint packet");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Dimension, HostError, Rgb};
    use glam::{DVec3, IVec3};
    use rstest::*;
    use similar_asserts::assert_eq;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct TestReceiver {
        id: ActorId,
        position: DVec3,
        receive_range: f64,
        sent: Mutex<Vec<ClientboundWaypoint>>,
    }
    impl Receiver for TestReceiver {
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
            self.sent.lock().unwrap().push(packet);
            Ok(())
        }
    }

    const OWNER: ActorId = ActorId(Uuid::from_u128(7));
    const STRANGER: ActorId = ActorId(Uuid::from_u128(8));

    fn receiver(id: ActorId, position: DVec3) -> TestReceiver {
        TestReceiver {
            id,
            position,
            receive_range: 60_000_000.0,
            sent: Default::default(),
        }
    }

    #[fixture]
    fn waypoint() -> Waypoint {
        let target = LandmarkPos::new(Dimension::overworld(), IVec3::new(10, 64, 10));
        Waypoint {
            id: WaypointId::for_landmark(OWNER, &target),
            target,
            icon: Icon::lodestone(Rgb::new(0x44FF44)),
            range: 60_000_000,
            owner: OWNER,
        }
    }

    #[rstest]
    fn only_the_owner_gets_a_connection(waypoint: Waypoint) {
        let transmitter = WaypointTransmitter::new(waypoint, Default::default());
        assert!(transmitter.is_transmitting());
        assert!(transmitter
            .make_connection(&receiver(STRANGER, DVec3::ZERO))
            .is_none());
        let connection = transmitter
            .make_connection(&receiver(OWNER, DVec3::ZERO))
            .expect("owner must get a connection");
        assert_eq!(connection.receiver(), OWNER);
    }

    #[rstest]
    fn vanilla_receivers_get_a_bare_icon(waypoint: Waypoint) {
        let transmitter = WaypointTransmitter::new(waypoint.clone(), Default::default());
        let owner = receiver(OWNER, DVec3::ZERO);
        let connection = transmitter.make_connection(&owner).unwrap();
        connection.connect(&owner);
        connection.disconnect(&owner);
        assert_eq!(
            *owner.sent.lock().unwrap(),
            vec![
                ClientboundWaypoint::Track {
                    id: waypoint.id,
                    icon: Icon::bare(),
                    pos: IVec3::new(10, 64, 10),
                },
                ClientboundWaypoint::Untrack { id: waypoint.id },
            ]
        );
    }

    #[rstest]
    fn extended_receivers_get_the_full_icon(waypoint: Waypoint) {
        let peers = Arc::new(ModdedPeers::default());
        peers.mark_extended(OWNER);
        let transmitter = WaypointTransmitter::new(waypoint.clone(), peers);
        let owner = receiver(OWNER, DVec3::ZERO);
        let connection = transmitter.make_connection(&owner).unwrap();
        connection.update(&owner);
        assert_eq!(
            *owner.sent.lock().unwrap(),
            vec![ClientboundWaypoint::Track {
                id: waypoint.id,
                icon: Icon::lodestone(Rgb::new(0x44FF44)),
                pos: IVec3::new(10, 64, 10),
            }]
        );
    }

    #[rstest]
    #[case(60_000_000, 100.0, DVec3::new(10.5, 64.5, 109.0), false)]
    #[case(60_000_000, 100.0, DVec3::new(10.5, 64.5, 110.5), true)]
    #[case(50, 100.0, DVec3::new(10.5, 64.5, 70.0), true)]
    #[case(50, 100.0, DVec3::new(10.5, 64.5, 50.0), false)]
    fn broken_uses_the_smaller_range(
        waypoint: Waypoint,
        #[case] range: u32,
        #[case] receive_range: f64,
        #[case] position: DVec3,
        #[case] broken: bool,
    ) {
        let mut waypoint = waypoint;
        waypoint.range = range;
        let transmitter = WaypointTransmitter::new(waypoint, Default::default());
        let mut owner = receiver(OWNER, position);
        owner.receive_range = receive_range;
        let connection = transmitter.make_connection(&owner).unwrap();
        assert_eq!(connection.is_broken(&owner), broken);
    }
}
