use cap_std::fs_utf8::{camino::Utf8PathBuf, Dir};
use glam::{DVec3, IVec3};
use lode_compass::MemoryColorStore;
use lode_core::init::open_dir_at;
use lodebar::{LodebarConfig, Session, CONFIG_FILE_NAME};
use lodelink::{
    memory::{MemoryWorld, SimActor},
    ActorId, Capability, ClientboundWaypoint, Dimension, Icon, LandmarkPos, Marker, PresenceHandshake,
    Slot, WaypointId,
};
use rstest::*;
use similar_asserts::assert_eq;

fn lodestone() -> LandmarkPos {
    LandmarkPos::new(Dimension::overworld(), IVec3::new(10, 64, 10))
}

#[fixture]
fn alice() -> ActorId {
    lodebar::actor_id("alice")
}

#[fixture]
fn world(alice: ActorId) -> MemoryWorld {
    let world = MemoryWorld::default();
    world.add_actor(alice, SimActor::new(Dimension::overworld(), DVec3::ZERO));
    world.place_landmark(lodestone());
    world.set_slot(alice, Slot::MainHand, Marker::pointing_at(lodestone()));
    world
}

#[fixture]
fn session() -> Session {
    Session::new(&LodebarConfig::default(), MemoryColorStore::default())
}

#[rstest]
fn handshake_upgrades_existing_waypoints(
    alice: ActorId,
    world: MemoryWorld,
    session: Session,
) {
    let color = session.landmark_placed(&world, &lodestone());
    session.actor_join(&world, alice);
    let id = WaypointId::for_landmark(alice, &lodestone());
    assert_eq!(
        world.drain_packets(alice),
        vec![ClientboundWaypoint::Track {
            id,
            icon: Icon::bare(),
            pos: IVec3::new(10, 64, 10),
        }]
    );

    session.presence_handshake(&world, alice, PresenceHandshake);
    assert_eq!(
        world.drain_packets(alice),
        vec![
            ClientboundWaypoint::Untrack { id },
            ClientboundWaypoint::Track {
                id,
                icon: Icon::lodestone(color),
                pos: IVec3::new(10, 64, 10),
            },
        ]
    );
    // a second handshake changes nothing
    session.presence_handshake(&world, alice, PresenceHandshake);
    assert!(world.drain_packets(alice).is_empty());
}

#[rstest]
fn handshake_leaves_other_actors_waypoints_alone(
    alice: ActorId,
    world: MemoryWorld,
    session: Session,
) {
    let bob = lodebar::actor_id("bob");
    world.add_actor(bob, SimActor::new(Dimension::overworld(), DVec3::ZERO));
    world.set_slot(bob, Slot::OffHand, Marker::pointing_at(lodestone()));
    session.landmark_placed(&world, &lodestone());
    session.actor_join(&world, alice);
    session.actor_join(&world, bob);
    world.drain_packets(alice);
    world.drain_packets(bob);
    let calls = world.broadcast_calls();

    session.presence_handshake(&world, alice, PresenceHandshake);
    assert_eq!(world.drain_packets(alice).len(), 2);
    assert!(world.drain_packets(bob).is_empty());
    // one untrack and one track, both for alice's waypoint
    assert_eq!(world.broadcast_calls(), (calls.0 + 1, calls.1 + 1));
    assert_eq!(
        session.tracker().waypoint_ids(bob),
        vec![WaypointId::for_landmark(bob, &lodestone())]
    );
}

#[rstest]
fn leaving_forgets_the_handshake(alice: ActorId, world: MemoryWorld, session: Session) {
    session.actor_join(&world, alice);
    session.presence_handshake(&world, alice, PresenceHandshake);
    assert_eq!(session.peers().capability(alice), Capability::Extended);
    session.actor_leave(&world, alice);
    assert_eq!(session.peers().capability(alice), Capability::Vanilla);
    assert!(session.tracker().waypoints_of(alice).is_empty());
    assert!(world.tracked_waypoints().is_empty());
}

#[rstest]
fn placing_colors_waypoints_that_already_point_there(
    alice: ActorId,
    world: MemoryWorld,
    session: Session,
) {
    // the block existed before the session, so it has no color yet
    session.actor_join(&world, alice);
    session.presence_handshake(&world, alice, PresenceHandshake);
    assert_eq!(
        session.tracker().waypoints_of(alice)[0].icon(),
        Icon::lodestone(session.tracker().config().default_color)
    );
    let color = session.landmark_placed(&world, &lodestone());
    assert_eq!(
        session.tracker().waypoints_of(alice)[0].icon(),
        Icon::lodestone(color)
    );
    assert_eq!(session.colors().color(&lodestone()), Some(color));
}

#[rstest]
fn breaking_forgets_the_color(alice: ActorId, world: MemoryWorld, session: Session) {
    session.landmark_placed(&world, &lodestone());
    session.actor_join(&world, alice);
    world.break_landmark(&lodestone());
    assert_eq!(session.landmark_broken(&world, &lodestone()), 1);
    assert!(session.colors().is_empty());
}

#[rstest]
fn tick_only_reports_due_actors(alice: ActorId, world: MemoryWorld, session: Session) {
    session.actor_join(&world, alice);
    let reports = (0..40)
        .map(|_| session.tick(&world).len())
        .collect::<Vec<_>>();
    assert_eq!(reports.iter().sum::<usize>(), 2);
    assert_eq!(reports[19], 1);
    assert_eq!(reports[39], 1);
}

#[rstest]
fn session_uses_the_data_dir(alice: ActorId, world: MemoryWorld) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = Utf8PathBuf::try_from(tmp.path().to_path_buf()).expect("non utf-8 temp dir");
    let dir: Dir = open_dir_at(path).expect("failed to open temp dir");
    dir.write(CONFIG_FILE_NAME, r#"{"colors_file": "colors.json"}"#)
        .unwrap();

    let config = LodebarConfig::load(&dir).unwrap();
    assert_eq!(config.tracker.scan_interval_ticks, 20);
    let color = {
        let session = Session::open(&dir, &config).unwrap();
        session.actor_join(&world, alice);
        session.landmark_placed(&world, &lodestone())
    };
    assert!(dir.exists("colors.json"));
    let session = Session::open(&dir, &config).unwrap();
    assert_eq!(session.colors().color(&lodestone()), Some(color));
}
