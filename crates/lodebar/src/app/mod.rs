use std::sync::Arc;

use cap_std::fs_utf8::Dir;
use lode_compass::{
    colors::{ColorStore, DirColorStore},
    ColorRegistry, CompassTracker, ScanReport,
};
use lode_core::{
    init::get_lodebar_dir,
    trace::{install_miette_panic_hooks, install_tracing},
};
use lodelink::{ActorId, LandmarkPos, ModdedPeers, PresenceHandshake, Rgb, World};
use miette::{Context, IntoDiagnostic, Result};
use tracing::{debug, error, info};

pub mod config;
pub mod scenario;

use config::LodebarConfig;
use scenario::{Scenario, Simulator};

/// The services of one server session and the hooks the host calls into.
/// The host owns the threads, every hook returns before the host's tick continues.
pub struct Session {
    colors: Arc<ColorRegistry>,
    peers: Arc<ModdedPeers>,
    tracker: CompassTracker,
}

impl Session {
    pub fn new(config: &LodebarConfig, store: impl ColorStore + 'static) -> Self {
        let colors = Arc::new(ColorRegistry::open(store));
        let peers = Arc::new(ModdedPeers::default());
        let tracker = CompassTracker::new(config.tracker.clone(), colors.clone(), peers.clone());
        Self {
            colors,
            peers,
            tracker,
        }
    }

    /// colors are kept in `config.colors_file` inside `dir`
    pub fn open(dir: &Dir, config: &LodebarConfig) -> Result<Self> {
        let dir = dir
            .try_clone()
            .into_diagnostic()
            .wrap_err("failed to clone data dir handle")?;
        Ok(Self::new(
            config,
            DirColorStore::new(dir, config.colors_file.clone()),
        ))
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }
    pub fn peers(&self) -> &ModdedPeers {
        &self.peers
    }
    pub fn tracker(&self) -> &CompassTracker {
        &self.tracker
    }

    /// A lodestone block was placed. Gets a color right away and waypoints already pointing here pick it up.
    pub fn landmark_placed(&self, world: &dyn World, pos: &LandmarkPos) -> Rgb {
        let color = self.colors.assign_color(pos);
        self.tracker.refresh_waypoints_for_landmark(world, pos);
        color
    }

    /// A lodestone block was broken. Returns the number of compasses invalidated.
    pub fn landmark_broken(&self, world: &dyn World, pos: &LandmarkPos) -> usize {
        self.colors.remove(pos);
        self.tracker.update_compasses_for_broken_landmark(world, pos)
    }

    pub fn actor_tick(&self, world: &dyn World, actor: ActorId) -> Option<ScanReport> {
        self.tracker.on_actor_tick(world, actor)
    }

    /// [Self::actor_tick] for every online actor
    pub fn tick(&self, world: &dyn World) -> Vec<(ActorId, ScanReport)> {
        self.tracker
            .online_actors()
            .into_iter()
            .filter_map(|actor| self.actor_tick(world, actor).map(|report| (actor, report)))
            .collect()
    }

    pub fn actor_join(&self, world: &dyn World, actor: ActorId) -> ScanReport {
        self.tracker.on_actor_join(world, actor)
    }

    pub fn actor_leave(&self, world: &dyn World, actor: ActorId) {
        self.tracker.on_actor_leave(world, actor);
        self.peers.forget(actor);
    }

    /// The actor's client announced the extension. Only its own waypoints are recreated so the next
    /// connection carries the full icon.
    pub fn presence_handshake(&self, world: &dyn World, actor: ActorId, _: PresenceHandshake) {
        if !self.peers.mark_extended(actor) {
            debug!(%actor, "repeated presence handshake");
            return;
        }
        self.tracker.refresh_actor_waypoints(world, actor);
    }
}

/// `lodebar <scenario.json>`. Replays the scenario against an in-memory world.
pub fn start_lodebar() -> Result<()> {
    let ldir = get_lodebar_dir().wrap_err("failed to open lodebar data dir")?;
    let log_file_flush_guard = install_tracing(&ldir)?;
    if let Err(e) = install_miette_panic_hooks() {
        error!(?e, "failed to install panic hooks");
    }

    let result = run_scenario_from_args(&ldir);
    if let Err(e) = &result {
        error!(?e, "lodebar failed");
    }
    std::mem::drop(log_file_flush_guard);
    result
}

fn run_scenario_from_args(ldir: &Dir) -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| miette::miette!("usage: lodebar <scenario.json>"))?;
    let json = std::fs::read_to_string(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read scenario {path}"))?;
    let scenario: Scenario = serde_json::from_str(&json)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse scenario {path}"))?;

    let config = LodebarConfig::load(ldir)?;
    let session = Session::open(ldir, &config)?;
    let mut simulator = Simulator::new(session);
    let log = simulator.run(&scenario)?;
    info!(
        steps = scenario.steps.len(),
        packets = log.packet_count(),
        "scenario finished"
    );
    for (pos, color) in simulator.session().colors().landmarks() {
        info!(%pos, %color, "registered lodestone");
    }
    Ok(())
}
