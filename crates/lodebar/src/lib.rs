mod app;

pub use app::{
    config::{LodebarConfig, CONFIG_FILE_NAME},
    scenario::{actor_id, Scenario, SimulationLog, Simulator, Step},
    start_lodebar, Session,
};
