//! Lodestone compass tracking.
//!
//! [colors::ColorRegistry] decides which color every lodestone gets and remembers it.
//! [tracker::CompassTracker] scans each actor's compasses and keeps their waypoints in sync.
//! [marker] formats the coordinate line written onto the compasses.

pub mod colors;
pub mod marker;
pub mod tracker;

pub use colors::{ColorRegistry, ColorStore, DirColorStore, MemoryColorStore, PALETTE};
pub use tracker::{CompassTracker, ScanChanges, ScanReport, TrackerConfig};
