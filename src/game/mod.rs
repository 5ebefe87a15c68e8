//! Game Logic Module
//!
//! All race simulation code. Deterministic for a given seed, clock script
//! and command sequence.
//!
//! ## Module Structure
//!
//! - `config`: Tuning constants and `RaceConfig`
//! - `state`: Race state, player state, track objects
//! - `events`: Race events and the bounded event log
//! - `spawn`: Seeded obstacle/token spawning
//! - `motion`: Object motion, culling, speed ramp
//! - `collision`: Player-vs-object contact
//! - `progress`: Distance accrual and finish detection
//! - `ranking`: Live standings order
//! - `tick`: Cadence scheduler, lifecycle and the tick entry point
//! - `bus`: Snapshot subscribers
//! - `results`: Standings rows for leaderboards
//! - `engine`: `RaceEngine`, the per-room façade

pub mod config;
pub mod state;
pub mod events;
pub mod spawn;
pub mod motion;
pub mod collision;
pub mod progress;
pub mod ranking;
pub mod tick;
pub mod bus;
pub mod results;
pub mod engine;

// Re-export key types
pub use config::{ConfigError, RaceConfig};
pub use state::{
    GameObject, ObjectKind, PlayerId, PlayerIdentity, PlayerState, RacePhase, RaceSnapshot, RaceState, RoomId,
};
pub use events::{EventLog, EventPayload, RaceEvent, RaceEventKind};
pub use tick::{CompletionReason, Scheduler, TickResult};
pub use bus::{SubscriberBus, Subscription};
pub use results::Standing;
pub use engine::{RaceEngine, Steer};
