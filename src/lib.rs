//! # Lane Racer Server
//!
//! Authoritative race engine for Lane Racer, a multiplayer lane-dodging
//! racing game. Each room runs one engine that owns the roster, the falling
//! obstacles and tokens, collisions, distance, rankings and the race
//! lifecycle, and pushes snapshots to subscribers after every change.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LANE RACER SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xoroshiro128+ PRNG, room seeds     │
//! │  ├── hash.rs     - State hashing for replay checks           │
//! │  └── clock.rs    - Injectable millisecond clock              │
//! │                                                              │
//! │  game/           - Race logic (deterministic)                │
//! │  ├── config.rs   - Tuning constants, RaceConfig              │
//! │  ├── state.rs    - Race, player and object state             │
//! │  ├── events.rs   - Race events, bounded event log            │
//! │  ├── spawn.rs    - Obstacle/token spawning                   │
//! │  ├── motion.rs   - Object motion, speed ramp                 │
//! │  ├── collision.rs- Player-vs-object contact                  │
//! │  ├── progress.rs - Distance and finish detection             │
//! │  ├── ranking.rs  - Live standings                            │
//! │  ├── tick.rs     - Cadence scheduler and lifecycle           │
//! │  ├── bus.rs      - Snapshot subscribers                      │
//! │  └── engine.rs   - RaceEngine façade                         │
//! │                                                              │
//! │  room/           - Room management                           │
//! │  ├── registry.rs - Sync room map                             │
//! │  ├── driver.rs   - One tokio task per room                   │
//! │  └── directory.rs- Async room map                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The engine never reads the wall clock or a global RNG directly:
//! - Time comes from a [`core::Clock`]
//! - Randomness comes from the room's seeded [`DeterministicRng`]
//! - Periodic duties run at their scheduled instants, not at call time
//! - Players are iterated in join order
//!
//! Given the same seed, clock script and command sequence, two engines
//! produce the same [`RaceEngine::digest`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod room;

// Re-export commonly used types
pub use core::clock::{Clock, ManualClock, Millis, SystemClock};
pub use core::rng::DeterministicRng;
pub use game::config::RaceConfig;
pub use game::engine::{RaceEngine, Steer};
pub use game::state::{ObjectKind, PlayerId, PlayerIdentity, PlayerState, RaceSnapshot};
pub use room::{RoomDirectory, RoomRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz), rounded from the 16 ms step
pub const TICK_RATE: u32 = 60;
