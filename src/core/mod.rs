//! Core deterministic primitives.
//!
//! Seeded randomness, state hashing and injectable time. Nothing in here
//! knows about races; the game layer builds on these.

pub mod clock;
pub mod hash;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use hash::{compute_state_hash, StateHash, StateHasher};
pub use rng::{derive_room_seed, DeterministicRng};
