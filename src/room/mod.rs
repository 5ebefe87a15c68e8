//! Room Management
//!
//! Maps room codes to race engines.
//!
//! - `registry`: Synchronous owner of engines for single-threaded hosts
//! - `driver`: One tokio task per room, commands over a queue
//! - `directory`: Async map of room codes to driver handles

pub mod registry;
pub mod driver;
pub mod directory;

pub use registry::RoomRegistry;
pub use driver::{spawn_room, DriverConfig, RoomError, RoomHandle};
pub use directory::RoomDirectory;
