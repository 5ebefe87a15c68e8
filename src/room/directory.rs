//! Room Directory
//!
//! Async counterpart of the registry: each room runs in its own driver task
//! and is reached through a [`RoomHandle`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::clock::Clock;
use crate::core::rng::derive_room_seed;
use crate::game::config::RaceConfig;
use crate::game::engine::RaceEngine;
use crate::game::state::{PlayerId, RoomId};
use crate::room::driver::{spawn_room, DriverConfig, RoomError, RoomHandle};

/// Length of generated room codes.
const ROOM_CODE_LEN: usize = 6;

struct RoomEntry {
    handle: RoomHandle,
    task: JoinHandle<()>,
}

/// Directory of running rooms.
pub struct RoomDirectory {
    rooms: RwLock<BTreeMap<RoomId, RoomEntry>>,
    config: RaceConfig,
    driver: DriverConfig,
    clock: Arc<dyn Clock>,
    seed_salt: u64,
}

impl RoomDirectory {
    /// Create an empty directory.
    pub fn new(config: RaceConfig, driver: DriverConfig, clock: Arc<dyn Clock>, seed_salt: u64) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            config,
            driver,
            clock,
            seed_salt,
        }
    }

    fn start_room(&self, room_id: &str) -> RoomEntry {
        let seed = derive_room_seed(self.seed_salt, room_id);
        let engine = RaceEngine::new(room_id, seed, self.config.clone(), self.clock.clone());
        let (handle, task) = spawn_room(engine, &self.driver);
        info!(room = room_id, seed, "room opened");
        RoomEntry { handle, task }
    }

    /// Handle for `room_id`, starting a driver if needed.
    pub async fn acquire(&self, room_id: &str) -> RoomHandle {
        let mut rooms = self.rooms.write().await;

        if let Some(entry) = rooms.get(room_id) {
            if !entry.handle.is_closed() {
                return entry.handle.clone();
            }
        }

        let entry = self.start_room(room_id);
        let handle = entry.handle.clone();
        rooms.insert(room_id.to_string(), entry);
        handle
    }

    /// Open a room under a fresh random code.
    pub async fn open_room(&self) -> RoomHandle {
        let mut rooms = self.rooms.write().await;

        let room_id = loop {
            let code = new_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let entry = self.start_room(&room_id);
        let handle = entry.handle.clone();
        rooms.insert(room_id, entry);
        handle
    }

    /// Existing handle, if any.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|entry| entry.handle.clone())
    }

    /// Shut a room down and forget it. Returns whether it existed.
    pub async fn release(&self, room_id: &str) -> bool {
        let entry = {
            let mut rooms = self.rooms.write().await;
            rooms.remove(room_id)
        };

        let Some(entry) = entry else {
            return false;
        };

        match entry.handle.shutdown().await {
            Ok(()) | Err(RoomError::Closed) => {}
            Err(e) => warn!(room = room_id, error = %e, "room shutdown incomplete"),
        }
        if let Err(e) = entry.task.await {
            warn!(room = room_id, error = %e, "room driver task failed");
        }
        info!(room = room_id, "room released");
        true
    }

    /// Remove a player; release the room once nobody is left.
    ///
    /// The directory stays locked until the room is gone, so a concurrent
    /// `acquire` gets either the occupied room or a fresh one.
    ///
    /// Returns whether the room was released.
    pub async fn leave(&self, room_id: &str, player_id: PlayerId) -> Result<bool, RoomError> {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get(room_id) else {
            return Ok(false);
        };

        if entry.handle.leave(player_id).await? > 0 {
            return Ok(false);
        }

        let Some(entry) = rooms.remove(room_id) else {
            return Ok(false);
        };
        drop(rooms);

        if let Err(e) = entry.task.await {
            warn!(room = room_id, error = %e, "room driver task failed");
        }
        info!(room = room_id, "room released");
        Ok(true)
    }

    /// Number of rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Room ids in sorted order.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Forget rooms whose driver task has exited. Returns how many.
    pub async fn cleanup(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, entry| !entry.task.is_finished());
        before - rooms.len()
    }
}

/// Uppercase alphanumeric room code from a v4 uuid.
fn new_room_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ROOM_CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}
