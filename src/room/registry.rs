//! Room Registry
//!
//! Owns one [`RaceEngine`] per room for single-threaded hosts. Rooms are
//! created on first use and destroyed on release.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::core::clock::Clock;
use crate::core::rng::derive_room_seed;
use crate::game::config::RaceConfig;
use crate::game::engine::RaceEngine;
use crate::game::state::{PlayerId, RoomId};
use crate::game::tick::TickResult;

/// Room id to engine map.
pub struct RoomRegistry {
    rooms: BTreeMap<RoomId, RaceEngine>,
    config: RaceConfig,
    clock: Arc<dyn Clock>,
    seed_salt: u64,
}

impl RoomRegistry {
    /// Create an empty registry. Every room gets `config` and a seed
    /// derived from `seed_salt` and its id.
    pub fn new(config: RaceConfig, clock: Arc<dyn Clock>, seed_salt: u64) -> Self {
        Self {
            rooms: BTreeMap::new(),
            config,
            clock,
            seed_salt,
        }
    }

    /// The engine for `room_id`, created if missing.
    pub fn acquire(&mut self, room_id: &str) -> &mut RaceEngine {
        let config = &self.config;
        let clock = &self.clock;
        let salt = self.seed_salt;

        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            let seed = derive_room_seed(salt, room_id);
            info!(room = room_id, seed, "room created");
            RaceEngine::new(room_id, seed, config.clone(), clock.clone())
        })
    }

    /// Existing engine, if any.
    pub fn get(&self, room_id: &str) -> Option<&RaceEngine> {
        self.rooms.get(room_id)
    }

    /// Existing engine, mutably.
    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut RaceEngine> {
        self.rooms.get_mut(room_id)
    }

    /// Destroy and forget a room. Returns whether it existed.
    pub fn release(&mut self, room_id: &str) -> bool {
        match self.rooms.remove(room_id) {
            Some(mut engine) => {
                engine.destroy();
                info!(room = room_id, "room released");
                true
            }
            None => false,
        }
    }

    /// Remove a player; release the room once nobody is left.
    ///
    /// Returns whether the room was released.
    pub fn leave(&mut self, room_id: &str, player_id: &PlayerId) -> bool {
        let Some(engine) = self.rooms.get_mut(room_id) else {
            return false;
        };

        engine.remove_player(player_id);
        if engine.view().players.is_empty() {
            return self.release(room_id);
        }
        false
    }

    /// Tick every room. Returns results for rooms where anything ran.
    pub fn tick_all(&mut self) -> Vec<(RoomId, TickResult)> {
        self.rooms
            .iter_mut()
            .map(|(id, engine)| (id.clone(), engine.tick()))
            .filter(|(_, result)| !result.is_idle())
            .collect()
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Is there a room with this id?
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Room ids in sorted order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::game::state::PlayerIdentity;

    fn registry() -> (RoomRegistry, ManualClock) {
        let clock = ManualClock::new(0);
        (RoomRegistry::new(RaceConfig::default(), Arc::new(clock.clone()), 7), clock)
    }

    #[test]
    fn test_acquire_reuses_room() {
        let (mut registry, _) = registry();

        registry.acquire("ABC123").add_player(PlayerIdentity::new("a", "A", "#fff", 0));
        let engine = registry.acquire("ABC123");

        assert_eq!(engine.players().len(), 1);
        assert_eq!(registry.room_count(), 1);
        assert!(registry.contains("ABC123"));
    }

    #[test]
    fn test_rooms_are_isolated() {
        let (mut registry, _) = registry();
        registry.acquire("one").add_player(PlayerIdentity::new("a", "A", "#fff", 0));
        registry.acquire("two");

        assert_eq!(registry.get("two").map(|e| e.players().len()), Some(0));
        assert_eq!(registry.room_ids(), vec!["one".to_string(), "two".to_string()]);
        assert_ne!(
            registry.get("one").map(|e| e.view().rng_seed),
            registry.get("two").map(|e| e.view().rng_seed)
        );
    }

    #[test]
    fn test_release_then_acquire_is_fresh() {
        let (mut registry, _) = registry();
        registry.acquire("r").add_player(PlayerIdentity::new("a", "A", "#fff", 0));

        assert!(registry.release("r"));
        assert!(!registry.release("r"));
        assert_eq!(registry.room_count(), 0);

        assert!(registry.acquire("r").players().is_empty());
    }

    #[test]
    fn test_leave_releases_empty_room() {
        let (mut registry, _) = registry();
        let engine = registry.acquire("r");
        engine.add_player(PlayerIdentity::new("a", "A", "#fff", 0));
        engine.add_player(PlayerIdentity::new("b", "B", "#fff", 0));

        assert!(!registry.leave("r", &PlayerId::from("a")));
        assert!(registry.contains("r"));
        assert!(registry.leave("r", &PlayerId::from("b")));
        assert!(!registry.contains("r"));
        assert!(!registry.leave("missing", &PlayerId::from("b")));
    }

    #[test]
    fn test_tick_all_only_reports_running_rooms() {
        let (mut registry, clock) = registry();
        let engine = registry.acquire("running");
        engine.add_player(PlayerIdentity::new("a", "A", "#fff", 0));
        engine.start_game();
        registry.acquire("idle");

        clock.advance(100);
        let results = registry.tick_all();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "running");
        assert_eq!(results[0].1.simulation_steps, 6);
    }
}
