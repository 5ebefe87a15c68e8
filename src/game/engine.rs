//! Race Engine
//!
//! One room's authoritative race: owns the state, the cadence scheduler and
//! the subscriber bus. Every mutating command ends with exactly one
//! snapshot delivery. Commands that would be illegal (unknown player,
//! starting a running race) are ignored and logged rather than failing.

use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::clock::{Clock, Millis};
use crate::core::hash::StateHash;
use crate::game::bus::{SubscriberBus, Subscription};
use crate::game::config::RaceConfig;
use crate::game::events::RaceEvent;
use crate::game::ranking::assign_ranks;
use crate::game::results::{standings, Standing};
use crate::game::state::{
    clamp_lane, ObjectKind, PlayerId, PlayerIdentity, PlayerState, RacePhase, RaceSnapshot, RaceState, RoomId,
};
use crate::game::tick::{self, begin_race, complete_race, halt_race, CompletionReason, Scheduler, TickResult};

/// Lane change direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Steer {
    /// One lane step left
    Left,
    /// One lane step right
    Right,
}

/// Authoritative race for one room.
pub struct RaceEngine {
    state: RaceState,
    config: RaceConfig,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    bus: SubscriberBus,
    destroyed: bool,
}

impl std::fmt::Debug for RaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceEngine")
            .field("room_id", &self.state.room_id)
            .field("phase", &self.state.phase)
            .field("players", &self.state.players.len())
            .field("subscribers", &self.bus.len())
            .finish()
    }
}

impl RaceEngine {
    /// Create an idle engine.
    pub fn new(room_id: impl Into<RoomId>, seed: u64, config: RaceConfig, clock: Arc<dyn Clock>) -> Self {
        let state = RaceState::new(room_id, seed, &config);
        let scheduler = Scheduler::new(&config);
        Self {
            state,
            config,
            scheduler,
            clock,
            bus: SubscriberBus::new(),
            destroyed: false,
        }
    }

    fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    fn notify(&self) {
        self.bus.publish(&self.state);
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Add a player, or reset an existing one with the same id in place.
    pub fn add_player(&mut self, identity: PlayerIdentity) -> PlayerState {
        let now = self.now();
        let index = self.state.upsert_player(identity, &self.config, now);
        assign_ranks(&mut self.state.players);

        let player = self.state.players[index].clone();
        debug!(room = %self.state.room_id, player = %player.id, "player added");
        self.notify();
        player
    }

    /// Remove a player. Unknown ids still notify.
    pub fn remove_player(&mut self, id: &PlayerId) {
        if self.state.remove_player(id).is_some() {
            debug!(room = %self.state.room_id, player = %id, "player removed");
        }
        assign_ranks(&mut self.state.players);

        if self.state.players.is_empty() && self.state.is_active() {
            halt_race(&mut self.state, &mut self.scheduler);
        }

        self.notify();
    }

    /// Move a player to lane position `x`, clamped to the track.
    ///
    /// Returns `false` (and does not notify) for unknown or finished players.
    pub fn update_player_position(&mut self, id: &PlayerId, x: f64) -> bool {
        let now = self.now();
        let lane_max = self.config.lane_max;
        let bonus = self.config.move_distance_bonus;

        let Some(player) = self.state.get_player_mut(id) else {
            debug!(room = %self.state.room_id, player = %id, "move for unknown player ignored");
            return false;
        };
        if player.is_finished {
            debug!(player = %id, "move for finished player ignored");
            return false;
        }

        player.position = clamp_lane(x, lane_max);
        player.total_distance += bonus;
        player.last_update_ms = now;

        assign_ranks(&mut self.state.players);
        self.notify();
        true
    }

    /// Move one lane step left or right.
    pub fn steer(&mut self, id: &PlayerId, direction: Steer) -> bool {
        let Some(current) = self.state.get_player(id).map(|p| p.position) else {
            debug!(room = %self.state.room_id, player = %id, "steer for unknown player ignored");
            return false;
        };

        let target = match direction {
            Steer::Left => current - self.config.lane_step,
            Steer::Right => current + self.config.lane_step,
        };
        self.update_player_position(id, target)
    }

    /// Place an object on the track directly. Returns its id.
    pub fn spawn_object_at(&mut self, x: f64, y: f64, kind: ObjectKind) -> u64 {
        let now = self.now();
        let x = clamp_lane(x, self.config.object_x_max);
        let id = self.state.spawn_object(x, y, kind, now);

        debug!(room = %self.state.room_id, id, x, y, ?kind, "scripted object");
        self.notify();
        id
    }

    /// Start (or restart) the race.
    ///
    /// Ignored without notification when there are no players or the race
    /// is already running.
    pub fn start_game(&mut self) -> bool {
        if self.state.players.is_empty() {
            debug!(room = %self.state.room_id, "start ignored: no players");
            return false;
        }
        if self.state.is_active() {
            debug!(room = %self.state.room_id, "start ignored: already active");
            return false;
        }

        let now = self.now();
        begin_race(&mut self.state, &mut self.scheduler, &self.config, now);
        self.notify();
        true
    }

    /// Stop the cadences. A running race is completed with current
    /// standings; otherwise nothing changes. Always notifies.
    pub fn stop_game(&mut self) {
        let now = self.now();
        complete_race(&mut self.state, &mut self.scheduler, now, CompletionReason::Stopped);
        self.scheduler.disarm();
        self.notify();
    }

    /// Stop and drop every subscriber. Later subscriptions are inert.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_game();
        self.bus.close();
        self.destroyed = true;
        info!(room = %self.state.room_id, "engine destroyed");
    }

    /// Run every duty due by now. Notifies when anything ran.
    pub fn tick(&mut self) -> TickResult {
        let now = self.now();
        let result = tick::tick(&mut self.state, &mut self.scheduler, &self.config, now);
        if !result.is_idle() {
            self.notify();
        }
        result
    }

    /// Register a snapshot callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&RaceSnapshot) + Send + 'static,
    {
        self.bus.subscribe(callback)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Owned copy of the whole state.
    pub fn state(&self) -> RaceSnapshot {
        self.state.clone()
    }

    /// Borrow the state read-only.
    pub fn view(&self) -> &RaceState {
        &self.state
    }

    /// Room id.
    pub fn room_id(&self) -> &str {
        &self.state.room_id
    }

    /// Tuning in use.
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> RacePhase {
        self.state.phase
    }

    /// Copy of one player.
    pub fn player(&self, id: &PlayerId) -> Option<PlayerState> {
        self.state.get_player(id).cloned()
    }

    /// Copy of the roster in join order.
    pub fn players(&self) -> Vec<PlayerState> {
        self.state.players.clone()
    }

    /// Frozen results (empty until complete).
    pub fn race_results(&self) -> Vec<PlayerState> {
        self.state.race_results.clone()
    }

    /// Winner (set at completion).
    pub fn winner(&self) -> Option<PlayerState> {
        self.state.winner.clone()
    }

    /// Retained events, oldest first.
    pub fn race_events(&self) -> Vec<RaceEvent> {
        self.state.events.to_vec()
    }

    /// Race running?
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Results frozen?
    pub fn is_race_complete(&self) -> bool {
        self.state.is_race_complete()
    }

    /// Standings table sorted by rank.
    pub fn standings(&self) -> Vec<Standing> {
        standings(&self.state.players, self.state.start_time_ms)
    }

    /// Digest of the current state.
    pub fn digest(&self) -> StateHash {
        self.state.compute_hash()
    }

    /// Next time a cadence fires, if the race is running.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.scheduler.next_deadline()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.bus.len()
    }

    /// Destroyed?
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

// =============================================================================
// TESTS
// =============================================================================
