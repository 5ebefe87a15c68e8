//! Race State Definitions
//!
//! All state types for one room's race. Players are kept in insertion order
//! so that contested pickups resolve the same way on every replay.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::game::config::RaceConfig;
use crate::game::events::{EventLog, RaceEvent};

// =============================================================================
// IDS
// =============================================================================

/// Room identifier (the room code shared with players).
pub type RoomId = String;

/// Player identifier as handed out by the lobby.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// Identity supplied by the join flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Unique player ID
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Car color (CSS color string)
    pub car_color: String,
    /// When the player joined the room
    pub joined_at_ms: Millis,
}

impl PlayerIdentity {
    /// Convenience constructor.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, car_color: impl Into<String>, joined_at_ms: Millis) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            car_color: car_color.into(),
            joined_at_ms,
        }
    }
}

/// State of a single player in the race.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Unique player ID
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Car color
    pub car_color: String,
    /// Join time
    pub joined_at_ms: Millis,

    /// Lane position (left edge of the car, percent of track width)
    pub position: f64,
    /// Points from tokens
    pub score: u32,
    /// Remaining lives
    pub lives: u32,
    /// Still racing? Cleared when lives run out.
    pub is_active: bool,
    /// Last accepted command or mutation
    pub last_update_ms: Millis,

    /// Distance covered this race
    pub total_distance: f64,
    /// Obstacles hit
    pub collisions: u32,
    /// Tokens picked up
    pub tokens_collected: u32,
    /// Crossed the race distance?
    pub is_finished: bool,
    /// When the race distance was crossed
    pub finish_time_ms: Option<Millis>,
    /// Live rank, 1 = leader
    pub race_position: u32,
}

impl PlayerState {
    /// Create a new player with race defaults.
    pub fn new(identity: PlayerIdentity, config: &RaceConfig, now: Millis, provisional_rank: u32) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            car_color: identity.car_color,
            joined_at_ms: identity.joined_at_ms,
            position: config.start_position,
            score: 0,
            lives: config.initial_lives,
            is_active: true,
            last_update_ms: now,
            total_distance: 0.0,
            collisions: 0,
            tokens_collected: 0,
            is_finished: false,
            finish_time_ms: None,
            race_position: provisional_rank,
        }
    }

    /// Reset race telemetry for a new race. Lane position is kept.
    pub fn reset_race(&mut self, config: &RaceConfig) {
        self.score = 0;
        self.lives = config.initial_lives;
        self.is_active = true;
        self.total_distance = 0.0;
        self.collisions = 0;
        self.tokens_collected = 0;
        self.is_finished = false;
        self.finish_time_ms = None;
    }

    /// Can this player still be hit, collect, and accrue distance?
    #[inline]
    pub fn is_racing(&self) -> bool {
        self.is_active && !self.is_finished && self.lives > 0
    }

    /// Horizontal center of the car.
    #[inline]
    pub fn center_x(&self, config: &RaceConfig) -> f64 {
        self.position + config.player_width / 2.0
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_f64(self.position);
        hasher.update_u32(self.score);
        hasher.update_u32(self.lives);
        hasher.update_bool(self.is_active);
        hasher.update_f64(self.total_distance);
        hasher.update_u32(self.collisions);
        hasher.update_u32(self.tokens_collected);
        hasher.update_bool(self.is_finished);
        hasher.update_opt_u64(self.finish_time_ms);
        hasher.update_u32(self.race_position);
    }
}

/// Clamp a requested lane position into `[0, lane_max]`.
///
/// NaN collapses to 0 so a bad client value cannot poison the state.
#[inline]
pub fn clamp_lane(position: f64, lane_max: f64) -> f64 {
    if position.is_nan() {
        return 0.0;
    }
    position.clamp(0.0, lane_max)
}

// =============================================================================
// GAME OBJECTS
// =============================================================================

/// Kind of falling object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Costs a life on contact.
    Obstacle,
    /// Worth points on contact.
    Token,
}

/// An obstacle or token sliding down the track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    /// Unique object ID (monotonic per room)
    pub id: u64,
    /// Left edge, percent of track width
    pub x: f64,
    /// Vertical position; grows every tick
    pub y: f64,
    /// Obstacle or token
    pub kind: ObjectKind,
    /// Spawn time
    pub spawn_time_ms: Millis,
    /// Owning room
    pub room_id: RoomId,
}

impl GameObject {
    /// Horizontal center.
    #[inline]
    pub fn center_x(&self, config: &RaceConfig) -> f64 {
        self.x + config.object_width / 2.0
    }
}

// =============================================================================
// RACE PHASE
// =============================================================================

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    /// Waiting for a start command
    #[default]
    Idle,
    /// Timers running
    Active,
    /// Results frozen
    Complete,
}

// =============================================================================
// RACE STATE
// =============================================================================

/// Complete state of one room's race.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RaceState {
    /// Room this race belongs to
    pub room_id: RoomId,

    /// Lifecycle phase
    pub phase: RacePhase,

    /// Players in insertion order
    pub players: Vec<PlayerState>,

    /// Objects on the track, oldest first
    pub objects: Vec<GameObject>,

    /// Object fall speed per tick
    pub game_speed: f64,

    /// When the current race started
    pub start_time_ms: Option<Millis>,

    /// Last assigned object id
    pub last_object_id: u64,

    /// Recent events
    pub events: EventLog,

    /// Distance needed to finish
    pub race_distance: f64,

    /// Winner, frozen at completion
    pub winner: Option<PlayerState>,

    /// Final standings, frozen at completion
    pub race_results: Vec<PlayerState>,

    /// RNG seed (for verification)
    pub rng_seed: u64,

    /// Deterministic RNG state
    #[serde(skip)]
    pub rng: DeterministicRng,
}

/// Snapshots handed to subscribers are owned copies of the state.
pub type RaceSnapshot = RaceState;

impl RaceState {
    /// Create an idle race.
    pub fn new(room_id: impl Into<RoomId>, rng_seed: u64, config: &RaceConfig) -> Self {
        Self {
            room_id: room_id.into(),
            phase: RacePhase::Idle,
            players: Vec::new(),
            objects: Vec::new(),
            game_speed: config.initial_speed,
            start_time_ms: None,
            last_object_id: 0,
            events: EventLog::new(config.event_ring_size),
            race_distance: config.race_distance,
            winner: None,
            race_results: Vec::new(),
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
        }
    }

    /// Timers running?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase == RacePhase::Active
    }

    /// Results frozen?
    #[inline]
    pub fn is_race_complete(&self) -> bool {
        self.phase == RacePhase::Complete
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Insert a player, or replace one with the same id in place.
    ///
    /// Returns the index of the stored record.
    pub fn upsert_player(&mut self, identity: PlayerIdentity, config: &RaceConfig, now: Millis) -> usize {
        match self.players.iter().position(|p| p.id == identity.id) {
            Some(index) => {
                let rank = self.players[index].race_position;
                self.players[index] = PlayerState::new(identity, config, now, rank);
                index
            }
            None => {
                let rank = self.players.len() as u32 + 1;
                self.players.push(PlayerState::new(identity, config, now, rank));
                self.players.len() - 1
            }
        }
    }

    /// Remove a player, returning the record if it existed.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<PlayerState> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        Some(self.players.remove(index))
    }

    /// Place a new object on the track and return its id.
    pub fn spawn_object(&mut self, x: f64, y: f64, kind: ObjectKind, now: Millis) -> u64 {
        self.last_object_id += 1;
        let id = self.last_object_id;
        self.objects.push(GameObject {
            id,
            x,
            y,
            kind,
            spawn_time_ms: now,
            room_id: self.room_id.clone(),
        });
        id
    }

    /// Players that are still racing (active, unfinished, lives left).
    pub fn racing_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_racing()).count()
    }

    /// Earliest finish time among finished players.
    pub fn first_finish_ms(&self) -> Option<Millis> {
        self.players.iter().filter_map(|p| p.finish_time_ms).min()
    }

    /// Push a race event into the ring.
    pub fn push_event(&mut self, event: RaceEvent) {
        self.events.push(event);
    }

    /// Reset everything a new race starts from.
    pub fn reset_for_race(&mut self, config: &RaceConfig, now: Millis) {
        for player in &mut self.players {
            player.reset_race(config);
        }
        self.objects.clear();
        self.events.clear();
        self.race_results.clear();
        self.winner = None;
        self.game_speed = config.initial_speed;
        self.race_distance = config.race_distance;
        self.start_time_ms = Some(now);
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.rng_seed, |hasher| {
            hasher.update_str(&self.room_id);
            hasher.update_u8(self.phase as u8);

            // Insertion order is part of the state
            for player in &self.players {
                player.hash_into(hasher);
            }

            for object in &self.objects {
                hasher.update_u64(object.id);
                hasher.update_f64(object.x);
                hasher.update_f64(object.y);
                hasher.update_u8(object.kind as u8);
            }

            hasher.update_f64(self.game_speed);
            hasher.update_u64(self.last_object_id);
            hasher.update_u64(self.events.len() as u64);

            for player in &self.race_results {
                hasher.update_str(player.id.as_str());
            }

            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);
        })
    }

    /// Encode as JSON for renderers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
