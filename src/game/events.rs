//! Race Events
//!
//! Events generated during simulation, kept in a bounded ring that ages
//! entries out. Subscribers read the ring from snapshots to drive
//! pickup sparkles, crash shakes and the results screen.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::state::PlayerId;

/// Kind of race event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceEventKind {
    /// Player hit an obstacle.
    Collision,
    /// Player picked up a token.
    TokenCollected,
    /// Player crossed the race distance.
    PlayerFinished,
    /// Results are frozen.
    RaceComplete,
}

impl RaceEventKind {
    /// Stable prefix used in event ids.
    pub fn as_str(self) -> &'static str {
        match self {
            RaceEventKind::Collision => "collision",
            RaceEventKind::TokenCollected => "token",
            RaceEventKind::PlayerFinished => "finish",
            RaceEventKind::RaceComplete => "race_complete",
        }
    }
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Obstacle hit.
    Collision {
        /// Obstacle that was hit
        obstacle_id: u64,
        /// Lives left after the hit
        lives_remaining: u32,
    },

    /// Token picked up.
    TokenCollected {
        /// Token that was taken
        token_id: u64,
        /// Score after the pickup
        new_score: u32,
    },

    /// Player crossed the line.
    PlayerFinished {
        /// When the line was crossed
        finish_time_ms: Millis,
        /// Rank at the moment of finishing
        position: u32,
    },

    /// Race closed; player ids in final order.
    RaceComplete {
        /// Final order, winner first
        results: Vec<PlayerId>,
    },
}

impl EventPayload {
    /// Kind implied by this payload.
    pub fn kind(&self) -> RaceEventKind {
        match self {
            EventPayload::Collision { .. } => RaceEventKind::Collision,
            EventPayload::TokenCollected { .. } => RaceEventKind::TokenCollected,
            EventPayload::PlayerFinished { .. } => RaceEventKind::PlayerFinished,
            EventPayload::RaceComplete { .. } => RaceEventKind::RaceComplete,
        }
    }
}

/// A race event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    /// Event id, e.g. `token_p1_17`.
    pub id: String,
    /// Event kind.
    pub kind: RaceEventKind,
    /// Subject player (the winner for `race_complete`).
    pub player_id: PlayerId,
    /// When it happened.
    pub timestamp_ms: Millis,
    /// Kind-specific data.
    pub payload: EventPayload,
}

impl RaceEvent {
    /// Create an event. `discriminator` is the object id for collisions and
    /// pickups, and the timestamp otherwise.
    pub fn new(player_id: PlayerId, timestamp_ms: Millis, discriminator: u64, payload: EventPayload) -> Self {
        let kind = payload.kind();
        let id = match kind {
            RaceEventKind::RaceComplete => format!("{}_{}", kind.as_str(), discriminator),
            _ => format!("{}_{}_{}", kind.as_str(), player_id, discriminator),
        };

        Self {
            id,
            kind,
            player_id,
            timestamp_ms,
            payload,
        }
    }

    /// Obstacle hit event.
    pub fn collision(player_id: PlayerId, now: Millis, obstacle_id: u64, lives_remaining: u32) -> Self {
        Self::new(player_id, now, obstacle_id, EventPayload::Collision { obstacle_id, lives_remaining })
    }

    /// Token pickup event.
    pub fn token_collected(player_id: PlayerId, now: Millis, token_id: u64, new_score: u32) -> Self {
        Self::new(player_id, now, token_id, EventPayload::TokenCollected { token_id, new_score })
    }

    /// Finish line event.
    pub fn player_finished(player_id: PlayerId, now: Millis, position: u32) -> Self {
        Self::new(player_id, now, now, EventPayload::PlayerFinished { finish_time_ms: now, position })
    }

    /// Race complete event.
    pub fn race_complete(winner: PlayerId, now: Millis, results: Vec<PlayerId>) -> Self {
        Self::new(winner, now, now, EventPayload::RaceComplete { results })
    }
}

/// Bounded, age-limited event log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<RaceEvent>,
    capacity: usize,
    /// Events ever pushed, including evicted ones
    #[serde(default)]
    pushed: u64,
}

impl EventLog {
    /// Create an empty log holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
        }
    }

    /// Append, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, event: RaceEvent) {
        self.events.push_back(event);
        self.pushed += 1;
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Drop events that are `ttl_ms` old or older at `now`.
    ///
    /// Returns how many were dropped.
    pub fn expire(&mut self, now: Millis, ttl_ms: Millis) -> usize {
        let before = self.events.len();
        let cutoff = now.saturating_sub(ttl_ms);
        self.events.retain(|e| e.timestamp_ms > cutoff || now < ttl_ms);
        before - self.events.len()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RaceEvent> {
        self.events.iter()
    }

    /// Count events of a kind.
    pub fn count_kind(&self, kind: RaceEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Total number of events ever pushed.
    pub fn pushed_total(&self) -> u64 {
        self.pushed
    }

    /// The newest `n` retained events, oldest first.
    pub fn latest(&self, n: usize) -> Vec<RaceEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Copy out as a vector, oldest first.
    pub fn to_vec(&self) -> Vec<RaceEvent> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    #[test]
    fn test_event_ids() {
        let e = RaceEvent::token_collected(pid("p1"), 500, 17, 10);
        assert_eq!(e.id, "token_p1_17");
        assert_eq!(e.kind, RaceEventKind::TokenCollected);

        let e = RaceEvent::collision(pid("p2"), 500, 4, 2);
        assert_eq!(e.id, "collision_p2_4");

        let e = RaceEvent::race_complete(pid("p1"), 900, vec![pid("p1")]);
        assert_eq!(e.id, "race_complete_900");
    }

    #[test]
    fn test_ring_capacity() {
        let mut log = EventLog::new(100);
        for i in 0..150 {
            log.push(RaceEvent::token_collected(pid("p1"), i, i, 10));
        }

        assert_eq!(log.len(), 100);
        assert_eq!(log.pushed_total(), 150);
        // Oldest 50 were evicted
        assert_eq!(log.iter().next().map(|e| e.timestamp_ms), Some(50));
        assert_eq!(log.latest(2).iter().map(|e| e.timestamp_ms).collect::<Vec<_>>(), vec![148, 149]);
    }

    #[test]
    fn test_expire_by_age() {
        let mut log = EventLog::new(100);
        log.push(RaceEvent::collision(pid("p1"), 1_000, 1, 2));
        log.push(RaceEvent::collision(pid("p1"), 5_000, 2, 1));
        log.push(RaceEvent::collision(pid("p1"), 11_500, 3, 0));

        let dropped = log.expire(12_000, 10_000);
        assert_eq!(dropped, 1);
        assert!(log.iter().all(|e| 12_000 - e.timestamp_ms < 10_000));
    }

    #[test]
    fn test_expire_early_clock_keeps_all() {
        let mut log = EventLog::new(10);
        log.push(RaceEvent::collision(pid("p1"), 0, 1, 2));
        assert_eq!(log.expire(500, 10_000), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let payload = EventPayload::Collision { obstacle_id: 3, lives_remaining: 1 };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""type":"collision""#));
    }
}
