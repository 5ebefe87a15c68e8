//! Collision Detection
//!
//! Player-vs-object contact in the collision band near the bottom of the
//! track. Players are visited in insertion order and a consumed object is
//! gone before the next player is checked, so the earlier-joined player
//! wins a contested pickup.

use tracing::debug;

use crate::core::clock::Millis;
use crate::game::config::RaceConfig;
use crate::game::events::RaceEvent;
use crate::game::state::{GameObject, ObjectKind, PlayerId, PlayerState, RaceState};

/// Is the object inside the vertical collision band?
#[inline]
pub fn in_collision_band(object: &GameObject, config: &RaceConfig) -> bool {
    object.y > config.collision_band_min && object.y < config.collision_band_max
}

/// Does a player touch an object?
#[inline]
pub fn overlaps(player: &PlayerState, object: &GameObject, config: &RaceConfig) -> bool {
    if !in_collision_band(object, config) {
        return false;
    }

    let dx = (player.center_x(config) - object.center_x(config)).abs();
    dx < config.hit_distance()
}

/// What collision resolution did this step.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollisionOutcome {
    /// Objects removed by contact
    pub consumed: usize,
    /// Obstacles hit
    pub obstacle_hits: usize,
    /// Tokens collected
    pub tokens_collected: usize,
    /// Players that lost their last life this step
    pub eliminated: Vec<PlayerId>,
}

/// Resolve all player-vs-object contacts for one simulation step.
///
/// Obstacle: -1 life, +1 collision, deactivate at zero lives.
/// Token: +token_value score, +1 token.
/// Either way the object is consumed and an event is recorded.
pub fn resolve_collisions(state: &mut RaceState, config: &RaceConfig, now: Millis) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();
    let RaceState { players, objects, events, .. } = state;

    for player in players.iter_mut() {
        if !player.is_racing() {
            continue;
        }

        objects.retain(|object| {
            // An eliminated player takes no further hits
            if !player.is_racing() || !overlaps(player, object, config) {
                return true;
            }

            match object.kind {
                ObjectKind::Obstacle => {
                    player.lives = player.lives.saturating_sub(1);
                    player.collisions += 1;
                    if player.lives == 0 {
                        player.is_active = false;
                        outcome.eliminated.push(player.id.clone());
                        debug!(player = %player.id, "player eliminated");
                    }
                    events.push(RaceEvent::collision(player.id.clone(), now, object.id, player.lives));
                    outcome.obstacle_hits += 1;
                }
                ObjectKind::Token => {
                    player.score += config.token_value;
                    player.tokens_collected += 1;
                    events.push(RaceEvent::token_collected(player.id.clone(), now, object.id, player.score));
                    outcome.tokens_collected += 1;
                }
            }

            player.last_update_ms = now;
            outcome.consumed += 1;
            false
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::RaceEventKind;
    use crate::game::state::PlayerIdentity;

    fn state_with(players: &[&str]) -> (RaceState, RaceConfig) {
        let config = RaceConfig::default();
        let mut state = RaceState::new("room", 1, &config);
        for id in players {
            state.upsert_player(PlayerIdentity::new(*id, *id, "#fff", 0), &config, 0);
        }
        (state, config)
    }

    #[test]
    fn test_overlap_band_is_exclusive() {
        let (mut state, config) = state_with(&["a"]);
        // Player center 54, object center 54
        state.spawn_object(51.0, 70.0, ObjectKind::Token, 0);
        state.spawn_object(51.0, 90.0, ObjectKind::Token, 0);
        state.spawn_object(51.0, 80.0, ObjectKind::Token, 0);

        let player = &state.players[0];
        assert!(!overlaps(player, &state.objects[0], &config));
        assert!(!overlaps(player, &state.objects[1], &config));
        assert!(overlaps(player, &state.objects[2], &config));
    }

    #[test]
    fn test_overlap_horizontal_distance() {
        let (mut state, config) = state_with(&["a"]);
        // dx = 6.9 hits, dx = 7 misses
        state.spawn_object(57.9, 80.0, ObjectKind::Obstacle, 0);
        state.spawn_object(58.0, 80.0, ObjectKind::Obstacle, 0);

        let player = &state.players[0];
        assert!(overlaps(player, &state.objects[0], &config));
        assert!(!overlaps(player, &state.objects[1], &config));
    }

    #[test]
    fn test_token_pickup() {
        let (mut state, config) = state_with(&["a"]);
        state.spawn_object(51.0, 80.0, ObjectKind::Token, 0);

        let outcome = resolve_collisions(&mut state, &config, 500);

        assert_eq!(outcome.consumed, 1);
        assert_eq!(outcome.tokens_collected, 1);
        assert!(state.objects.is_empty());
        assert_eq!(state.players[0].score, 10);
        assert_eq!(state.players[0].tokens_collected, 1);
        assert_eq!(state.players[0].last_update_ms, 500);
        assert_eq!(state.events.count_kind(RaceEventKind::TokenCollected), 1);
    }

    #[test]
    fn test_obstacle_elimination() {
        let (mut state, config) = state_with(&["a"]);
        state.players[0].lives = 1;
        state.spawn_object(51.0, 80.0, ObjectKind::Obstacle, 0);
        state.spawn_object(50.0, 82.0, ObjectKind::Obstacle, 0);

        let outcome = resolve_collisions(&mut state, &config, 0);

        let player = &state.players[0];
        assert_eq!(player.lives, 0);
        assert!(!player.is_active);
        assert_eq!(player.collisions, 1);
        assert_eq!(outcome.eliminated, vec![PlayerId::from("a")]);
        // Second obstacle is left for nobody
        assert_eq!(state.objects.len(), 1);
    }

    #[test]
    fn test_contested_token_goes_to_first_player() {
        let (mut state, config) = state_with(&["first", "second"]);
        state.spawn_object(51.0, 80.0, ObjectKind::Token, 0);

        resolve_collisions(&mut state, &config, 0);

        assert_eq!(state.players[0].score, 10);
        assert_eq!(state.players[1].score, 0);
        assert_eq!(state.events.len(), 1);
    }

    #[test]
    fn test_finished_player_not_hit() {
        let (mut state, config) = state_with(&["a"]);
        state.players[0].is_finished = true;
        state.spawn_object(51.0, 80.0, ObjectKind::Obstacle, 0);

        let outcome = resolve_collisions(&mut state, &config, 0);

        assert_eq!(outcome.consumed, 0);
        assert_eq!(state.players[0].lives, 3);
        assert_eq!(state.objects.len(), 1);
    }
}
