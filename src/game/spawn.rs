//! Object Spawning
//!
//! Deterministic obstacle/token spawning from the room's seeded RNG.

use tracing::trace;

use crate::core::clock::Millis;
use crate::game::config::RaceConfig;
use crate::game::state::{ObjectKind, RaceState};

/// Spawn one object at the top of the track.
///
/// Returns the new object id, or `None` when the race is not running.
pub fn spawn_random_object(state: &mut RaceState, config: &RaceConfig, now: Millis) -> Option<u64> {
    // Only spawn during an active race
    if !state.is_active() {
        return None;
    }

    let x = state.rng.next_f64_below(config.object_x_max);
    let kind = random_object_kind(state, config);
    let id = state.spawn_object(x, config.spawn_y, kind, now);

    trace!(room = %state.room_id, id, x, ?kind, "spawned object");
    Some(id)
}

/// Roll the kind of the next object.
fn random_object_kind(state: &mut RaceState, config: &RaceConfig) -> ObjectKind {
    if state.rng.next_bool(config.token_probability) {
        ObjectKind::Token
    } else {
        ObjectKind::Obstacle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::RacePhase;

    fn active_state(seed: u64) -> (RaceState, RaceConfig) {
        let config = RaceConfig::default();
        let mut state = RaceState::new("room", seed, &config);
        state.phase = RacePhase::Active;
        (state, config)
    }

    #[test]
    fn test_spawn_determinism() {
        let (mut state1, config) = active_state(12345);
        let (mut state2, _) = active_state(12345);

        for t in 0..50 {
            spawn_random_object(&mut state1, &config, t * 1200);
            spawn_random_object(&mut state2, &config, t * 1200);
        }

        assert_eq!(state1.objects, state2.objects);
    }

    #[test]
    fn test_spawn_placement_bounds() {
        let (mut state, config) = active_state(7);

        for _ in 0..2_000 {
            spawn_random_object(&mut state, &config, 0);
        }

        for object in &state.objects {
            assert!(object.x >= 0.0 && object.x < 94.0);
            assert_eq!(object.y, -10.0);
        }
        assert_eq!(state.last_object_id, 2_000);
    }

    #[test]
    fn test_token_ratio() {
        let (mut state, config) = active_state(99);

        for _ in 0..10_000 {
            spawn_random_object(&mut state, &config, 0);
        }

        let tokens = state.objects.iter().filter(|o| o.kind == ObjectKind::Token).count();
        let ratio = tokens as f64 / 10_000.0;
        assert!((0.32..0.38).contains(&ratio), "token ratio {}", ratio);
    }

    #[test]
    fn test_no_spawn_when_idle_or_complete() {
        let (mut state, config) = active_state(1);

        state.phase = RacePhase::Idle;
        assert_eq!(spawn_random_object(&mut state, &config, 0), None);

        state.phase = RacePhase::Complete;
        assert_eq!(spawn_random_object(&mut state, &config, 0), None);

        assert!(state.objects.is_empty());
        assert_eq!(state.last_object_id, 0);
    }
}
