//! Distance accrual and finish detection.

use tracing::info;

use crate::core::clock::Millis;
use crate::game::config::RaceConfig;
use crate::game::events::RaceEvent;
use crate::game::state::{PlayerId, RaceState};

/// Credit distance to every racing player for one progress period.
///
/// Returns the players that crossed the race distance during this call.
pub fn accrue_distance(state: &mut RaceState, config: &RaceConfig, now: Millis) -> Vec<PlayerId> {
    let step = state.game_speed * config.progress_factor;
    let race_distance = state.race_distance;
    let mut finished = Vec::new();

    for player in state.players.iter_mut() {
        if !player.is_racing() {
            continue;
        }

        player.total_distance += step;

        if player.total_distance >= race_distance {
            player.is_finished = true;
            player.finish_time_ms = Some(now);
            finished.push(player.id.clone());
        }
    }

    for id in &finished {
        let position = state.get_player(id).map(|p| p.race_position).unwrap_or_default();
        info!(room = %state.room_id, player = %id, position, "player finished");
        state.push_event(RaceEvent::player_finished(id.clone(), now, position));
    }

    finished
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
    fn test_accrual_uses_speed() {
        let (mut state, config) = state_with(&["a"]);
        state.game_speed = 3.0;

        accrue_distance(&mut state, &config, 100);
        accrue_distance(&mut state, &config, 200);

        assert!((state.players[0].total_distance - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_eliminated_player_frozen() {
        let (mut state, config) = state_with(&["a", "b"]);
        state.players[1].lives = 0;
        state.players[1].is_active = false;

        accrue_distance(&mut state, &config, 100);

        assert!(state.players[0].total_distance > 0.0);
        assert_eq!(state.players[1].total_distance, 0.0);
    }

    #[test]
    fn test_finish_crossing() {
        let (mut state, config) = state_with(&["a", "b"]);
        state.players[0].total_distance = 999.9;
        state.players[0].race_position = 1;

        let finished = accrue_distance(&mut state, &config, 4_200);

        assert_eq!(finished, vec![PlayerId::from("a")]);
        let player = &state.players[0];
        assert!(player.is_finished);
        assert_eq!(player.finish_time_ms, Some(4_200));
        assert_eq!(state.events.count_kind(RaceEventKind::PlayerFinished), 1);

        // Finished players stop accruing and finish only once
        let distance = player.total_distance;
        assert!(accrue_distance(&mut state, &config, 4_300).is_empty());
        assert_eq!(state.players[0].total_distance, distance);
        assert_eq!(state.events.count_kind(RaceEventKind::PlayerFinished), 1);
    }
}
