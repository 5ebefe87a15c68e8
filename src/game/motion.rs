//! Object motion, off-screen culling and the global speed ramp.

use crate::core::clock::Millis;
use crate::game::config::RaceConfig;
use crate::game::state::RaceState;

/// Move every object down by the current game speed and cull the ones
/// that left the screen. Returns how many were culled.
pub fn advance_objects(state: &mut RaceState, config: &RaceConfig) -> usize {
    let speed = state.game_speed;
    for object in &mut state.objects {
        object.y += speed;
    }

    let before = state.objects.len();
    state.objects.retain(|o| o.y < config.cull_y);
    before - state.objects.len()
}

/// Speed after `elapsed_ms` of racing: linear ramp, capped.
#[inline]
pub fn speed_at(config: &RaceConfig, elapsed_ms: Millis) -> f64 {
    (config.initial_speed + elapsed_ms as f64 / config.speed_ramp_ms).min(config.max_speed)
}

/// Recompute `game_speed` from the race start time.
pub fn update_speed(state: &mut RaceState, config: &RaceConfig, now: Millis) {
    if let Some(start) = state.start_time_ms {
        state.game_speed = speed_at(config, now.saturating_sub(start));
    }
}
