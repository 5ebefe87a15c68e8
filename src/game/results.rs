//! Standings summaries for leaderboards and the results screen.

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::state::{PlayerId, PlayerState};

/// One row of the standings table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1 = leader
    pub rank: u32,
    /// Player
    pub player_id: PlayerId,
    /// Display name
    pub name: String,
    /// Car color
    pub car_color: String,
    /// Points
    pub score: u32,
    /// Distance covered
    pub total_distance: f64,
    /// Obstacles hit
    pub collisions: u32,
    /// Tokens picked up
    pub tokens_collected: u32,
    /// Lives left
    pub lives: u32,
    /// Eliminated?
    pub eliminated: bool,
    /// Race time, for finishers
    pub race_time_ms: Option<Millis>,
}

impl Standing {
    /// Build a row from a player record.
    pub fn from_player(player: &PlayerState, start_time_ms: Option<Millis>) -> Self {
        let race_time_ms = match (player.finish_time_ms, start_time_ms) {
            (Some(finish), Some(start)) => Some(finish.saturating_sub(start)),
            _ => None,
        };

        Self {
            rank: player.race_position,
            player_id: player.id.clone(),
            name: player.name.clone(),
            car_color: player.car_color.clone(),
            score: player.score,
            total_distance: player.total_distance,
            collisions: player.collisions,
            tokens_collected: player.tokens_collected,
            lives: player.lives,
            eliminated: !player.is_active,
            race_time_ms,
        }
    }

    /// Rank as an English ordinal ("1st", "2nd", ...).
    pub fn ordinal(&self) -> String {
        ordinal(self.rank)
    }
}

/// Standings sorted by rank.
pub fn standings(players: &[PlayerState], start_time_ms: Option<Millis>) -> Vec<Standing> {
    let mut rows: Vec<Standing> = players.iter().map(|p| Standing::from_player(p, start_time_ms)).collect();
    rows.sort_by_key(|s| s.rank);
    rows
}

/// English ordinal for a rank.
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
