//! Live standings.
//!
//! Finished players rank ahead of everyone still on the track, ordered by
//! finish time. Unfinished players order by score, then distance, then
//! fewer collisions. Sorting is stable so full ties keep join order.

use std::cmp::Ordering;

use crate::game::state::PlayerState;

/// Compare two players for ranking. `Less` means `a` ranks ahead of `b`.
pub fn compare_standing(a: &PlayerState, b: &PlayerState) -> Ordering {
    match (a.is_finished, b.is_finished) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.finish_time_ms.cmp(&b.finish_time_ms),
        (false, false) => b
            .score
            .cmp(&a.score)
            .then_with(|| b.total_distance.total_cmp(&a.total_distance))
            .then_with(|| a.collisions.cmp(&b.collisions)),
    }
}

/// Assign `race_position` (1-based) to every player without reordering
/// the roster.
pub fn assign_ranks(players: &mut [PlayerState]) {
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by(|&i, &j| compare_standing(&players[i], &players[j]));

    for (rank, index) in order.into_iter().enumerate() {
        players[index].race_position = rank as u32 + 1;
    }
}

/// Copy of the roster sorted by current rank.
pub fn ranked(players: &[PlayerState]) -> Vec<PlayerState> {
    let mut sorted = players.to_vec();
    sorted.sort_by_key(|p| p.race_position);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::RaceConfig;
    use crate::game::state::PlayerIdentity;

    fn roster(ids: &[&str]) -> Vec<PlayerState> {
        let config = RaceConfig::default();
        ids.iter()
            .enumerate()
            .map(|(i, id)| PlayerState::new(PlayerIdentity::new(*id, *id, "#000", 0), &config, 0, i as u32 + 1))
            .collect()
    }

    fn positions(players: &[PlayerState]) -> Vec<u32> {
        players.iter().map(|p| p.race_position).collect()
    }

    #[test]
    fn test_score_beats_distance() {
        let mut players = roster(&["a", "b"]);
        players[0].total_distance = 500.0;
        players[1].score = 10;

        assign_ranks(&mut players);
        assert_eq!(positions(&players), vec![2, 1]);
    }

    #[test]
    fn test_distance_then_collisions() {
        let mut players = roster(&["a", "b", "c"]);
        players[0].total_distance = 100.0;
        players[0].collisions = 2;
        players[1].total_distance = 100.0;
        players[2].total_distance = 120.0;

        assign_ranks(&mut players);
        assert_eq!(positions(&players), vec![3, 2, 1]);
    }

    #[test]
    fn test_finished_rank_first_by_time() {
        let mut players = roster(&["a", "b", "c"]);
        players[0].score = 90;
        players[1].is_finished = true;
        players[1].finish_time_ms = Some(9_000);
        players[2].is_finished = true;
        players[2].finish_time_ms = Some(8_000);

        assign_ranks(&mut players);
        assert_eq!(positions(&players), vec![3, 2, 1]);
    }

    #[test]
    fn test_ties_keep_roster_order() {
        let mut players = roster(&["a", "b", "c"]);
        players.reverse();

        assign_ranks(&mut players);
        assert_eq!(positions(&players), vec![1, 2, 3]);
    }

    #[test]
    fn test_ranked_is_permutation() {
        let mut players = roster(&["a", "b", "c", "d"]);
        players[3].score = 30;
        players[1].score = 20;

        assign_ranks(&mut players);
        let sorted = ranked(&players);

        let ids: Vec<&str> = sorted.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a", "c"]);
        assert_eq!(positions(&sorted), vec![1, 2, 3, 4]);
    }
}
