//! Authoritative Simulation Tick
//!
//! A race runs four periodic duties: the simulation step, object spawning,
//! distance progress and event aging. Each duty has its own cadence. A call
//! to [`tick`] runs every duty that has come due since the last call, in
//! chronological order, using the scheduled time rather than the wall time.
//! The outcome is therefore identical whether the caller ticks every 16 ms
//! or once after a long pause.

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::clock::Millis;
use crate::game::collision::resolve_collisions;
use crate::game::config::RaceConfig;
use crate::game::events::RaceEvent;
use crate::game::motion::{advance_objects, update_speed};
use crate::game::progress::accrue_distance;
use crate::game::ranking::{assign_ranks, ranked};
use crate::game::spawn::spawn_random_object;
use crate::game::state::{PlayerId, RacePhase, RaceState};

// =============================================================================
// SCHEDULING
// =============================================================================

/// Periodic duty. Declaration order breaks ties between duties due at the
/// same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Duty {
    /// Move objects, resolve collisions, ramp speed
    Simulate,
    /// Spawn one object
    Spawn,
    /// Accrue distance, detect finishes, re-rank
    Progress,
    /// Age out old events
    EventGc,
}

impl Duty {
    /// All duties in tie-break order.
    pub const ALL: [Duty; 4] = [Duty::Simulate, Duty::Spawn, Duty::Progress, Duty::EventGc];
}

/// A single repeating deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence {
    /// Period between firings
    pub period_ms: Millis,
    next_due_ms: Option<Millis>,
}

impl Cadence {
    /// Create a disarmed cadence.
    pub fn new(period_ms: Millis) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due_ms: None,
        }
    }

    /// First firing one period after `now`.
    pub fn arm(&mut self, now: Millis) {
        self.next_due_ms = Some(now + self.period_ms);
    }

    /// Stop firing.
    pub fn disarm(&mut self) {
        self.next_due_ms = None;
    }

    /// Next firing time, if armed.
    pub fn next_due(&self) -> Option<Millis> {
        self.next_due_ms
    }

    fn advance(&mut self) {
        if let Some(due) = self.next_due_ms.as_mut() {
            *due += self.period_ms;
        }
    }
}

/// The four cadences of one room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheduler {
    simulate: Cadence,
    spawn: Cadence,
    progress: Cadence,
    event_gc: Cadence,
}

impl Scheduler {
    /// Create a disarmed scheduler with periods from `config`.
    pub fn new(config: &RaceConfig) -> Self {
        Self {
            simulate: Cadence::new(config.simulation_period_ms),
            spawn: Cadence::new(config.spawn_period_ms),
            progress: Cadence::new(config.progress_period_ms),
            event_gc: Cadence::new(config.event_gc_period_ms),
        }
    }

    /// Arm every cadence from `now`.
    pub fn arm(&mut self, now: Millis) {
        for duty in Duty::ALL {
            self.cadence_mut(duty).arm(now);
        }
    }

    /// Disarm every cadence.
    pub fn disarm(&mut self) {
        for duty in Duty::ALL {
            self.cadence_mut(duty).disarm();
        }
    }

    /// Any cadence armed?
    pub fn is_armed(&self) -> bool {
        Duty::ALL.iter().any(|&d| self.cadence(d).next_due().is_some())
    }

    /// Cadence for a duty.
    pub fn cadence(&self, duty: Duty) -> &Cadence {
        match duty {
            Duty::Simulate => &self.simulate,
            Duty::Spawn => &self.spawn,
            Duty::Progress => &self.progress,
            Duty::EventGc => &self.event_gc,
        }
    }

    fn cadence_mut(&mut self, duty: Duty) -> &mut Cadence {
        match duty {
            Duty::Simulate => &mut self.simulate,
            Duty::Spawn => &mut self.spawn,
            Duty::Progress => &mut self.progress,
            Duty::EventGc => &mut self.event_gc,
        }
    }

    /// Earliest armed duty due at or before `now`.
    pub fn next_due(&self, now: Millis) -> Option<(Duty, Millis)> {
        let mut best: Option<(Duty, Millis)> = None;
        for duty in Duty::ALL {
            if let Some(due) = self.cadence(duty).next_due() {
                if due <= now && best.map_or(true, |(_, b)| due < b) {
                    best = Some((duty, due));
                }
            }
        }
        best
    }

    /// Earliest armed deadline, due or not.
    pub fn next_deadline(&self) -> Option<Millis> {
        Duty::ALL.iter().filter_map(|&d| self.cadence(d).next_due()).min()
    }
}

// =============================================================================
// TICK RESULT
// =============================================================================

/// Why a race was completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every non-eliminated player crossed the line
    AllFinished,
    /// The first finisher's grace period ran out
    GraceExpired,
    /// Nobody is left with lives
    NoneRacing,
    /// Explicit stop command
    Stopped,
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<RaceEvent>,
    /// Duties run
    pub duties_run: u32,
    /// Simulation steps run
    pub simulation_steps: u32,
    /// Object ids spawned
    pub spawned: Vec<u64>,
    /// Objects that fell off the track
    pub culled: usize,
    /// Objects consumed by contact
    pub consumed: usize,
    /// Players that lost their last life
    pub eliminated: Vec<PlayerId>,
    /// Players that crossed the line
    pub finished: Vec<PlayerId>,
    /// Events aged out
    pub expired_events: usize,
    /// Set when the race completed during this tick
    pub completion: Option<CompletionReason>,
    /// Winner, if the race completed
    pub winner: Option<PlayerId>,
}

impl TickResult {
    /// Did anything run?
    pub fn is_idle(&self) -> bool {
        self.duties_run == 0
    }

    /// Did the race complete this tick?
    pub fn race_completed(&self) -> bool {
        self.completion.is_some()
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Reset the state for a fresh race and arm every cadence.
pub fn begin_race(state: &mut RaceState, scheduler: &mut Scheduler, config: &RaceConfig, now: Millis) {
    state.reset_for_race(config, now);
    assign_ranks(&mut state.players);
    state.phase = RacePhase::Active;
    scheduler.arm(now);

    info!(room = %state.room_id, players = state.players.len(), "race started");
}

/// Freeze results and pick the winner. Does nothing unless the race is
/// active; an active race with an empty roster is halted instead.
///
/// Returns the winner when the race completed.
pub fn complete_race(
    state: &mut RaceState,
    scheduler: &mut Scheduler,
    now: Millis,
    reason: CompletionReason,
) -> Option<PlayerId> {
    if !state.is_active() {
        return None;
    }

    scheduler.disarm();

    if state.players.is_empty() {
        halt_race(state, scheduler);
        return None;
    }

    assign_ranks(&mut state.players);
    state.race_results = ranked(&state.players);
    state.winner = state.race_results.first().cloned();
    state.phase = RacePhase::Complete;

    let winner = state.winner.as_ref().map(|w| w.id.clone())?;
    let order = state.race_results.iter().map(|p| p.id.clone()).collect();
    state.push_event(RaceEvent::race_complete(winner.clone(), now, order));

    info!(room = %state.room_id, winner = %winner, ?reason, "race complete");
    Some(winner)
}

/// Stop an active race without producing results.
pub fn halt_race(state: &mut RaceState, scheduler: &mut Scheduler) {
    scheduler.disarm();
    if state.is_active() {
        state.phase = RacePhase::Idle;
        info!(room = %state.room_id, "race halted");
    }
}

// =============================================================================
// TICK
// =============================================================================

/// Run every duty due at or before `now`.
pub fn tick(state: &mut RaceState, scheduler: &mut Scheduler, config: &RaceConfig, now: Millis) -> TickResult {
    let mut result = TickResult::default();

    if !state.is_active() {
        scheduler.disarm();
        return result;
    }

    let pushed_before = state.events.pushed_total();

    while let Some((duty, due)) = scheduler.next_due(now) {
        scheduler.cadence_mut(duty).advance();
        result.duties_run += 1;

        match duty {
            Duty::Simulate => simulate(state, scheduler, config, due, &mut result),
            Duty::Spawn => {
                if let Some(id) = spawn_random_object(state, config, due) {
                    result.spawned.push(id);
                }
            }
            Duty::Progress => progress(state, scheduler, config, due, &mut result),
            Duty::EventGc => {
                result.expired_events += state.events.expire(due, config.event_ttl_ms);
            }
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(room = %state.room_id, ?duty, due, "duty ran");
    }

    let produced = (state.events.pushed_total() - pushed_before) as usize;
    result.events = state.events.latest(produced);
    result
}

/// One simulation step: motion, collisions, speed ramp.
fn simulate(state: &mut RaceState, scheduler: &mut Scheduler, config: &RaceConfig, now: Millis, result: &mut TickResult) {
    result.simulation_steps += 1;
    result.culled += advance_objects(state, config);

    let outcome = resolve_collisions(state, config, now);
    result.consumed += outcome.consumed;
    result.eliminated.extend(outcome.eliminated);
    if outcome.consumed > 0 {
        assign_ranks(&mut state.players);
    }

    update_speed(state, config, now);

    if !state.players.iter().any(|p| p.is_active && p.lives > 0) {
        finish(state, scheduler, now, CompletionReason::NoneRacing, result);
    }
}

/// One progress step: distance, finishes, end conditions, ranks.
fn progress(state: &mut RaceState, scheduler: &mut Scheduler, config: &RaceConfig, now: Millis, result: &mut TickResult) {
    result.finished.extend(accrue_distance(state, config, now));

    if let Some(reason) = check_end_conditions(state, config, now) {
        finish(state, scheduler, now, reason, result);
        return;
    }

    assign_ranks(&mut state.players);
}

/// Finish-line end conditions.
fn check_end_conditions(state: &RaceState, config: &RaceConfig, now: Millis) -> Option<CompletionReason> {
    let mut active = state.players.iter().filter(|p| p.is_active).peekable();
    if active.peek().is_some() && active.all(|p| p.is_finished) {
        return Some(CompletionReason::AllFinished);
    }

    let first = state.first_finish_ms()?;
    if now.saturating_sub(first) > config.finish_grace_ms {
        return Some(CompletionReason::GraceExpired);
    }

    None
}

fn finish(state: &mut RaceState, scheduler: &mut Scheduler, now: Millis, reason: CompletionReason, result: &mut TickResult) {
    let winner = complete_race(state, scheduler, now, reason);
    if state.is_race_complete() {
        result.completion = Some(reason);
        result.winner = winner;
    }
}

// =============================================================================
// TESTS
// =============================================================================
