//! Async Room Driver
//!
//! Runs one [`RaceEngine`] inside its own tokio task. Commands are queued
//! over an mpsc channel and applied between ticks, so the engine is only
//! ever touched from one task. Snapshots fan out over a broadcast channel.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::core::clock::Millis;
use crate::core::hash::StateHash;
use crate::game::engine::{RaceEngine, Steer};
use crate::game::results::Standing;
use crate::game::state::{ObjectKind, PlayerId, PlayerIdentity, PlayerState, RaceSnapshot, RoomId};

/// Configuration for room drivers.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Wall-clock period between ticks
    pub tick_period_ms: Millis,
    /// Pending command capacity
    pub command_capacity: usize,
    /// Snapshots buffered per watcher before it lags
    pub watch_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 16,
            command_capacity: 256,
            watch_capacity: 64,
        }
    }
}

/// Room driver errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    /// The driver task has exited.
    #[error("room driver is closed")]
    Closed,

    /// The driver dropped the reply channel.
    #[error("room driver dropped the reply")]
    ReplyDropped,
}

/// Queued engine command.
enum Command {
    AddPlayer {
        identity: PlayerIdentity,
        reply: oneshot::Sender<PlayerState>,
    },
    RemovePlayer {
        player_id: PlayerId,
        reply: oneshot::Sender<usize>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<usize>,
    },
    MovePlayer {
        player_id: PlayerId,
        x: f64,
        reply: oneshot::Sender<bool>,
    },
    Steer {
        player_id: PlayerId,
        direction: Steer,
        reply: oneshot::Sender<bool>,
    },
    SpawnObject {
        x: f64,
        y: f64,
        kind: ObjectKind,
        reply: oneshot::Sender<u64>,
    },
    Start {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<RaceSnapshot>,
    },
    Standings {
        reply: oneshot::Sender<Vec<Standing>>,
    },
    Digest {
        reply: oneshot::Sender<StateHash>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    commands: mpsc::Sender<Command>,
    snapshots: broadcast::Sender<Arc<RaceSnapshot>>,
}

impl RoomHandle {
    /// Room id.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Has the driver task gone away?
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Receive every snapshot published from now on.
    pub fn watch(&self) -> broadcast::Receiver<Arc<RaceSnapshot>> {
        self.snapshots.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.map_err(|_| RoomError::Closed)?;
        rx.await.map_err(|_| RoomError::ReplyDropped)
    }

    /// Add (or reset) a player.
    pub async fn add_player(&self, identity: PlayerIdentity) -> Result<PlayerState, RoomError> {
        self.request(|reply| Command::AddPlayer { identity, reply }).await
    }

    /// Remove a player. Returns how many players remain.
    pub async fn remove_player(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| Command::RemovePlayer { player_id, reply }).await
    }

    /// Remove a player and, if nobody is left, destroy the engine and end
    /// the driver task in the same step. Returns how many players remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.request(|reply| Command::Leave { player_id, reply }).await
    }

    /// Move a player to a lane position.
    pub async fn update_player_position(&self, player_id: PlayerId, x: f64) -> Result<bool, RoomError> {
        self.request(|reply| Command::MovePlayer { player_id, x, reply }).await
    }

    /// Move a player one lane step.
    pub async fn steer(&self, player_id: PlayerId, direction: Steer) -> Result<bool, RoomError> {
        self.request(|reply| Command::Steer { player_id, direction, reply }).await
    }

    /// Place an object on the track.
    pub async fn spawn_object_at(&self, x: f64, y: f64, kind: ObjectKind) -> Result<u64, RoomError> {
        self.request(|reply| Command::SpawnObject { x, y, kind, reply }).await
    }

    /// Start the race.
    pub async fn start_game(&self) -> Result<bool, RoomError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stop the race.
    pub async fn stop_game(&self) -> Result<(), RoomError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Owned snapshot of the current state.
    pub async fn snapshot(&self) -> Result<RaceSnapshot, RoomError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Current standings.
    pub async fn standings(&self) -> Result<Vec<Standing>, RoomError> {
        self.request(|reply| Command::Standings { reply }).await
    }

    /// State digest.
    pub async fn digest(&self) -> Result<StateHash, RoomError> {
        self.request(|reply| Command::Digest { reply }).await
    }

    /// Destroy the engine and end the driver task.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Move `engine` into a new driver task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_room(engine: RaceEngine, config: &DriverConfig) -> (RoomHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
    let (snapshot_tx, _) = broadcast::channel(config.watch_capacity.max(1));

    let watchers = snapshot_tx.clone();
    // Lives as long as the engine's bus; a send with no receivers is fine
    let _ = engine.subscribe(move |snapshot| {
        if watchers.receiver_count() > 0 {
            let _ = watchers.send(Arc::new(snapshot.clone()));
        }
    });

    let handle = RoomHandle {
        room_id: engine.room_id().to_string(),
        commands: command_tx,
        snapshots: snapshot_tx,
    };

    let period = Duration::from_millis(config.tick_period_ms.max(1));
    let task = tokio::spawn(run_room(engine, command_rx, period));

    (handle, task)
}

#[instrument(skip_all, fields(room = %engine.room_id()))]
async fn run_room(mut engine: RaceEngine, mut commands: mpsc::Receiver<Command>, period: Duration) {
    info!("room driver started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = engine.tick();
                if let Some(reason) = result.completion {
                    info!(?reason, winner = ?result.winner, "race completed");
                }
            }
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        if apply(&mut engine, command).is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("all handles dropped");
                        engine.destroy();
                        break;
                    }
                }
            }
        }
    }

    info!("room driver stopped");
}

/// Apply one command. Breaks once the engine has been destroyed.
///
/// A caller that stopped waiting is not an error.
fn apply(engine: &mut RaceEngine, command: Command) -> ControlFlow<()> {
    match command {
        Command::AddPlayer { identity, reply } => {
            let _ = reply.send(engine.add_player(identity));
        }
        Command::RemovePlayer { player_id, reply } => {
            engine.remove_player(&player_id);
            let _ = reply.send(engine.view().players.len());
        }
        Command::Leave { player_id, reply } => {
            engine.remove_player(&player_id);
            let remaining = engine.view().players.len();
            if remaining == 0 {
                engine.destroy();
            }
            let _ = reply.send(remaining);
            if remaining == 0 {
                return ControlFlow::Break(());
            }
        }
        Command::MovePlayer { player_id, x, reply } => {
            let _ = reply.send(engine.update_player_position(&player_id, x));
        }
        Command::Steer { player_id, direction, reply } => {
            let _ = reply.send(engine.steer(&player_id, direction));
        }
        Command::SpawnObject { x, y, kind, reply } => {
            let _ = reply.send(engine.spawn_object_at(x, y, kind));
        }
        Command::Start { reply } => {
            let _ = reply.send(engine.start_game());
        }
        Command::Stop { reply } => {
            engine.stop_game();
            let _ = reply.send(());
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(engine.state());
        }
        Command::Standings { reply } => {
            let _ = reply.send(engine.standings());
        }
        Command::Digest { reply } => {
            let _ = reply.send(engine.digest());
        }
        Command::Shutdown { reply } => {
            engine.destroy();
            let _ = reply.send(());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::game::config::RaceConfig;
    use crate::game::state::RacePhase;

    fn room(clock: &ManualClock) -> (RoomHandle, JoinHandle<()>) {
        let engine = RaceEngine::new("DRIVE", 11, RaceConfig::default(), Arc::new(clock.clone()));
        spawn_room(engine, &DriverConfig::default())
    }

    fn identity(id: &str) -> PlayerIdentity {
        PlayerIdentity::new(id, id, "#f97316", 0)
    }

    #[tokio::test]
    async fn test_commands_round_trip() {
        let clock = ManualClock::new(0);
        let (handle, _task) = room(&clock);

        let player = handle.add_player(identity("a")).await.unwrap();
        assert_eq!(player.position, 50.0);

        assert!(handle.update_player_position(PlayerId::from("a"), 500.0).await.unwrap());
        assert!(!handle.update_player_position(PlayerId::from("ghost"), 1.0).await.unwrap());
        assert!(handle.start_game().await.unwrap());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, RacePhase::Active);
        assert_eq!(snapshot.players[0].position, 92.0);

        handle.stop_game().await.unwrap();
        let standings = handle.standings().await.unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].rank, 1);
    }

    #[tokio::test]
    async fn test_watch_receives_snapshots() {
        let clock = ManualClock::new(0);
        let (handle, _task) = room(&clock);
        let mut watch = handle.watch();

        handle.add_player(identity("a")).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), watch.recv())
            .await
            .expect("snapshot in time")
            .unwrap();
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.room_id, "DRIVE");
    }

    #[tokio::test]
    async fn test_driver_ticks_engine() {
        let clock = ManualClock::new(0);
        let (handle, _task) = room(&clock);
        handle.add_player(identity("a")).await.unwrap();
        handle.start_game().await.unwrap();
        let mut watch = handle.watch();

        clock.advance(1_200);

        let ticked = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = watch.recv().await.unwrap();
                if snapshot.last_object_id > 0 {
                    return snapshot;
                }
            }
        })
        .await
        .expect("driver tick in time");

        assert_eq!(ticked.last_object_id, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_room() {
        let clock = ManualClock::new(0);
        let (handle, task) = room(&clock);
        handle.add_player(identity("a")).await.unwrap();

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.snapshot().await.unwrap_err(), RoomError::Closed);
        assert_eq!(handle.start_game().await.unwrap_err(), RoomError::Closed);
    }

    #[tokio::test]
    async fn test_remove_reports_remaining() {
        let clock = ManualClock::new(0);
        let (handle, _task) = room(&clock);
        handle.add_player(identity("a")).await.unwrap();
        handle.add_player(identity("b")).await.unwrap();

        assert_eq!(handle.remove_player(PlayerId::from("a")).await.unwrap(), 1);
        assert_eq!(handle.remove_player(PlayerId::from("a")).await.unwrap(), 1);
        assert_eq!(handle.remove_player(PlayerId::from("b")).await.unwrap(), 0);
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_last_leave_ends_driver() {
        let clock = ManualClock::new(0);
        let (handle, task) = room(&clock);
        handle.add_player(identity("a")).await.unwrap();
        handle.add_player(identity("b")).await.unwrap();

        assert_eq!(handle.leave(PlayerId::from("a")).await.unwrap(), 1);
        assert_eq!(handle.snapshot().await.unwrap().players.len(), 1);

        assert_eq!(handle.leave(PlayerId::from("b")).await.unwrap(), 0);
        task.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(handle.add_player(identity("c")).await.unwrap_err(), RoomError::Closed);
    }

    #[tokio::test]
    async fn test_unwatched_room_still_publishes_to_new_watchers() {
        let clock = ManualClock::new(0);
        let (handle, _task) = room(&clock);
        handle.add_player(identity("a")).await.unwrap();

        let mut watch = handle.watch();
        handle.add_player(identity("b")).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), watch.recv())
            .await
            .expect("snapshot in time")
            .unwrap();
        assert_eq!(snapshot.players.len(), 2);
    }
}
