//! Lane Racer Server
//!
//! Runs a scripted race on a manual clock, then a short live room on the
//! async driver. An optional first argument names a JSON tuning file.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lane_racer::{
    TICK_RATE, VERSION,
    core::clock::{Clock, ManualClock, SystemClock},
    game::{
        config::RaceConfig,
        engine::Steer,
        events::{EventPayload, RaceEventKind},
        results::ordinal,
        state::{PlayerId, PlayerIdentity},
    },
    room::{DriverConfig, RoomDirectory, RoomRegistry},
};

/// Salt mixed into every room seed.
const SEED_SALT: u64 = 0x4c41_4e45_5241_4345;

/// Upper bound on the scripted race, in simulated milliseconds.
const DEMO_LIMIT_MS: u64 = 600_000;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = match std::env::args().nth(1) {
        Some(path) => RaceConfig::from_file(&path).with_context(|| format!("loading config from {}", path))?,
        None => RaceConfig::default(),
    };

    info!("Lane Racer Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);
    info!(
        "Race distance {}, spawn every {} ms, token chance {:.0}%",
        config.race_distance,
        config.spawn_period_ms,
        config.token_probability * 100.0
    );

    demo_race(&config);
    live_room(&config).await?;

    Ok(())
}

fn demo_identity(index: usize) -> PlayerIdentity {
    const COLORS: [&str; 4] = ["#ef4444", "#3b82f6", "#22c55e", "#eab308"];
    PlayerIdentity::new(
        format!("player-{}", index + 1),
        format!("Driver {}", index + 1),
        COLORS[index % COLORS.len()],
        0,
    )
}

/// Scripted race on a manual clock: fully reproducible.
fn demo_race(config: &RaceConfig) {
    info!("=== Starting Demo Race ===");

    let clock = ManualClock::new(0);
    let mut registry = RoomRegistry::new(config.clone(), Arc::new(clock.clone()), SEED_SALT);
    let room_id = "DEMO01";

    let players: Vec<PlayerId> = {
        let engine = registry.acquire(room_id);
        info!("Room {} seed {}", room_id, engine.view().rng_seed);
        (0..4).map(|i| engine.add_player(demo_identity(i)).id).collect()
    };

    registry.acquire(room_id).start_game();

    let step = config.simulation_period_ms;
    let mut last_report = 0;
    let (mut pickups, mut hits) = (0usize, 0usize);

    while clock.now_ms() < DEMO_LIMIT_MS {
        let now = clock.advance(step);
        let engine = registry.acquire(room_id);

        // Each driver weaves on its own rhythm
        if now % 400 == 0 {
            for (i, id) in players.iter().enumerate() {
                let direction = if (now / (400 * (i as u64 + 2))) % 2 == 0 { Steer::Left } else { Steer::Right };
                engine.steer(id, direction);
            }
        }

        let result = engine.tick();

        for event in &result.events {
            match (&event.kind, &event.payload) {
                (RaceEventKind::TokenCollected, _) => pickups += 1,
                (RaceEventKind::Collision, EventPayload::Collision { lives_remaining, .. }) => {
                    hits += 1;
                    if *lives_remaining == 0 {
                        info!("{} is out of lives", event.player_id);
                    }
                }
                (RaceEventKind::PlayerFinished, EventPayload::PlayerFinished { position, .. }) => {
                    info!("{} crossed the line in {}", event.player_id, ordinal(*position));
                }
                _ => {}
            }
        }

        if now - last_report >= 10_000 {
            let view = engine.view();
            info!(
                "t={}s: speed {:.2}, {} objects, {} racing, {} pickups, {} hits",
                now / 1000,
                view.game_speed,
                view.objects.len(),
                view.racing_count(),
                pickups,
                hits
            );
            last_report = now;
        }

        if result.race_completed() {
            info!("Race completed at t={}s ({:?})", now / 1000, result.completion);
            break;
        }
    }

    let engine = registry.acquire(room_id);
    if !engine.is_race_complete() {
        warn!("Demo limit reached, stopping race");
        engine.stop_game();
    }

    // Print final results
    info!("=== Race Results ===");
    for row in engine.standings() {
        info!(
            "{:>4} {:<10} score {:>3}  distance {:>7.1}  hits {}  time {}",
            row.ordinal(),
            row.name,
            row.score,
            row.total_distance,
            row.collisions,
            row.race_time_ms.map(|ms| format!("{:.1}s", ms as f64 / 1000.0)).unwrap_or_else(|| "-".into())
        );
    }
    if let Some(winner) = engine.winner() {
        info!("Winner: {}", winner.name);
    }
    info!("Final State Hash: {}", hex::encode(engine.digest()));

    registry.release(room_id);
}

/// A few seconds of a wall-clock room on the async driver.
async fn live_room(config: &RaceConfig) -> Result<()> {
    info!("=== Starting Live Room ===");

    let directory = RoomDirectory::new(config.clone(), DriverConfig::default(), Arc::new(SystemClock), SEED_SALT);
    let room = directory.open_room().await;
    info!("Opened room {}", room.room_id());

    let mut watch = room.watch();
    for i in 0..2 {
        room.add_player(demo_identity(i)).await?;
    }
    room.start_game().await?;

    let driver = PlayerId::new("player-1");
    let mut snapshots = 0usize;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);

    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), watch.recv()).await {
            Ok(Ok(_)) => snapshots += 1,
            Ok(Err(e)) => warn!("watch: {}", e),
            Err(_) => {
                room.steer(driver.clone(), Steer::Right).await?;
            }
        }
        if snapshots % 60 == 59 {
            room.steer(driver.clone(), Steer::Left).await?;
        }
    }

    room.stop_game().await?;
    for row in room.standings().await? {
        info!("{:>4} {:<10} distance {:>6.1}", row.ordinal(), row.name, row.total_distance);
    }
    info!("Received {} snapshots; digest {}", snapshots, hex::encode(room.digest().await?));

    directory.release(room.room_id()).await;
    Ok(())
}
