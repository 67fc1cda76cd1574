//! Room binding simulator.
//!
//! Connects a [`RoomBinding`] to an in-memory room, drives the room with a
//! seeded mutation script and logs every store generation a subscriber sees.
//!
//! # Usage
//!
//! ```bash
//! # 20 ticks against the default demo room
//! roomsync-sim --ticks 20
//!
//! # Reject the first two joins, trace tracker decisions
//! roomsync-sim --fail-joins 2 --log-level roomsync_core=trace,info
//! ```

use std::time::Duration;

use clap::Parser;
use roomsync_client::{ConnectOutcome, Room, RoomBinding, Snapshot, Subscription};
use roomsync_harness::{DemoRoom, RoomScript, SimClient, SimRoom};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Room binding simulator
#[derive(Parser, Debug)]
#[command(name = "roomsync-sim")]
#[command(about = "Drive a room binding with a scripted in-memory room")]
#[command(version)]
struct Args {
    /// Room name to join
    #[arg(short, long, default_value = "demo")]
    room: String,

    /// Endpoint reported by the simulated client
    #[arg(short, long, default_value = "sim://localhost:2567")]
    endpoint: String,

    /// Number of script ticks to run
    #[arg(short, long, default_value = "20")]
    ticks: usize,

    /// Script seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Delay between ticks in milliseconds
    #[arg(long, default_value = "50")]
    interval_ms: u64,

    /// Number of joins the client rejects before accepting
    #[arg(long, default_value = "0")]
    fail_joins: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let demo = DemoRoom::new();
    let client = SimClient::new(&args.endpoint).with_room(&args.room, demo.initial_state());
    client.fail_next_joins(args.fail_joins);

    let binding = RoomBinding::new(client);
    let observer = tokio::spawn(observe(binding.subscribe()));

    let mut attempts = 0;
    let room = loop {
        attempts += 1;
        match binding.connect(&args.room).await {
            ConnectOutcome::Connected => break binding.client().room(&args.room),
            ConnectOutcome::Failed if attempts <= args.fail_joins => {
                tracing::warn!(attempt = attempts, "join rejected, retrying");
            },
            outcome => {
                observer.abort();
                return Err(format!("could not connect to {}: {outcome:?}", args.room).into());
            },
        }
    };
    let room: SimRoom = room.ok_or("joined room is not open")?;
    tracing::info!(
        room = room.id(),
        attempts,
        tracked = ?binding.tracked_fields(),
        "binding connected"
    );

    let mut script = RoomScript::seeded(args.seed);
    let mut interval = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    for tick in 0..args.ticks {
        interval.tick().await;
        let step = script.step(&demo, &room);
        tracing::debug!(tick, ?step, "script step applied");
    }

    binding.disconnect().await;
    observer.await?;

    tracing::info!(ticks = args.ticks, left = room.has_left(), "simulation finished");
    Ok(())
}

/// Log every store generation until the store is cleared.
async fn observe(mut subscription: Subscription<SimRoom>) {
    while subscription.changed().await {
        let generation = subscription.mark_seen();
        let Some(snapshot) = subscription.use_state() else {
            tracing::info!(generation, "store cleared");
            break;
        };
        log_snapshot(generation, &snapshot);
    }
}

fn log_snapshot(generation: u64, snapshot: &Snapshot) {
    let items = snapshot.collection("items").map_or(0, |c| c.len());
    let players = snapshot.collection("players").map_or(0, |c| c.len());
    tracing::info!(
        generation,
        snapshot = snapshot.generation(),
        items,
        players,
        score = ?snapshot.scalar("score"),
        "store updated"
    );
}
