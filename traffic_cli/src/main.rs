//! Traffic simulator CLI.
//!
//! Loads a scene file, runs the engine for a fixed number of ticks, and
//! optionally writes the per-tick car/light snapshots to CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use traffic_core::Engine;

/// Run the discrete-time road-traffic simulator against a scene file.
#[derive(Parser, Debug)]
#[command(name = "traffic-sim")]
#[command(about = "Run the discrete-time, discrete-space road-traffic simulator", long_about = None)]
struct Args {
    /// Path to the scene JSON file.
    scene: PathBuf,

    /// RNG seed; determines the whole run given a fixed host.
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of ticks to run.
    #[arg(short, long, default_value = "200")]
    ticks: u64,

    /// Seconds to wait between ticks (0 = run flat out).
    #[arg(long, default_value = "0")]
    t_gap: f64,

    /// Optional horizon beyond which the engine refuses to step further.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Write the cars table to this CSV path after the run.
    #[arg(long)]
    export_cars: Option<PathBuf>,

    /// Write the lights table to this CSV path after the run.
    #[arg(long)]
    export_lights: Option<PathBuf>,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    info!(scene = %args.scene.display(), seed = args.seed, "loading scene");
    let world = traffic_scene::load_world(&args.scene, args.seed)
        .with_context(|| format!("failed to load scene {}", args.scene.display()))?;

    let engine = Engine::new(world, args.max_steps);
    info!(ticks = args.ticks, t_gap = args.t_gap, "starting run");
    let executed = engine.step(args.ticks, args.t_gap)?;
    info!(executed, elapsed = engine.time_elapsed(), "run complete");

    if let Some(path) = &args.export_cars {
        let handle = engine.world_handle();
        let world = handle.lock().expect("world mutex poisoned");
        export_cars(world.snapshots().all_cars(), path)?;
        info!(path = %path.display(), "wrote cars snapshot");
    }

    if let Some(path) = &args.export_lights {
        let handle = engine.world_handle();
        let world = handle.lock().expect("world mutex poisoned");
        export_lights(world.snapshots().all_lights(), path)?;
        info!(path = %path.display(), "wrote lights snapshot");
    }

    Ok(())
}

fn export_cars(rows: &[traffic_core::CarRow], path: &PathBuf) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "step,id,road,lane,cell,velocity,target,closest_junction")?;
    for r in rows {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            r.step, r.id, r.road, r.lane, r.cell, r.velocity, r.target, r.closest_junction
        )?;
    }
    Ok(())
}

fn export_lights(rows: &[traffic_core::LightRow], path: &PathBuf) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "step,id,road,phase,remaining")?;
    for r in rows {
        let phase = match r.phase {
            traffic_core::Phase::Green => "green",
            traffic_core::Phase::Red => "red",
        };
        writeln!(w, "{},{},{},{},{}", r.step, r.id, r.road, phase, r.remaining)?;
    }
    Ok(())
}
