use std::path::{Path, PathBuf};
use std::process::ExitCode;

use nodal::prelude::*;
use nodal::SimulationError;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage: nodal [scene.json] [options]

Options:
  --cpu               Force the CPU canvas backend
  --mobile            Use the constrained device budget (fewer particles, 30 fps)
  --particles N       Particle count
  --snapshot OUT.png  Run headless and write the final frame as PNG
  --frames N          Frames to simulate before a snapshot (default 600)
  -h, --help          Show this help

Keys: wheel / arrows / PageUp / PageDown scroll, Space scatters, Esc quits.
Set RUST_LOG to adjust logging (default nodal=info).";

#[derive(Debug, Default)]
struct Args {
    scene: Option<PathBuf>,
    cpu: bool,
    mobile: bool,
    particles: Option<usize>,
    snapshot: Option<PathBuf>,
    frames: Option<u32>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Args>, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--cpu" => parsed.cpu = true,
            "--mobile" => parsed.mobile = true,
            "--particles" => {
                let value = args.next().ok_or("--particles needs a value")?;
                parsed.particles = Some(value.parse().map_err(|_| format!("bad particle count: {}", value))?);
            }
            "--snapshot" => {
                let value = args.next().ok_or("--snapshot needs a path")?;
                parsed.snapshot = Some(PathBuf::from(value));
            }
            "--frames" => {
                let value = args.next().ok_or("--frames needs a value")?;
                parsed.frames = Some(value.parse().map_err(|_| format!("bad frame count: {}", value))?);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option: {}", flag)),
            path => {
                if parsed.scene.is_some() {
                    return Err(format!("unexpected argument: {}", path));
                }
                parsed.scene = Some(PathBuf::from(path));
            }
        }
    }
    Ok(Some(parsed))
}

fn build(args: &Args) -> Result<Simulation, SimulationError> {
    let scene = match &args.scene {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    info!(sections = scene.sections.len(), "scene loaded");

    let mut simulation = Simulation::new().with_scene(&scene);
    if let Some(count) = args.particles {
        simulation = simulation.with_particle_count(count);
    }
    if args.mobile {
        simulation = simulation.with_device_class(DeviceClass::Constrained);
    }
    if args.cpu || args.snapshot.is_some() {
        simulation = simulation.with_backend(BackendPreference::Cpu);
    }
    Ok(simulation)
}

fn snapshot(simulation: Simulation, out: &Path, frames: u32) -> Result<(), SimulationError> {
    let mut instance = simulation.with_surface_size(1280.0, 720.0).build();
    for _ in 0..frames {
        instance.frame(1.0 / 60.0);
    }
    instance.snapshot()?.save(out)?;
    info!(path = %out.display(), frames, "snapshot written");
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nodal=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("{}\n\n{}", msg, USAGE);
            return ExitCode::FAILURE;
        }
    };

    let result = build(&args).and_then(|simulation| match &args.snapshot {
        Some(out) => snapshot(simulation, out, args.frames.unwrap_or(600)),
        None => simulation.run(),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
