//! `canopy`: run a light-transport simulation from a JSON run document.
//!
//! Usage: canopy <run.json> [--flux <out.bin>] [--sky <out.txt>]
//!
//! The document holds a `scene` (polygons, materials, up vector, light
//! model) and an optional `config` (run settings; defaults otherwise).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use canopy_core::{export, RunConfig, SceneDescription, SkyTable};
use canopy_tracer::{Simulation, SimulationResult};
use serde::Deserialize;

#[derive(Deserialize)]
struct RunDocument {
    scene: SceneDescription,
    #[serde(default)]
    config: RunConfig,
}

struct Args {
    input: PathBuf,
    flux: Option<PathBuf>,
    sky: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut input = None;
    let mut flux = None;
    let mut sky = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--flux" => flux = Some(args.next().context("--flux needs a path")?.into()),
            "--sky" => sky = Some(args.next().context("--sky needs a path")?.into()),
            other if other.starts_with("--") => bail!("Unknown option {}", other),
            other => input = Some(PathBuf::from(other)),
        }
    }
    let Some(input) = input else {
        bail!("Usage: canopy <run.json> [--flux <out.bin>] [--sky <out.txt>]");
    };
    Ok(Args { input, flux, sky })
}

fn load_document(path: &Path) -> Result<RunDocument> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_result(result: &SimulationResult, level: f64) {
    println!(
        "\n=== {} blocks, {} rays, {} surface hits, {} clamps ===",
        result.blocks, result.rays_traced, result.surface_hits, result.clamp_count
    );
    for query in &result.queries {
        println!("\nQuery {} (area {:.4})", query.query, query.area);
        for (band, stats) in query.bands.iter().enumerate() {
            println!(
                "  band {} {:?}: {:.6} ± {:.6} ({:.0}% CI), variance {:.3e}",
                band,
                stats.return_type,
                stats.mean,
                stats.half_width,
                level * 100.0,
                stats.variance
            );
        }
        if let Some(correlation) = query.band_correlation {
            println!("  band 0/1 correlation: {:.4}", correlation);
        }
    }
}

/// Write a table in the sky-file format, one triple per bin center.
fn write_sky_table(path: &Path, table: &SkyTable) -> Result<()> {
    let mut text = format!("{} {}\n", table.azimuth_samples(), table.altitude_samples());
    for a in 0..table.azimuth_samples() {
        for h in 0..table.altitude_samples() {
            text.push_str(&format!(
                "{:.4} {:.4} {:.8e}\n",
                table.azimuth_center(a).to_degrees(),
                table.altitude_center(h).to_degrees(),
                table.get(a, h)
            ));
        }
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;
    log::info!("Loading run document {}", args.input.display());
    let document = load_document(&args.input)?;
    let level = document.config.confidence_level;

    let simulation = Simulation::new(&document.scene, document.config)
        .context("Failed to set up simulation")?;
    let result = simulation.run().context("Simulation run failed")?;
    print_result(&result, level);

    if let Some(path) = &args.flux {
        let records = simulation.snapshot_flux()?;
        fs::write(path, export::as_bytes(&records))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {} flux records to {}", records.len(), path.display());
    }

    if let Some(path) = &args.sky {
        match simulation.sky_table()? {
            Some(table) => {
                write_sky_table(path, &table)?;
                log::info!("Wrote sky table to {}", path.display());
            }
            None => log::warn!("Light model has no sky; {} not written", path.display()),
        }
    }

    Ok(())
}
