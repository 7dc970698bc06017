//! Example: Load a JSON scene description and print what it builds to.
//!
//! Run with: cargo run --example load_scene -- demos/two_layer_canopy.json

use std::env;
use std::fs;

use canopy_core::{LightModel, SceneDescription};
use serde::Deserialize;

/// Run documents carry the scene next to the run settings; only the scene
/// is read here.
#[derive(Deserialize)]
struct Document {
    scene: SceneDescription,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: load_scene <path-to-run.json> [bands]");
        return;
    }

    let path = &args[1];
    let bands = args.get(2).and_then(|b| b.parse().ok()).unwrap_or(1);
    println!("Loading scene: {}", path);

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            return;
        }
    };
    let document: Document = match serde_json::from_str(&text) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error parsing {}: {}", path, e);
            return;
        }
    };

    match document.scene.build(bands) {
        Ok(scene) => {
            println!("\n=== Scene ===");
            println!("Primitives: {}", scene.primitive_count());
            println!("Materials: {}", scene.materials.len());
            println!("Queries: {}", scene.query_count());
            println!("Up: ({:.2}, {:.2}, {:.2})", scene.up.x, scene.up.y, scene.up.z);

            println!("\n--- Queries ---");
            for q in 0..scene.query_count() {
                println!("  [{}] area {:.4}", q, scene.query_area(q));
            }

            println!("\n--- Light ---");
            match &document.scene.light {
                LightModel::Directional(lights) => {
                    for light in lights {
                        let d = light.direction;
                        println!(
                            "  Directional ({:.2}, {:.2}, {:.2}) weight {:.3}",
                            d.x, d.y, d.z, light.weight
                        );
                    }
                }
                LightModel::Sky(sky) => println!(
                    "  Sky: lat {:.2}, lon {:.2}, day {}, {:.1}h-{:.1}h, turbidity {:.1}",
                    sky.latitude, sky.longitude, sky.julian_day, sky.start_hour, sky.end_hour, sky.turbidity
                ),
            }
        }
        Err(e) => {
            eprintln!("Error building scene: {}", e);
        }
    }
}
