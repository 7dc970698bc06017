//! Example: Build a sky table and print its altitude profile.
//!
//! Run with: cargo run --example sky_table -- 52.0 172 0.6

use std::env;

use canopy_core::SkyParameters;
use canopy_tracer::SkyModel;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let arg = |i: usize, default: f64| args.get(i).and_then(|a| a.parse().ok()).unwrap_or(default);

    let params = SkyParameters {
        latitude: arg(1, 52.0),
        julian_day: arg(2, 172.0) as u32,
        clear_fraction: arg(3, 0.6),
        azimuth_samples: 36,
        altitude_samples: 9,
        ..Default::default()
    };
    println!(
        "Sky for latitude {:.1}, day {}, clear fraction {:.2}",
        params.latitude, params.julian_day, params.clear_fraction
    );

    let sky = match SkyModel::from_parameters(&params) {
        Ok(sky) => sky,
        Err(e) => {
            eprintln!("Error building sky: {}", e);
            return;
        }
    };

    let table = sky.table();
    println!("\n--- Share of sky flux per altitude band ---");
    for h in 0..table.altitude_samples() {
        let share: f64 = (0..table.azimuth_samples()).map(|a| table.get(a, h)).sum();
        println!(
            "  {:5.1} deg  {:6.4}  {}",
            table.altitude_center(h).to_degrees(),
            share,
            "#".repeat((share * 200.0) as usize)
        );
    }

    println!("\n--- Share per compass quadrant ---");
    let quadrant = table.azimuth_samples() / 4;
    for (name, q) in ["N-E", "E-S", "S-W", "W-N"].iter().zip(0..4) {
        let share: f64 = (q * quadrant..(q + 1) * quadrant)
            .map(|a| table.row(a).iter().sum::<f64>())
            .sum();
        println!("  {}  {:6.4}", name, share);
    }
}
