//! Headless box implosion benchmark.
//!
//! A closed no-slip box seeded with a low-density disc at the center; the
//! surrounding fluid implodes into it. Prints throughput in MLUPS (million
//! lattice updates per second) between synchronization points.
//!
//! Run with: cargo run --example implosion --release -p lbm

use std::time::Instant;

use lbm::material::{BULK, GHOST};
use lbm::{CellInit, D2Q9, Geometry, GpuContext, Lattice, LatticeConfig, MaterialMap, MaterialRule, Region};

const SIZE: usize = 1024;
const UPDATES: u32 = 2000;
const STAT_EVERY: u32 = 100;

fn mlups(cells: usize, steps: u32, seconds: f64) -> f64 {
    cells as f64 * steps as f64 / seconds * 1e-6
}

fn main() -> Result<(), lbm::Error> {
    env_logger::init();

    let geometry = Geometry::new_2d(SIZE, SIZE)?;

    let mut material = MaterialMap::new(&geometry);
    material.apply(&[
        MaterialRule { region: Region::Frame, tag: GHOST },
        MaterialRule { region: Region::PlaneX(1), tag: 2 },
        MaterialRule { region: Region::PlaneX(SIZE - 2), tag: 2 },
        MaterialRule { region: Region::PlaneY(1), tag: 2 },
        MaterialRule { region: Region::PlaneY(SIZE - 2), tag: 2 },
        MaterialRule { region: Region::Interior, tag: BULK },
    ])?;

    let context = GpuContext::new()?;
    let mut lattice = Lattice::<D2Q9>::new(
        &context,
        geometry,
        LatticeConfig {
            tau: 0.8,
            boundary: "\
if (m == 2u) {
    u_0 = 0.0;
    u_1 = 0.0;
}"
            .to_string(),
        },
    )?;
    lattice.write_material(&material);

    let bubble = Region::Circle {
        cx: (SIZE / 2) as i64,
        cy: (SIZE / 2) as i64,
        r: (SIZE / 10) as i64,
    };
    lattice.write_populations(|x, y, z| {
        if bubble.contains(&geometry, x, y, z) {
            CellInit { rho: 0.375, velocity: [0.0; 3] }
        } else {
            CellInit::default()
        }
    });

    println!("Starting simulation using {} cells\n", geometry.volume());

    let mut last_stat = Instant::now();
    for i in 1..=UPDATES {
        lattice.step();

        if i % STAT_EVERY == 0 {
            lattice.sync();
            let elapsed = last_stat.elapsed().as_secs_f64();

            let moments = lattice.moments()?;
            let peak = geometry
                .inner_cells()
                .map(|(x, y, z)| moments[geometry.index(x, y, z)].velocity.length())
                .fold(0.0f32, f32::max);

            println!(
                "i = {:4}; {:3.0} MLUPS; peak |u| = {:.4}",
                i,
                mlups(geometry.volume(), STAT_EVERY, elapsed),
                peak
            );
            last_stat = Instant::now();
        }
    }

    println!("\nConcluded simulation.");
    Ok(())
}
