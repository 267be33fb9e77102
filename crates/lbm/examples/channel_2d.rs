//! Headless channel flow with obstacles.
//!
//! A horizontal channel driven by a time-ramped velocity inflow on the
//! left edge and a fixed-density outflow on the right. Two baffles and a
//! crescent obstacle (a disc with a second disc carved back out) disturb
//! the flow. Prints bulk velocity statistics as the flow develops.
//!
//! Run with: cargo run --example channel_2d --release -p lbm

use lbm::material::{BULK, GHOST};
use lbm::{D2Q9, Geometry, GpuContext, Lattice, LatticeConfig, MaterialMap, MaterialRule, Region};

const SIZE_X: usize = 480;
const SIZE_Y: usize = 300;
const UPDATES: u32 = 10_000;
const STAT_EVERY: u32 = 500;

const INFLOW: f32 = 0.01;

fn channel_rules() -> Vec<MaterialRule> {
    // First match wins: the carved-out disc must precede the obstacle
    // disc, and obstacles/walls must precede the inflow strip and bulk.
    vec![
        MaterialRule { region: Region::Frame, tag: GHOST },
        MaterialRule {
            region: Region::Circle { cx: (SIZE_X / 4 - 25) as i64, cy: (SIZE_Y / 2) as i64, r: 50 },
            tag: BULK,
        },
        MaterialRule {
            region: Region::Circle { cx: (SIZE_X / 4) as i64, cy: (SIZE_Y / 2) as i64, r: 50 },
            tag: 2,
        },
        MaterialRule {
            region: Region::Box {
                min: [SIZE_X / 20 + 1, 1, 0],
                max: [2 * SIZE_X / 20 - 1, 4 * SIZE_Y / 9 - 1, 0],
            },
            tag: 2,
        },
        MaterialRule {
            region: Region::Box {
                min: [SIZE_X / 20 + 1, 5 * SIZE_Y / 9 + 1, 0],
                max: [2 * SIZE_X / 20 - 1, SIZE_Y - 2, 0],
            },
            tag: 2,
        },
        MaterialRule { region: Region::PlaneY(1), tag: 2 },
        MaterialRule { region: Region::PlaneY(SIZE_Y - 2), tag: 2 },
        MaterialRule { region: Region::PlaneX(1), tag: 3 },
        MaterialRule { region: Region::PlaneX(SIZE_X - 2), tag: 4 },
        MaterialRule { region: Region::Interior, tag: BULK },
    ]
}

fn main() -> Result<(), lbm::Error> {
    env_logger::init();

    let geometry = Geometry::new_2d(SIZE_X, SIZE_Y)?;

    let mut material = MaterialMap::new(&geometry);
    material.apply(&channel_rules())?;

    let inflow = format!("{:.5}", INFLOW);
    let boundary = format!(
        "\
if (m == 2u) {{
    u_0 = 0.0;
    u_1 = 0.0;
}}
if (m == 3u) {{
    u_0 = min(time / 10000.0 * {inflow}, {inflow});
    u_1 = 0.0;
}}
if (m == 4u) {{
    rho = 1.0;
}}"
    );

    let context = GpuContext::new()?;
    let mut lattice = Lattice::<D2Q9>::new(
        &context,
        geometry,
        LatticeConfig { tau: 0.52, boundary },
    )?;
    lattice.write_material(&material);

    println!("Starting simulation using {} cells\n", geometry.volume());

    for i in 1..=UPDATES / STAT_EVERY {
        lattice.step_n(STAT_EVERY);
        let moments = lattice.moments()?;

        let mut mean = 0.0f64;
        let mut peak = 0.0f32;
        for (x, y, z) in geometry.inner_cells() {
            let u = moments[geometry.index(x, y, z)].velocity.length();
            mean += u as f64;
            peak = peak.max(u);
        }
        mean /= geometry.inner_volume() as f64;

        println!(
            "i = {:5}; mean |u| = {:.5}; peak |u| = {:.5}",
            i * STAT_EVERY,
            mean,
            peak
        );
    }

    println!("\nConcluded simulation.");
    Ok(())
}
