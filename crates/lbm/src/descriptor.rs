//! Discrete velocity sets.
//!
//! A descriptor fixes the lattice scheme: the Q velocity vectors with
//! components in {-1, 0, 1}, their weights, and the opposite-direction
//! table required by reflection boundaries. Direction 0 is always the rest
//! vector, and the set is symmetric (every `c` has `-c` present).

/// A discrete velocity set (D2Q9, D3Q19).
///
/// The WGSL kernel fragments for a descriptor are generated from these
/// constants by [`crate::gpu::codegen`]; host code uses them directly for
/// equilibrium initialization.
pub trait Descriptor: 'static {
    /// Spatial dimension, 2 or 3.
    const DIM: usize;
    /// Number of discrete velocities.
    const Q: usize;
    /// Velocity vectors; the z component is 0 throughout in 2-D.
    const VELOCITIES: &'static [[i32; 3]];
    /// Lattice weights, summing to 1.
    const WEIGHTS: &'static [f32];
    /// Weights as exact WGSL expressions, kept as fractions so the device
    /// kernel and host initialization agree to the last ulp.
    const WEIGHTS_WGSL: &'static [&'static str];
    /// `OPPOSITE[i]` is the index of `-VELOCITIES[i]`.
    const OPPOSITE: &'static [usize];

    /// Second-order BGK equilibrium for the given density and velocity,
    /// written into `f_eq` (length `Q`).
    ///
    /// `f_eq_i = w_i rho (1 + 3 c·u + 4.5 (c·u)^2 - 1.5 u·u)`
    fn equilibrium(rho: f32, u: [f32; 3], f_eq: &mut [f32]) {
        debug_assert_eq!(f_eq.len(), Self::Q);
        let usqr = 1.5 * (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]);
        for (i, c) in Self::VELOCITIES.iter().enumerate() {
            let cu = c[0] as f32 * u[0] + c[1] as f32 * u[1] + c[2] as f32 * u[2];
            f_eq[i] = Self::WEIGHTS[i] * rho * (1.0 + 3.0 * cu + 4.5 * cu * cu - usqr);
        }
    }
}

/// Nine-velocity 2-D lattice.
///
/// ```text
///   6   2   5
///    \  |  /
///   3 - 0 - 1
///    /  |  \
///   7   4   8
/// ```
pub struct D2Q9;

impl Descriptor for D2Q9 {
    const DIM: usize = 2;
    const Q: usize = 9;

    const VELOCITIES: &'static [[i32; 3]] = &[
        [0, 0, 0],
        [1, 0, 0],
        [0, 1, 0],
        [-1, 0, 0],
        [0, -1, 0],
        [1, 1, 0],
        [-1, 1, 0],
        [-1, -1, 0],
        [1, -1, 0],
    ];

    const WEIGHTS: &'static [f32] = &[
        4.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
    ];

    const WEIGHTS_WGSL: &'static [&'static str] = &[
        "(4.0 / 9.0)",
        "(1.0 / 9.0)",
        "(1.0 / 9.0)",
        "(1.0 / 9.0)",
        "(1.0 / 9.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
    ];

    const OPPOSITE: &'static [usize] = &[0, 3, 4, 1, 2, 7, 8, 5, 6];
}

/// Nineteen-velocity 3-D lattice: one rest, six face and twelve edge
/// directions on the unit cube.
pub struct D3Q19;

impl Descriptor for D3Q19 {
    const DIM: usize = 3;
    const Q: usize = 19;

    const VELOCITIES: &'static [[i32; 3]] = &[
        [0, 0, 0],
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
        [1, 1, 0],
        [-1, -1, 0],
        [1, -1, 0],
        [-1, 1, 0],
        [1, 0, 1],
        [-1, 0, -1],
        [1, 0, -1],
        [-1, 0, 1],
        [0, 1, 1],
        [0, -1, -1],
        [0, 1, -1],
        [0, -1, 1],
    ];

    const WEIGHTS: &'static [f32] = &[
        1.0 / 3.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
    ];

    const WEIGHTS_WGSL: &'static [&'static str] = &[
        "(1.0 / 3.0)",
        "(1.0 / 18.0)",
        "(1.0 / 18.0)",
        "(1.0 / 18.0)",
        "(1.0 / 18.0)",
        "(1.0 / 18.0)",
        "(1.0 / 18.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
        "(1.0 / 36.0)",
    ];

    const OPPOSITE: &'static [usize] = &[
        0, 2, 1, 4, 3, 6, 5, 8, 7, 10, 9, 12, 11, 14, 13, 16, 15, 18, 17,
    ];
}
