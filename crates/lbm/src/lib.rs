//! GPU lattice-Boltzmann collide-and-stream core.
//!
//! Advances a discretized particle-distribution field on a regular lattice
//! using a single fused collide-and-stream compute kernel, double-buffered
//! across time steps. The host side owns geometry, material classification,
//! and the execution/sync protocol; the numerics run entirely on the GPU.
//!
//! # Example
//!
//! ```no_run
//! use lbm::{D2Q9, Geometry, GpuContext, Lattice, LatticeConfig, MaterialMap, MaterialRule, Region};
//!
//! let geometry = Geometry::new_2d(64, 64)?;
//!
//! let mut material = MaterialMap::new(&geometry);
//! material.apply(&[
//!     MaterialRule { region: Region::Frame, tag: lbm::material::GHOST },
//!     MaterialRule { region: Region::Interior, tag: lbm::material::BULK },
//! ])?;
//!
//! let context = GpuContext::new()?;
//! let mut lattice = Lattice::<D2Q9>::new(&context, geometry, LatticeConfig::default())?;
//! lattice.write_material(&material);
//!
//! lattice.step_n(100);
//! lattice.sync();
//! let moments = lattice.moments()?;
//! println!("center density: {}", moments[geometry.index(32, 32, 0)].rho);
//! # Ok::<(), lbm::Error>(())
//! ```

pub mod descriptor;
pub mod geometry;
pub mod gpu;
pub mod material;

pub use descriptor::{Descriptor, D2Q9, D3Q19};
pub use geometry::Geometry;
pub use gpu::lattice::{CellInit, Lattice, LatticeConfig};
pub use gpu::moments::Moments;
pub use gpu::GpuContext;
pub use material::{MaterialMap, MaterialRule, Region};

/// Errors surfaced by the solver.
///
/// Configuration errors (bad extents, empty rule lists, unresolved kernel
/// placeholders) are detected synchronously at construction/classification
/// time. Device errors (no adapter, kernel build failure, failed readback)
/// are fatal; population state after a partial device failure is undefined
/// and requires full re-initialization.
#[derive(Debug)]
pub enum Error {
    /// A grid extent is too small to hold a ghost frame plus one interior cell.
    InvalidGeometry { axis: char, extent: usize },
    /// Classification was invoked with no rules.
    EmptyMaterialMap,
    /// A kernel template placeholder was left unsubstituted.
    UnresolvedPlaceholder(String),
    /// No compatible GPU adapter was found.
    NoAdapter,
    /// The adapter refused to provide a device.
    RequestDevice(wgpu::RequestDeviceError),
    /// The generated compute kernel failed validation.
    KernelBuild(String),
    /// A staging buffer could not be mapped for readback.
    BufferMap(wgpu::BufferAsyncError),
    /// The buffer-map completion channel disconnected, likely a lost device.
    ChannelDisconnected,
    /// The GPU device was lost.
    DeviceLost,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidGeometry { axis, extent } => {
                write!(f, "invalid geometry: extent {} on axis {} (minimum is 3)", extent, axis)
            }
            Error::EmptyMaterialMap => write!(f, "material rule list is empty"),
            Error::UnresolvedPlaceholder(name) => {
                write!(f, "unresolved kernel template placeholder: {{{{{}}}}}", name)
            }
            Error::NoAdapter => write!(f, "no compatible GPU adapter found"),
            Error::RequestDevice(e) => write!(f, "device request failed: {}", e),
            Error::KernelBuild(msg) => write!(f, "kernel build failed: {}", msg),
            Error::BufferMap(e) => write!(f, "buffer map failed: {:?}", e),
            Error::ChannelDisconnected => write!(f, "buffer map channel disconnected"),
            Error::DeviceLost => write!(f, "GPU device lost"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
