//! Double-buffered lattice execution on the GPU.
//!
//! [`Lattice`] owns the two population buffers, the material array, and the
//! generated collide-and-stream pipeline. One `step()` issues exactly one
//! kernel invocation over the whole grid reading the current buffer and
//! writing the other, then flips which buffer is current. Issuance is
//! fire-and-forget; the host only blocks at [`Lattice::sync`] or inside a
//! read operation, which implies the barrier. Batching many steps between
//! synchronizations is the primary performance lever.

use std::marker::PhantomData;
use std::sync::{mpsc, Arc};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::geometry::Geometry;
use crate::material::MaterialMap;
use crate::{Error, Result};

use super::codegen;
use super::moments::{Moments, MomentsPipeline};
use super::{await_buffer_map, GpuContext};

const WORKGROUP_SIZE: u32 = 64;

/// Per-invocation kernel parameters.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct LatticeParams {
    size_x: u32,
    size_y: u32,
    size_z: u32,
    volume: u32,
    omega: f32,
    time: f32,
    _pad0: f32,
    _pad1: f32,
}

/// Solver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// BGK relaxation time; the kernel relaxes with ω = 1/τ.
    ///
    /// Precondition: 0 < ω ≤ 2 (τ ≥ 0.5) for stability. Not validated at
    /// runtime.
    pub tau: f32,
    /// WGSL boundary fragment, substituted verbatim into the kernel. It is
    /// evaluated per boundary cell with `m` (material tag), mutable `rho`,
    /// `u_0`, `u_1` (and `u_2` in 3-D), and `time` in scope, and must only
    /// branch on `m`. Empty fragment means no boundary correction.
    pub boundary: String,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            tau: 0.8,
            boundary: String::new(),
        }
    }
}

/// Initial macroscopic state of one cell; populations are seeded with the
/// corresponding equilibrium distribution.
#[derive(Clone, Copy, Debug)]
pub struct CellInit {
    pub rho: f32,
    pub velocity: [f32; 3],
}

impl Default for CellInit {
    fn default() -> Self {
        Self {
            rho: 1.0,
            velocity: [0.0; 3],
        }
    }
}

/// GPU-resident lattice: population store, material array, and the
/// collide-and-stream execution controller.
pub struct Lattice<D: Descriptor> {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    geometry: Geometry,
    omega: f32,
    /// Completed-or-issued step count since the last (re)initialization.
    time: u32,
    /// Buffer parity; `f[tick & 1]` is the current buffer.
    tick: usize,
    f: [wgpu::Buffer; 2],
    material_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    pipeline: wgpu::ComputePipeline,
    bind_groups: [wgpu::BindGroup; 2],
    moments: MomentsPipeline,
    populations_staging: wgpu::Buffer,
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> Lattice<D> {
    /// Build the generated kernels and allocate both population buffers,
    /// initialized to the equilibrium distribution at ρ = 1, u = 0.
    ///
    /// All cells start as ghost; upload a classification with
    /// [`Lattice::write_material`] before stepping does any work.
    pub fn new(context: &GpuContext, geometry: Geometry, config: LatticeConfig) -> Result<Self> {
        let device = Arc::clone(&context.device);
        let queue = Arc::clone(&context.queue);

        let volume = geometry.volume();
        let population_bytes = (D::Q * volume * std::mem::size_of::<f32>()) as u64;

        let collide_src = codegen::collide_stream_source::<D>(&config.boundary)?;
        let moments_src = codegen::moments_source::<D>()?;

        let f = [0, 1].map(|i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if i == 0 { "Populations A" } else { "Populations B" }),
                size: population_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });

        // Zero-initialized, so every cell is ghost until classified.
        let material_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Material Tags"),
            size: (volume * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lattice Params"),
            size: std::mem::size_of::<LatticeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let populations_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Populations Staging"),
            size: population_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Catch generated-kernel validation failures here instead of
        // through the uncaptured-error hook.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Collide Stream Shader"),
            source: wgpu::ShaderSource::Wgsl(collide_src.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Collide Stream Bind Group Layout"),
            entries: &[
                // 0: params
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // 1: f_prev (read)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // 2: f_next (write)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // 3: material (read)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        // Ping-pong: parity selects which buffer is current. Flipping is a
        // parity toggle, never a copy.
        let bind_groups = [0usize, 1].map(|parity| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Collide Stream Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: f[parity].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: f[parity ^ 1].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: material_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Collide Stream Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Collide Stream Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("collide_and_stream"),
            compilation_options: Default::default(),
            cache: None,
        });

        let moments = MomentsPipeline::new(&device, &moments_src, &params_buffer, &f, volume);

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::KernelBuild(error.to_string()));
        }

        log::info!(
            "lattice ready: {}x{}x{} cells, Q{}, omega {}",
            geometry.size_x(),
            geometry.size_y(),
            geometry.size_z(),
            D::Q,
            1.0 / config.tau
        );

        let mut lattice = Self {
            device,
            queue,
            geometry,
            omega: 1.0 / config.tau,
            time: 0,
            tick: 0,
            f,
            material_buffer,
            params_buffer,
            pipeline,
            bind_groups,
            moments,
            populations_staging,
            _descriptor: PhantomData,
        };
        lattice.write_populations(|_, _, _| CellInit::default());
        Ok(lattice)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn omega(&self) -> f32 {
        self.omega
    }

    /// Steps issued since the last (re)initialization.
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Index of the buffer currently holding the authoritative field.
    /// Flips exactly once per step; an even number of steps is an identity.
    pub fn current_index(&self) -> usize {
        self.tick & 1
    }

    /// Upload a material classification. Blocks until in-flight work has
    /// drained so the array is never swapped under a pending invocation.
    pub fn write_material(&mut self, material: &MaterialMap) {
        assert_eq!(
            material.geometry(),
            &self.geometry,
            "material map geometry does not match lattice geometry"
        );
        self.sync();
        self.queue
            .write_buffer(&self.material_buffer, 0, bytemuck::cast_slice(material.tags()));
    }

    /// Reinitialize both population buffers from per-cell macroscopic
    /// state, e.g. to seed a density perturbation. Resets the step counter
    /// and makes buffer A current again.
    pub fn write_populations<F>(&mut self, mut init: F)
    where
        F: FnMut(usize, usize, usize) -> CellInit,
    {
        self.sync();

        let volume = self.geometry.volume();
        let mut data = vec![0.0f32; D::Q * volume];
        let mut f_eq = vec![0.0f32; D::Q];
        for z in 0..self.geometry.size_z() {
            for y in 0..self.geometry.size_y() {
                for x in 0..self.geometry.size_x() {
                    let cell = init(x, y, z);
                    D::equilibrium(cell.rho, cell.velocity, &mut f_eq);
                    let idx = self.geometry.index(x, y, z);
                    for (i, &f) in f_eq.iter().enumerate() {
                        data[i * volume + idx] = f;
                    }
                }
            }
        }

        // Both copies get the same field: ghost padding must be defined in
        // whichever buffer is current.
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        self.queue.write_buffer(&self.f[0], 0, bytes);
        self.queue.write_buffer(&self.f[1], 0, bytes);
        self.time = 0;
        self.tick = 0;
    }

    /// Issue one collide-and-stream invocation over the whole grid, then
    /// flip the buffers. Non-blocking; work queues on the device.
    pub fn step(&mut self) {
        let params = LatticeParams {
            size_x: self.geometry.size_x() as u32,
            size_y: self.geometry.size_y() as u32,
            size_z: self.geometry.size_z() as u32,
            volume: self.geometry.volume() as u32,
            omega: self.omega,
            time: self.time as f32,
            _pad0: 0.0,
            _pad1: 0.0,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Collide Stream Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Collide Stream Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.tick & 1], &[]);
            let (x, y) = self.dispatch_extent();
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.time += 1;
        self.tick ^= 1;
    }

    /// Issue `n` steps with no host-side synchronization in between.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Block until all previously issued device work has completed.
    pub fn sync(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Extract per-cell density and velocity from the current buffer.
    ///
    /// Implies a full synchronization barrier, so it is always safe to call
    /// after a batch of steps; idempotent between steps.
    pub fn moments(&self) -> Result<Vec<Moments>> {
        self.sync();
        self.moments.collect(
            &self.device,
            &self.queue,
            self.tick & 1,
            self.dispatch_extent(),
        )
    }

    /// Copy the current population buffer back to the host, laid out as
    /// `Q` planes of `volume` values. Implies a synchronization barrier.
    pub fn populations(&self) -> Result<Vec<f32>> {
        self.sync();

        let byte_size = (D::Q * self.geometry.volume() * std::mem::size_of::<f32>()) as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Populations Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &self.f[self.tick & 1],
            0,
            &self.populations_staging,
            0,
            byte_size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        self.populations_staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.device.poll(wgpu::Maintain::Wait);
        await_buffer_map(rx)?;

        let out = {
            let data = self.populations_staging.slice(..).get_mapped_range();
            bytemuck::cast_slice::<u8, f32>(&data).to_vec()
        };
        self.populations_staging.unmap();
        Ok(out)
    }

    /// Workgroup counts: x covers one xy plane, y covers the z extent.
    fn dispatch_extent(&self) -> (u32, u32) {
        let plane = (self.geometry.size_x() * self.geometry.size_y()) as u32;
        (
            (plane + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
            self.geometry.size_z() as u32,
        )
    }
}
