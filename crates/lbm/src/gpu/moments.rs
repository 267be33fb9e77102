//! Moments extraction: density and velocity per cell.

use std::sync::mpsc;

use glam::Vec3;

use crate::Result;

use super::await_buffer_map;

/// Macroscopic per-cell quantities derived from the populations.
///
/// Always recomputable from a population snapshot; never authoritative.
/// In 2-D the z component of `velocity` is 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Moments {
    pub rho: f32,
    pub velocity: Vec3,
}

/// Compute pipeline reducing one population buffer into a vec4 per cell,
/// plus the staging readback to host memory.
///
/// The reduction is read-only with respect to populations and overwrites
/// the same moments buffer on every call; calling it twice without an
/// intervening step yields bit-identical output.
pub(crate) struct MomentsPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_groups: [wgpu::BindGroup; 2],
    moments_buffer: wgpu::Buffer,
    staging: wgpu::Buffer,
    volume: usize,
}

impl MomentsPipeline {
    /// Build the reduction pipeline. Call inside the caller's validation
    /// error scope so generated-source failures surface as `KernelBuild`.
    pub fn new(
        device: &wgpu::Device,
        source: &str,
        params_buffer: &wgpu::Buffer,
        populations: &[wgpu::Buffer; 2],
        volume: usize,
    ) -> Self {
        let byte_size = (volume * std::mem::size_of::<[f32; 4]>()) as u64;

        let moments_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell Moments"),
            size: byte_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Moments Staging"),
            size: byte_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Moments Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Moments Bind Group Layout"),
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
                // 1: populations (read)
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
                // 2: moments (output)
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
            ],
        });

        let bind_groups = [0, 1].map(|parity| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Moments Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: populations[parity].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: moments_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Moments Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Moments Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("collect_moments"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_groups,
            moments_buffer,
            staging,
            volume,
        }
    }

    /// Run the reduction over the population buffer selected by `parity`
    /// and read the result back, blocking until the copy completes.
    pub fn collect(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        parity: usize,
        workgroups: (u32, u32),
    ) -> Result<Vec<Moments>> {
        let byte_size = (self.volume * std::mem::size_of::<[f32; 4]>()) as u64;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Moments Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Moments Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[parity & 1], &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.moments_buffer, 0, &self.staging, 0, byte_size);
        queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        self.staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        device.poll(wgpu::Maintain::Wait);
        await_buffer_map(rx)?;

        let out = {
            let data = self.staging.slice(..).get_mapped_range();
            let raw: &[[f32; 4]] = bytemuck::cast_slice(&data);
            raw.iter()
                .map(|m| Moments {
                    rho: m[0],
                    velocity: Vec3::new(m[1], m[2], m[3]),
                })
                .collect()
        };
        self.staging.unmap();
        Ok(out)
    }
}
