//! wgpu compute backend for the particle field.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use instrument_core::{
    CoreError, CoreResult, FieldParams, FieldUniforms, GridField, SimulationBackend, StepUniforms,
    FIELD_STEP_WGSL,
};
use wgpu::util::DeviceExt;

const WORKGROUP: u32 = 64;
const VEC4_BYTES: u64 = 16;

/// What the adapter can do, captured once at startup.
#[derive(Clone, Copy, Debug)]
pub struct ComputeCaps {
    pub compute_shaders: bool,
    pub max_storage_buffers: u32,
    pub max_storage_binding: u64,
}

impl ComputeCaps {
    pub fn query(adapter: &wgpu::Adapter, limits: &wgpu::Limits) -> Self {
        let flags = adapter.get_downlevel_capabilities().flags;
        Self {
            compute_shaders: flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            max_storage_buffers: limits.max_storage_buffers_per_shader_stage,
            max_storage_binding: limits.max_storage_buffer_binding_size as u64,
        }
    }
}

struct Buffers {
    positions: [wgpu::Buffer; 2],
    /// `groups[i]` reads set `i` and writes set `1 - i`.
    groups: [wgpu::BindGroup; 2],
    count: u32,
}

/// Ping-pong position/velocity buffers advanced by `FIELD_STEP_WGSL`.
/// The renderer binds [`GpuFieldBackend::front_positions`] directly.
pub struct GpuFieldBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    caps: ComputeCaps,
    lost: Arc<AtomicBool>,
    uniforms: Option<wgpu::Buffer>,
    pipeline: Option<wgpu::ComputePipeline>,
    buffers: Option<Buffers>,
    front: usize,
}

impl GpuFieldBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, caps: ComputeCaps) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, msg| {
            log::warn!("[compute] device lost ({reason:?}): {msg}");
            flag.store(true, Ordering::Relaxed);
        });
        Self {
            device,
            queue,
            caps,
            lost,
            uniforms: None,
            pipeline: None,
            buffers: None,
            front: 0,
        }
    }

    /// Buffer holding the positions written by the most recent step.
    pub fn front_positions(&self) -> Option<&wgpu::Buffer> {
        self.buffers.as_ref().map(|b| &b.positions[self.front])
    }

    pub fn position_buffers(&self) -> Option<&[wgpu::Buffer; 2]> {
        self.buffers.as_ref().map(|b| &b.positions)
    }

    pub fn front(&self) -> usize {
        self.front
    }

    pub fn count(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.count)
    }

    fn layout(&self) -> wgpu::BindGroupLayout {
        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("field.step.layout"),
                entries: &[
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
                    storage(1, true),
                    storage(2, true),
                    storage(3, false),
                    storage(4, false),
                ],
            })
    }
}

impl SimulationBackend for GpuFieldBackend {
    fn label(&self) -> &str {
        "wgpu-compute"
    }

    fn supports_grid(&self, width: u32) -> bool {
        let bytes = (width as u64) * (width as u64) * VEC4_BYTES;
        self.caps.compute_shaders
            && self.caps.max_storage_buffers >= 4
            && bytes > 0
            && bytes <= self.caps.max_storage_binding
    }

    fn seed(&mut self, field: &GridField) -> CoreResult<()> {
        let (pos, vel) = field.to_vec4s();
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let make = |label: &str, data: &[[f32; 4]]| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(data),
                    usage,
                })
        };
        let positions = [make("field.pos.0", &pos), make("field.pos.1", &pos)];
        let velocities = [make("field.vel.0", &vel), make("field.vel.1", &vel)];

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field.uniforms"),
            size: std::mem::size_of::<FieldUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = self.layout();
        let group = |read: usize| {
            let write = 1 - read;
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("field.step.group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: positions[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: velocities[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: positions[write].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: velocities[write].as_entire_binding(),
                    },
                ],
            })
        };
        let groups = [group(0), group(1)];

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("field.step.shader"),
                source: wgpu::ShaderSource::Wgsl(FIELD_STEP_WGSL.into()),
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("field.step.pipeline_layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("field.step.pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("cs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        self.buffers = Some(Buffers {
            positions,
            groups,
            count: field.len() as u32,
        });
        self.uniforms = Some(uniforms);
        self.pipeline = Some(pipeline);
        self.front = 0;
        log::info!("[compute] seeded {} particles", field.len());
        Ok(())
    }

    fn step(&mut self, uniforms: &StepUniforms, params: &FieldParams) -> CoreResult<()> {
        if self.lost.load(Ordering::Relaxed) {
            return Err(CoreError::BackendFailure("gpu device lost".into()));
        }
        let (Some(buffers), Some(ubuf), Some(pipeline)) =
            (&self.buffers, &self.uniforms, &self.pipeline)
        else {
            return Err(CoreError::BackendFailure("compute field not seeded".into()));
        };
        let block = FieldUniforms::new(uniforms, params);
        self.queue.write_buffer(ubuf, 0, bytemuck::bytes_of(&block));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("field.step.encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("field.step.pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &buffers.groups[self.front], &[]);
            pass.dispatch_workgroups(buffers.count.div_ceil(WORKGROUP), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.front = 1 - self.front;
        Ok(())
    }
}
