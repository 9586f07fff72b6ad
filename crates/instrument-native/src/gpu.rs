use std::sync::Arc;

use glam::{Mat4, Vec3};
use instrument_core::{
    CameraPose, FieldMode, FieldParams, FrameOutput, RenderParams, StepUniforms, PARTICLES_WGSL,
};
use wgpu::util::DeviceExt;

use crate::compute::{ComputeCaps, GpuFieldBackend};

const POINT_SIZE: f32 = 0.011;
const EYE_DISTANCE: f32 = 3.2;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
    right: [f32; 4],
    up: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LookUniforms {
    tone: [f32; 4],
    shape: [f32; 4],
}

impl LookUniforms {
    fn new(render: &RenderParams, step: &StepUniforms) -> Self {
        Self {
            tone: [render.hue, render.bloom, render.sparkle, render.pad],
            shape: [
                POINT_SIZE * (1.0 + render.texture_mix * 0.5),
                render.time,
                step.strength,
                render.mix,
            ],
        }
    }
}

pub struct GpuState<'w> {
    pub window: &'w winit::window::Window,
    surface: wgpu::Surface<'w>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    look_buffer: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
    field: FieldMode<GpuFieldBackend>,
    /// One render group per ping-pong position buffer.
    field_groups: Option<[wgpu::BindGroup; 2]>,
    fallback: Option<(wgpu::BindGroup, u32)>,
    width: u32,
    height: u32,
}

impl<'w> GpuState<'w> {
    pub async fn new(
        window: &'w winit::window::Window,
        params: FieldParams,
        seed: u64,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);
        log::info!("[gpu] adapter {:?}", adapter.get_info().name);

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps.formats[0];
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            desired_maximum_frame_latency: 2,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let caps = ComputeCaps::query(&adapter, &device.limits());
        let backend = GpuFieldBackend::new(Arc::clone(&device), Arc::clone(&queue), caps);
        let field = FieldMode::negotiate(backend, params, seed);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particles"),
            source: wgpu::ShaderSource::Wgsl(PARTICLES_WGSL.into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let look_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("look"),
            size: std::mem::size_of::<LookUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // billboard corners, two triangles
        let quad_vertices: [f32; 12] = [
            -0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, -0.5, 0.5, 0.5, -0.5, 0.5,
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vb"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("particles.layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("particles.pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: (std::mem::size_of::<f32>() * 2) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            }],
        }];
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        };
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("particles.pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            cache: None,
            multiview: None,
        });

        let mut state = Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            layout,
            camera_buffer,
            look_buffer,
            quad_vb,
            field,
            field_groups: None,
            fallback: None,
            width: size.width.max(1),
            height: size.height.max(1),
        };
        state.field_groups = state.build_field_groups();
        Ok(state)
    }

    fn group_for(&self, positions: &wgpu::Buffer) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particles.group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.look_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: positions.as_entire_binding(),
                },
            ],
        })
    }

    fn build_field_groups(&self) -> Option<[wgpu::BindGroup; 2]> {
        let buffers = self.field.simulation()?.backend().position_buffers()?;
        Some([self.group_for(&buffers[0]), self.group_for(&buffers[1])])
    }

    /// Static cloud uploaded on first use after negotiation or degradation.
    fn ensure_fallback(&mut self) {
        if self.fallback.is_some() {
            return;
        }
        let FieldMode::Fallback(cloud) = &self.field else {
            return;
        };
        let points: Vec<[f32; 4]> = cloud.points().iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fallback.points"),
                contents: bytemuck::cast_slice(&points),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let group = self.group_for(&buffer);
        self.fallback = Some((group, points.len() as u32));
        self.field_groups = None;
    }

    pub fn is_simulated(&self) -> bool {
        self.field.is_simulated()
    }

    pub fn step_field(&mut self, step: &StepUniforms) {
        if let Some(err) = self.field.step(step) {
            log::warn!("[gpu] field degraded: {err}");
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.width = new_size.width;
        self.height = new_size.height;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn camera(&self, pose: &CameraPose) -> CameraUniforms {
        let aspect = self.width as f32 / self.height as f32;
        let proj = Mat4::perspective_rh(pose.fov_deg.to_radians(), aspect, 0.05, 50.0);
        let eye = Vec3::new(
            pose.offset_x + EYE_DISTANCE * pose.yaw.sin(),
            0.0,
            EYE_DISTANCE * pose.yaw.cos(),
        );
        let view = Mat4::look_at_rh(eye, Vec3::new(pose.offset_x * 0.5, 0.0, 0.0), Vec3::Y);
        let right = view.row(0);
        let up = view.row(1);
        CameraUniforms {
            view_proj: (proj * view).to_cols_array_2d(),
            right: [right.x, right.y, right.z, 0.0],
            up: [up.x, up.y, up.z, 0.0],
        }
    }

    pub fn render(&mut self, frame_out: &FrameOutput) -> Result<(), wgpu::SurfaceError> {
        self.ensure_fallback();

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&self.camera(&frame_out.camera)),
        );
        self.queue.write_buffer(
            &self.look_buffer,
            0,
            bytemuck::bytes_of(&LookUniforms::new(&frame_out.render, &frame_out.step)),
        );

        let (group, count) = match (&self.field, &self.field_groups, &self.fallback) {
            (FieldMode::Simulated(sim), Some(groups), _) => {
                let backend = sim.backend();
                (&groups[backend.front()], backend.count())
            }
            (_, _, Some((group, n))) => (group, *n),
            _ => {
                frame.present();
                return Ok(());
            }
        };

        let pad = frame_out.render.pad as f64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rpass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.01 + pad * 0.02,
                            g: 0.01,
                            b: 0.025 + pad * 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, group, &[]);
            rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
            rpass.draw(0..6, 0..count);
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
