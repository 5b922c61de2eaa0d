// Tank steering demo: toroidal tile level, tanks driven by steering agents.
// Tiles, hulls and turrets are all drawn in a single instanced draw call.
//
// Controls: left click toggles a rock, right click (held) sets the target,
// F3 stats, F4 steering probes, Escape quits.

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec2};
use log::{error, info};
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use tank_steering::engine::camera::ScreenCamera;
use tank_steering::engine::config::{DEFAULT_CONFIG_PATH, GameConfig};
use tank_steering::engine::debug_overlay::{DebugOverlay, DebugStats, TankDebugDraw, TankReadout};
use tank_steering::engine::input::InputState;
use tank_steering::engine::steering::facing;
use tank_steering::engine::systems::{build_schedule, build_world};
use tank_steering::engine::{
    FrameTime, Level, ObstacleShape, PointerSnapshot, PositionProvider, Settings, TankBody, Tint, TurretMount,
};

/// Longest step the simulation takes in one frame, in seconds. Stalls (window
/// drags, breakpoints) would otherwise launch tanks through walls.
const MAX_FRAME_DT: f32 = 0.1;

const GROUND: [f32; 4] = [0.16, 0.20, 0.13, 1.0];
const GRID_LINE: wgpu::Color = wgpu::Color { r: 0.10, g: 0.12, b: 0.08, a: 1.0 };
const ROCK: [f32; 4] = [0.45, 0.43, 0.40, 1.0];
const TARGET_MARKER: [f32; 4] = [0.90, 0.25, 0.20, 1.0];

// ============================================================================
// VERTEX DEFINITION
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

// ============================================================================
// INSTANCE DATA (per-sprite)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    center: [f32; 2],
    /// (along axis, across axis)
    size: [f32; 2],
    /// Unit forward direction in world space.
    axis: [f32; 2],
    /// 0 = rectangle, 1 = inscribed disc.
    shape: f32,
    _padding: f32,
    color: [f32; 4],
}

impl InstanceData {
    const RECT: f32 = 0.0;
    const DISC: f32 = 1.0;

    fn new(center: Vec2, size: Vec2, axis: Vec2, shape: f32, color: [f32; 4]) -> Self {
        Self {
            center: center.to_array(),
            size: size.to_array(),
            axis: axis.to_array(),
            shape,
            _padding: 0.0,
            color,
        }
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const F2: wgpu::BufferAddress = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance, // One per instance, not per vertex
            attributes: &[
                // Center (location 1)
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // Size (location 2)
                wgpu::VertexAttribute {
                    offset: F2,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // Axis (location 3)
                wgpu::VertexAttribute {
                    offset: 2 * F2,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // Shape (location 4)
                wgpu::VertexAttribute {
                    offset: 3 * F2,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32,
                },
                // Color (location 5)
                wgpu::VertexAttribute {
                    offset: 4 * F2,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

// Unit quad centred on the origin
const QUAD_VERTICES: &[Vertex] = &[
    Vertex { position: [-0.5, -0.5] },
    Vertex { position: [ 0.5, -0.5] },
    Vertex { position: [ 0.5,  0.5] },
    Vertex { position: [-0.5,  0.5] },
];

const QUAD_INDICES: &[u16] = &[0, 1, 2, 0, 2, 3];

// ============================================================================
// UNIFORM DATA (camera only)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

impl Uniforms {
    fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}

// ============================================================================
// FRAME TIMING
// ============================================================================

/// Frame times collected over one-second windows for the stats panel.
struct FrameTimer {
    window_start: Instant,
    frames: u32,
    sum_ms: f32,
    min_ms: f32,
    max_ms: f32,
    // Last completed window
    fps: u32,
    avg_ms: f32,
    last_min_ms: f32,
    last_max_ms: f32,
}

impl FrameTimer {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            sum_ms: 0.0,
            min_ms: f32::MAX,
            max_ms: 0.0,
            fps: 0,
            avg_ms: 0.0,
            last_min_ms: 0.0,
            last_max_ms: 0.0,
        }
    }

    fn record(&mut self, dt: f32) {
        let ms = dt * 1000.0;
        self.frames += 1;
        self.sum_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);

        if self.window_start.elapsed().as_secs_f32() >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.sum_ms / self.frames as f32;
            self.last_min_ms = self.min_ms;
            self.last_max_ms = self.max_ms;

            self.window_start = Instant::now();
            self.frames = 0;
            self.sum_ms = 0.0;
            self.min_ms = f32::MAX;
            self.max_ms = 0.0;
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    // ECS World
    world: World,
    schedule: Schedule,
    last_update: Instant,

    camera: ScreenCamera,
    input: InputState,
    overlay: DebugOverlay,
    show_probes: bool,
    timer: FrameTimer,
}

impl State {
    async fn new(window: Arc<Window>, game: &GameConfig) -> Result<Self, Box<dyn Error>> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or("no suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_sprite.wgsl").into()),
        });

        let uniforms = Uniforms::new();

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), InstanceData::desc()], // Vertex + Instance buffers
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // The y-down projection flips winding; sprites are flat anyway.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let world = build_world(game);
        let grid = &world.resource::<Level>().0;

        // One sprite per tile, four per tank (hull, turret, barrel, target marker)
        let max_instances = (grid.width() * grid.height()) as usize + 4 * game.tank.count;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera = ScreenCamera::new(grid.screen_size(), Vec2::new(size.width as f32, size.height as f32));
        let overlay = DebugOverlay::new(&window, &device, surface_format);

        let mut input = InputState::new();
        input.window_size = (size.width, size.height);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices: QUAD_INDICES.len() as u32,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            world,
            schedule: build_schedule(),
            last_update: Instant::now(),
            camera,
            input,
            overlay,
            show_probes: false,
            timer: FrameTimer::new(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.camera.resize(Vec2::new(new_size.width as f32, new_size.height as f32));
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;
        self.timer.record(dt);

        self.world.resource_mut::<FrameTime>().dt = dt.min(MAX_FRAME_DT);
        *self.world.resource_mut::<PointerSnapshot>() = PointerSnapshot::capture(&self.input, &self.camera);
        self.schedule.run(&mut self.world);
        self.input.end_frame();
    }

    fn collect_instances(&mut self) -> Vec<InstanceData> {
        let mut instances = Vec::with_capacity(self.max_instances);

        let grid = &self.world.resource::<Level>().0;
        let tile = grid.tile_size();
        let rock_shape = match grid.obstacle_shape() {
            ObstacleShape::InscribedCircle => InstanceData::DISC,
            ObstacleShape::TileBox => InstanceData::RECT,
        };
        for (cell, t) in grid.tiles() {
            let center = grid.tile_center(cell);
            instances.push(if t.passable {
                InstanceData::new(center, tile - Vec2::ONE, Vec2::X, InstanceData::RECT, GROUND)
            } else {
                InstanceData::new(center, tile, Vec2::X, rock_shape, ROCK)
            });
        }

        let mut tanks = self.world.query::<(&TankBody, &Tint)>();
        for (body, tint) in tanks.iter(&self.world) {
            let agent = &body.agent;
            let size = agent.size();
            // Hull quads run length along the facing axis.
            instances.push(InstanceData::new(
                agent.position(),
                Vec2::new(size.y, size.x),
                facing(agent.rotation()),
                InstanceData::RECT,
                tint.to_rgba(),
            ));
            if let Some(target) = agent.target() {
                instances.push(InstanceData::new(target, Vec2::splat(8.0), Vec2::X, InstanceData::DISC, TARGET_MARKER));
            }
        }

        let mut turrets = self.world.query::<(&TurretMount, &Tint)>();
        for (mount, tint) in turrets.iter(&self.world) {
            let hull = self
                .world
                .get::<TankBody>(mount.owner)
                .map(|b| b.agent.size())
                .unwrap_or(Vec2::splat(32.0));
            let aim = facing(mount.turret.rotation);
            instances.push(InstanceData::new(
                mount.turret.position + aim * hull.y * 0.3,
                Vec2::new(hull.y * 0.5, hull.x * 0.15),
                aim,
                InstanceData::RECT,
                tint.to_rgba(),
            ));
            instances.push(InstanceData::new(
                mount.turret.position,
                Vec2::splat(hull.x * 0.55),
                aim,
                InstanceData::DISC,
                tint.to_rgba(),
            ));
        }

        instances.truncate(self.max_instances);
        instances
    }

    fn debug_stats(&mut self) -> DebugStats {
        let pointer = self.world.resource::<PointerSnapshot>().position;
        let lead_tank = self
            .world
            .query::<&TankBody>()
            .iter(&self.world)
            .next()
            .map(|body| TankReadout {
                mode: body.agent.mode(),
                speed: body.agent.velocity().length(),
                target: body.agent.target().map(|t| (t.x, t.y)),
                forces: *body.agent.last_forces(),
            });
        let tank_count = self.world.query::<&TankBody>().iter(&self.world).count();
        let grid = &self.world.resource::<Level>().0;

        DebugStats {
            fps: self.timer.fps,
            frame_time_avg_ms: self.timer.avg_ms,
            frame_time_min_ms: self.timer.last_min_ms,
            frame_time_max_ms: self.timer.last_max_ms,
            tank_count,
            obstacle_count: grid.obstacle_count(),
            grid_size: (grid.width(), grid.height()),
            draw_calls: 1,
            resolution: (self.size.width, self.size.height),
            pointer: (pointer.x, pointer.y),
            lead_tank,
        }
    }

    fn probe_draws(&mut self) -> Vec<TankDebugDraw> {
        let ppp = self.window.scale_factor() as f32;
        let camera = &self.camera;
        let to_screen = |p: Vec2| {
            let w = camera.world_to_window(p) / ppp;
            egui::pos2(w.x, w.y)
        };
        let dt = self.world.resource::<FrameTime>().dt;
        let tuning = self.world.resource::<Settings>().0.clone();

        self.world
            .query::<&TankBody>()
            .iter(&self.world)
            .map(|body| {
                let agent = &body.agent;
                let probes = agent.whiskers(&tuning, dt);
                TankDebugDraw {
                    pos: to_screen(agent.position()),
                    vel_tip: to_screen(agent.position() + agent.velocity() * 0.5),
                    whiskers: probes.segments().map(|(a, b)| (to_screen(a), to_screen(b))),
                    avoiding: agent.last_forces().avoid != Vec2::ZERO,
                    waypoint: agent.waypoint().map(to_screen),
                }
            })
            .collect()
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Collect instance data from ECS BEFORE creating render pass
        let instance_data = self.collect_instances();
        let instance_count = instance_data.len();
        if !instance_data.is_empty() {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instance_data));
        }

        let uniforms = Uniforms {
            view_proj: self.camera.view_projection().to_cols_array_2d(),
        };
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(GRID_LINE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..)); // Instance data
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            // ONE DRAW CALL for all sprites
            render_pass.draw_indexed(0..self.num_indices, 0, 0..instance_count as u32);
        }

        if self.overlay.visible || self.show_probes {
            let stats = self.overlay.visible.then(|| self.debug_stats());
            let probes = self.show_probes.then(|| self.probe_draws());
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.config.width, self.config.height],
                pixels_per_point: self.window.scale_factor() as f32,
            };
            self.overlay.render(
                &self.device,
                &self.queue,
                &mut encoder,
                &self.window,
                &view,
                &screen_descriptor,
                stats.as_ref(),
                probes.as_deref(),
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let game = GameConfig::load_or_default(&config_path);

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Tank Steering")
        .with_inner_size(winit::dpi::LogicalSize::new(game.level.screen_width, game.level.screen_height));

    #[allow(deprecated)]
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), &game))?;
    info!("{} tank(s) ready; F3 stats, F4 steering probes", game.tank.count);

    #[allow(deprecated)]
    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let _ = state.overlay.handle_window_event(&window, event);
                state.input.process_event(event);

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(key),
                                repeat: false,
                                ..
                            },
                        ..
                    } => match key {
                        KeyCode::F3 => state.overlay.toggle(),
                        KeyCode::F4 => state.show_probes = !state.show_probes,
                        _ => {}
                    },
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                error!("GPU out of memory");
                                control_flow.exit();
                            }
                            Err(e) => error!("{:?}", e),
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
