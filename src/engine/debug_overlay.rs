use egui::epaint::Shadow;

use super::agent::SteeringMode;
use super::steering::ForceBreakdown;

pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub tank_count: usize,
    pub obstacle_count: usize,
    pub grid_size: (i32, i32),
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    /// Cursor in level pixels.
    pub pointer: (f32, f32),
    /// Readout for the first tank, if any.
    pub lead_tank: Option<TankReadout>,
}

pub struct TankReadout {
    pub mode: SteeringMode,
    pub speed: f32,
    pub target: Option<(f32, f32)>,
    pub forces: ForceBreakdown,
}

/// One tank's steering probes, already projected to egui screen points.
pub struct TankDebugDraw {
    pub pos: egui::Pos2,
    /// Tip of the velocity arrow (0.5 s ahead).
    pub vel_tip: egui::Pos2,
    /// `(origin, tip)` of the left, centre and right whiskers.
    pub whiskers: [(egui::Pos2, egui::Pos2); 3],
    /// Avoidance produced a force this tick.
    pub avoiding: bool,
    pub waypoint: Option<egui::Pos2>,
}

pub struct DebugOverlay {
    pub visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame with the optional debug layers:
    ///
    /// - `tank_draws` - F4 whiskers, velocity arrows and waypoints (`None` = hidden).
    /// - `stats`      - F3 stats panel (`None` = hidden).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        stats: Option<&DebugStats>,
        tank_draws: Option<&[TankDebugDraw]>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            // ── F4: steering probes on a background layer ────────────────────
            if let Some(draws) = tank_draws {
                let painter = ctx.layer_painter(egui::LayerId::new(
                    egui::Order::Background,
                    egui::Id::new("tank_debug"),
                ));
                let whisker_clear = egui::Stroke::new(
                    1.0,
                    egui::Color32::from_rgba_unmultiplied(255, 220, 0, 160),
                );
                let whisker_hit = egui::Stroke::new(
                    1.5,
                    egui::Color32::from_rgba_unmultiplied(255, 60, 40, 220),
                );
                let vel_stroke = egui::Stroke::new(
                    2.0,
                    egui::Color32::from_rgba_unmultiplied(80, 255, 140, 220),
                );
                let waypoint_stroke = egui::Stroke::new(
                    1.0,
                    egui::Color32::from_rgba_unmultiplied(0, 220, 255, 200),
                );
                for draw in draws {
                    let stroke = if draw.avoiding { whisker_hit } else { whisker_clear };
                    for (from, to) in draw.whiskers {
                        painter.line_segment([from, to], stroke);
                    }
                    painter.line_segment([draw.pos, draw.vel_tip], vel_stroke);
                    painter.circle_filled(
                        draw.vel_tip,
                        2.5,
                        egui::Color32::from_rgba_unmultiplied(80, 255, 140, 220),
                    );
                    if let Some(waypoint) = draw.waypoint {
                        painter.circle_stroke(waypoint, 6.0, waypoint_stroke);
                        painter.line_segment([draw.pos, waypoint], waypoint_stroke);
                    }
                }
            }

            // ── F3: stats panel ──────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(format!("FPS: {}", stats.fps));
                                ui.label(format!(
                                    "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                                    stats.frame_time_avg_ms,
                                    stats.frame_time_min_ms,
                                    stats.frame_time_max_ms
                                ));
                                ui.label(format!(
                                    "Grid: {} x {}  Rocks: {}",
                                    stats.grid_size.0, stats.grid_size.1, stats.obstacle_count
                                ));
                                ui.label(format!("Tanks: {}", stats.tank_count));
                                ui.label(format!("Draw calls: {}", stats.draw_calls));
                                ui.label(format!(
                                    "Resolution: {} x {}",
                                    stats.resolution.0, stats.resolution.1
                                ));
                                ui.label(format!(
                                    "Pointer: ({:.0}, {:.0})",
                                    stats.pointer.0, stats.pointer.1
                                ));
                                if let Some(tank) = &stats.lead_tank {
                                    ui.separator();
                                    ui.label(format!("Mode: {:?}  Speed: {:.1}", tank.mode, tank.speed));
                                    match tank.target {
                                        Some((x, y)) => ui.label(format!("Target: ({:.0}, {:.0})", x, y)),
                                        None => ui.label("Target: none"),
                                    };
                                    let f = &tank.forces;
                                    for (name, force) in [
                                        ("seek", f.seek),
                                        ("accel", f.accelerate),
                                        ("slow", f.slow),
                                        ("wander", f.wander),
                                        ("avoid", f.avoid),
                                        ("total", f.total()),
                                    ] {
                                        ui.label(format!(
                                            "{:>6}: ({:>7.1}, {:>7.1})",
                                            name, force.x, force.y
                                        ));
                                    }
                                }
                            });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
