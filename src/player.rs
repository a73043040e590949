//! Windowed scene player.
//!
//! Opens a winit window and draws the scene every frame with the time
//! elapsed since start, wrapped over the scene duration when looping.
//!
//! # Keys
//!
//! - `Escape` closes the window
//! - `Space` pauses and resumes playback

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::Window,
};

use crate::context::{Context, LOG_TARGET};
use crate::gpu::Renderer;
use crate::nodes::Node;

/// Scene attributes and window settings of the player.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    /// Scene duration in seconds.
    pub duration: f64,
    /// Width and height ratio the scene is drawn with, letterboxed into the
    /// window.
    pub aspect_ratio: (u32, u32),
    pub clear_color: [f64; 4],
    pub title: String,
    /// Restart from zero once `duration` is reached instead of holding the
    /// last frame.
    pub looping: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            duration: 30.0,
            aspect_ratio: (16, 9),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            title: "node.gl".to_string(),
            looping: true,
        }
    }
}

impl PlayerConfig {
    /// Scene time for `elapsed` seconds of playback.
    pub fn scene_time(&self, elapsed: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            elapsed.rem_euclid(self.duration)
        } else {
            elapsed.clamp(0.0, self.duration)
        }
    }

    /// Largest viewport of the configured aspect ratio centered in a
    /// `width` x `height` window.
    pub fn fit_viewport(&self, width: u32, height: u32) -> [i32; 4] {
        let (num, den) = self.aspect_ratio;
        if num == 0 || den == 0 || width == 0 || height == 0 {
            return [0, 0, width as i32, height as i32];
        }
        let ratio = num as f64 / den as f64;
        let (w, h) = (width as f64, height as f64);
        let (vw, vh) = if w / h > ratio { (h * ratio, h) } else { (w, w / ratio) };
        let (vw, vh) = (vw.round() as i32, vh.round() as i32);
        [(width as i32 - vw) / 2, (height as i32 - vh) / 2, vw, vh]
    }
}

struct Surface {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    renderer: Renderer,
    is_surface_configured: bool,
}

impl Surface {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let surface = instance.create_surface(window.clone())?;
        let (renderer, adapter) = Renderer::request(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("the surface supports no format"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        Ok(Self {
            window,
            surface,
            config,
            renderer,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(self.renderer.device(), &self.config);
            self.is_surface_configured = true;
        }
    }

    fn render(&mut self, ctx: &mut Context, t: f64) -> anyhow::Result<()> {
        self.window.request_redraw();
        if !self.is_surface_configured {
            return Ok(());
        }
        let output = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            e => {
                log::warn!(target: LOG_TARGET, "surface lost ({e:?}), reconfiguring");
                self.surface.configure(self.renderer.device(), &self.config);
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let frame = ctx.draw(t)?;
        self.renderer
            .render(&frame, &view, self.config.format, [self.config.width, self.config.height])?;
        output.present();
        Ok(())
    }
}

struct Player {
    async_runtime: tokio::runtime::Runtime,
    config: PlayerConfig,
    ctx: Context,
    surface: Option<Surface>,
    start: Instant,
    paused_at: Option<f64>,
    error: Option<anyhow::Error>,
}

impl Player {
    fn elapsed(&self) -> f64 {
        match self.paused_at {
            Some(t) => t,
            None => self.start.elapsed().as_secs_f64(),
        }
    }

    fn toggle_pause(&mut self) {
        match self.paused_at.take() {
            Some(t) => {
                self.start = Instant::now() - instant::Duration::from_secs_f64(t);
                log::info!(target: LOG_TARGET, "resumed at t={t:.3}");
            }
            None => {
                let t = self.elapsed();
                self.paused_at = Some(t);
                log::info!(target: LOG_TARGET, "paused at t={t:.3}");
            }
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        log::error!(target: LOG_TARGET, "{e:#}");
        self.error = Some(e);
        event_loop.exit();
    }
}

impl ApplicationHandler for Player {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.surface.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes().with_title(self.config.title.clone());
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        match self.async_runtime.block_on(Surface::new(window)) {
            Ok(surface) => {
                self.surface = Some(surface);
                self.start = Instant::now();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match key {
                NamedKey::Escape => event_loop.exit(),
                NamedKey::Space => self.toggle_pause(),
                _ => (),
            },
            WindowEvent::Resized(size) => {
                let viewport = self.config.fit_viewport(size.width, size.height);
                let [x, y, w, h] = viewport;
                self.ctx.set_viewport(x, y, w, h);
                if let Some(surface) = &mut self.surface {
                    surface.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let t = self.config.scene_time(self.elapsed());
                let Some(surface) = &mut self.surface else {
                    return;
                };
                if let Err(e) = surface.render(&mut self.ctx, t) {
                    self.fail(event_loop, e);
                }
            }
            _ => (),
        }
    }
}

/// Plays `scene` in a window until it is closed.
pub fn run(scene: Node, config: PlayerConfig) -> anyhow::Result<()> {
    crate::init_logging();

    let mut ctx = Context::new();
    ctx.set_clear_color(config.clear_color);
    ctx.set_scene(Some(scene))?;

    let event_loop = EventLoop::new()?;
    let mut player = Player {
        async_runtime: tokio::runtime::Runtime::new()?,
        config,
        ctx,
        surface: None,
        start: Instant::now(),
        paused_at: None,
        error: None,
    };
    event_loop.run_app(&mut player)?;

    match player.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
