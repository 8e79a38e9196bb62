use std::sync::Arc;

use color_eyre::eyre::{self, Result, WrapErr};
use egui_wgpu::{Renderer, ScreenDescriptor};
use wgpu::{
	Adapter, CompositeAlphaMode, Device, Queue, Surface, SurfaceCapabilities, SurfaceTexture,
	TextureFormat,
};
use winit::dpi::{LogicalPosition, LogicalSize, PhysicalPosition, PhysicalSize, Position, Size};
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes, WindowId, WindowLevel};

use snapglot_protocol::{Point, Rect};

/// A borderless, transparent, always-on-top window covering one monitor, painted with egui.
///
/// `area` is the monitor in capture space (see `snapglot_pipeline::monitor_areas`).
pub struct EguiSurface {
	window: Arc<Window>,
	area: Rect,
	gpu: GpuContext,
	surface: Surface<'static>,
	surface_config: wgpu::SurfaceConfiguration,
	egui_ctx: egui::Context,
	egui_state: egui_winit::State,
	renderer: Renderer,
	label: &'static str,
}
impl EguiSurface {
	pub fn open(
		event_loop: &ActiveEventLoop,
		label: &'static str,
		area: Rect,
		configure: impl FnOnce(WindowAttributes) -> WindowAttributes,
	) -> Result<Self> {
		let (position, size) = placement(area);
		let attrs = Window::default_attributes()
			.with_title(label)
			.with_decorations(false)
			.with_transparent(true)
			.with_resizable(false)
			.with_window_level(WindowLevel::AlwaysOnTop)
			.with_position(position)
			.with_inner_size(size);
		let attrs = configure(attrs);
		let window =
			event_loop.create_window(attrs).wrap_err_with(|| format!("create {label} window"))?;
		let window = Arc::new(window);
		let (gpu, surface, surface_config) =
			GpuContext::new_with_surface(Arc::clone(&window), label)?;
		let egui_ctx = egui::Context::default();
		let egui_state = egui_winit::State::new(
			egui_ctx.clone(),
			egui::ViewportId::ROOT,
			window.as_ref(),
			None,
			None,
			None,
		);
		let renderer = Renderer::new(
			&gpu.device,
			surface_config.format,
			egui_wgpu::RendererOptions {
				msaa_samples: 1,
				depth_stencil_format: None,
				dithering: false,
				predictable_texture_filtering: false,
			},
		);

		Ok(Self {
			window,
			area,
			gpu,
			surface,
			surface_config,
			egui_ctx,
			egui_state,
			renderer,
			label,
		})
	}

	#[must_use]
	pub fn window(&self) -> &Window {
		&self.window
	}

	#[must_use]
	pub fn window_id(&self) -> WindowId {
		self.window.id()
	}

	#[must_use]
	pub fn area(&self) -> Rect {
		self.area
	}

	/// Capture-space point for a window-relative physical position.
	#[must_use]
	pub fn to_screen(&self, position: PhysicalPosition<f64>) -> Point {
		self.mapping().to_screen(position.x, position.y)
	}

	/// Capture-space rectangle in this window's egui points.
	#[must_use]
	pub fn to_local(&self, rect: Rect) -> egui::Rect {
		self.mapping().to_points(rect, self.window.scale_factor())
	}

	fn mapping(&self) -> ScreenMapping {
		ScreenMapping::new(self.area, self.window.inner_size().width)
	}

	pub fn handle_window_event(&mut self, event: &WindowEvent) {
		match event {
			WindowEvent::Resized(size) => self.resize(*size),
			WindowEvent::ScaleFactorChanged { .. } => self.resize(self.window.inner_size()),
			_ => {},
		}

		let _ = self.egui_state.on_window_event(&self.window, event);
	}

	pub fn draw(&mut self, mut ui: impl FnMut(&egui::Context, &Self)) -> Result<()> {
		let raw_input = self.egui_state.take_egui_input(&self.window);
		let egui_ctx = self.egui_ctx.clone();
		let full_output = egui_ctx.run(raw_input, |ctx| ui(ctx, self));

		self.egui_state.handle_platform_output(&self.window, full_output.platform_output);

		for (id, delta) in &full_output.textures_delta.set {
			self.renderer.update_texture(&self.gpu.device, &self.gpu.queue, *id, delta);
		}
		for id in &full_output.textures_delta.free {
			self.renderer.free_texture(id);
		}

		let pixels_per_point = self.window.scale_factor() as f32;
		let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, pixels_per_point);
		let size = self.window.inner_size();
		let screen_descriptor = ScreenDescriptor {
			size_in_pixels: [size.width.max(1), size.height.max(1)],
			pixels_per_point,
		};
		let frame = self.acquire_frame()?;
		let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
		let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
			label: Some(self.label),
		});

		self.renderer.update_buffers(
			&self.gpu.device,
			&self.gpu.queue,
			&mut encoder,
			&paint_jobs,
			&screen_descriptor,
		);

		{
			let rpass_desc = wgpu::RenderPassDescriptor {
				label: Some(self.label),
				color_attachments: &[Some(wgpu::RenderPassColorAttachment {
					view: &view,
					depth_slice: None,
					resolve_target: None,
					ops: wgpu::Operations {
						load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
						store: wgpu::StoreOp::Store,
					},
				})],
				depth_stencil_attachment: None,
				timestamp_writes: None,
				occlusion_query_set: None,
			};
			let mut rpass = encoder.begin_render_pass(&rpass_desc).forget_lifetime();

			self.renderer.render(&mut rpass, &paint_jobs, &screen_descriptor);
		}

		self.gpu.queue.submit(Some(encoder.finish()));
		self.window.pre_present_notify();
		frame.present();

		Ok(())
	}

	fn acquire_frame(&mut self) -> Result<SurfaceTexture> {
		match self.surface.get_current_texture() {
			Ok(frame) => Ok(frame),
			Err(wgpu::SurfaceError::Outdated) => {
				self.reconfigure_surface();

				self.surface.get_current_texture().wrap_err("get_current_texture after reconfigure")
			},
			Err(wgpu::SurfaceError::Lost) => {
				self.recreate_surface().wrap_err("recreate surface")?;

				self.surface.get_current_texture().wrap_err("get_current_texture after recreate")
			},
			Err(err) => Err(eyre::eyre!("get_current_texture failed: {err:?}")),
		}
	}

	fn recreate_surface(&mut self) -> Result<()> {
		self.surface = self
			.gpu
			.instance
			.create_surface(Arc::clone(&self.window))
			.wrap_err("create_surface")?;

		self.reconfigure_surface();

		Ok(())
	}

	fn reconfigure_surface(&mut self) {
		let caps = self.surface.get_capabilities(&self.gpu.adapter);

		self.surface_config.alpha_mode = pick_surface_alpha(&caps);

		self.surface.configure(&self.gpu.device, &self.surface_config);
	}

	fn resize(&mut self, size: PhysicalSize<u32>) {
		self.surface_config.width = size.width.max(1);
		self.surface_config.height = size.height.max(1);

		self.reconfigure_surface();
	}
}

/// Converts between capture space and the pixels of a window covering `area`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenMapping {
	area: Rect,
	/// Window pixels per capture unit: the monitor scale on macOS, 1 elsewhere.
	pixels_per_unit: f64,
}
impl ScreenMapping {
	#[must_use]
	pub fn new(area: Rect, window_width_px: u32) -> Self {
		let pixels_per_unit = if area.width == 0 || window_width_px == 0 {
			1.0
		} else {
			f64::from(window_width_px) / f64::from(area.width)
		};

		Self { area, pixels_per_unit }
	}

	#[must_use]
	pub fn to_screen(&self, x_px: f64, y_px: f64) -> Point {
		Point::new(
			self.area.x.saturating_add((x_px / self.pixels_per_unit).round() as i32),
			self.area.y.saturating_add((y_px / self.pixels_per_unit).round() as i32),
		)
	}

	#[must_use]
	pub fn to_points(&self, rect: Rect, pixels_per_point: f64) -> egui::Rect {
		let scale = (self.pixels_per_unit / pixels_per_point) as f32;
		let min = egui::pos2(
			(rect.x - self.area.x) as f32 * scale,
			(rect.y - self.area.y) as f32 * scale,
		);

		egui::Rect::from_min_size(
			min,
			egui::vec2(rect.width as f32 * scale, rect.height as f32 * scale),
		)
	}
}

/// xcap reports monitors in points on macOS and in pixels elsewhere; winit is
/// told which so the window lands exactly on the monitor.
fn placement(area: Rect) -> (Position, Size) {
	let width = area.width.max(1);
	let height = area.height.max(1);

	if cfg!(target_os = "macos") {
		(
			LogicalPosition::new(f64::from(area.x), f64::from(area.y)).into(),
			LogicalSize::new(f64::from(width), f64::from(height)).into(),
		)
	} else {
		(PhysicalPosition::new(area.x, area.y).into(), PhysicalSize::new(width, height).into())
	}
}

struct GpuContext {
	instance: wgpu::Instance,
	adapter: Adapter,
	device: Device,
	queue: Queue,
}
impl GpuContext {
	fn new_with_surface(
		window: Arc<Window>,
		label: &'static str,
	) -> Result<(Self, Surface<'static>, wgpu::SurfaceConfiguration)> {
		let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
		let surface = instance.create_surface(Arc::clone(&window)).wrap_err("create_surface")?;
		let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
			power_preference: wgpu::PowerPreference::LowPower,
			compatible_surface: Some(&surface),
			force_fallback_adapter: false,
		}))
		.map_err(|err| eyre::eyre!("Failed to request GPU adapter: {err}"))?;
		let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
			label: Some(label),
			required_features: wgpu::Features::empty(),
			required_limits: adapter.limits(),
			experimental_features: wgpu::ExperimentalFeatures::default(),
			memory_hints: wgpu::MemoryHints::MemoryUsage,
			trace: wgpu::Trace::Off,
		}))
		.wrap_err("request_device")?;
		let caps = surface.get_capabilities(&adapter);
		let format = pick_surface_format(&caps);
		let size = window.inner_size();
		let surface_config = wgpu::SurfaceConfiguration {
			usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
			format,
			width: size.width.max(1),
			height: size.height.max(1),
			present_mode: wgpu::PresentMode::AutoVsync,
			alpha_mode: pick_surface_alpha(&caps),
			view_formats: vec![format],
			desired_maximum_frame_latency: 2,
		};

		surface.configure(&device, &surface_config);

		Ok((Self { instance, adapter, device, queue }, surface, surface_config))
	}
}

fn pick_surface_format(caps: &SurfaceCapabilities) -> TextureFormat {
	caps.formats
		.iter()
		.copied()
		.find(|f| matches!(f, TextureFormat::Bgra8Unorm | TextureFormat::Rgba8Unorm))
		.unwrap_or(caps.formats[0])
}

/// Transparent windows need a non-opaque compositor mode when the platform offers one.
fn pick_surface_alpha(caps: &SurfaceCapabilities) -> CompositeAlphaMode {
	[CompositeAlphaMode::PreMultiplied, CompositeAlphaMode::PostMultiplied]
		.into_iter()
		.find(|mode| caps.alpha_modes.contains(mode))
		.or_else(|| caps.alpha_modes.iter().copied().find(|m| *m != CompositeAlphaMode::Opaque))
		.unwrap_or(caps.alpha_modes[0])
}
