use std::time::{Duration, Instant};

use color_eyre::eyre;
use color_eyre::eyre::Result;
use global_hotkey::GlobalHotKeyEvent;
use tray_icon::{
	TrayIcon, TrayIconBuilder, TrayIconEvent,
	menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem},
};
use winit::error::EventLoopError;
use winit::event::WindowEvent;
use winit::{
	application::ApplicationHandler,
	event_loop::{ActiveEventLoop, ControlFlow, EventLoopProxy},
	window::WindowId,
};

use snapglot_overlay::{OverlayLifecycle, RegionSelector, ResultDispatcher};
use snapglot_pipeline::{CaptureWorker, CommandQueue, RequestChannel, WorkerHandle};
use snapglot_protocol::{CaptureCommand, LanguagePair, Rect};

use crate::collaborators;
use crate::hotkeys::{
	HotkeyAction, HotkeyDispatcher, HotkeyIntent, intent_for, wants_escape_binding,
};
use crate::icon;
use crate::overlay_window::OverlayWindow;
use crate::selection_window::{SelectionControl, SelectionWindow};
use crate::settings::AppSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub enum UserEvent {
	TrayIcon(TrayIconEvent),
	Menu(MenuEvent),
	HotKey(GlobalHotKeyEvent),
}

struct TrayMenuIds {
	capture_region: MenuId,
	capture_full_screen: MenuId,
	clear: MenuId,
	quit: MenuId,
}

struct App {
	hotkeys: HotkeyDispatcher,
	commands: CommandQueue,
	languages: LanguagePair,
	dispatcher: ResultDispatcher,
	lifecycle: OverlayLifecycle,
	selector: RegionSelector,
	worker: Option<WorkerHandle>,
	tray_icon: Option<TrayIcon>,
	menu_ids: Option<TrayMenuIds>,
	/// One per monitor, in capture space.
	selection_windows: Vec<SelectionWindow>,
	overlay_windows: Vec<OverlayWindow>,
	/// Union of the monitors the overlay windows cover.
	screen: Rect,
}
impl App {
	fn is_selecting(&self) -> bool {
		!self.selection_windows.is_empty()
	}

	/// Current monitor layout. Overlay windows built for an older layout are dropped.
	fn refresh_monitors(&mut self) -> Option<Vec<Rect>> {
		let areas = match snapglot_pipeline::monitor_areas() {
			Ok(areas) if !areas.is_empty() => areas,
			Ok(_) => {
				tracing::warn!("No monitors available.");

				return None;
			},
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), "Failed to list monitors.");

				return None;
			},
		};

		if !self.overlay_windows.iter().map(OverlayWindow::area).eq(areas.iter().copied()) {
			self.overlay_windows.clear();
		}

		self.screen = areas.iter().copied().reduce(|a, b| a.union(&b)).unwrap_or(self.screen);

		Some(areas)
	}

	fn start_region_selection(&mut self, event_loop: &ActiveEventLoop, requested_by: &'static str) {
		if self.is_selecting() {
			tracing::info!(requested_by = %requested_by, "Selection already active; ignoring.");

			return;
		}
		if self.dispatcher.is_down() {
			tracing::warn!(requested_by = %requested_by, "Capture pipeline is down; ignoring.");

			return;
		}

		let Some(areas) = self.refresh_monitors() else {
			return;
		};

		// The page, not an earlier translation, is what gets selected and captured.
		if self.lifecycle.clear() {
			tracing::info!(requested_by = %requested_by, "Translations cleared for selection.");
		}

		self.selector.reset();
		self.selector.set_bounds(self.screen);

		for (index, area) in areas.into_iter().enumerate() {
			match SelectionWindow::open(event_loop, area, index == 0) {
				Ok(window) => self.selection_windows.push(window),
				Err(err) => tracing::warn!(
					error = %format!("{err:#}"),
					?area,
					"Failed to open selection surface."
				),
			}
		}

		if self.is_selecting() {
			tracing::info!(
				requested_by = %requested_by,
				bounds = ?self.screen,
				monitors = self.selection_windows.len(),
				"Selection surface opened."
			);
		}

		self.sync_overlay(event_loop);
	}

	fn request_full_screen(&mut self, event_loop: &ActiveEventLoop, requested_by: &'static str) {
		if self.dispatcher.is_down() {
			tracing::warn!(requested_by = %requested_by, "Capture pipeline is down; ignoring.");

			return;
		}

		if self.refresh_monitors().is_none() {
			return;
		}

		let request_id = self.commands.next_request_id();

		match self.commands.send(CaptureCommand::full_screen(request_id, self.languages.clone())) {
			Ok(()) => {
				tracing::info!(
					request_id = %request_id,
					requested_by = %requested_by,
					"Full screen capture requested."
				);

				self.lifecycle.mark_pending(request_id, None);
				self.sync_overlay(event_loop);
			},
			Err(err) => tracing::error!(error = %err, "Failed to enqueue full screen capture."),
		}
	}

	fn clear_overlay(&mut self, event_loop: &ActiveEventLoop, requested_by: &'static str) {
		if self.lifecycle.clear() {
			tracing::info!(requested_by = %requested_by, "Translations cleared.");
		}

		self.sync_overlay(event_loop);
	}

	fn quit(&mut self, event_loop: &ActiveEventLoop) {
		self.selection_windows.clear();
		self.overlay_windows.clear();

		if let Err(err) = self.commands.shutdown() {
			tracing::warn!(error = %err, "Worker already gone at shutdown.");
		}
		if let Some(mut worker) = self.worker.take()
			&& !worker.join_timeout(SHUTDOWN_GRACE)
		{
			tracing::warn!(
				grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
				"Capture worker still busy; exiting without it."
			);
		}

		event_loop.exit();
	}

	fn end_selection(&mut self, event_loop: &ActiveEventLoop, control: SelectionControl) {
		match control {
			SelectionControl::Continue => {
				for window in &self.selection_windows {
					window.request_redraw();
				}

				return;
			},
			SelectionControl::Committed { request_id, rect } => {
				self.lifecycle.mark_pending(request_id, Some(rect));
			},
			SelectionControl::Cancelled => tracing::info!("Selection cancelled."),
			SelectionControl::Failed(message) =>
				tracing::error!(error = %message, "Failed to submit selection."),
		}

		self.selection_windows.clear();
		self.sync_overlay(event_loop);
	}

	fn handle_hotkey(&mut self, event_loop: &ActiveEventLoop, action: HotkeyAction) {
		match intent_for(action, self.is_selecting()) {
			HotkeyIntent::Run(HotkeyAction::CaptureRegion) =>
				self.start_region_selection(event_loop, "global-hotkey"),
			HotkeyIntent::Run(HotkeyAction::CaptureFullScreen) =>
				self.request_full_screen(event_loop, "global-hotkey"),
			HotkeyIntent::Run(HotkeyAction::ClearOverlay) =>
				self.clear_overlay(event_loop, "global-hotkey"),
			HotkeyIntent::CancelSelection => {
				self.selector.reset();
				self.end_selection(event_loop, SelectionControl::Cancelled);
			},
			HotkeyIntent::Ignore =>
				tracing::info!(action = action.label(), "Selection active; ignoring hotkey."),
		}
	}

	/// Shows, hides, or creates the overlay windows to match the lifecycle.
	///
	/// Nothing is shown while a selection is open.
	fn sync_overlay(&mut self, event_loop: &ActiveEventLoop) {
		let selecting = self.is_selecting();
		let visible = self.lifecycle.is_visible() && !selecting;
		let showing = self.lifecycle.entry().is_some() || self.lifecycle.notice().is_some();

		self.hotkeys.set_clear_enabled(wants_escape_binding(showing, selecting));

		if !self.overlay_windows.is_empty() {
			for window in &mut self.overlay_windows {
				window.set_visible(visible);
			}

			return;
		}
		if !visible {
			return;
		}

		let Some(areas) = self.refresh_monitors() else {
			return;
		};

		for area in areas {
			match OverlayWindow::open(event_loop, area) {
				Ok(window) => self.overlay_windows.push(window),
				Err(err) => tracing::warn!(
					error = %format!("{err:#}"),
					?area,
					"Failed to open overlay window."
				),
			}
		}
	}

	fn install_tray(&mut self, event_loop: &ActiveEventLoop) {
		if self.tray_icon.is_some() {
			return;
		}

		let tray_menu = Menu::new();
		let region_item = MenuItem::new("Capture Region", true, None);
		let full_item = MenuItem::new("Capture Full Screen", true, None);
		let clear_item = MenuItem::new("Clear Translations", true, None);
		let quit_item = MenuItem::new("Quit", true, None);

		if let Err(err) = tray_menu.append_items(&[
			&region_item,
			&full_item,
			&PredefinedMenuItem::separator(),
			&clear_item,
			&PredefinedMenuItem::separator(),
			&quit_item,
		]) {
			tracing::warn!(error = ?err, "Failed to build tray menu.");

			event_loop.exit();

			return;
		}

		let icon = match icon::default_tray_icon() {
			Ok(icon) => icon,
			Err(err) => {
				tracing::warn!(error = ?err, "Failed to create tray icon image.");

				event_loop.exit();

				return;
			},
		};
		let tooltip = match self.hotkeys.label(HotkeyAction::CaptureRegion) {
			Some(hotkey) => format!("snapglot ({hotkey})"),
			None => String::from("snapglot"),
		};
		let tray_icon = match TrayIconBuilder::new()
			.with_tooltip(tooltip)
			.with_menu(Box::new(tray_menu))
			.with_icon(icon)
			.build()
		{
			Ok(icon) => icon,
			Err(err) => {
				tracing::warn!(error = ?err, "Failed to build tray icon.");

				event_loop.exit();

				return;
			},
		};

		self.menu_ids = Some(TrayMenuIds {
			capture_region: region_item.id().clone(),
			capture_full_screen: full_item.id().clone(),
			clear: clear_item.id().clone(),
			quit: quit_item.id().clone(),
		});
		self.tray_icon = Some(tray_icon);
	}

	fn handle_menu(&mut self, event_loop: &ActiveEventLoop, event: &MenuEvent) {
		let Some(ids) = self.menu_ids.as_ref() else {
			return;
		};
		let id = event.id();

		if id == &ids.capture_region {
			self.start_region_selection(event_loop, "tray-menu");
		} else if id == &ids.capture_full_screen {
			self.request_full_screen(event_loop, "tray-menu");
		} else if id == &ids.clear {
			self.clear_overlay(event_loop, "tray-menu");
		} else if id == &ids.quit {
			tracing::info!("Quit requested from tray menu.");

			self.quit(event_loop);
		} else {
			tracing::warn!(menu_id = ?id.as_ref(), "Ignoring unknown menu event.");
		}
	}
}

impl ApplicationHandler<UserEvent> for App {
	fn resumed(&mut self, event_loop: &ActiveEventLoop) {
		self.install_tray(event_loop);
	}

	fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
		match event {
			UserEvent::Menu(event) => self.handle_menu(event_loop, &event),
			UserEvent::HotKey(event) =>
				if let Some(action) = self.hotkeys.action_for(&event) {
					self.handle_hotkey(event_loop, action);
				},
			UserEvent::TrayIcon(TrayIconEvent::DoubleClick { .. }) =>
				self.start_region_selection(event_loop, "tray-icon"),
			UserEvent::TrayIcon(_) => {},
		}
	}

	fn window_event(
		&mut self,
		event_loop: &ActiveEventLoop,
		window_id: WindowId,
		event: WindowEvent,
	) {
		if let Some(window) =
			self.selection_windows.iter_mut().find(|window| window.window_id() == window_id)
		{
			if let WindowEvent::RedrawRequested = event {
				if let Err(err) = window.draw(&self.selector) {
					tracing::warn!(error = %err, "Selection surface draw failed.");
				}

				return;
			}

			let control = window.handle_window_event(&mut self.selector, &event);

			self.end_selection(event_loop, control);

			return;
		}

		let screen = self.screen;

		// Notices go on the first monitor only.
		if let Some((index, window)) = self
			.overlay_windows
			.iter_mut()
			.enumerate()
			.find(|(_, window)| window.window_id() == window_id)
		{
			match event {
				WindowEvent::RedrawRequested =>
					if let Err(err) = window.draw(&self.lifecycle, screen, index == 0) {
						tracing::warn!(error = %err, "Overlay draw failed.");
					},
				_ => window.handle_window_event(&event),
			}
		}
	}

	fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
		let now = Instant::now();
		let summary = self.dispatcher.pump(&mut self.lifecycle, now);
		let expired = self.lifecycle.tick(now);

		if summary.changed || expired {
			self.sync_overlay(event_loop);
		}

		let busy =
			self.is_selecting() || self.lifecycle.is_visible() || self.lifecycle.is_waiting();
		let interval = if busy { POLL_INTERVAL } else { IDLE_POLL_INTERVAL };
		let wake = match self.lifecycle.next_deadline() {
			Some(deadline) => deadline.min(now + interval),
			None => now + interval,
		};

		event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
	}

	fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
		// Covers exits that did not come through the Quit item.
		if let Some(mut worker) = self.worker.take() {
			let _ = self.commands.shutdown();

			worker.join_timeout(SHUTDOWN_GRACE);
		}

		tracing::info!("snapglot exiting.");
	}
}

pub fn run(settings: AppSettings) -> Result<()> {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let recognizer = settings.recognizer.clone();
	let translator = settings.translator.clone();
	let worker = CaptureWorker::spawn(worker, settings.queue_policy, move || {
		collaborators::build(recognizer, translator)
	})?;
	let hotkeys = HotkeyDispatcher::new(&settings.region_hotkey, &settings.fullscreen_hotkey);
	let languages = settings.languages();
	let selector = RegionSelector::new(
		commands.clone(),
		languages.clone(),
		Rect::new(0, 0, 0, 0),
		settings.min_size(),
	);
	let mut event_loop_builder = winit::event_loop::EventLoop::<UserEvent>::with_user_event();

	#[cfg(target_os = "macos")]
	{
		use winit::platform::macos::{ActivationPolicy, EventLoopBuilderExtMacOS};

		event_loop_builder.with_activation_policy(ActivationPolicy::Accessory);
		event_loop_builder.with_activate_ignoring_other_apps(false);
		event_loop_builder.with_default_menu(false);
	}

	let event_loop = event_loop_builder.build()?;
	let tray_proxy: EventLoopProxy<UserEvent> = event_loop.create_proxy();
	let mut app = App {
		hotkeys,
		commands,
		languages,
		dispatcher: ResultDispatcher::new(results),
		lifecycle: OverlayLifecycle::new(settings.display_duration()),
		selector,
		worker: Some(worker),
		tray_icon: None,
		menu_ids: None,
		selection_windows: Vec::new(),
		overlay_windows: Vec::new(),
		screen: Rect::new(0, 0, 0, 0),
	};

	TrayIconEvent::set_event_handler(Some(move |event| {
		let _ = tray_proxy.send_event(UserEvent::TrayIcon(event));
	}));

	let menu_proxy: EventLoopProxy<UserEvent> = event_loop.create_proxy();

	MenuEvent::set_event_handler(Some(move |event| {
		let _ = menu_proxy.send_event(UserEvent::Menu(event));
	}));

	let hotkey_proxy: EventLoopProxy<UserEvent> = event_loop.create_proxy();

	GlobalHotKeyEvent::set_event_handler(Some(move |event| {
		let _ = hotkey_proxy.send_event(UserEvent::HotKey(event));
	}));

	tracing::info!(
		region_hotkey = ?app.hotkeys.label(HotkeyAction::CaptureRegion),
		fullscreen_hotkey = ?app.hotkeys.label(HotkeyAction::CaptureFullScreen),
		"Starting tray-only snapglot app."
	);

	event_loop.run_app(&mut app).map_err(|err: EventLoopError| eyre::eyre!(err))?;

	Ok(())
}
