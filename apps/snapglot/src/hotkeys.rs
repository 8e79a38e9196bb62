use std::fmt;
use std::str::FromStr;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HotkeyAction {
	CaptureRegion,
	CaptureFullScreen,
	/// Plain Escape, bound only while translations are showing.
	ClearOverlay,
}
impl HotkeyAction {
	#[must_use]
	pub const fn label(self) -> &'static str {
		match self {
			Self::CaptureRegion => "capture region",
			Self::CaptureFullScreen => "capture full screen",
			Self::ClearOverlay => "clear translations",
		}
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordError {
	#[error("chord is empty")]
	Empty,

	#[error("unknown token `{0}`")]
	UnknownToken(String),

	#[error("modifier `{0}` appears twice")]
	DuplicateModifier(String),

	#[error("chord names two keys, `{first}` and `{second}`")]
	MultipleKeys { first: String, second: String },

	#[error("chord has no key")]
	MissingKey,

	#[error("chord needs at least one modifier")]
	MissingModifier,
}

/// Parses `Ctrl+Shift+J` style chords.
///
/// Tokens are case-insensitive and joined by `+`. Modifiers are `ctrl`/`control`,
/// `shift`, `alt`/`option` and `win`/`super`/`cmd`/`meta`. Exactly one key is
/// allowed: a letter, a digit, `F1`..`F24`, or one of the named keys.
pub fn parse_chord(chord: &str) -> Result<HotKey, ChordError> {
	if chord.trim().is_empty() {
		return Err(ChordError::Empty);
	}

	let mut modifiers = Modifiers::empty();
	let mut key: Option<(String, Code)> = None;

	for raw in chord.split('+') {
		let token = raw.trim();

		if token.is_empty() {
			return Err(ChordError::UnknownToken(raw.to_owned()));
		}

		if let Some(modifier) = modifier_for(token) {
			if modifiers.contains(modifier) {
				return Err(ChordError::DuplicateModifier(token.to_owned()));
			}

			modifiers |= modifier;

			continue;
		}

		let code = code_for(token).ok_or_else(|| ChordError::UnknownToken(token.to_owned()))?;

		if let Some((first, _)) = &key {
			return Err(ChordError::MultipleKeys { first: first.clone(), second: token.to_owned() });
		}

		key = Some((token.to_owned(), code));
	}

	let Some((_, code)) = key else {
		return Err(ChordError::MissingKey);
	};

	if modifiers.is_empty() {
		return Err(ChordError::MissingModifier);
	}

	Ok(HotKey::new(Some(modifiers), code))
}

fn modifier_for(token: &str) -> Option<Modifiers> {
	match token.to_ascii_lowercase().as_str() {
		"ctrl" | "control" => Some(Modifiers::CONTROL),
		"shift" => Some(Modifiers::SHIFT),
		"alt" | "option" => Some(Modifiers::ALT),
		"win" | "super" | "cmd" | "meta" => Some(Modifiers::SUPER),
		_ => None,
	}
}

fn is_function_key(number: &str) -> bool {
	!number.starts_with('0') && number.parse::<u8>().is_ok_and(|n| (1..=24).contains(&n))
}

fn code_for(token: &str) -> Option<Code> {
	let lower = token.to_ascii_lowercase();
	let name = match lower.as_str() {
		"space" => String::from("Space"),
		"enter" => String::from("Enter"),
		"tab" => String::from("Tab"),
		"escape" | "esc" => String::from("Escape"),
		"insert" => String::from("Insert"),
		"delete" => String::from("Delete"),
		"home" => String::from("Home"),
		"end" => String::from("End"),
		"pageup" => String::from("PageUp"),
		"pagedown" => String::from("PageDown"),
		_ => {
			let mut chars = lower.chars();

			match (chars.next(), chars.as_str()) {
				(Some(c @ 'a'..='z'), "") => format!("Key{}", c.to_ascii_uppercase()),
				(Some(c @ '0'..='9'), "") => format!("Digit{c}"),
				(Some('f'), n) if is_function_key(n) => format!("F{n}"),
				_ => return None,
			}
		},
	};

	Code::from_str(&name).ok()
}

/// What a pressed action does, given whether a selection surface is open.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HotkeyIntent {
	Run(HotkeyAction),
	CancelSelection,
	Ignore,
}

/// Escape belongs to the selection surface while it is open; the capture chords wait.
#[must_use]
pub const fn intent_for(action: HotkeyAction, selecting: bool) -> HotkeyIntent {
	match (action, selecting) {
		(_, false) => HotkeyIntent::Run(action),
		(HotkeyAction::ClearOverlay, true) => HotkeyIntent::CancelSelection,
		(HotkeyAction::CaptureRegion | HotkeyAction::CaptureFullScreen, true) =>
			HotkeyIntent::Ignore,
	}
}

/// Escape is grabbed globally only while something is showing and no selection is open.
#[must_use]
pub const fn wants_escape_binding(showing: bool, selecting: bool) -> bool {
	showing && !selecting
}

/// Hotkey ids and the actions they trigger.
///
/// A chord that fails to parse or register disables only its own action.
#[derive(Debug)]
pub struct HotkeyBindings {
	bindings: Vec<(u32, HotkeyAction, HotKey)>,
	clear: HotKey,
	clear_bound: bool,
}
impl HotkeyBindings {
	pub fn bind<E: fmt::Display>(
		chords: &[(HotkeyAction, &str)],
		mut register: impl FnMut(HotKey) -> Result<(), E>,
	) -> Self {
		let mut bindings = Vec::new();

		for &(action, chord) in chords {
			let hotkey = match parse_chord(chord) {
				Ok(hotkey) => hotkey,
				Err(err) => {
					tracing::warn!(
						action = action.label(),
						chord = %chord,
						error = %err,
						"Invalid hotkey chord; action disabled."
					);

					continue;
				},
			};

			if let Err(err) = register(hotkey) {
				tracing::warn!(
					action = action.label(),
					chord = %chord,
					error = %err,
					"Failed to register hotkey; action disabled."
				);

				continue;
			}

			tracing::info!(action = action.label(), hotkey = %hotkey, "Registered hotkey.");

			bindings.push((hotkey.id(), action, hotkey));
		}

		Self { bindings, clear: HotKey::new(None, Code::Escape), clear_bound: false }
	}

	#[must_use]
	pub fn clear_hotkey(&self) -> HotKey {
		self.clear
	}

	#[must_use]
	pub fn is_clear_bound(&self) -> bool {
		self.clear_bound
	}

	pub fn set_clear_bound(&mut self, bound: bool) {
		self.clear_bound = bound;
	}

	#[must_use]
	pub fn label(&self, action: HotkeyAction) -> Option<String> {
		self.bindings
			.iter()
			.find(|(_, bound, _)| *bound == action)
			.map(|(_, _, hotkey)| hotkey.to_string())
	}

	/// The action a key press triggers. Releases and unknown ids map to nothing.
	#[must_use]
	pub fn action_for(&self, id: u32, state: HotKeyState) -> Option<HotkeyAction> {
		if state != HotKeyState::Pressed {
			return None;
		}
		if self.clear_bound && id == self.clear.id() {
			return Some(HotkeyAction::ClearOverlay);
		}

		self.bindings.iter().find(|(bound, _, _)| *bound == id).map(|(_, action, _)| *action)
	}
}

/// Owns the global hotkey manager and the bindings registered through it.
pub struct HotkeyDispatcher {
	manager: Option<GlobalHotKeyManager>,
	bindings: HotkeyBindings,
}
impl HotkeyDispatcher {
	pub fn new(region_chord: &str, fullscreen_chord: &str) -> Self {
		let manager = match GlobalHotKeyManager::new() {
			Ok(manager) => Some(manager),
			Err(err) => {
				tracing::warn!(error = ?err, "Failed to create global hotkey manager.");

				None
			},
		};
		let chords = [
			(HotkeyAction::CaptureRegion, region_chord),
			(HotkeyAction::CaptureFullScreen, fullscreen_chord),
		];
		let bindings = HotkeyBindings::bind(&chords, |hotkey| match manager.as_ref() {
			Some(manager) => manager.register(hotkey),
			None => Ok(()),
		});

		Self { manager, bindings }
	}

	/// Grabs Escape globally or releases it.
	pub fn set_clear_enabled(&mut self, enabled: bool) {
		if enabled == self.bindings.is_clear_bound() {
			return;
		}

		let Some(manager) = self.manager.as_ref() else {
			return;
		};
		let clear = self.bindings.clear_hotkey();
		let result = if enabled { manager.register(clear) } else { manager.unregister(clear) };

		if let Err(err) = result {
			tracing::warn!(enabled, error = ?err, "Failed to toggle the Escape binding.");
		}

		// Recorded even on failure so the toggle is not retried every tick.
		self.bindings.set_clear_bound(enabled);
	}

	#[must_use]
	pub fn label(&self, action: HotkeyAction) -> Option<String> {
		self.bindings.label(action)
	}

	#[must_use]
	pub fn action_for(&self, event: &GlobalHotKeyEvent) -> Option<HotkeyAction> {
		self.bindings.action_for(event.id(), event.state())
	}
}
