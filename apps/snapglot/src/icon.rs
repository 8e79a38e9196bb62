use color_eyre::eyre::{Result, WrapErr};
use tray_icon::Icon;

/// Four corner brackets around two lines of "text".
pub fn default_tray_icon() -> Result<Icon> {
	let side: u32 = 16;
	let mut rgba = vec![0_u8; (side * side * 4) as usize];

	for y in 0..side {
		for x in 0..side {
			let i = ((y * side + x) * 4) as usize;
			let on_edge = x == 0 || y == 0 || x == side - 1 || y == side - 1;
			let near_corner = (x < 4 || x >= side - 4) && (y < 4 || y >= side - 4);
			let is_text = (4..=11).contains(&x) && (y == 6 || y == 9);

			if (on_edge && near_corner) || is_text {
				rgba[i + 3] = 255;
			}
		}
	}

	Icon::from_rgba(rgba, side, side).wrap_err("Failed to build tray icon from RGBA bytes")
}
