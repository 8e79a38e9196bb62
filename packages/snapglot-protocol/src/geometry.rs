use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
	pub x: i32,
	pub y: i32,
}
impl Point {
	#[must_use]
	pub const fn new(x: i32, y: i32) -> Self {
		Self { x, y }
	}
}

/// Axis-aligned rectangle; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
	pub x: i32,
	pub y: i32,
	pub width: u32,
	pub height: u32,
}
impl Rect {
	#[must_use]
	pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}

	#[must_use]
	pub fn from_points(a: Point, b: Point) -> Self {
		let (min_x, max_x) = if a.x <= b.x { (a.x, b.x) } else { (b.x, a.x) };
		let (min_y, max_y) = if a.y <= b.y { (a.y, b.y) } else { (b.y, a.y) };
		let width = max_x.saturating_sub(min_x) as u32;
		let height = max_y.saturating_sub(min_y) as u32;

		Self { x: min_x, y: min_y, width, height }
	}

	#[must_use]
	pub fn origin(&self) -> Point {
		Point::new(self.x, self.y)
	}

	#[must_use]
	pub fn right(&self) -> i32 {
		self.x.saturating_add_unsigned(self.width)
	}

	#[must_use]
	pub fn bottom(&self) -> i32 {
		self.y.saturating_add_unsigned(self.height)
	}

	#[must_use]
	pub fn area(&self) -> u64 {
		u64::from(self.width) * u64::from(self.height)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	/// Pulls `point` onto the closed edge of this rectangle.
	#[must_use]
	pub fn clamp_point(&self, point: Point) -> Point {
		Point::new(point.x.clamp(self.x, self.right()), point.y.clamp(self.y, self.bottom()))
	}

	#[must_use]
	pub fn intersection(&self, other: &Rect) -> Option<Rect> {
		let left = self.x.max(other.x);
		let top = self.y.max(other.y);
		let right = self.right().min(other.right());
		let bottom = self.bottom().min(other.bottom());

		if right <= left || bottom <= top {
			return None;
		}

		Some(Rect::from_points(Point::new(left, top), Point::new(right, bottom)))
	}

	#[must_use]
	pub fn union(&self, other: &Rect) -> Rect {
		let left = self.x.min(other.x);
		let top = self.y.min(other.y);
		let right = self.right().max(other.right());
		let bottom = self.bottom().max(other.bottom());

		Rect::from_points(Point::new(left, top), Point::new(right, bottom))
	}

	/// Intersection-over-union in `[0, 1]`.
	#[must_use]
	pub fn overlap_ratio(&self, other: &Rect) -> f32 {
		let Some(shared) = self.intersection(other) else {
			return 0.0;
		};
		let shared = shared.area() as f64;
		let union = self.area() as f64 + other.area() as f64 - shared;

		if union <= 0.0 {
			return 0.0;
		}

		(shared / union) as f32
	}

	/// Moves this rectangle from a local space whose origin sits at `origin`.
	#[must_use]
	pub fn offset_by(&self, origin: Point) -> Rect {
		Rect {
			x: self.x.saturating_add(origin.x),
			y: self.y.saturating_add(origin.y),
			width: self.width,
			height: self.height,
		}
	}
}

/// Smallest accepted region, inclusive on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinSize {
	pub width: u32,
	pub height: u32,
}
impl MinSize {
	#[must_use]
	pub const fn square(side: u32) -> Self {
		Self { width: side, height: side }
	}

	#[must_use]
	pub fn admits(&self, rect: &Rect) -> bool {
		!rect.is_empty() && rect.width >= self.width && rect.height >= self.height
	}
}

impl Default for MinSize {
	fn default() -> Self {
		Self::square(10)
	}
}
