use serde::{Deserialize, Serialize};

/// A pixel position inside a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, width) × [0, height)`. A zero dimension clamps to 0.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let max_x = (width as i64 - 1).max(0) as i32;
        let max_y = (height as i64 - 1).max(0) as i32;
        Self {
            x: self.x.clamp(0, max_x),
            y: self.y.clamp(0, max_y),
        }
    }

    /// Translate by a capture origin into virtual-desktop coordinates.
    pub fn offset(self, origin_x: i32, origin_y: i32) -> Self {
        Self {
            x: self.x + origin_x,
            y: self.y + origin_y,
        }
    }
}

/// Axis-aligned region of the virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x,
            y,
            width: (right - x as i64) as u32,
            height: (bottom - y as i64) as u32,
        }
    }

    /// Overlap of two rectangles, `None` when they do not intersect.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x as i64 || bottom <= y as i64 {
            return None;
        }
        Some(Rect {
            x,
            y,
            width: (right - x as i64) as u32,
            height: (bottom - y as i64) as u32,
        })
    }
}

/// One physical display as reported by a topology provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub origin_x: i32,
    pub origin_y: i32,
}

impl MonitorDescriptor {
    pub fn rect(&self) -> Rect {
        Rect::new(self.origin_x, self.origin_y, self.width, self.height)
    }
}

impl std::fmt::Display for MonitorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}x{} at ({},{})",
            self.name, self.width, self.height, self.origin_x, self.origin_y
        )
    }
}

/// Which part of the desktop a session captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Selection {
    AllMonitors,
    Monitor(String),
}

impl Selection {
    /// `"all"` (any case) selects the whole desktop, anything else a monitor by name.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("all monitors") {
            Selection::AllMonitors
        } else {
            Selection::Monitor(trimmed.to_string())
        }
    }
}

/// Unprocessed provider output: an image whose top-left pixel sits at
/// `(origin_x, origin_y)` on the virtual desktop.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub image: image::RgbaImage,
    pub origin_x: i32,
    pub origin_y: i32,
}

impl RawCapture {
    pub fn region(&self) -> Rect {
        Rect::new(
            self.origin_x,
            self.origin_y,
            self.image.width(),
            self.image.height(),
        )
    }
}

/// A captured region of the desktop, cropped to what was asked for.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub image: image::RgbaImage,
    pub origin_x: i32,
    pub origin_y: i32,
    /// Name of the provider that produced the image.
    pub provider: String,
}

impl CaptureResult {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn region(&self) -> Rect {
        Rect::new(self.origin_x, self.origin_y, self.width(), self.height())
    }

    /// Image-local point to virtual-desktop point.
    pub fn to_desktop(&self, point: Point) -> Point {
        point.offset(self.origin_x, self.origin_y)
    }
}
