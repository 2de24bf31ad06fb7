/// Live preview feed: the distance from the first click to wherever the
/// pointer currently is, converted for display while the second click is
/// still pending.
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::errors::Point2PointResult;
use crate::measure::types::Point;
use crate::measure::units::{convert, ConversionSettings, UnitResult};

/// Default minimum gap between two redraws (~60 fps).
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(16);

/// The distance label floats this many pixels above the segment midpoint.
const LABEL_OFFSET_Y: f64 = 15.0;

/// Euclidean distance between two points, in pixels.
pub fn preview(first: Point, current: Point) -> f64 {
    let dx = (current.x as i64 - first.x as i64) as f64;
    let dy = (current.y as i64 - first.y as i64) as f64;
    dx.hypot(dy)
}

/// Everything a UI needs to draw one preview update.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewFrame {
    pub from: Point,
    pub to: Point,
    pub distance: f64,
    /// Where to anchor the distance label.
    pub label_anchor: (f64, f64),
    pub table: UnitResult,
}

/// Drops redraws arriving faster than `min_interval`.
#[derive(Debug, Clone)]
pub struct PreviewThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl PreviewThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn should_emit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for PreviewThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REDRAW_INTERVAL)
    }
}

/// Builds throttled preview frames.
#[derive(Debug, Clone, Default)]
pub struct LivePreview {
    throttle: PreviewThrottle,
}

impl LivePreview {
    pub fn new(throttle: PreviewThrottle) -> Self {
        Self { throttle }
    }

    /// A frame for this pointer position, or `None` when throttled.
    pub fn frame_at(
        &mut self,
        first: Point,
        pointer: Point,
        settings: &ConversionSettings,
        now: Instant,
    ) -> Point2PointResult<Option<PreviewFrame>> {
        if !self.throttle.should_emit(now) {
            return Ok(None);
        }
        build_frame(first, pointer, settings).map(Some)
    }

    pub fn reset(&mut self) {
        self.throttle.reset();
    }
}

/// An unthrottled frame.
pub fn build_frame(
    first: Point,
    pointer: Point,
    settings: &ConversionSettings,
) -> Point2PointResult<PreviewFrame> {
    let distance = preview(first, pointer);
    let mid_x = (first.x as f64 + pointer.x as f64) / 2.0;
    let mid_y = (first.y as f64 + pointer.y as f64) / 2.0;
    Ok(PreviewFrame {
        from: first,
        to: pointer,
        distance,
        label_anchor: (mid_x, mid_y - LABEL_OFFSET_Y),
        table: convert(distance, settings)?,
    })
}
