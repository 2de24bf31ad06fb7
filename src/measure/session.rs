/// One "click two points on the capture" interaction as an explicit state
/// machine.
///
/// ```text
/// AwaitingCapture ──capture ok──▶ AwaitingFirstPoint ──click──▶ AwaitingSecondPoint ──click──▶ Completed
///        │ capture failed / ESC           │ ESC                         │ ESC
///        └────────────────────────────────┴─────────────▶ Cancelled ◀───┘
/// ```
///
/// Events are handled one at a time in arrival order. Terminal sessions
/// reject every further event with `SessionAlreadyFinished`.
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::capture::CaptureAdapter;
use crate::measure::preview::preview;
use crate::measure::types::{CaptureResult, Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingCapture,
    AwaitingFirstPoint,
    AwaitingSecondPoint,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Pointer moved without a button press.
    PointerMoved(Point),
    Click(Point),
    Escape,
}

/// What handling one event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Nothing to show (e.g. motion before the first click).
    Ignored,
    FirstPoint(Point),
    /// Transient distance from the first point to the pointer.
    Preview { from: Point, to: Point, distance: f64 },
    Completed(Measurement),
    Cancelled,
}

/// Final result of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub session_id: Uuid,
    pub first: Point,
    pub second: Point,
    /// The same points on the virtual desktop.
    pub first_desktop: Point,
    pub second_desktop: Point,
    pub dx: u32,
    pub dy: u32,
    pub distance: f64,
    /// Desktop region the points were picked on.
    pub region: Rect,
    pub measured_at: DateTime<Utc>,
}

pub struct MeasurementSession {
    id: Uuid,
    state: SessionState,
    capture: Option<CaptureResult>,
    first_point: Option<Point>,
    result: Option<Measurement>,
}

impl MeasurementSession {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "measurement session created");
        Self {
            id,
            state: SessionState::AwaitingCapture,
            capture: None,
            first_point: None,
            result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn capture(&self) -> Option<&CaptureResult> {
        self.capture.as_ref()
    }

    pub fn first_point(&self) -> Option<Point> {
        self.first_point
    }

    pub fn result(&self) -> Option<&Measurement> {
        self.result.as_ref()
    }

    /// Capture `target` through `adapter`, or the whole desktop for `None`.
    /// A failure ends the session; the error is returned for the caller to
    /// report.
    pub async fn capture_with(
        &mut self,
        adapter: &CaptureAdapter,
        target: Option<Rect>,
    ) -> Point2PointResult<()> {
        self.expect_awaiting_capture()?;
        let captured = match target {
            Some(rect) => adapter.capture(rect).await,
            None => adapter.capture_desktop().await,
        };
        match captured {
            Ok(capture) => self.attach_capture(capture),
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "capture failed; session terminated");
                self.finish(SessionState::Cancelled);
                Err(e)
            }
        }
    }

    /// Hand the session a capture obtained elsewhere.
    pub fn attach_capture(&mut self, capture: CaptureResult) -> Point2PointResult<()> {
        self.expect_awaiting_capture()?;
        if capture.width() == 0 || capture.height() == 0 {
            self.finish(SessionState::Cancelled);
            return Err(Point2PointError::capture_unavailable("capture has no pixels"));
        }
        tracing::info!(
            session = %self.id,
            width = capture.width(),
            height = capture.height(),
            provider = %capture.provider,
            "capture attached; waiting for first point"
        );
        self.capture = Some(capture);
        self.state = SessionState::AwaitingFirstPoint;
        Ok(())
    }

    pub fn handle(&mut self, event: SessionEvent) -> Point2PointResult<SessionOutcome> {
        if self.state.is_terminal() {
            tracing::error!(session = %self.id, state = ?self.state, ?event, "event delivered to finished session");
            return Err(Point2PointError::SessionAlreadyFinished);
        }

        if event == SessionEvent::Escape {
            tracing::info!(session = %self.id, state = ?self.state, "session cancelled");
            self.finish(SessionState::Cancelled);
            return Ok(SessionOutcome::Cancelled);
        }

        match (self.state, event) {
            (SessionState::AwaitingCapture, _) => Ok(SessionOutcome::Ignored),
            (SessionState::AwaitingFirstPoint, SessionEvent::PointerMoved(_)) => Ok(SessionOutcome::Ignored),
            (SessionState::AwaitingFirstPoint, SessionEvent::Click(p)) => {
                let p = self.clamp(p);
                self.first_point = Some(p);
                self.state = SessionState::AwaitingSecondPoint;
                tracing::debug!(session = %self.id, x = p.x, y = p.y, "first point set");
                Ok(SessionOutcome::FirstPoint(p))
            }
            (SessionState::AwaitingSecondPoint, SessionEvent::PointerMoved(p)) => {
                let from = self.require_first_point()?;
                let to = self.clamp(p);
                Ok(SessionOutcome::Preview {
                    from,
                    to,
                    distance: preview(from, to),
                })
            }
            (SessionState::AwaitingSecondPoint, SessionEvent::Click(p)) => {
                let first = self.require_first_point()?;
                let second = self.clamp(p);
                let measurement = self.measurement(first, second)?;
                tracing::info!(
                    session = %self.id,
                    distance = measurement.distance,
                    dx = measurement.dx,
                    dy = measurement.dy,
                    "measurement completed"
                );
                self.result = Some(measurement.clone());
                self.finish(SessionState::Completed);
                Ok(SessionOutcome::Completed(measurement))
            }
            (_, SessionEvent::Escape) | (SessionState::Completed | SessionState::Cancelled, _) => {
                Err(Point2PointError::SessionAlreadyFinished)
            }
        }
    }

    fn expect_awaiting_capture(&self) -> Point2PointResult<()> {
        match self.state {
            SessionState::AwaitingCapture => Ok(()),
            s if s.is_terminal() => Err(Point2PointError::SessionAlreadyFinished),
            _ => Err(Point2PointError::Usage("session already has a capture".into())),
        }
    }

    fn require_first_point(&self) -> Point2PointResult<Point> {
        self.first_point
            .ok_or_else(|| Point2PointError::Usage("second point before first point".into()))
    }

    fn clamp(&self, p: Point) -> Point {
        match &self.capture {
            Some(c) => p.clamp_to(c.width(), c.height()),
            None => p,
        }
    }

    fn measurement(&self, first: Point, second: Point) -> Point2PointResult<Measurement> {
        let capture = self
            .capture
            .as_ref()
            .ok_or_else(|| Point2PointError::Usage("no capture attached".into()))?;
        Ok(Measurement {
            session_id: self.id,
            first,
            second,
            first_desktop: capture.to_desktop(first),
            second_desktop: capture.to_desktop(second),
            dx: first.x.abs_diff(second.x),
            dy: first.y.abs_diff(second.y),
            distance: preview(first, second),
            region: capture.region(),
            measured_at: Utc::now(),
        })
    }

    /// Enter a terminal state and release the capture.
    fn finish(&mut self, state: SessionState) {
        self.state = state;
        self.capture = None;
    }
}

impl Default for MeasurementSession {
    fn default() -> Self {
        Self::new()
    }
}
