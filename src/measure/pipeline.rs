//! Measurement pipeline: monitor selection → capture → session → conversion.
//!
//! `start_session` does everything up to a session waiting for its first
//! click; `SessionDriver` then feeds it events and settings edits one at a
//! time and turns the outcomes into display updates.
use std::time::Instant;

use crate::config::{AppConfig, ConversionConfig};
use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::capture::CaptureAdapter;
use crate::measure::monitors::{capture_target, desktop_bounds, MonitorRegistry};
use crate::measure::preview::{build_frame, LivePreview, PreviewFrame};
use crate::measure::probe::DisplayProtocol;
use crate::measure::session::{Measurement, MeasurementSession, SessionEvent, SessionOutcome};
use crate::measure::types::{Point, Rect, Selection};
use crate::measure::units::{convert, ConversionSettings, SettingsStore, UnitResult};

/// Settings for a captured region: configured DPI and font size, viewport
/// from config when set, otherwise the region size.
pub fn settings_for_region(
    conversion: &ConversionConfig,
    region: Rect,
) -> Point2PointResult<ConversionSettings> {
    ConversionSettings::new(
        conversion.dpi,
        conversion.base_font_size,
        conversion.viewport_width.unwrap_or(region.width as f64),
        conversion.viewport_height.unwrap_or(region.height as f64),
    )
}

/// Resolve `selection`, capture it and return a session waiting for the
/// first point. An unknown monitor fails before any session exists. With no
/// known topology, "all monitors" keeps the provider's full image.
pub async fn start_session(
    config: &AppConfig,
    selection: &Selection,
) -> Point2PointResult<MeasurementSession> {
    let registry = MonitorRegistry::from_config(&config.topology);
    let monitors = registry.list_monitors().await;
    let target = capture_target(selection, &monitors)?;
    tracing::info!(?selection, ?target, "selection resolved");

    let protocol = DisplayProtocol::detect();
    let adapter = CaptureAdapter::from_config(&config.capture, desktop_bounds(&monitors), protocol);
    tracing::debug!(?protocol, providers = ?adapter.provider_names(), "capture providers");

    let mut session = MeasurementSession::new();
    session.capture_with(&adapter, target).await?;
    Ok(session)
}

/// Input accepted by [`SessionDriver::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverInput {
    Event(SessionEvent),
    SetDpi(f64),
    SetBaseFontSize(f64),
}

/// What changed after one input.
#[derive(Debug, Clone)]
pub enum DriverUpdate {
    Nothing,
    FirstPoint(Point),
    Preview(PreviewFrame),
    SettingsChanged(ConversionSettings),
    Completed {
        measurement: Measurement,
        table: UnitResult,
    },
    Cancelled,
}

pub struct SessionDriver {
    session: MeasurementSession,
    settings: SettingsStore,
    live: LivePreview,
    last_pointer: Option<Point>,
}

impl SessionDriver {
    pub fn new(session: MeasurementSession, settings: ConversionSettings) -> Point2PointResult<Self> {
        Ok(Self {
            session,
            settings: SettingsStore::new(settings)?,
            live: LivePreview::default(),
            last_pointer: None,
        })
    }

    pub fn with_preview(mut self, live: LivePreview) -> Self {
        self.live = live;
        self
    }

    pub fn session(&self) -> &MeasurementSession {
        &self.session
    }

    pub fn settings(&self) -> ConversionSettings {
        self.settings.current()
    }

    /// Handle one input. Rejected settings edits return the error and keep
    /// the previous settings in effect.
    pub fn step(&mut self, input: DriverInput, now: Instant) -> Point2PointResult<DriverUpdate> {
        match input {
            DriverInput::Event(event) => self.on_event(event, now),
            DriverInput::SetDpi(dpi) => {
                self.settings.set_dpi(dpi)?;
                Ok(self.on_settings_changed())
            }
            DriverInput::SetBaseFontSize(size) => {
                self.settings.set_base_font_size(size)?;
                Ok(self.on_settings_changed())
            }
        }
    }

    fn on_event(&mut self, event: SessionEvent, now: Instant) -> Point2PointResult<DriverUpdate> {
        match self.session.handle(event)? {
            SessionOutcome::Ignored => Ok(DriverUpdate::Nothing),
            SessionOutcome::FirstPoint(p) => {
                self.live.reset();
                Ok(DriverUpdate::FirstPoint(p))
            }
            SessionOutcome::Preview { from, to, .. } => {
                self.last_pointer = Some(to);
                let settings = self.settings.current();
                Ok(self
                    .live
                    .frame_at(from, to, &settings, now)?
                    .map_or(DriverUpdate::Nothing, DriverUpdate::Preview))
            }
            SessionOutcome::Completed(measurement) => {
                let table = convert(measurement.distance, &self.settings.current())?;
                Ok(DriverUpdate::Completed { measurement, table })
            }
            SessionOutcome::Cancelled => Ok(DriverUpdate::Cancelled),
        }
    }

    /// A settings change mid-preview recomputes the current frame instead of
    /// waiting for the next pointer motion.
    fn on_settings_changed(&mut self) -> DriverUpdate {
        let settings = self.settings.current();
        if let (Some(first), Some(pointer)) = (self.session.first_point(), self.last_pointer) {
            if !self.session.state().is_terminal() {
                match build_frame(first, pointer, &settings) {
                    Ok(frame) => return DriverUpdate::Preview(frame),
                    Err(e) => tracing::warn!(error = %e, "could not refresh preview"),
                }
            }
        }
        DriverUpdate::SettingsChanged(settings)
    }
}

/// Apply two clicks to a fresh session and convert the result.
pub fn measure_points(
    session: MeasurementSession,
    settings: ConversionSettings,
    from: Point,
    to: Point,
) -> Point2PointResult<(Measurement, UnitResult)> {
    let mut driver = SessionDriver::new(session, settings)?;
    let now = Instant::now();
    driver.step(DriverInput::Event(SessionEvent::Click(from)), now)?;
    match driver.step(DriverInput::Event(SessionEvent::Click(to)), now)? {
        DriverUpdate::Completed { measurement, table } => Ok((measurement, table)),
        other => Err(Point2PointError::Usage(format!(
            "session did not complete after two clicks: {other:?}"
        ))),
    }
}
