//! End-to-end flow with in-memory providers: topology → selection → capture
//! → session → conversion.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use point2point_lib::config::ConversionConfig;
use point2point_lib::errors::{Point2PointError, Point2PointResult};
use point2point_lib::measure::capture::CaptureAdapter;
use point2point_lib::measure::monitors::{
    capture_target, desktop_bounds, resolve_selection, MonitorRegistry,
};
use point2point_lib::measure::pipeline::{settings_for_region, DriverInput, DriverUpdate, SessionDriver};
use point2point_lib::measure::session::{MeasurementSession, SessionEvent, SessionState};
use point2point_lib::measure::traits::{CaptureProvider, TopologyProvider};
use point2point_lib::measure::types::{MonitorDescriptor, Point, RawCapture, Selection};
use point2point_lib::measure::units::{convert, ConversionSettings, Unit};

struct TwoMonitors;

#[async_trait]
impl TopologyProvider for TwoMonitors {
    fn name(&self) -> &str {
        "two-monitors"
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn query(&self) -> Point2PointResult<Vec<MonitorDescriptor>> {
        // Deliberately out of order.
        Ok(vec![
            MonitorDescriptor {
                name: "HDMI-1".into(),
                width: 1280,
                height: 1024,
                origin_x: 1920,
                origin_y: 0,
            },
            MonitorDescriptor {
                name: "eDP-1".into(),
                width: 1920,
                height: 1080,
                origin_x: 0,
                origin_y: 0,
            },
        ])
    }
}

/// Whole-desktop screenshot with a horizontal gradient.
struct Desktop {
    width: u32,
    height: u32,
}

#[async_trait]
impl CaptureProvider for Desktop {
    fn name(&self) -> &str {
        "desktop"
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn grab(&self) -> Point2PointResult<RawCapture> {
        Ok(RawCapture {
            image: RgbaImage::from_fn(self.width, self.height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
            }),
            origin_x: 0,
            origin_y: 0,
        })
    }
}

struct Broken;

#[async_trait]
impl CaptureProvider for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn grab(&self) -> Point2PointResult<RawCapture> {
        Err(Point2PointError::capture_unavailable("permission denied"))
    }
}

fn registry() -> MonitorRegistry {
    MonitorRegistry::new(vec![Box::new(TwoMonitors)], Duration::from_secs(1))
}

#[tokio::test]
async fn measures_on_a_single_monitor() {
    let monitors = registry().list_monitors().await;
    assert_eq!(monitors[0].name, "eDP-1");
    assert_eq!(desktop_bounds(&monitors).width, 3200);

    let rect = resolve_selection(&Selection::parse("HDMI-1"), &monitors).unwrap();
    let adapter = CaptureAdapter::new(
        vec![Box::new(Broken), Box::new(Desktop { width: 3200, height: 1080 })],
        Duration::from_secs(1),
    );

    let mut session = MeasurementSession::new();
    session.capture_with(&adapter, Some(rect)).await.unwrap();
    let capture = session.capture().unwrap();
    assert_eq!(capture.provider, "desktop");
    assert_eq!((capture.width(), capture.height()), (1280, 1024));
    assert_eq!((capture.origin_x, capture.origin_y), (1920, 0));

    let settings = ConversionSettings::for_viewport(1280.0, 1024.0).unwrap();
    let mut driver = SessionDriver::new(session, settings).unwrap();
    let now = Instant::now();

    driver
        .step(DriverInput::Event(SessionEvent::Click(Point::new(100, 100))), now)
        .unwrap();
    let update = driver
        .step(DriverInput::Event(SessionEvent::Click(Point::new(196, 100))), now)
        .unwrap();

    let DriverUpdate::Completed { measurement, table } = update else {
        panic!("expected a completed measurement, got {update:?}");
    };
    assert_eq!(measurement.distance, 96.0);
    assert_eq!(measurement.first_desktop, Point::new(2020, 100));
    assert_eq!(measurement.second_desktop, Point::new(2116, 100));
    assert_eq!(table.get(Unit::In), 1.0);
    assert_eq!(table.get(Unit::Pt), 72.0);
    assert_eq!(table.get(Unit::Rem), 6.0);
    assert_eq!(table.get(Unit::Vw), 7.5);
    assert_eq!(driver.session().state(), SessionState::Completed);
    assert!(driver.session().capture().is_none());
}

#[tokio::test]
async fn unknown_topology_keeps_the_whole_desktop() {
    let empty = MonitorRegistry::new(Vec::new(), Duration::from_secs(1)).list_monitors().await;
    assert!(empty.is_empty());

    let target = capture_target(&Selection::AllMonitors, &empty).unwrap();
    let adapter = CaptureAdapter::new(
        vec![Box::new(Desktop { width: 2560, height: 1440 })],
        Duration::from_secs(1),
    );
    let mut session = MeasurementSession::new();
    session.capture_with(&adapter, target).await.unwrap();

    let capture = session.capture().unwrap();
    assert_eq!((capture.width(), capture.height()), (2560, 1440));

    let settings = settings_for_region(&ConversionConfig::default(), capture.region()).unwrap();
    assert_eq!((settings.viewport_width, settings.viewport_height), (2560.0, 1440.0));

    let mut driver = SessionDriver::new(session, settings).unwrap();
    let now = Instant::now();
    driver
        .step(DriverInput::Event(SessionEvent::Click(Point::new(2000, 1200))), now)
        .unwrap();
    let DriverUpdate::Completed { measurement, .. } = driver
        .step(DriverInput::Event(SessionEvent::Click(Point::new(2500, 1200))), now)
        .unwrap()
    else {
        panic!("expected a completed measurement");
    };
    // Nothing was clamped to a 1920x1080 fallback.
    assert_eq!(measurement.second, Point::new(2500, 1200));
    assert_eq!(measurement.distance, 500.0);
}

#[tokio::test]
async fn unknown_monitor_is_rejected_before_capture() {
    let monitors = registry().list_monitors().await;
    let err = resolve_selection(&Selection::parse("DP-9"), &monitors).unwrap_err();
    match err {
        Point2PointError::InvalidSelection(msg) => {
            assert!(msg.contains("eDP-1"));
            assert!(msg.contains("HDMI-1"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn capture_failure_cancels_the_session() {
    let adapter = CaptureAdapter::new(vec![Box::new(Broken)], Duration::from_secs(1));
    let mut session = MeasurementSession::new();
    let rect = desktop_bounds(&[]);

    let err = session.capture_with(&adapter, Some(rect)).await.unwrap_err();
    match err {
        Point2PointError::CaptureUnavailable { reason, hint } => {
            assert!(reason.contains("broken: permission denied"));
            assert!(!hint.is_empty());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(matches!(
        session.handle(SessionEvent::Click(Point::new(1, 1))),
        Err(Point2PointError::SessionAlreadyFinished)
    ));
}

#[tokio::test]
async fn escape_after_first_point_produces_no_result() {
    let adapter = CaptureAdapter::new(
        vec![Box::new(Desktop { width: 1920, height: 1080 })],
        Duration::from_secs(1),
    );
    let mut session = MeasurementSession::new();
    session.capture_with(&adapter, None).await.unwrap();

    session.handle(SessionEvent::Click(Point::new(10, 10))).unwrap();
    session.handle(SessionEvent::PointerMoved(Point::new(50, 40))).unwrap();
    session.handle(SessionEvent::Escape).unwrap();

    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.result().is_none());
}

#[test]
fn conversion_matches_css_reference_values() {
    let settings = ConversionSettings::new(96.0, 16.0, 1920.0, 1080.0).unwrap();
    let table = convert(192.0, &settings).unwrap();
    assert_eq!(table.get(Unit::In), 2.0);
    assert_eq!(table.get(Unit::Pc), 12.0);
    assert_eq!(table.get(Unit::Em), 12.0);
    assert_eq!(table.get(Unit::Ch), 24.0);
    assert_eq!(table.get(Unit::Percent), 10.0);
    assert_eq!(table.get(Unit::Vmax), 10.0);
    assert!((table.get(Unit::Vh) - 17.777_777_777_777_78).abs() < 1e-9);
    assert!((table.get(Unit::Mm) - 50.8).abs() < 1e-9);
}
