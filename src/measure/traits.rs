use async_trait::async_trait;

use crate::errors::Point2PointResult;
use crate::measure::types::{MonitorDescriptor, RawCapture};

/// A backend able to grab the whole virtual desktop.
/// Implementations: external screenshot tools and the native xcap grabber.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap probe run before `grab`; unavailable providers are skipped.
    fn is_available(&self) -> bool;

    async fn grab(&self) -> Point2PointResult<RawCapture>;
}

/// A backend that reports display geometry.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn query(&self) -> Point2PointResult<Vec<MonitorDescriptor>>;
}
