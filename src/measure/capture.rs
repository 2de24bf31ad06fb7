/// Capture adapter: grabs the desktop through the first working provider and
/// crops the result to the requested rectangle.
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::CaptureConfig;
use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::probe::{find_in_path, DisplayProtocol};
use crate::measure::traits::CaptureProvider;
use crate::measure::types::{CaptureResult, RawCapture, Rect};

/// Screenshot files smaller than this are treated as failed captures.
const MIN_OUTPUT_BYTES: u64 = 1000;

pub const GNOME_SCREENSHOT: &str = "gnome-screenshot";
pub const GRIM: &str = "grim";
pub const SCROT: &str = "scrot";
pub const XCAP: &str = "xcap";

/// Provider names in preference order for a display protocol.
pub fn default_order(protocol: DisplayProtocol) -> Vec<&'static str> {
    match protocol {
        DisplayProtocol::Wayland => vec![GNOME_SCREENSHOT, GRIM, XCAP],
        DisplayProtocol::X11 => vec![GNOME_SCREENSHOT, SCROT, XCAP],
        DisplayProtocol::Unknown => vec![GNOME_SCREENSHOT, GRIM, SCROT, XCAP],
    }
}

// ── External screenshot tools ────────────────────────────────────────────────

/// A screenshot tool that writes the whole desktop to a file path given as
/// its last argument.
pub struct CommandCapture {
    program: &'static str,
    args: &'static [&'static str],
    settle: Duration,
    /// Desktop coordinate of the output image's top-left pixel.
    origin: (i32, i32),
}

impl CommandCapture {
    pub fn new(
        program: &'static str,
        args: &'static [&'static str],
        settle: Duration,
        origin: (i32, i32),
    ) -> Self {
        Self {
            program,
            args,
            settle,
            origin,
        }
    }

    pub fn gnome_screenshot(settle: Duration, origin: (i32, i32)) -> Self {
        Self::new(GNOME_SCREENSHOT, &["-f"], settle, origin)
    }

    pub fn grim(settle: Duration, origin: (i32, i32)) -> Self {
        Self::new(GRIM, &[], settle, origin)
    }

    pub fn scrot(settle: Duration, origin: (i32, i32)) -> Self {
        Self::new(SCROT, &[], settle, origin)
    }
}

/// Removes the screenshot file however the grab ends.
struct TempShot(PathBuf);

impl Drop for TempShot {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                tracing::debug!(path = %self.0.display(), error = %e, "could not remove screenshot file");
            }
        }
    }
}

#[async_trait]
impl CaptureProvider for CommandCapture {
    fn name(&self) -> &str {
        self.program
    }

    fn is_available(&self) -> bool {
        find_in_path(self.program).is_some()
    }

    async fn grab(&self) -> Point2PointResult<RawCapture> {
        let shot = TempShot(
            std::env::temp_dir().join(format!("point2point_{}.png", uuid::Uuid::new_v4())),
        );

        let output = Command::new(self.program)
            .args(self.args)
            .arg(&shot.0)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Point2PointError::capture_unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        // Some tools return before the file is fully written.
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let size = match tokio::fs::metadata(&shot.0).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(Point2PointError::capture_unavailable(format!(
                    "{} produced no output file",
                    self.program
                )))
            }
        };
        if size < MIN_OUTPUT_BYTES {
            return Err(Point2PointError::capture_unavailable(format!(
                "{} output is suspiciously small ({size} bytes)",
                self.program
            )));
        }

        let path = shot.0.clone();
        let image = tokio::task::spawn_blocking(move || image::open(path))
            .await
            .map_err(|e| Point2PointError::capture_unavailable(format!("join: {e}")))??
            .to_rgba8();
        tracing::debug!(
            provider = self.program,
            width = image.width(),
            height = image.height(),
            bytes = size,
            "screenshot decoded"
        );

        Ok(RawCapture {
            image,
            origin_x: self.origin.0,
            origin_y: self.origin.1,
        })
    }
}

// ── Native capture ───────────────────────────────────────────────────────────

/// Captures every monitor through xcap and composes them into one desktop image.
pub struct XcapCapture;

#[async_trait]
impl CaptureProvider for XcapCapture {
    fn name(&self) -> &str {
        XCAP
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn grab(&self) -> Point2PointResult<RawCapture> {
        tokio::task::spawn_blocking(grab_all_monitors)
            .await
            .map_err(|e| Point2PointError::capture_unavailable(format!("join: {e}")))?
    }
}

fn grab_all_monitors() -> Point2PointResult<RawCapture> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| Point2PointError::capture_unavailable(format!("xcap monitors: {e}")))?;

    let bounds = monitors
        .iter()
        .map(|m| Rect::new(m.x(), m.y(), m.width(), m.height()))
        .reduce(|acc, r| acc.union(&r))
        .ok_or_else(|| Point2PointError::capture_unavailable("xcap found no monitors"))?;

    let mut canvas = image::RgbaImage::new(bounds.width, bounds.height);
    for monitor in &monitors {
        let shot = monitor
            .capture_image()
            .map_err(|e| Point2PointError::capture_unavailable(format!("xcap capture: {e}")))?;
        let tile = image::RgbaImage::from_raw(shot.width(), shot.height(), shot.as_raw().clone())
            .ok_or_else(|| Point2PointError::capture_unavailable("xcap returned a malformed buffer"))?;
        image::imageops::overlay(
            &mut canvas,
            &tile,
            (monitor.x() - bounds.x) as i64,
            (monitor.y() - bounds.y) as i64,
        );
    }

    Ok(RawCapture {
        image: canvas,
        origin_x: bounds.x,
        origin_y: bounds.y,
    })
}

// ── Adapter ──────────────────────────────────────────────────────────────────

pub struct CaptureAdapter {
    providers: Vec<Box<dyn CaptureProvider>>,
    timeout: Duration,
}

impl CaptureAdapter {
    pub fn new(providers: Vec<Box<dyn CaptureProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Providers from `config.providers`, or the protocol's default order when
    /// that list is empty. `desktop` is where screenshot tools place their
    /// top-left pixel.
    pub fn from_config(config: &CaptureConfig, desktop: Rect, protocol: DisplayProtocol) -> Self {
        let settle = Duration::from_millis(config.settle_ms);
        let origin = (desktop.x, desktop.y);
        let names: Vec<&str> = if config.providers.is_empty() {
            default_order(protocol)
        } else {
            config.providers.iter().map(String::as_str).collect()
        };

        let providers = names
            .into_iter()
            .filter_map(|name| -> Option<Box<dyn CaptureProvider>> {
                match name {
                    GNOME_SCREENSHOT => Some(Box::new(CommandCapture::gnome_screenshot(settle, origin))),
                    GRIM => Some(Box::new(CommandCapture::grim(settle, origin))),
                    SCROT => Some(Box::new(CommandCapture::scrot(settle, origin))),
                    XCAP => Some(Box::new(XcapCapture)),
                    other => {
                        tracing::warn!(provider = other, "unknown capture provider in config; skipped");
                        None
                    }
                }
            })
            .collect();

        Self::new(providers, Duration::from_millis(config.timeout_ms))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Capture `rect` of the desktop. The first provider whose output is
    /// usable wins; there is no retry once every provider has failed.
    pub async fn capture(&self, rect: Rect) -> Point2PointResult<CaptureResult> {
        if rect.is_empty() {
            return Err(Point2PointError::capture_unavailable(format!(
                "requested region {}x{} is empty",
                rect.width, rect.height
            )));
        }
        self.capture_region(Some(rect)).await
    }

    /// Capture whatever the provider returns, uncropped.
    pub async fn capture_desktop(&self) -> Point2PointResult<CaptureResult> {
        self.capture_region(None).await
    }

    async fn capture_region(&self, target: Option<Rect>) -> Point2PointResult<CaptureResult> {

        let mut failures = Vec::new();
        for provider in &self.providers {
            if !provider.is_available() {
                tracing::debug!(provider = provider.name(), "capture provider not installed");
                continue;
            }

            let started = std::time::Instant::now();
            let outcome = match tokio::time::timeout(self.timeout, provider.grab()).await {
                Ok(Ok(raw)) => crop_to(raw, target, provider.name()),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Point2PointError::capture_unavailable(format!(
                    "timed out after {} ms",
                    self.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        provider = provider.name(),
                        width = result.width(),
                        height = result.height(),
                        origin_x = result.origin_x,
                        origin_y = result.origin_y,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "capture complete"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "capture provider failed");
                    failures.push(format!("{}: {}", provider.name(), failure_reason(&e)));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no capture provider is installed".to_string()
        } else {
            failures.join("; ")
        };
        Err(Point2PointError::capture_unavailable(reason))
    }
}

fn failure_reason(error: &Point2PointError) -> String {
    match error {
        Point2PointError::CaptureUnavailable { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

/// Crop a provider image to `target`, clamping to what the image actually
/// covers. `None` keeps the full image.
fn crop_to(raw: RawCapture, target: Option<Rect>, provider: &str) -> Point2PointResult<CaptureResult> {
    let covered = raw.region();
    let rect = target.unwrap_or(covered);
    let region = covered.intersection(&rect).ok_or_else(|| {
        Point2PointError::capture_unavailable(format!(
            "image {}x{} at ({},{}) does not cover the requested region",
            covered.width, covered.height, covered.x, covered.y
        ))
    })?;
    if region != rect {
        tracing::warn!(
            requested = ?rect,
            clamped = ?region,
            "capture only partially covers the requested region; clamping"
        );
    }

    let image = if region == covered {
        raw.image
    } else {
        image::imageops::crop_imm(
            &raw.image,
            (region.x - raw.origin_x) as u32,
            (region.y - raw.origin_y) as u32,
            region.width,
            region.height,
        )
        .to_image()
    };

    if is_blank(&image) {
        return Err(Point2PointError::capture_unavailable(
            "captured image is blank (every pixel identical)",
        ));
    }

    Ok(CaptureResult {
        image,
        origin_x: region.x,
        origin_y: region.y,
        provider: provider.to_string(),
    })
}

/// Zero-size or uniform images are what a denied or broken capture looks like.
pub fn is_blank(image: &image::RgbaImage) -> bool {
    let mut pixels = image.pixels();
    match pixels.next() {
        None => true,
        Some(first) => pixels.all(|p| p == first),
    }
}
