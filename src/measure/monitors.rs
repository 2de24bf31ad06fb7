/// Monitor registry: asks topology providers for display geometry and turns
/// a monitor selection into the desktop rectangle to capture.
///
/// Providers are tried in order (xrandr, wlr-randr, native xcap); the first
/// non-empty answer wins. Every failure degrades to an empty list, which
/// callers treat as "capture the whole desktop".
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;

use crate::config::TopologyConfig;
use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::probe::find_in_path;
use crate::measure::traits::TopologyProvider;
use crate::measure::types::{MonitorDescriptor, Rect, Selection};

/// Desktop assumed when no geometry is known at all.
pub const FALLBACK_DESKTOP: Rect = Rect::new(0, 0, 1920, 1080);

lazy_static! {
    // "DP-3 connected primary 1920x1080+1920+600 (normal left inverted ...) 527mm x 296mm"
    static ref XRANDR_CONNECTED: Regex =
        Regex::new(r"^(\S+)\s+connected\s+(?:primary\s+)?(\d+)x(\d+)([+-]\d+)([+-]\d+)").unwrap();
    static ref WLR_POSITION: Regex = Regex::new(r"Position:\s*(-?\d+)\s*,\s*(-?\d+)").unwrap();
    static ref WLR_MODE: Regex = Regex::new(r"(\d+)x(\d+)").unwrap();
}

// ── Parsers ──────────────────────────────────────────────────────────────────

/// Parse `xrandr --query` output. Disconnected outputs and connected outputs
/// without an active mode are skipped.
pub fn parse_xrandr(output: &str) -> Vec<MonitorDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let caps = XRANDR_CONNECTED.captures(line)?;
            let width = caps[2].parse::<u32>().ok()?;
            let height = caps[3].parse::<u32>().ok()?;
            if width == 0 || height == 0 {
                return None;
            }
            Some(MonitorDescriptor {
                name: caps[1].to_string(),
                width,
                height,
                origin_x: caps[4].parse().ok()?,
                origin_y: caps[5].parse().ok()?,
            })
        })
        .collect()
}

/// Parse `wlr-randr` output: one unindented header line per output followed
/// by indented properties. The mode flagged `current` gives the size.
pub fn parse_wlr_randr(output: &str) -> Vec<MonitorDescriptor> {
    #[derive(Default)]
    struct Block {
        name: String,
        size: Option<(u32, u32)>,
        position: (i32, i32),
    }

    fn finish(block: Option<Block>, out: &mut Vec<MonitorDescriptor>) {
        if let Some(Block {
            name,
            size: Some((width, height)),
            position,
        }) = block
        {
            if width > 0 && height > 0 {
                out.push(MonitorDescriptor {
                    name,
                    width,
                    height,
                    origin_x: position.0,
                    origin_y: position.1,
                });
            }
        }
    }

    let mut monitors = Vec::new();
    let mut current: Option<Block> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('\t') {
            finish(current.take(), &mut monitors);
            let name = line.split_whitespace().next().unwrap_or_default().to_string();
            current = Some(Block {
                name,
                ..Block::default()
            });
            continue;
        }
        let Some(block) = current.as_mut() else { continue };
        if let Some(caps) = WLR_POSITION.captures(line) {
            if let (Ok(x), Ok(y)) = (caps[1].parse(), caps[2].parse()) {
                block.position = (x, y);
            }
        } else if block.size.is_none() && line.to_lowercase().contains("current") {
            if let Some(caps) = WLR_MODE.captures(line) {
                if let (Ok(w), Ok(h)) = (caps[1].parse(), caps[2].parse()) {
                    block.size = Some((w, h));
                }
            }
        }
    }
    finish(current, &mut monitors);
    monitors
}

// ── Providers ────────────────────────────────────────────────────────────────

/// Runs a topology tool and parses its stdout.
pub struct CommandTopology {
    name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    parser: fn(&str) -> Vec<MonitorDescriptor>,
}

impl CommandTopology {
    pub fn xrandr() -> Self {
        Self {
            name: "xrandr",
            program: "xrandr",
            args: &["--query"],
            parser: parse_xrandr,
        }
    }

    pub fn wlr_randr() -> Self {
        Self {
            name: "wlr-randr",
            program: "wlr-randr",
            args: &[],
            parser: parse_wlr_randr,
        }
    }
}

#[async_trait]
impl TopologyProvider for CommandTopology {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        find_in_path(self.program).is_some()
    }

    async fn query(&self) -> Point2PointResult<Vec<MonitorDescriptor>> {
        let output = Command::new(self.program)
            .args(self.args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Point2PointError::Topology(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok((self.parser)(&stdout))
    }
}

/// Native enumeration through xcap, used when no topology tool is installed.
pub struct XcapTopology;

#[async_trait]
impl TopologyProvider for XcapTopology {
    fn name(&self) -> &str {
        "xcap"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn query(&self) -> Point2PointResult<Vec<MonitorDescriptor>> {
        tokio::task::spawn_blocking(|| -> Point2PointResult<Vec<MonitorDescriptor>> {
            let monitors = xcap::Monitor::all()
                .map_err(|e| Point2PointError::Topology(format!("xcap: {e}")))?;
            Ok(monitors
                .iter()
                .filter(|m| m.width() > 0 && m.height() > 0)
                .map(|m| MonitorDescriptor {
                    name: m.name().to_string(),
                    width: m.width(),
                    height: m.height(),
                    origin_x: m.x(),
                    origin_y: m.y(),
                })
                .collect())
        })
        .await
        .map_err(|e| Point2PointError::Topology(format!("join: {e}")))?
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub struct MonitorRegistry {
    providers: Vec<Box<dyn TopologyProvider>>,
    timeout: Duration,
}

impl MonitorRegistry {
    pub fn new(providers: Vec<Box<dyn TopologyProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(
            vec![
                Box::new(CommandTopology::xrandr()),
                Box::new(CommandTopology::wlr_randr()),
                Box::new(XcapTopology),
            ],
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Monitors sorted left to right, then top to bottom. Never fails; an
    /// empty list means nothing could be enumerated.
    pub async fn list_monitors(&self) -> Vec<MonitorDescriptor> {
        for provider in &self.providers {
            if !provider.is_available() {
                tracing::debug!(provider = provider.name(), "topology provider not available");
                continue;
            }
            match tokio::time::timeout(self.timeout, provider.query()).await {
                Ok(Ok(mut monitors)) if !monitors.is_empty() => {
                    monitors.sort_by_key(|m| (m.origin_x, m.origin_y));
                    tracing::info!(
                        provider = provider.name(),
                        count = monitors.len(),
                        "monitors enumerated"
                    );
                    return monitors;
                }
                Ok(Ok(_)) => {
                    tracing::debug!(provider = provider.name(), "topology provider reported no monitors");
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider = provider.name(), error = %e, "topology query failed");
                }
                Err(_) => {
                    tracing::warn!(
                        provider = provider.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "topology query timed out"
                    );
                }
            }
        }
        tracing::warn!("no topology provider succeeded; falling back to the full desktop");
        Vec::new()
    }
}

/// Bounding box of every monitor, or [`FALLBACK_DESKTOP`] for an empty list.
pub fn desktop_bounds(monitors: &[MonitorDescriptor]) -> Rect {
    monitors
        .iter()
        .map(MonitorDescriptor::rect)
        .reduce(|acc, r| acc.union(&r))
        .unwrap_or(FALLBACK_DESKTOP)
}

/// Region to crop the capture to; `None` means the provider's full image.
/// "All monitors" against an unknown topology is the whole virtual desktop,
/// whatever its real size.
pub fn capture_target(
    selection: &Selection,
    monitors: &[MonitorDescriptor],
) -> Point2PointResult<Option<Rect>> {
    if monitors.is_empty() && *selection == Selection::AllMonitors {
        return Ok(None);
    }
    resolve_selection(selection, monitors).map(Some)
}

/// The desktop rectangle a selection refers to.
pub fn resolve_selection(
    selection: &Selection,
    monitors: &[MonitorDescriptor],
) -> Point2PointResult<Rect> {
    match selection {
        Selection::AllMonitors => Ok(desktop_bounds(monitors)),
        Selection::Monitor(name) => monitors
            .iter()
            .find(|m| m.name == *name)
            .map(MonitorDescriptor::rect)
            .ok_or_else(|| {
                let known: Vec<&str> = monitors.iter().map(|m| m.name.as_str()).collect();
                Point2PointError::InvalidSelection(format!(
                    "no monitor named {name:?} (known: {})",
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                ))
            }),
    }
}
