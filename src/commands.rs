//! Command-line front end.
//!
//! ```text
//! point2point monitors [--json]
//! point2point convert <px> [--dpi N] [--font-size N] [--viewport WxH] [--json]
//! point2point measure [--monitor NAME|all] [--from X,Y --to X,Y] [--dpi N] [--font-size N] [--json]
//! point2point config init [PATH]
//! point2point version | help
//! ```
//!
//! Without `--from/--to`, `measure` reads pointer events from stdin, one per
//! line: `move X Y`, `click X Y`, `esc`, `set dpi N`, `set font N`.

use std::path::PathBuf;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{self, AppConfig};
use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::monitors::{desktop_bounds, MonitorRegistry};
use crate::measure::pipeline::{
    measure_points, settings_for_region, start_session, DriverInput, DriverUpdate, SessionDriver,
};
use crate::measure::report::{self, MeasurementReport};
use crate::measure::session::{Measurement, SessionEvent};
use crate::measure::types::{Point, Selection};
use crate::measure::units::{convert, ConversionSettings, UnitResult};

pub const USAGE: &str = "\
Point2Point - measure on-screen distances in every CSS unit

USAGE:
    point2point monitors [--json]
    point2point convert <px> [--dpi N] [--font-size N] [--viewport WxH] [--json]
    point2point measure [--monitor NAME|all] [--from X,Y --to X,Y] [--dpi N] [--font-size N] [--json]
    point2point config init [PATH]
    point2point version
    point2point help

Without --from/--to, measure reads events from stdin, one per line:
    move X Y | click X Y | esc | set dpi N | set font N
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Monitors {
        json: bool,
    },
    Convert {
        pixels: f64,
        overrides: SettingsOverrides,
        viewport: Option<(f64, f64)>,
        json: bool,
    },
    Measure {
        selection: Selection,
        points: Option<(Point, Point)>,
        overrides: SettingsOverrides,
        json: bool,
    },
    ConfigInit {
        path: Option<PathBuf>,
    },
    Version,
    Help,
}

impl Command {
    /// Commands that read conversion, capture or topology settings.
    pub fn needs_config(&self) -> bool {
        matches!(
            self,
            Command::Monitors { .. } | Command::Convert { .. } | Command::Measure { .. }
        )
    }

    pub fn wants_json(&self) -> bool {
        matches!(
            self,
            Command::Monitors { json: true }
                | Command::Convert { json: true, .. }
                | Command::Measure { json: true, .. }
        )
    }
}

/// `--dpi` / `--font-size` given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsOverrides {
    pub dpi: Option<f64>,
    pub font_size: Option<f64>,
}

impl SettingsOverrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dpi) = self.dpi {
            config.conversion.dpi = dpi;
        }
        if let Some(size) = self.font_size {
            config.conversion.base_font_size = size;
        }
    }
}

/// What the process should report once a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Cancelled,
}

// ── Argument parsing ─────────────────────────────────────────────────────────

/// Parse arguments without the program name.
pub fn parse_args(args: &[String]) -> Point2PointResult<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "version" | "--version" | "-V" => Ok(Command::Version),
        "monitors" => {
            let mut flags = Flags::new(rest);
            let json = flags.switch("--json");
            flags.finish()?;
            Ok(Command::Monitors { json })
        }
        "convert" => {
            let mut flags = Flags::new(rest);
            let json = flags.switch("--json");
            let overrides = flags.overrides()?;
            let viewport = flags
                .value("--viewport")?
                .map(|v| parse_viewport(&v))
                .transpose()?;
            let pixels = match flags.positional().as_slice() {
                [px] => parse_number("pixel distance", px)?,
                [] => return Err(usage("convert needs a pixel distance")),
                _ => return Err(usage("convert takes a single pixel distance")),
            };
            flags.finish()?;
            Ok(Command::Convert {
                pixels,
                overrides,
                viewport,
                json,
            })
        }
        "measure" => {
            let mut flags = Flags::new(rest);
            let json = flags.switch("--json");
            let overrides = flags.overrides()?;
            let selection = flags
                .value("--monitor")?
                .map(|m| Selection::parse(&m))
                .unwrap_or(Selection::AllMonitors);
            let from = flags.value("--from")?.map(|v| parse_point(&v)).transpose()?;
            let to = flags.value("--to")?.map(|v| parse_point(&v)).transpose()?;
            let points = match (from, to) {
                (Some(a), Some(b)) => Some((a, b)),
                (None, None) => None,
                _ => return Err(usage("--from and --to must be given together")),
            };
            flags.finish()?;
            Ok(Command::Measure {
                selection,
                points,
                overrides,
                json,
            })
        }
        "config" => match rest {
            [sub] if sub == "init" => Ok(Command::ConfigInit { path: None }),
            [sub, path] if sub == "init" => Ok(Command::ConfigInit {
                path: Some(PathBuf::from(path)),
            }),
            _ => Err(usage("expected `config init [PATH]`")),
        },
        other => Err(usage(format!("unknown command {other:?}"))),
    }
}

/// Minimal flag scanner: every matched flag is removed, leftovers are errors.
struct Flags {
    args: Vec<String>,
}

impl Flags {
    fn new(args: &[String]) -> Self {
        Self {
            args: args.to_vec(),
        }
    }

    fn switch(&mut self, name: &str) -> bool {
        match self.args.iter().position(|a| a == name) {
            Some(i) => {
                self.args.remove(i);
                true
            }
            None => false,
        }
    }

    fn value(&mut self, name: &str) -> Point2PointResult<Option<String>> {
        let prefix = format!("{name}=");
        if let Some(i) = self.args.iter().position(|a| a.starts_with(&prefix)) {
            let arg = self.args.remove(i);
            return Ok(Some(arg[prefix.len()..].to_string()));
        }
        let Some(i) = self.args.iter().position(|a| a == name) else {
            return Ok(None);
        };
        if i + 1 >= self.args.len() {
            return Err(usage(format!("{name} needs a value")));
        }
        let value = self.args.remove(i + 1);
        self.args.remove(i);
        Ok(Some(value))
    }

    fn overrides(&mut self) -> Point2PointResult<SettingsOverrides> {
        Ok(SettingsOverrides {
            dpi: self
                .value("--dpi")?
                .map(|v| parse_number("--dpi", &v))
                .transpose()?,
            font_size: self
                .value("--font-size")?
                .map(|v| parse_number("--font-size", &v))
                .transpose()?,
        })
    }

    /// Take the arguments that do not look like flags.
    fn positional(&mut self) -> Vec<String> {
        let (positional, rest): (Vec<String>, Vec<String>) = std::mem::take(&mut self.args)
            .into_iter()
            .partition(|a| !a.starts_with("--"));
        self.args = rest;
        positional
    }

    fn finish(self) -> Point2PointResult<()> {
        match self.args.first() {
            None => Ok(()),
            Some(extra) => Err(usage(format!("unexpected argument {extra:?}"))),
        }
    }
}

fn usage(message: impl Into<String>) -> Point2PointError {
    Point2PointError::Usage(message.into())
}

fn parse_number(what: &str, raw: &str) -> Point2PointResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| usage(format!("{what}: {raw:?} is not a number")))
}

fn parse_int(what: &str, raw: &str) -> Point2PointResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| usage(format!("{what}: {raw:?} is not an integer")))
}

/// `X,Y`
fn parse_point(raw: &str) -> Point2PointResult<Point> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| usage(format!("expected X,Y but got {raw:?}")))?;
    Ok(Point::new(parse_int("x", x)?, parse_int("y", y)?))
}

/// `WxH`
fn parse_viewport(raw: &str) -> Point2PointResult<(f64, f64)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| usage(format!("expected WxH but got {raw:?}")))?;
    Ok((parse_number("viewport width", w)?, parse_number("viewport height", h)?))
}

/// One line of a `measure` event script; `None` for blank lines and comments.
pub fn parse_script_line(line: &str) -> Point2PointResult<Option<DriverInput>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    let input = match words.as_slice() {
        ["move", x, y] => DriverInput::Event(SessionEvent::PointerMoved(Point::new(
            parse_int("x", x)?,
            parse_int("y", y)?,
        ))),
        ["click", x, y] => DriverInput::Event(SessionEvent::Click(Point::new(
            parse_int("x", x)?,
            parse_int("y", y)?,
        ))),
        ["esc"] | ["escape"] => DriverInput::Event(SessionEvent::Escape),
        ["set", "dpi", v] => DriverInput::SetDpi(parse_number("dpi", v)?),
        ["set", "font", v] => DriverInput::SetBaseFontSize(parse_number("font size", v)?),
        _ => return Err(usage(format!("unrecognised event {line:?}"))),
    };
    Ok(Some(input))
}

// ── Execution ────────────────────────────────────────────────────────────────

pub async fn execute(command: Command, mut config: AppConfig) -> Point2PointResult<Outcome> {
    match command {
        Command::Help => {
            print!("{USAGE}");
            Ok(Outcome::Done)
        }
        Command::Version => {
            println!("point2point {}", env!("CARGO_PKG_VERSION"));
            Ok(Outcome::Done)
        }
        Command::Monitors { json } => {
            let monitors = MonitorRegistry::from_config(&config.topology).list_monitors().await;
            if json {
                println!("{}", report::to_json(&monitors)?);
            } else {
                print!("{}", report::render_monitors(&monitors));
            }
            Ok(Outcome::Done)
        }
        Command::Convert {
            pixels,
            overrides,
            viewport,
            json,
        } => {
            overrides.apply(&mut config);
            let settings = match viewport {
                Some((w, h)) => ConversionSettings::new(
                    config.conversion.dpi,
                    config.conversion.base_font_size,
                    w,
                    h,
                )?,
                None => {
                    let monitors = MonitorRegistry::from_config(&config.topology).list_monitors().await;
                    settings_for_region(&config.conversion, desktop_bounds(&monitors))?
                }
            };
            let table = convert(pixels, &settings)?;
            if json {
                println!("{}", report::to_json(&table)?);
            } else {
                print!("{}", report::render_table(&table));
            }
            Ok(Outcome::Done)
        }
        Command::Measure {
            selection,
            points,
            overrides,
            json,
        } => {
            overrides.apply(&mut config);
            // Fail on bad settings before taking a screenshot.
            ConversionSettings::new(config.conversion.dpi, config.conversion.base_font_size, 1.0, 1.0)?;

            let session = start_session(&config, &selection).await?;
            let region = session
                .capture()
                .map(|c| c.region())
                .ok_or_else(|| usage("session has no capture"))?;
            let settings = settings_for_region(&config.conversion, region)?;

            match points {
                Some((from, to)) => {
                    let (measurement, table) = measure_points(session, settings, from, to)?;
                    print_result(&measurement, &table, json)?;
                    Ok(Outcome::Done)
                }
                None => {
                    let driver = SessionDriver::new(session, settings)?;
                    run_event_script(driver, json).await
                }
            }
        }
        Command::ConfigInit { path } => {
            let path = match path {
                Some(p) => p,
                None => config::user_config_path()
                    .ok_or_else(|| Point2PointError::Config("no user config directory".into()))?,
            };
            if path.exists() {
                return Err(Point2PointError::Config(format!(
                    "{} already exists; not overwriting",
                    path.display()
                )));
            }
            config::save_config(&AppConfig::default(), &path)?;
            println!("wrote {}", path.display());
            Ok(Outcome::Done)
        }
    }
}

fn print_result(measurement: &Measurement, table: &UnitResult, json: bool) -> Point2PointResult<()> {
    if json {
        println!(
            "{}",
            report::to_json(&MeasurementReport {
                measurement,
                units: table,
            })?
        );
    } else {
        print!("{}", report::render_measurement(measurement, table));
    }
    Ok(())
}

/// Feed stdin events to the driver until the session finishes. End of input
/// before completion cancels the session.
async fn run_event_script(mut driver: SessionDriver, json: bool) -> Point2PointResult<Outcome> {
    eprintln!("Click FIRST point (esc to cancel)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = match parse_script_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let update = match driver.step(input, Instant::now()) {
            Ok(update) => update,
            Err(e @ Point2PointError::InvalidSettings(_)) => {
                eprintln!("{e}; keeping previous settings");
                continue;
            }
            Err(e) => return Err(e),
        };

        match update {
            DriverUpdate::Nothing => {}
            DriverUpdate::FirstPoint(p) => {
                eprintln!("First point ({}, {}). Click SECOND point (esc to cancel)", p.x, p.y);
            }
            DriverUpdate::Preview(frame) => println!("{}", report::render_preview(&frame)),
            DriverUpdate::SettingsChanged(s) => {
                eprintln!("settings: {} dpi, {}px base font", s.dpi, s.base_font_size);
            }
            DriverUpdate::Completed { measurement, table } => {
                print_result(&measurement, &table, json)?;
                return Ok(Outcome::Done);
            }
            DriverUpdate::Cancelled => return Ok(Outcome::Cancelled),
        }
    }

    tracing::info!("input closed before the second click; cancelling");
    driver.step(DriverInput::Event(SessionEvent::Escape), Instant::now())?;
    Ok(Outcome::Cancelled)
}
