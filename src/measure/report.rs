//! Human-readable and JSON renderings of measurement results.

use std::fmt::Write as _;

use serde::Serialize;

use crate::errors::Point2PointResult;
use crate::measure::preview::PreviewFrame;
use crate::measure::session::Measurement;
use crate::measure::types::MonitorDescriptor;
use crate::measure::units::{Unit, UnitResult};

/// Display name and short explanation of a unit.
pub fn describe(unit: Unit) -> (&'static str, &'static str) {
    match unit {
        Unit::Px => ("Pixels (px)", "Absolute pixel measurement"),
        Unit::Pt => ("Points (pt)", "1pt = 1/72 inch"),
        Unit::Pc => ("Picas (pc)", "1pc = 12pt"),
        Unit::In => ("Inches (in)", "Physical unit"),
        Unit::Cm => ("Centimeters (cm)", "Physical unit"),
        Unit::Mm => ("Millimeters (mm)", "Physical unit"),
        Unit::Q => ("Quarter-mm (Q)", "1Q = 1/4 millimeter"),
        Unit::Em => ("Em (em)", "Relative to font-size"),
        Unit::Rem => ("Rem (rem)", "Relative to root font-size"),
        Unit::Ch => ("Character (ch)", "Width of '0' (~0.5em)"),
        Unit::Ex => ("Ex height (ex)", "Height of 'x' (~0.5em)"),
        Unit::Percent => ("Percentage (%)", "Relative to viewport width"),
        Unit::Vw => ("Viewport Width (vw)", "1vw = 1% of viewport width"),
        Unit::Vh => ("Viewport Height (vh)", "1vh = 1% of viewport height"),
        Unit::Vmin => ("Viewport Min (vmin)", "1vmin = 1% of smaller dimension"),
        Unit::Vmax => ("Viewport Max (vmax)", "1vmax = 1% of larger dimension"),
    }
}

/// `12.00 px`, `0.1250 in`: pixels and points get two decimals, the rest four.
pub fn format_value(unit: Unit, value: f64) -> String {
    match unit {
        Unit::Px | Unit::Pt => format!("{value:.2} {unit}"),
        _ => format!("{value:.4} {unit}"),
    }
}

pub fn render_table(table: &UnitResult) -> String {
    let mut out = String::new();
    for v in table.iter() {
        let (label, description) = describe(v.unit);
        let _ = writeln!(
            out,
            "{label:<22}{:>16}  {description}",
            format_value(v.unit, v.value)
        );
    }
    out
}

pub fn render_measurement(measurement: &Measurement, table: &UnitResult) -> String {
    let mut out = String::new();
    let (p1, p2) = (measurement.first, measurement.second);
    let _ = writeln!(out, "Point 1: ({}, {})", p1.x, p1.y);
    let _ = writeln!(out, "Point 2: ({}, {})", p2.x, p2.y);
    let _ = writeln!(
        out,
        "Δx: {}px | Δy: {}px | Diagonal: {:.2}px",
        measurement.dx, measurement.dy, measurement.distance
    );
    let _ = writeln!(
        out,
        "Settings: {} dpi, {}px base font, {}x{} viewport",
        table.settings.dpi,
        table.settings.base_font_size,
        table.settings.viewport_width,
        table.settings.viewport_height
    );
    out.push('\n');
    out.push_str(&render_table(table));
    out
}

/// One status line per preview frame.
pub fn render_preview(frame: &PreviewFrame) -> String {
    format!(
        "preview ({},{}) -> ({},{}): {:.1} px",
        frame.from.x, frame.from.y, frame.to.x, frame.to.y, frame.distance
    )
}

pub fn render_monitors(monitors: &[MonitorDescriptor]) -> String {
    if monitors.is_empty() {
        return "No monitors detected; the full desktop will be captured.\n".to_string();
    }
    let mut out = String::from("Detected monitors:\n");
    for m in monitors {
        let _ = writeln!(out, "  {m}");
    }
    out
}

/// What `measure --json` prints.
#[derive(Debug, Serialize)]
pub struct MeasurementReport<'a> {
    pub measurement: &'a Measurement,
    pub units: &'a UnitResult,
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Point2PointResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::units::{convert, ConversionSettings};

    #[test]
    fn precision_depends_on_unit() {
        assert_eq!(format_value(Unit::Px, 12.0), "12.00 px");
        assert_eq!(format_value(Unit::Pt, 9.0), "9.00 pt");
        assert_eq!(format_value(Unit::In, 0.125), "0.1250 in");
        assert_eq!(format_value(Unit::Percent, 50.0), "50.0000 %");
    }

    #[test]
    fn table_lists_every_unit_in_order() {
        let settings = ConversionSettings::for_viewport(1920.0, 1080.0).unwrap();
        let table = convert(96.0, &settings).unwrap();
        let text = render_table(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert!(lines[0].starts_with("Pixels (px)"));
        assert!(lines[0].contains("96.00 px"));
        assert!(lines[3].contains("1.0000 in"));
        assert!(lines[15].starts_with("Viewport Max (vmax)"));
    }

    #[test]
    fn json_uses_css_unit_names() {
        let settings = ConversionSettings::for_viewport(100.0, 100.0).unwrap();
        let table = convert(10.0, &settings).unwrap();
        let json: serde_json::Value = serde_json::from_str(&to_json(&table).unwrap()).unwrap();
        let values = json["values"].as_array().unwrap();
        assert_eq!(values[0]["unit"], "px");
        assert_eq!(values[11]["unit"], "%");
        assert_eq!(values[11]["value"], 10.0);
    }

    #[test]
    fn empty_monitor_list_mentions_fallback() {
        assert!(render_monitors(&[]).contains("full desktop"));
        let text = render_monitors(&[MonitorDescriptor {
            name: "DP-3".into(),
            width: 1920,
            height: 1080,
            origin_x: 0,
            origin_y: 600,
        }]);
        assert!(text.contains("DP-3: 1920x1080 at (0,600)"));
    }
}
