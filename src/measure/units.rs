//! Pixel distance → CSS length units.
//!
//! Physical units go through the configured DPI, font-relative units through
//! the base font size and viewport units through the size of the captured
//! region. `ch` and `ex` use half the base font size as the glyph metric.

use serde::{Deserialize, Serialize};

use crate::errors::{Point2PointError, Point2PointResult};

pub const DEFAULT_DPI: f64 = 96.0;
pub const DEFAULT_BASE_FONT_SIZE: f64 = 16.0;

const POINTS_PER_INCH: f64 = 72.0;
const POINTS_PER_PICA: f64 = 12.0;
const CM_PER_INCH: f64 = 2.54;
const MM_PER_INCH: f64 = 25.4;
const QUARTERS_PER_MM: f64 = 4.0;
const GLYPH_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "px")]
    Px,
    #[serde(rename = "pt")]
    Pt,
    #[serde(rename = "pc")]
    Pc,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "cm")]
    Cm,
    #[serde(rename = "mm")]
    Mm,
    #[serde(rename = "Q")]
    Q,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "rem")]
    Rem,
    #[serde(rename = "ch")]
    Ch,
    #[serde(rename = "ex")]
    Ex,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "vw")]
    Vw,
    #[serde(rename = "vh")]
    Vh,
    #[serde(rename = "vmin")]
    Vmin,
    #[serde(rename = "vmax")]
    Vmax,
}

impl Unit {
    /// Every unit, in display order.
    pub const ALL: [Unit; 16] = [
        Unit::Px,
        Unit::Pt,
        Unit::Pc,
        Unit::In,
        Unit::Cm,
        Unit::Mm,
        Unit::Q,
        Unit::Em,
        Unit::Rem,
        Unit::Ch,
        Unit::Ex,
        Unit::Percent,
        Unit::Vw,
        Unit::Vh,
        Unit::Vmin,
        Unit::Vmax,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Px => "px",
            Unit::Pt => "pt",
            Unit::Pc => "pc",
            Unit::In => "in",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::Q => "Q",
            Unit::Em => "em",
            Unit::Rem => "rem",
            Unit::Ch => "ch",
            Unit::Ex => "ex",
            Unit::Percent => "%",
            Unit::Vw => "vw",
            Unit::Vh => "vh",
            Unit::Vmin => "vmin",
            Unit::Vmax => "vmax",
        }
    }

    fn of_pixels(self, px: f64, s: &ConversionSettings) -> f64 {
        let inches = px / s.dpi;
        match self {
            Unit::Px => px,
            Unit::Pt => inches * POINTS_PER_INCH,
            Unit::Pc => inches * POINTS_PER_INCH / POINTS_PER_PICA,
            Unit::In => inches,
            Unit::Cm => inches * CM_PER_INCH,
            Unit::Mm => inches * MM_PER_INCH,
            Unit::Q => inches * MM_PER_INCH * QUARTERS_PER_MM,
            Unit::Em | Unit::Rem => px / s.base_font_size,
            Unit::Ch | Unit::Ex => px / (s.base_font_size * GLYPH_RATIO),
            Unit::Percent | Unit::Vw => px / s.viewport_width * 100.0,
            Unit::Vh => px / s.viewport_height * 100.0,
            Unit::Vmin => px / s.viewport_width.min(s.viewport_height) * 100.0,
            Unit::Vmax => px / s.viewport_width.max(s.viewport_height) * 100.0,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Inputs of a conversion. Constructed through [`ConversionSettings::new`] so
/// every instance handed out is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub dpi: f64,
    pub base_font_size: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl ConversionSettings {
    pub fn new(
        dpi: f64,
        base_font_size: f64,
        viewport_width: f64,
        viewport_height: f64,
    ) -> Point2PointResult<Self> {
        let settings = Self {
            dpi,
            base_font_size,
            viewport_width,
            viewport_height,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults for DPI and font size with the given viewport.
    pub fn for_viewport(viewport_width: f64, viewport_height: f64) -> Point2PointResult<Self> {
        Self::new(
            DEFAULT_DPI,
            DEFAULT_BASE_FONT_SIZE,
            viewport_width,
            viewport_height,
        )
    }

    pub fn validate(&self) -> Point2PointResult<()> {
        check_positive("dpi", self.dpi)?;
        check_positive("base font size", self.base_font_size)?;
        check_positive("viewport width", self.viewport_width)?;
        check_positive("viewport height", self.viewport_height)?;
        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> Point2PointResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Point2PointError::InvalidSettings(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitValue {
    pub unit: Unit,
    pub value: f64,
}

/// The full conversion table for one pixel distance and one settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    pub pixel_distance: f64,
    pub settings: ConversionSettings,
    values: Vec<UnitValue>,
}

impl UnitResult {
    pub fn values(&self) -> &[UnitValue] {
        &self.values
    }

    pub fn get(&self, unit: Unit) -> f64 {
        self.values
            .iter()
            .find(|v| v.unit == unit)
            .map(|v| v.value)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitValue> {
        self.values.iter()
    }
}

/// Convert a pixel distance into every supported unit.
pub fn convert(pixel_distance: f64, settings: &ConversionSettings) -> Point2PointResult<UnitResult> {
    settings.validate()?;
    if !pixel_distance.is_finite() || pixel_distance < 0.0 {
        return Err(Point2PointError::Usage(format!(
            "pixel distance must be a non-negative number, got {pixel_distance}"
        )));
    }

    let values = Unit::ALL
        .iter()
        .map(|&unit| UnitValue {
            unit,
            value: unit.of_pixels(pixel_distance, settings),
        })
        .collect();

    Ok(UnitResult {
        pixel_distance,
        settings: *settings,
        values,
    })
}

/// Holds the settings currently in effect. Rejected edits leave the previous
/// values untouched.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    current: ConversionSettings,
}

impl SettingsStore {
    pub fn new(initial: ConversionSettings) -> Point2PointResult<Self> {
        initial.validate()?;
        Ok(Self { current: initial })
    }

    pub fn current(&self) -> ConversionSettings {
        self.current
    }

    pub fn set_dpi(&mut self, dpi: f64) -> Point2PointResult<ConversionSettings> {
        self.apply(ConversionSettings { dpi, ..self.current })
    }

    pub fn set_base_font_size(&mut self, size: f64) -> Point2PointResult<ConversionSettings> {
        self.apply(ConversionSettings {
            base_font_size: size,
            ..self.current
        })
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) -> Point2PointResult<ConversionSettings> {
        self.apply(ConversionSettings {
            viewport_width: width,
            viewport_height: height,
            ..self.current
        })
    }

    fn apply(&mut self, candidate: ConversionSettings) -> Point2PointResult<ConversionSettings> {
        if let Err(e) = candidate.validate() {
            tracing::warn!(error = %e, "settings edit rejected; keeping previous values");
            return Err(e);
        }
        self.current = candidate;
        tracing::debug!(
            dpi = candidate.dpi,
            base_font_size = candidate.base_font_size,
            viewport_width = candidate.viewport_width,
            viewport_height = candidate.viewport_height,
            "settings updated"
        );
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn settings() -> ConversionSettings {
        ConversionSettings::new(96.0, 16.0, 1920.0, 1080.0).unwrap()
    }

    #[test]
    fn absolute_units_at_96_dpi() {
        let r = convert(96.0, &settings()).unwrap();
        assert!((r.get(Unit::In) - 1.0).abs() < EPS);
        assert!((r.get(Unit::Cm) - 2.54).abs() < EPS);
        assert!((r.get(Unit::Mm) - 25.4).abs() < EPS);
        assert!((r.get(Unit::Q) - 101.6).abs() < EPS);
        assert!((r.get(Unit::Pt) - 72.0).abs() < EPS);
        assert!((r.get(Unit::Pc) - 6.0).abs() < EPS);
    }

    #[test]
    fn relative_and_viewport_units() {
        let r = convert(192.0, &settings()).unwrap();
        assert!((r.get(Unit::Em) - 12.0).abs() < EPS);
        assert!((r.get(Unit::Rem) - 12.0).abs() < EPS);
        assert!((r.get(Unit::Ch) - 24.0).abs() < EPS);
        assert!((r.get(Unit::Ex) - 24.0).abs() < EPS);
        assert!((r.get(Unit::Vw) - 10.0).abs() < EPS);
        assert!((r.get(Unit::Percent) - 10.0).abs() < EPS);
        assert!((r.get(Unit::Vh) - 192.0 / 1080.0 * 100.0).abs() < EPS);
        assert!((r.get(Unit::Vmin) - r.get(Unit::Vh)).abs() < EPS);
        assert!((r.get(Unit::Vmax) - r.get(Unit::Vw)).abs() < EPS);
    }

    #[test]
    fn dpi_changes_physical_units_only() {
        let s = ConversionSettings::new(144.0, 16.0, 1920.0, 1080.0).unwrap();
        let r = convert(144.0, &s).unwrap();
        assert!((r.get(Unit::In) - 1.0).abs() < EPS);
        assert!((r.get(Unit::Pt) - 72.0).abs() < EPS);
        assert!((r.get(Unit::Em) - 9.0).abs() < EPS);
    }

    #[test]
    fn output_order_is_stable() {
        let r = convert(10.0, &settings()).unwrap();
        let order: Vec<Unit> = r.iter().map(|v| v.unit).collect();
        assert_eq!(order, Unit::ALL.to_vec());
        assert_eq!(r.values().len(), 16);
    }

    #[test]
    fn zero_distance_is_zero_everywhere() {
        let r = convert(0.0, &settings()).unwrap();
        assert!(r.iter().all(|v| v.value == 0.0));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            ConversionSettings::new(0.0, 16.0, 100.0, 100.0),
            Err(Point2PointError::InvalidSettings(_))
        ));
        assert!(matches!(
            ConversionSettings::new(-5.0, 16.0, 100.0, 100.0),
            Err(Point2PointError::InvalidSettings(_))
        ));
        assert!(matches!(
            ConversionSettings::new(96.0, 0.0, 100.0, 100.0),
            Err(Point2PointError::InvalidSettings(_))
        ));
        assert!(matches!(
            ConversionSettings::new(96.0, 16.0, 0.0, 100.0),
            Err(Point2PointError::InvalidSettings(_))
        ));
        assert!(matches!(
            ConversionSettings::new(96.0, 16.0, 100.0, -1.0),
            Err(Point2PointError::InvalidSettings(_))
        ));
    }

    #[test]
    fn convert_rejects_hand_built_invalid_settings() {
        let bad = ConversionSettings {
            dpi: 0.0,
            ..settings()
        };
        assert!(matches!(
            convert(10.0, &bad),
            Err(Point2PointError::InvalidSettings(_))
        ));
    }

    #[test]
    fn negative_distance_is_a_usage_error() {
        assert!(matches!(
            convert(-1.0, &settings()),
            Err(Point2PointError::Usage(_))
        ));
    }

    #[test]
    fn store_keeps_last_valid_settings() {
        let mut store = SettingsStore::new(settings()).unwrap();
        store.set_dpi(120.0).unwrap();
        assert!(store.set_dpi(0.0).is_err());
        assert!(store.set_base_font_size(-2.0).is_err());
        assert!(store.set_viewport(0.0, 10.0).is_err());
        let current = store.current();
        assert_eq!(current.dpi, 120.0);
        assert_eq!(current.base_font_size, 16.0);
        assert_eq!(current.viewport_width, 1920.0);
    }

    #[test]
    fn unit_symbols_serialize_as_css() {
        let json = serde_json::to_string(&Unit::Percent).unwrap();
        assert_eq!(json, "\"%\"");
        let json = serde_json::to_string(&Unit::Q).unwrap();
        assert_eq!(json, "\"Q\"");
    }

    proptest! {
        #[test]
        fn px_is_identity_and_scaling_is_linear(
            d in 0.0f64..100_000.0,
            dpi in 1.0f64..600.0,
            font in 1.0f64..72.0,
            vw in 1.0f64..8000.0,
            vh in 1.0f64..8000.0,
        ) {
            let s = ConversionSettings::new(dpi, font, vw, vh).unwrap();
            let single = convert(d, &s).unwrap();
            let double = convert(2.0 * d, &s).unwrap();
            prop_assert_eq!(single.get(Unit::Px), d);
            for (a, b) in single.iter().zip(double.iter()) {
                prop_assert_eq!(a.unit, b.unit);
                let tolerance = 1e-9 * b.value.abs().max(1.0);
                prop_assert!((b.value - 2.0 * a.value).abs() <= tolerance);
            }
        }
    }
}
