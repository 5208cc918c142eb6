//! Core data models for watermark placement

use crate::error::{Result, WatermarkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest and largest rotation accepted by a spec, in degrees
pub const ROTATION_RANGE: (i32, i32) = (-180, 180);

/// Largest opacity percentage
pub const MAX_OPACITY: u8 = 100;

/// Largest font size a spec may ask for, in pixels
pub const MAX_FONT_SIZE: u32 = 1000;

/// RGB text color, serialized as a 3-element array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }

    /// Format as `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Rgb {
    type Err = WatermarkError;

    /// Parse `#RGB` or `#RRGGBB` (the leading `#` is optional)
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(WatermarkError::invalid(format!("Invalid color: {}", s)));
        }
        let digit = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| WatermarkError::invalid(format!("Invalid hex digit in color: {}", s)))
        };

        match hex.len() {
            3 => Ok(Rgb::new(digit(0..1)? * 17, digit(1..2)? * 17, digit(2..3)? * 17)),
            6 => Ok(Rgb::new(digit(0..2)?, digit(2..4)?, digit(4..6)?)),
            n => Err(WatermarkError::invalid(format!(
                "Color must be #RGB or #RRGGBB, got {} hex digits",
                n
            ))),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A point in original-image pixel space, serialized as `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Position {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [i32; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Everything needed to draw one text watermark.
///
/// `position` is always in original-image coordinates, so the same spec can
/// be rendered into a scaled preview or a full-resolution export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    pub text: String,
    #[serde(rename = "font_size")]
    pub font_size_px: u32,
    #[serde(rename = "font_color")]
    pub color: Rgb,
    #[serde(rename = "opacity")]
    pub opacity_pct: u8,
    pub position: Position,
    #[serde(rename = "rotation")]
    pub rotation_deg: i32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "Watermark".to_string(),
            font_size_px: 24,
            color: Rgb::new(255, 0, 0),
            opacity_pct: 80,
            position: Position::new(50, 50),
            rotation_deg: 0,
        }
    }
}

impl WatermarkSpec {
    /// Check the numeric ranges a spec must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.font_size_px == 0 || self.font_size_px > MAX_FONT_SIZE {
            return Err(WatermarkError::invalid(format!(
                "Font size must be between 1 and {}, got {}",
                MAX_FONT_SIZE, self.font_size_px
            )));
        }
        if self.opacity_pct > MAX_OPACITY {
            return Err(WatermarkError::invalid(format!(
                "Opacity must be between 0 and {}, got {}",
                MAX_OPACITY, self.opacity_pct
            )));
        }
        let (min, max) = ROTATION_RANGE;
        if !(min..=max).contains(&self.rotation_deg) {
            return Err(WatermarkError::invalid(format!(
                "Rotation must be between {} and {} degrees, got {}",
                min, max, self.rotation_deg
            )));
        }
        Ok(())
    }

    /// Whether rendering this spec would leave the image untouched
    pub fn is_disabled(&self) -> bool {
        self.text.is_empty()
    }

    /// Fill alpha derived from the opacity percentage
    pub fn alpha(&self) -> u8 {
        (255.0 * f32::from(self.opacity_pct.min(MAX_OPACITY)) / 100.0).round() as u8
    }
}

/// A single user edit to a spec.
///
/// Every mutation of a stored spec goes through one of these so edits are
/// traceable without a GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecDelta {
    SetText(String),
    SetFontSize(u32),
    SetColor(Rgb),
    SetOpacity(u8),
    SetPosition(Position),
    SetRotation(i32),
}

impl SpecDelta {
    /// Produce the edited spec, leaving `spec` untouched
    pub fn apply(&self, spec: &WatermarkSpec) -> Result<WatermarkSpec> {
        let mut next = spec.clone();
        match self {
            SpecDelta::SetText(text) => next.text = text.clone(),
            SpecDelta::SetFontSize(size) => next.font_size_px = *size,
            SpecDelta::SetColor(color) => next.color = *color,
            SpecDelta::SetOpacity(opacity) => next.opacity_pct = *opacity,
            SpecDelta::SetPosition(position) => next.position = *position,
            SpecDelta::SetRotation(degrees) => next.rotation_deg = *degrees,
        }
        next.validate()?;
        Ok(next)
    }
}

/// Normalized anchor inside the usable area of an image, `(0,0)` top-left
/// and `(1,1)` bottom-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    fx: f64,
    fy: f64,
}

impl Anchor {
    /// Create an anchor, clamping both fractions into `[0, 1]`
    pub fn new(fx: f64, fy: f64) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            fx: clamp(fx),
            fy: clamp(fy),
        }
    }

    pub fn fx(&self) -> f64 {
        self.fx
    }

    pub fn fy(&self) -> f64 {
        self.fy
    }
}

/// The nine canonical anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorPreset {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl AnchorPreset {
    pub const ALL: [AnchorPreset; 9] = [
        AnchorPreset::TopLeft,
        AnchorPreset::TopCenter,
        AnchorPreset::TopRight,
        AnchorPreset::CenterLeft,
        AnchorPreset::Center,
        AnchorPreset::CenterRight,
        AnchorPreset::BottomLeft,
        AnchorPreset::BottomCenter,
        AnchorPreset::BottomRight,
    ];

    pub fn anchor(&self) -> Anchor {
        let (fx, fy) = match self {
            AnchorPreset::TopLeft => (0.0, 0.0),
            AnchorPreset::TopCenter => (0.5, 0.0),
            AnchorPreset::TopRight => (1.0, 0.0),
            AnchorPreset::CenterLeft => (0.0, 0.5),
            AnchorPreset::Center => (0.5, 0.5),
            AnchorPreset::CenterRight => (1.0, 0.5),
            AnchorPreset::BottomLeft => (0.0, 1.0),
            AnchorPreset::BottomCenter => (0.5, 1.0),
            AnchorPreset::BottomRight => (1.0, 1.0),
        };
        Anchor::new(fx, fy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnchorPreset::TopLeft => "top-left",
            AnchorPreset::TopCenter => "top-center",
            AnchorPreset::TopRight => "top-right",
            AnchorPreset::CenterLeft => "center-left",
            AnchorPreset::Center => "center",
            AnchorPreset::CenterRight => "center-right",
            AnchorPreset::BottomLeft => "bottom-left",
            AnchorPreset::BottomCenter => "bottom-center",
            AnchorPreset::BottomRight => "bottom-right",
        }
    }
}

impl From<AnchorPreset> for Anchor {
    fn from(preset: AnchorPreset) -> Self {
        preset.anchor()
    }
}

impl FromStr for AnchorPreset {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        AnchorPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| WatermarkError::invalid(format!("Unknown anchor: {}", s)))
    }
}

impl fmt::Display for AnchorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_is_valid() {
        let spec = WatermarkSpec::default();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.font_size_px, 24);
        assert_eq!(spec.color, Rgb::new(255, 0, 0));
        assert_eq!(spec.position, Position::new(50, 50));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut spec = WatermarkSpec::default();
        spec.font_size_px = 0;
        assert!(spec.validate().is_err());
        spec.font_size_px = MAX_FONT_SIZE;
        assert!(spec.validate().is_ok());
        spec.font_size_px = MAX_FONT_SIZE + 1;
        assert!(spec.validate().is_err());

        let mut spec = WatermarkSpec::default();
        spec.opacity_pct = 101;
        assert!(spec.validate().is_err());

        let mut spec = WatermarkSpec::default();
        spec.rotation_deg = 181;
        assert!(spec.validate().is_err());
        spec.rotation_deg = -180;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_alpha_from_opacity() {
        let mut spec = WatermarkSpec::default();
        spec.opacity_pct = 0;
        assert_eq!(spec.alpha(), 0);
        spec.opacity_pct = 100;
        assert_eq!(spec.alpha(), 255);
        spec.opacity_pct = 50;
        assert_eq!(spec.alpha(), 128);
    }

    #[test]
    fn test_spec_delta_does_not_mutate_input() {
        let spec = WatermarkSpec::default();
        let edited = SpecDelta::SetText("© 2024".to_string()).apply(&spec).unwrap();
        assert_eq!(edited.text, "© 2024");
        assert_eq!(spec.text, "Watermark");
    }

    #[test]
    fn test_spec_delta_validates() {
        let spec = WatermarkSpec::default();
        assert!(SpecDelta::SetOpacity(150).apply(&spec).is_err());
        assert!(SpecDelta::SetFontSize(0).apply(&spec).is_err());
        assert!(SpecDelta::SetRotation(-200).apply(&spec).is_err());
        let rotated = SpecDelta::SetRotation(45).apply(&spec).unwrap();
        assert_eq!(rotated.rotation_deg, 45);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!("#FF0000".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
        assert_eq!("#abc".parse::<Rgb>().unwrap(), Rgb::new(170, 187, 204));
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), Rgb::new(0, 255, 0));
        assert!("#GGGGGG".parse::<Rgb>().is_err());
        assert!("#FF00".parse::<Rgb>().is_err());
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn test_spec_serialization_keys() {
        let spec = WatermarkSpec::default();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["font_size"], 24);
        assert_eq!(value["font_color"], serde_json::json!([255, 0, 0]));
        assert_eq!(value["opacity"], 80);
        assert_eq!(value["position"], serde_json::json!([50, 50]));
        assert_eq!(value["rotation"], 0);
    }

    #[test]
    fn test_anchor_clamps() {
        let anchor = Anchor::new(-0.5, 1.5);
        assert_eq!(anchor.fx(), 0.0);
        assert_eq!(anchor.fy(), 1.0);
    }

    #[test]
    fn test_anchor_preset_parsing() {
        assert_eq!(
            "bottom-right".parse::<AnchorPreset>().unwrap(),
            AnchorPreset::BottomRight
        );
        assert_eq!(
            "Top_Left".parse::<AnchorPreset>().unwrap(),
            AnchorPreset::TopLeft
        );
        assert!("middle".parse::<AnchorPreset>().is_err());
        for preset in AnchorPreset::ALL {
            assert_eq!(preset.name().parse::<AnchorPreset>().unwrap(), preset);
        }
    }
}
