//! Print (PDF export) options and the units they are expressed in.

use crate::merge::merge_typed;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const CSS_PX_PER_INCH: f64 = 96.0;

/// Default export timeout in milliseconds.
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 60_000;

/// Export parameters handed to the rendering engine.
///
/// Field names follow the camelCase keys callers send in `printOptions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    pub format: PageFormat,
    pub margin: Margins,
    pub scale: f64,
    pub print_background: bool,
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: bool,
    #[serde(default)]
    pub landscape: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<String>,
    /// Export timeout in milliseconds
    pub timeout: u64,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            margin: Margins::default(),
            scale: 1.0,
            print_background: true,
            prefer_css_page_size: true,
            landscape: false,
            page_ranges: None,
            timeout: DEFAULT_EXPORT_TIMEOUT_MS,
        }
    }
}

impl PrintOptions {
    /// Merge caller overrides onto `self` and validate the result.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        let merged = merge_typed(self, overrides)?;
        merged.validate()?;
        Ok(merged)
    }

    /// Check the ranges the engine accepts.
    pub fn validate(&self) -> Result<()> {
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(Error::InvalidParameter(format!(
                "scale must be between 0.1 and 2, got {}",
                self.scale
            )));
        }
        if self.timeout == 0 {
            return Err(Error::InvalidParameter("timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Named paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PageFormat {
    /// Portrait width and height in inches.
    pub fn size_inches(&self) -> (f64, f64) {
        match self {
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
            PageFormat::Tabloid => (11.0, 17.0),
            PageFormat::Ledger => (17.0, 11.0),
            PageFormat::A0 => (33.1, 46.8),
            PageFormat::A1 => (23.4, 33.1),
            PageFormat::A2 => (16.54, 23.4),
            PageFormat::A3 => (11.7, 16.54),
            PageFormat::A4 => (8.27, 11.7),
            PageFormat::A5 => (5.83, 8.27),
            PageFormat::A6 => (4.13, 5.83),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageFormat::Letter => "letter",
            PageFormat::Legal => "legal",
            PageFormat::Tabloid => "tabloid",
            PageFormat::Ledger => "ledger",
            PageFormat::A0 => "a0",
            PageFormat::A1 => "a1",
            PageFormat::A2 => "a2",
            PageFormat::A3 => "a3",
            PageFormat::A4 => "a4",
            PageFormat::A5 => "a5",
            PageFormat::A6 => "a6",
        }
    }
}

impl FromStr for PageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => PageFormat::Letter,
            "legal" => PageFormat::Legal,
            "tabloid" => PageFormat::Tabloid,
            "ledger" => PageFormat::Ledger,
            "a0" => PageFormat::A0,
            "a1" => PageFormat::A1,
            "a2" => PageFormat::A2,
            "a3" => PageFormat::A3,
            "a4" => PageFormat::A4,
            "a5" => PageFormat::A5,
            "a6" => PageFormat::A6,
            other => {
                return Err(Error::InvalidParameter(format!("unknown page format '{}'", other)))
            }
        };
        Ok(format)
    }
}

impl TryFrom<String> for PageFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PageFormat> for String {
    fn from(format: PageFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Page margins; sides missing from a caller-supplied object are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default)]
    pub top: Length,
    #[serde(default)]
    pub right: Length,
    #[serde(default)]
    pub bottom: Length,
    #[serde(default)]
    pub left: Length,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(Length::zero())
    }
}

impl Margins {
    pub fn uniform(length: Length) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
}

impl LengthUnit {
    fn suffix(&self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
        }
    }
}

/// A unit-bearing length such as `10mm` or `0.5in`. Bare numbers are CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLength", into = "String")]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn zero() -> Self {
        Self::new(0.0, LengthUnit::Mm)
    }

    pub fn to_inches(&self) -> f64 {
        match self.unit {
            LengthUnit::Px => self.value / CSS_PX_PER_INCH,
            LengthUnit::In => self.value,
            LengthUnit::Cm => self.value / 2.54,
            LengthUnit::Mm => self.value / 25.4,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Length {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("invalid length '{}'", s)))?;
        let unit = match suffix.to_ascii_lowercase().as_str() {
            "" | "px" => LengthUnit::Px,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unsupported length unit '{}' in '{}'",
                    other, s
                )))
            }
        };
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidParameter(format!("invalid length '{}'", s)));
        }
        Ok(Length::new(value, unit))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLength {
    Text(String),
    Number(f64),
}

impl TryFrom<RawLength> for Length {
    type Error = Error;

    fn try_from(raw: RawLength) -> Result<Self> {
        match raw {
            RawLength::Text(s) => s.parse(),
            RawLength::Number(n) => format!("{}px", n).parse(),
        }
    }
}

impl From<Length> for String {
    fn from(length: Length) -> Self {
        length.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scale_override_keeps_remaining_defaults() {
        let effective = PrintOptions::default()
            .with_overrides(&json!({"scale": 0.5}))
            .unwrap();
        assert_eq!(effective.scale, 0.5);
        assert_eq!(effective.format, PageFormat::A4);
        assert_eq!(effective.margin, Margins::default());
        assert!(effective.print_background);
        assert!(effective.prefer_css_page_size);
        assert_eq!(effective.timeout, DEFAULT_EXPORT_TIMEOUT_MS);
    }

    #[test]
    fn margin_override_replaces_every_side() {
        let effective = PrintOptions {
            margin: Margins::uniform("5mm".parse().unwrap()),
            ..Default::default()
        }
        .with_overrides(&json!({"margin": {"top": "1in"}}))
        .unwrap();
        assert_eq!(effective.margin.top, Length::new(1.0, LengthUnit::In));
        assert_eq!(effective.margin.left, Length::zero());
    }

    #[test]
    fn lengths_convert_to_inches() {
        assert_eq!("96px".parse::<Length>().unwrap().to_inches(), 1.0);
        assert_eq!("48".parse::<Length>().unwrap().to_inches(), 0.5);
        assert_eq!("25.4mm".parse::<Length>().unwrap().to_inches(), 1.0);
        assert_eq!("2.54cm".parse::<Length>().unwrap().to_inches(), 1.0);
        assert!("10pt".parse::<Length>().is_err());
        assert!("mm".parse::<Length>().is_err());
    }

    #[test]
    fn numeric_margins_are_pixels() {
        let margins: Margins = serde_json::from_value(json!({"top": 24, "left": "1cm"})).unwrap();
        assert_eq!(margins.top, Length::new(24.0, LengthUnit::Px));
        assert_eq!(margins.left, Length::new(1.0, LengthUnit::Cm));
        assert_eq!(margins.bottom, Length::zero());
    }

    #[test]
    fn formats_are_case_insensitive() {
        let options = PrintOptions::default()
            .with_overrides(&json!({"format": "Letter", "landscape": true}))
            .unwrap();
        assert_eq!(options.format, PageFormat::Letter);
        assert!(options.landscape);
        assert_eq!(options.format.size_inches(), (8.5, 11.0));
        assert!(PrintOptions::default()
            .with_overrides(&json!({"format": "b5"}))
            .is_err());
    }

    #[test]
    fn out_of_range_scale_is_rejected() {
        let err = PrintOptions::default()
            .with_overrides(&json!({"scale": 3}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn serializes_with_caller_keys() {
        let value = serde_json::to_value(PrintOptions::default()).unwrap();
        assert_eq!(value["format"], "a4");
        assert_eq!(value["preferCSSPageSize"], true);
        assert_eq!(value["printBackground"], true);
        assert_eq!(value["margin"]["top"], "0mm");
        assert!(value.get("pageRanges").is_none());
    }
}
