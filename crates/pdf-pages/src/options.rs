//! Parameter sets for the page transforms
//!
//! Each struct carries the defaults of the corresponding tool and a
//! `validate()` that runs before any document is loaded.

use crate::transform::overlay::encode_win_ansi;
use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Watermark
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum WatermarkPosition {
    Center,
    /// Text drawn at -45 degrees; the page itself is not rotated
    #[default]
    Diagonal,
}

/// RGB color, each channel in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse `#rrggbb`
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(PagesError::validation(format!("Invalid color: {}", hex)));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| PagesError::validation(format!("Invalid color: {}", hex)))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct WatermarkOptions {
    pub text: String,
    pub opacity: f32,
    /// `#rrggbb`
    pub color: String,
    /// `None` sizes the text to 8% of the page's shorter side
    pub font_size: Option<f32>,
    pub position: WatermarkPosition,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            opacity: 0.3,
            color: "#8B5CF6".to_string(),
            font_size: None,
            position: WatermarkPosition::Diagonal,
        }
    }
}

impl WatermarkOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(PagesError::validation("Watermark text is empty"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PagesError::validation(format!(
                "Opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        if let Some(size) = self.font_size {
            if size <= 0.0 {
                return Err(PagesError::validation("Font size must be positive"));
            }
        }
        Rgb::from_hex(&self.color)?;
        encode_win_ansi(&self.text)?;
        Ok(())
    }
}

// =============================================================================
// Page numbers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum NumberPosition {
    #[default]
    BottomCenter,
    BottomLeft,
    BottomRight,
    TopCenter,
    TopLeft,
    TopRight,
}

impl NumberPosition {
    pub fn is_top(self) -> bool {
        matches!(
            self,
            NumberPosition::TopCenter | NumberPosition::TopLeft | NumberPosition::TopRight
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct PageNumberOptions {
    pub position: NumberPosition,
    pub start_number: usize,
    pub font_size: f32,
    /// Distance from the page edge in points
    pub margin: f32,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            position: NumberPosition::BottomCenter,
            start_number: 1,
            font_size: 12.0,
            margin: 30.0,
        }
    }
}

impl PageNumberOptions {
    pub fn validate(&self) -> Result<()> {
        if self.font_size <= 0.0 {
            return Err(PagesError::validation("Font size must be positive"));
        }
        if self.margin < 0.0 {
            return Err(PagesError::validation("Margin cannot be negative"));
        }
        Ok(())
    }
}

// =============================================================================
// Crop
// =============================================================================

/// Amount trimmed from each side of the page, in points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CropMargins {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl CropMargins {
    pub fn uniform(margin: f32) -> Self {
        Self {
            left: margin,
            bottom: margin,
            right: margin,
            top: margin,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if [self.left, self.bottom, self.right, self.top]
            .iter()
            .any(|m| *m < 0.0 || !m.is_finite())
        {
            return Err(PagesError::validation("Crop margins must be non-negative"));
        }
        Ok(())
    }
}

// =============================================================================
// Images
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ImagePageOptions {
    pub page_size: PageSize,
    /// Ignored for `PageSize::Fit`
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RasterFormat {
    #[default]
    Png,
    Jpg,
}

impl RasterFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RasterOptions {
    pub format: RasterFormat,
    pub dpi: f32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            format: RasterFormat::Png,
            dpi: 150.0,
        }
    }
}

impl RasterOptions {
    /// Render scale relative to the PDF's 72 points per inch
    pub fn scale(&self) -> f32 {
        self.dpi / crate::constants::POINTS_PER_INCH
    }

    pub fn validate(&self) -> Result<()> {
        if !(1.0..=1200.0).contains(&self.dpi) {
            return Err(PagesError::validation(format!(
                "DPI must be between 1 and 1200, got {}",
                self.dpi
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Compression
// =============================================================================

/// Label chosen by the user; every level runs the same re-serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CompressionQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionQuality {
    pub fn suffix(self) -> &'static str {
        match self {
            CompressionQuality::Low => "maxcompressed",
            CompressionQuality::Medium => "compressed",
            CompressionQuality::High => "optimized",
        }
    }

    /// Advertised reduction shown next to the option. Not a guarantee.
    pub fn advisory_label(self) -> &'static str {
        match self {
            CompressionQuality::Low => "up to 70% smaller",
            CompressionQuality::Medium => "up to 50% smaller",
            CompressionQuality::High => "up to 20% smaller",
        }
    }
}
