use std::time::SystemTime;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Error, Debug)]
pub enum PagesError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to load {name}: {source}")]
    DocumentLoad {
        name: String,
        #[source]
        source: lopdf::Error,
    },
    #[error("Unsupported asset {name}: {reason}")]
    UnsupportedAsset { name: String, reason: String },
    #[error("Render error: {0}")]
    Render(String),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl PagesError {
    pub fn validation(message: impl Into<String>) -> Self {
        PagesError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PagesError>;

/// A user-supplied input file: raw bytes plus the identity the UI knows it by.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub last_modified: Option<SystemTime>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, modified: SystemTime) -> Self {
        self.last_modified = Some(modified);
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Load a file from disk, keeping its modification time
    pub async fn read(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self {
            name,
            bytes,
            last_modified: modified,
        })
    }

    /// File name without a trailing `.pdf`
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }
}

/// Strip a trailing `.pdf` extension (case-insensitive)
pub fn base_name(name: &str) -> &str {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf")
    {
        &name[..len - 4]
    } else {
        name
    }
}

/// One produced artifact: bytes plus the name it should be saved under.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Write the artifact into `dir` under its suggested name
    pub async fn save_into(&self, dir: impl AsRef<std::path::Path>) -> Result<std::path::PathBuf> {
        let path = dir.as_ref().join(&self.name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Page orientation for fixed page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Target page size when converting images
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PageSize {
    /// Page takes the image's pixel dimensions
    #[default]
    Fit,
    A4,
    Letter,
}

impl PageSize {
    /// Portrait dimensions in points, `None` for `Fit`
    pub fn dimensions_pt(self) -> Option<(f32, f32)> {
        match self {
            PageSize::Fit => None,
            PageSize::A4 => Some((595.28, 841.89)),
            PageSize::Letter => Some((612.0, 792.0)),
        }
    }

    pub fn dimensions_with_orientation(self, orientation: Orientation) -> Option<(f32, f32)> {
        self.dimensions_pt().map(|(w, h)| match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        })
    }
}

/// Rotation applied on top of a page's existing rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAngle {
    Clockwise90,
    Clockwise180,
    Clockwise270,
    Full,
}

impl RotationAngle {
    pub fn degrees(self) -> i64 {
        match self {
            RotationAngle::Clockwise90 => 90,
            RotationAngle::Clockwise180 => 180,
            RotationAngle::Clockwise270 => 270,
            RotationAngle::Full => 360,
        }
    }

    pub fn from_degrees(degrees: i64) -> Result<Self> {
        match degrees {
            90 => Ok(RotationAngle::Clockwise90),
            180 => Ok(RotationAngle::Clockwise180),
            270 => Ok(RotationAngle::Clockwise270),
            360 => Ok(RotationAngle::Full),
            other => Err(PagesError::validation(format!(
                "Rotation must be 90, 180, 270 or 360 degrees, got {}",
                other
            ))),
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for RotationAngle {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.degrees())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RotationAngle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let degrees = i64::deserialize(deserializer)?;
        RotationAngle::from_degrees(degrees).map_err(serde::de::Error::custom)
    }
}

/// Size statistics reported by compression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    /// Percentage saved; zero or negative when the output did not shrink
    pub reduction_percent: f64,
}

impl CompressionStats {
    pub fn new(original_size: usize, compressed_size: usize) -> Self {
        let reduction_percent = if original_size == 0 {
            0.0
        } else {
            (1.0 - compressed_size as f64 / original_size as f64) * 100.0
        };
        Self {
            original_size,
            compressed_size,
            reduction_percent,
        }
    }
}

/// Document metadata from the trailer's Info dictionary
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub file_size: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Human readable byte count, base 1024
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
