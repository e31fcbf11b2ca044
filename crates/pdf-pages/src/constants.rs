//! Shared constants for page transforms
//!
//! This module centralizes the magic numbers used when drawing overlays,
//! building pages from images and rasterizing.

// =============================================================================
// Page Geometry
// =============================================================================

/// Default page dimensions in points (US Letter), used when a page has no MediaBox
pub const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (612.0, 792.0);

/// PDF user space units per inch
pub const POINTS_PER_INCH: f32 = 72.0;

// =============================================================================
// Text Overlays
// =============================================================================

/// Approximate character width ratio for Helvetica
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Approximate character width ratio for Helvetica-Bold
pub const HELVETICA_BOLD_CHAR_WIDTH_RATIO: f32 = 0.56;

/// Watermark font size as a fraction of the shorter page side, when unset
pub const WATERMARK_FONT_SIZE_RATIO: f32 = 0.08;

/// Resource names used for overlay fonts and graphics state
pub const OVERLAY_FONT_NAME: &str = "FPgOverlay";
pub const OVERLAY_GSTATE_NAME: &str = "GSPgOverlay";

// =============================================================================
// Parallelism
// =============================================================================

/// Upper bound on blocking tasks for independent per-page or per-file work
pub const DEFAULT_WORKERS: usize = 4;

// =============================================================================
// Rasterizing
// =============================================================================

/// JPEG quality for exported page images
pub const JPEG_QUALITY: u8 = 92;
