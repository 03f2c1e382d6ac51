//! Coordinate conversion between model space and device space.
//!
//! Locate models report element positions as width/height ratios in [0, 1],
//! independent of the device under test. Device actions need absolute pixels.
//! The conversion is the only place the two coordinate systems meet.

/// Result type for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors that can occur during coordinate conversion
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A reported ratio fell outside [0, 1]
    LocationOutOfRange {
        /// Reported x ratio
        x: f64,
        /// Reported y ratio
        y: f64,
    },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::LocationOutOfRange { x, y } => {
                write!(f, "location ratio out of [0, 1] range: [{}, {}]", x, y)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Device-independent element location reported by a locate model.
///
/// Components are ratios of screen width/height, scaled from 0 to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPoint {
    /// Horizontal position as a ratio of screen width
    pub x: f64,
    /// Vertical position as a ratio of screen height
    pub y: f64,
}

/// Absolute device coordinate in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    /// Horizontal pixel offset from the left edge
    pub x: u32,
    /// Vertical pixel offset from the top edge
    pub y: u32,
}

impl RatioPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both components are within [0, 1]
    pub fn in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Convert to an absolute pixel position on a device of the given size.
    ///
    /// Ratios outside [0, 1] indicate a malfunctioning locate model and are
    /// rejected rather than clamped, so the failure surfaces at the step that
    /// caused it. Results are rounded to the nearest integer pixel.
    pub fn to_pixel(&self, device_width: u32, device_height: u32) -> GeometryResult<PixelPoint> {
        if !self.in_range() {
            return Err(GeometryError::LocationOutOfRange { x: self.x, y: self.y });
        }

        Ok(PixelPoint {
            x: (self.x * f64::from(device_width)).round() as u32,
            y: (self.y * f64::from(device_height)).round() as u32,
        })
    }
}

impl std::fmt::Display for PixelPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
