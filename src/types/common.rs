//! Common types shared across the staging system.

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent of a texture upload, in texels.
///
/// Host arrays are row-major (`shape[0]` is the slowest axis), while device
/// extents are ordered fastest-first, so `width` is the last spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Build an extent from the spatial axes of a row-major shape.
    ///
    /// Only the first `ndim` axes are used; a trailing channel axis is ignored.
    pub fn from_shape(shape: &[usize], ndim: usize) -> Self {
        match ndim {
            3 => Self::new_3d(shape[2] as u32, shape[1] as u32, shape[0] as u32),
            _ => Self::new_2d(shape[1] as u32, shape[0] as u32),
        }
    }

    /// Number of texels covered by this extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

// ============================================================================
// Origin3d
// ============================================================================

/// Offset of a texture sub-region upload, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3d {
    /// X offset.
    pub x: u32,
    /// Y offset.
    pub y: u32,
    /// Z offset (0 for 2D textures).
    pub z: u32,
}

impl Origin3d {
    /// The zero origin.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Build an origin from a row-major offset (one entry per spatial axis).
    pub fn from_offset(offset: &[usize]) -> Self {
        match offset.len() {
            3 => Self {
                x: offset[2] as u32,
                y: offset[1] as u32,
                z: offset[0] as u32,
            },
            _ => Self {
                x: offset[1] as u32,
                y: offset[0] as u32,
                z: 0,
            },
        }
    }
}
