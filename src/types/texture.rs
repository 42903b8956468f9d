//! Texture types.

use std::fmt;

use crate::array::ScalarType;

/// Texture target (dimensionality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Two-dimensional texture.
    D2,
    /// Three-dimensional texture. Requires the 3D texture extension.
    D3,
}

impl TextureTarget {
    /// Number of spatial axes.
    pub fn ndim(&self) -> usize {
        match self {
            Self::D2 => 2,
            Self::D3 => 3,
        }
    }
}

impl fmt::Display for TextureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D2 => write!(f, "2D"),
            Self::D3 => write!(f, "3D"),
        }
    }
}

/// Pixel format of texture data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single channel, replicated to RGB.
    Luminance,
    /// Luminance plus alpha.
    LuminanceAlpha,
    /// Three channels.
    Rgb,
    /// Four channels.
    Rgba,
    /// Alpha only. Never inferred from a shape.
    Alpha,
}

impl TextureFormat {
    /// Number of channels per texel.
    pub fn channels(&self) -> usize {
        match self {
            Self::Luminance | Self::Alpha => 1,
            Self::LuminanceAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Component type of uploaded pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// 8-bit unsigned normalized.
    UnsignedByte,
    /// 16-bit float. Requires the half-float texture extension.
    HalfFloat,
    /// 32-bit float. Requires the float texture extension.
    Float,
}

impl PixelType {
    /// Map an element type to its upload type, if directly uploadable.
    pub fn from_scalar(scalar: ScalarType) -> Option<Self> {
        match scalar {
            ScalarType::UInt8 => Some(Self::UnsignedByte),
            ScalarType::Float16 => Some(Self::HalfFloat),
            ScalarType::Float32 => Some(Self::Float),
            _ => None,
        }
    }

    /// Size of one component in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::UnsignedByte => 1,
            Self::HalfFloat => 2,
            Self::Float => 4,
        }
    }
}
