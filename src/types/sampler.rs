//! Texture sampling parameters.

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    Linear,
    /// Nearest texel from the nearest mip level.
    NearestMipmapNearest,
    /// Nearest texel, blended between mip levels.
    NearestMipmapLinear,
    /// Linear interpolation within the nearest mip level.
    LinearMipmapNearest,
    /// Linear interpolation, blended between mip levels.
    LinearMipmapLinear,
}

impl FilterMode {
    /// Whether this mode samples mip levels (only valid for minification).
    pub fn uses_mipmaps(&self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }
}

/// Texture coordinate wrapping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Tile the texture.
    Repeat,
    /// Clamp coordinates to the edge texels.
    ClampToEdge,
    /// Tile the texture, mirroring every other repetition.
    MirroredRepeat,
}

/// Texture parameter key. Each key is idempotent: applying it twice with
/// the same value has the same effect as applying it once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureParameter {
    /// Magnification filter.
    MagFilter,
    /// Minification filter.
    MinFilter,
    /// Wrap mode along the S (x) axis.
    WrapS,
    /// Wrap mode along the T (y) axis.
    WrapT,
    /// Wrap mode along the R (z) axis. 3D textures only.
    WrapR,
}

/// Value of a texture parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterValue {
    /// A filter mode.
    Filter(FilterMode),
    /// A wrap mode.
    Wrap(WrapMode),
}
