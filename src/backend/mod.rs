//! Device abstraction layer.
//!
//! Resources never talk to a graphics API directly. Every GPU-facing call
//! goes through the [`GpuDevice`] trait, which is handed to the lifecycle
//! methods (`create`, `delete`, `activate`, `deactivate`, `update`) of each
//! resource. Extension availability is queried through the narrower
//! [`CapabilityQuery`] trait.

#[cfg(feature = "dummy")]
pub mod dummy;

use std::fmt;

use crate::error::StagingResult;
use crate::types::{
    BufferTarget, BufferUsageHint, Extent3d, Origin3d, ParameterValue, PixelType, TextureFormat,
    TextureParameter, TextureTarget,
};

#[cfg(feature = "dummy")]
pub use dummy::{DeviceCall, DeviceExtensions, DummyDevice};

/// Handle to a GPU buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

impl BufferHandle {
    /// Create a handle from a raw device identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw device identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Handle to a GPU texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Create a handle from a raw device identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw device identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

/// Optional device features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Three-dimensional textures.
    Texture3D,
    /// 32-bit float texture uploads.
    TextureFloat,
    /// 16-bit float texture uploads.
    TextureHalfFloat,
}

impl Extension {
    /// Conventional extension name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Texture3D => "texture_3d",
            Self::TextureFloat => "texture_float",
            Self::TextureHalfFloat => "texture_half_float",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability oracle: answers whether an optional device feature is present.
pub trait CapabilityQuery {
    /// Returns true if `extension` is available on the current context.
    fn extension_available(&self, extension: Extension) -> bool;
}

/// Fixed capability set, useful when no device is at hand (e.g. converting
/// texture data ahead of time).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCapabilities {
    /// 3D textures available.
    pub texture_3d: bool,
    /// Float textures available.
    pub texture_float: bool,
    /// Half-float textures available.
    pub texture_half_float: bool,
}

impl CapabilityQuery for StaticCapabilities {
    fn extension_available(&self, extension: Extension) -> bool {
        match extension {
            Extension::Texture3D => self.texture_3d,
            Extension::TextureFloat => self.texture_float,
            Extension::TextureHalfFloat => self.texture_half_float,
        }
    }
}

/// The graphics device interface consumed by buffers and textures.
///
/// All calls are synchronous and must run on the thread that owns the
/// device context.
pub trait GpuDevice: CapabilityQuery {
    /// Device name, for logging.
    fn name(&self) -> &str;

    /// Allocate a new buffer object.
    fn create_buffer(&mut self) -> StagingResult<BufferHandle>;

    /// Release a buffer object and its storage.
    fn delete_buffer(&mut self, handle: BufferHandle);

    /// Bind `handle` to `target`, or unbind with `None`.
    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<BufferHandle>);

    /// (Re)allocate storage of the bound buffer. Contents are undefined.
    fn allocate_buffer_storage(
        &mut self,
        target: BufferTarget,
        size: usize,
        usage: BufferUsageHint,
    ) -> StagingResult<()>;

    /// Upload `data` into the bound buffer at byte `offset`.
    fn upload_buffer_subrange(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> StagingResult<()>;

    /// Allocate a new texture object.
    fn create_texture(&mut self) -> StagingResult<TextureHandle>;

    /// Release a texture object and its storage.
    fn delete_texture(&mut self, handle: TextureHandle);

    /// Returns true if `handle` names a live texture object.
    fn is_texture(&self, handle: TextureHandle) -> bool;

    /// Bind `handle` to `target`, or unbind with `None`.
    fn bind_texture(&mut self, target: TextureTarget, handle: Option<TextureHandle>);

    /// Allocate storage of the bound texture without uploading pixels.
    fn allocate_texture_storage(
        &mut self,
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
    ) -> StagingResult<()>;

    /// Allocate storage of the bound texture and upload `data` into it.
    fn upload_texture(
        &mut self,
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
        ty: PixelType,
        data: &[u8],
    ) -> StagingResult<()>;

    /// Upload `data` into a sub-region of the bound texture.
    #[allow(clippy::too_many_arguments)]
    fn upload_texture_subregion(
        &mut self,
        target: TextureTarget,
        level: u32,
        origin: Origin3d,
        size: Extent3d,
        format: TextureFormat,
        ty: PixelType,
        data: &[u8],
    ) -> StagingResult<()>;

    /// Set a sampling parameter of the bound texture.
    fn set_texture_parameter(
        &mut self,
        target: TextureTarget,
        parameter: TextureParameter,
        value: ParameterValue,
    );

    /// Set the row alignment used when reading pixel data from host memory.
    fn set_unpack_alignment(&mut self, alignment: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_capabilities() {
        let caps = StaticCapabilities {
            texture_float: true,
            ..Default::default()
        };
        assert!(caps.extension_available(Extension::TextureFloat));
        assert!(!caps.extension_available(Extension::Texture3D));
        assert_eq!(Extension::TextureHalfFloat.to_string(), "texture_half_float");
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(BufferHandle::from_raw(3).to_string(), "buffer#3");
        assert_eq!(TextureHandle::from_raw(7).raw(), 7);
    }
}
