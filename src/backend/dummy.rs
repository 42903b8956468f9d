//! Dummy device for testing and development.
//!
//! This device doesn't talk to any GPU. It hands out handles, tracks which
//! ones are alive, and records every call it receives so tests can assert
//! on exactly which device calls a flush produced, and in which order.

use std::collections::HashSet;

use bitflags::bitflags;

use crate::error::{StagingError, StagingResult};
use crate::types::{
    BufferTarget, BufferUsageHint, Extent3d, Origin3d, ParameterValue, PixelType, TextureFormat,
    TextureParameter, TextureTarget,
};

use super::{BufferHandle, CapabilityQuery, Extension, GpuDevice, TextureHandle};

bitflags! {
    /// Extensions advertised by the dummy device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceExtensions: u32 {
        /// Three-dimensional textures.
        const TEXTURE_3D = 1 << 0;
        /// 32-bit float textures.
        const TEXTURE_FLOAT = 1 << 1;
        /// 16-bit float textures.
        const TEXTURE_HALF_FLOAT = 1 << 2;
    }
}

impl From<Extension> for DeviceExtensions {
    fn from(extension: Extension) -> Self {
        match extension {
            Extension::Texture3D => Self::TEXTURE_3D,
            Extension::TextureFloat => Self::TEXTURE_FLOAT,
            Extension::TextureHalfFloat => Self::TEXTURE_HALF_FLOAT,
        }
    }
}

/// One call received by the dummy device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer(BufferHandle),
    DeleteBuffer(BufferHandle),
    BindBuffer(BufferTarget, Option<BufferHandle>),
    AllocateBufferStorage {
        target: BufferTarget,
        size: usize,
        usage: BufferUsageHint,
    },
    UploadBufferSubrange {
        target: BufferTarget,
        offset: usize,
        data: Vec<u8>,
    },
    CreateTexture(TextureHandle),
    DeleteTexture(TextureHandle),
    BindTexture(TextureTarget, Option<TextureHandle>),
    AllocateTextureStorage {
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
    },
    UploadTexture {
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
        ty: PixelType,
        data: Vec<u8>,
    },
    UploadTextureSubregion {
        target: TextureTarget,
        level: u32,
        origin: Origin3d,
        size: Extent3d,
        format: TextureFormat,
        ty: PixelType,
        data: Vec<u8>,
    },
    SetTextureParameter {
        target: TextureTarget,
        parameter: TextureParameter,
        value: ParameterValue,
    },
    SetUnpackAlignment(u32),
}

impl DeviceCall {
    /// Returns true for calls that move pixel or byte data to the device.
    pub fn is_upload(&self) -> bool {
        matches!(
            self,
            Self::UploadBufferSubrange { .. }
                | Self::UploadTexture { .. }
                | Self::UploadTextureSubregion { .. }
                | Self::AllocateBufferStorage { .. }
                | Self::AllocateTextureStorage { .. }
        )
    }
}

/// Recording no-op device.
#[derive(Debug)]
pub struct DummyDevice {
    extensions: DeviceExtensions,
    next_handle: u64,
    live_buffers: HashSet<BufferHandle>,
    live_textures: HashSet<TextureHandle>,
    bound_texture: Option<TextureHandle>,
    invalidate_textures_on_upload: bool,
    calls: Vec<DeviceCall>,
}

impl DummyDevice {
    /// Create a dummy device that advertises every extension.
    pub fn new() -> Self {
        Self::with_extensions(DeviceExtensions::all())
    }

    /// Create a dummy device that advertises only `extensions`.
    pub fn with_extensions(extensions: DeviceExtensions) -> Self {
        Self {
            extensions,
            next_handle: 1,
            live_buffers: HashSet::new(),
            live_textures: HashSet::new(),
            bound_texture: None,
            invalidate_textures_on_upload: false,
            calls: Vec::new(),
        }
    }

    /// Simulate a driver that loses texture objects on full upload.
    pub fn with_lost_texture_uploads(mut self, lost: bool) -> Self {
        self.invalidate_textures_on_upload = lost;
        self
    }

    /// Advertised extensions.
    pub fn extensions(&self) -> DeviceExtensions {
        self.extensions
    }

    /// Calls received so far.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Take the recorded calls, clearing the log.
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of live buffer objects.
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    /// Number of live texture objects.
    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    fn next(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityQuery for DummyDevice {
    fn extension_available(&self, extension: Extension) -> bool {
        self.extensions.contains(extension.into())
    }
}

impl GpuDevice for DummyDevice {
    fn name(&self) -> &str {
        "Dummy Device"
    }

    fn create_buffer(&mut self) -> StagingResult<BufferHandle> {
        let handle = BufferHandle(self.next());
        log::trace!("DummyDevice: creating {handle}");
        self.live_buffers.insert(handle);
        self.calls.push(DeviceCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        log::trace!("DummyDevice: deleting {handle}");
        self.live_buffers.remove(&handle);
        self.calls.push(DeviceCall::DeleteBuffer(handle));
    }

    fn bind_buffer(&mut self, target: BufferTarget, handle: Option<BufferHandle>) {
        log::trace!("DummyDevice: binding {handle:?} to {target}");
        self.calls.push(DeviceCall::BindBuffer(target, handle));
    }

    fn allocate_buffer_storage(
        &mut self,
        target: BufferTarget,
        size: usize,
        usage: BufferUsageHint,
    ) -> StagingResult<()> {
        log::trace!("DummyDevice: allocating {size} bytes for {target} buffer ({usage:?})");
        self.calls.push(DeviceCall::AllocateBufferStorage {
            target,
            size,
            usage,
        });
        Ok(())
    }

    fn upload_buffer_subrange(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> StagingResult<()> {
        log::trace!(
            "DummyDevice: uploading {} bytes at offset {offset} to {target} buffer",
            data.len()
        );
        self.calls.push(DeviceCall::UploadBufferSubrange {
            target,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn create_texture(&mut self) -> StagingResult<TextureHandle> {
        let handle = TextureHandle(self.next());
        log::trace!("DummyDevice: creating {handle}");
        self.live_textures.insert(handle);
        self.calls.push(DeviceCall::CreateTexture(handle));
        Ok(handle)
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        log::trace!("DummyDevice: deleting {handle}");
        self.live_textures.remove(&handle);
        if self.bound_texture == Some(handle) {
            self.bound_texture = None;
        }
        self.calls.push(DeviceCall::DeleteTexture(handle));
    }

    fn is_texture(&self, handle: TextureHandle) -> bool {
        self.live_textures.contains(&handle)
    }

    fn bind_texture(&mut self, target: TextureTarget, handle: Option<TextureHandle>) {
        log::trace!("DummyDevice: binding {handle:?} to {target} target");
        self.bound_texture = handle;
        self.calls.push(DeviceCall::BindTexture(target, handle));
    }

    fn allocate_texture_storage(
        &mut self,
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
    ) -> StagingResult<()> {
        if target == TextureTarget::D3 && !self.extensions.contains(DeviceExtensions::TEXTURE_3D) {
            return Err(StagingError::Device("3D textures not supported".to_string()));
        }
        log::trace!(
            "DummyDevice: allocating {target} texture storage {}x{}x{} level {level} ({format:?})",
            size.width,
            size.height,
            size.depth
        );
        self.calls.push(DeviceCall::AllocateTextureStorage {
            target,
            level,
            format,
            size,
        });
        Ok(())
    }

    fn upload_texture(
        &mut self,
        target: TextureTarget,
        level: u32,
        format: TextureFormat,
        size: Extent3d,
        ty: PixelType,
        data: &[u8],
    ) -> StagingResult<()> {
        log::trace!(
            "DummyDevice: uploading {target} texture {}x{}x{} level {level} ({format:?}, {ty:?}, {} bytes)",
            size.width,
            size.height,
            size.depth,
            data.len()
        );
        self.calls.push(DeviceCall::UploadTexture {
            target,
            level,
            format,
            size,
            ty,
            data: data.to_vec(),
        });
        if self.invalidate_textures_on_upload {
            if let Some(handle) = self.bound_texture.take() {
                self.live_textures.remove(&handle);
            }
        }
        Ok(())
    }

    fn upload_texture_subregion(
        &mut self,
        target: TextureTarget,
        level: u32,
        origin: Origin3d,
        size: Extent3d,
        format: TextureFormat,
        ty: PixelType,
        data: &[u8],
    ) -> StagingResult<()> {
        log::trace!(
            "DummyDevice: uploading {target} texture region at ({}, {}, {}) size {}x{}x{} level {level}",
            origin.x,
            origin.y,
            origin.z,
            size.width,
            size.height,
            size.depth
        );
        self.calls.push(DeviceCall::UploadTextureSubregion {
            target,
            level,
            origin,
            size,
            format,
            ty,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_texture_parameter(
        &mut self,
        target: TextureTarget,
        parameter: TextureParameter,
        value: ParameterValue,
    ) {
        log::trace!("DummyDevice: {target} texture parameter {parameter:?} = {value:?}");
        self.calls.push(DeviceCall::SetTextureParameter {
            target,
            parameter,
            value,
        });
    }

    fn set_unpack_alignment(&mut self, alignment: u32) {
        log::trace!("DummyDevice: unpack alignment {alignment}");
        self.calls.push(DeviceCall::SetUnpackAlignment(alignment));
    }
}
