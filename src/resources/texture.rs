//! Staged 2D and 3D textures.
//!
//! A [`Texture`] records its data, sub-region writes and sampling
//! parameters on the CPU side. Nothing reaches the device until the texture
//! is activated or updated, at which point pending state is applied in a
//! fixed order: the full data (or storage) write, then queued sub-region
//! writes in FIFO order, then parameters that are still pending.
//!
//! # Example
//!
//! ```ignore
//! let mut texture = Texture::new_2d();
//! texture.set_data(&image, DataOptions::default())?;
//! texture.set_filter(Some(FilterMode::Nearest), None)?;
//! texture.activate(&mut device)?;
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::array::HostArray;
use crate::backend::{Extension, GpuDevice, TextureHandle};
use crate::error::{StagingError, StagingResult};
use crate::format::{convert_data, get_format, unpack_alignment};
use crate::types::{
    Extent3d, FilterMode, Origin3d, ParameterValue, PixelType, TextureFormat, TextureParameter,
    TextureTarget, WrapMode,
};

use super::lifecycle::{self, GpuObject, Lifecycle, Resource};

/// Options for [`Texture::set_data`] and [`Texture::set_subdata`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataOptions {
    /// Mip level.
    pub level: u32,
    /// Pixel format; inferred from the data shape when `None`.
    pub format: Option<TextureFormat>,
    /// Contrast limits `(low, high)` mapped to `[0, 1]`.
    pub limits: Option<(f64, f64)>,
}

impl DataOptions {
    /// Set the mip level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Set an explicit pixel format.
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set contrast limits.
    pub fn with_limits(mut self, low: f64, high: f64) -> Self {
        self.limits = Some((low, high));
        self
    }
}

/// Options for [`Texture::set_storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StorageOptions {
    /// Mip level.
    pub level: u32,
    /// Pixel format; inferred from the shape when `None`.
    pub format: Option<TextureFormat>,
}

impl StorageOptions {
    /// Set the mip level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Set an explicit pixel format.
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug, Clone)]
enum PendingFull {
    Data {
        data: HostArray,
        options: DataOptions,
    },
    Storage {
        shape: Vec<usize>,
        options: StorageOptions,
    },
}

#[derive(Debug, Clone)]
struct PendingRegion {
    data: HostArray,
    offset: Vec<usize>,
    options: DataOptions,
}

/// What the device currently holds for this texture.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Allocation {
    shape: Vec<usize>,
    format: TextureFormat,
    level: u32,
}

/// A 2D or 3D texture with deferred uploads.
pub struct Texture {
    lifecycle: Lifecycle<TextureHandle>,
    target: TextureTarget,
    shape: Option<Vec<usize>>,
    format: Option<TextureFormat>,
    pending_full: Option<PendingFull>,
    pending_regions: VecDeque<PendingRegion>,
    parameters: BTreeMap<TextureParameter, ParameterValue>,
    pending_parameters: BTreeMap<TextureParameter, ParameterValue>,
    allocation: Option<Allocation>,
    uploaded: bool,
}

impl Texture {
    /// Create an empty texture for `target` with linear filtering and
    /// clamp-to-edge wrapping on every axis.
    pub fn new(target: TextureTarget) -> Self {
        let mut texture = Self {
            lifecycle: Lifecycle::new(),
            target,
            shape: None,
            format: None,
            pending_full: None,
            pending_regions: VecDeque::new(),
            parameters: BTreeMap::new(),
            pending_parameters: BTreeMap::new(),
            allocation: None,
            uploaded: false,
        };
        texture.record(
            TextureParameter::MagFilter,
            ParameterValue::Filter(FilterMode::Linear),
        );
        texture.record(
            TextureParameter::MinFilter,
            ParameterValue::Filter(FilterMode::Linear),
        );
        texture.record(
            TextureParameter::WrapS,
            ParameterValue::Wrap(WrapMode::ClampToEdge),
        );
        texture.record(
            TextureParameter::WrapT,
            ParameterValue::Wrap(WrapMode::ClampToEdge),
        );
        if target == TextureTarget::D3 {
            texture.record(
                TextureParameter::WrapR,
                ParameterValue::Wrap(WrapMode::ClampToEdge),
            );
        }
        texture
    }

    /// Create an empty 2D texture.
    pub fn new_2d() -> Self {
        Self::new(TextureTarget::D2)
    }

    /// Create an empty 3D texture. Requires the 3D texture extension at
    /// activation time.
    pub fn new_3d() -> Self {
        Self::new(TextureTarget::D3)
    }

    /// Create a texture holding `data`.
    pub fn with_data(
        target: TextureTarget,
        data: &HostArray,
        options: DataOptions,
    ) -> StagingResult<Self> {
        let mut texture = Self::new(target);
        texture.set_data(data, options)?;
        Ok(texture)
    }

    /// Create a texture with storage for `shape` and no contents.
    pub fn with_storage(
        target: TextureTarget,
        shape: &[usize],
        options: StorageOptions,
    ) -> StagingResult<Self> {
        let mut texture = Self::new(target);
        texture.set_storage(shape, options)?;
        Ok(texture)
    }

    /// Texture target.
    pub fn target(&self) -> TextureTarget {
        self.target
    }

    /// Current GPU handle, if created.
    pub fn handle(&self) -> Option<TextureHandle> {
        self.lifecycle.handle()
    }

    /// Logical shape set by the last data or storage call.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// Pixel format of the last data or storage call.
    pub fn format(&self) -> Option<TextureFormat> {
        self.format
    }

    /// Recorded value of a sampling parameter.
    pub fn parameter(&self, parameter: TextureParameter) -> Option<ParameterValue> {
        self.parameters.get(&parameter).copied()
    }

    /// Returns true if `parameter` has not been applied to the device yet.
    pub fn is_parameter_pending(&self, parameter: TextureParameter) -> bool {
        self.pending_parameters.contains_key(&parameter)
    }

    /// Returns true if a full data or storage write is waiting.
    pub fn has_pending_data(&self) -> bool {
        self.pending_full.is_some()
    }

    /// Number of sub-region writes waiting.
    pub fn pending_regions(&self) -> usize {
        self.pending_regions.len()
    }

    fn record(&mut self, parameter: TextureParameter, value: ParameterValue) {
        self.parameters.insert(parameter, value);
        self.pending_parameters.insert(parameter, value);
        self.lifecycle.mark_dirty();
    }

    /// Set the magnification and minification filters. `None` leaves a
    /// filter unchanged.
    ///
    /// # Errors
    ///
    /// Magnification cannot use a mipmap filter.
    pub fn set_filter(
        &mut self,
        mag: Option<FilterMode>,
        min: Option<FilterMode>,
    ) -> StagingResult<()> {
        if let Some(mag) = mag.filter(FilterMode::uses_mipmaps) {
            return Err(StagingError::InvalidOperation(format!(
                "{mag:?} is not a magnification filter"
            )));
        }
        if let Some(mag) = mag {
            self.record(TextureParameter::MagFilter, ParameterValue::Filter(mag));
        }
        if let Some(min) = min {
            self.record(TextureParameter::MinFilter, ParameterValue::Filter(min));
        }
        Ok(())
    }

    /// Set coordinate wrapping per axis. `None` leaves an axis unchanged.
    ///
    /// # Errors
    ///
    /// The `r` axis only exists on 3D textures.
    pub fn set_wrapping(
        &mut self,
        s: Option<WrapMode>,
        t: Option<WrapMode>,
        r: Option<WrapMode>,
    ) -> StagingResult<()> {
        if r.is_some() && self.target != TextureTarget::D3 {
            return Err(StagingError::InvalidOperation(format!(
                "a {} texture has no R wrap axis",
                self.target
            )));
        }
        for (parameter, mode) in [
            (TextureParameter::WrapS, s),
            (TextureParameter::WrapT, t),
            (TextureParameter::WrapR, r),
        ] {
            if let Some(mode) = mode {
                self.record(parameter, ParameterValue::Wrap(mode));
            }
        }
        Ok(())
    }

    fn check_rank(&self, shape: &[usize]) -> StagingResult<()> {
        let ndim = self.target.ndim();
        if shape.len() != ndim && shape.len() != ndim + 1 {
            return Err(StagingError::InvalidData(format!(
                "data of shape {shape:?} does not fit a {} texture",
                self.target
            )));
        }
        Ok(())
    }

    fn resolve_format(
        &self,
        shape: &[usize],
        format: Option<TextureFormat>,
    ) -> StagingResult<TextureFormat> {
        match format {
            Some(format) => Ok(format),
            None => get_format(shape, self.target),
        }
    }

    fn check_convertible(data: &HostArray) -> StagingResult<()> {
        if data.scalar_type().is_none() {
            return Err(StagingError::Conversion(format!(
                "could not convert data of type {}",
                data.dtype()
            )));
        }
        Ok(())
    }

    /// Replace the texture contents with `data`.
    ///
    /// Only the last call before activation is uploaded. Queued sub-region
    /// writes are discarded.
    ///
    /// # Errors
    ///
    /// Fails if the rank does not fit the target, the format cannot be
    /// inferred, or the data is structured.
    pub fn set_data(&mut self, data: &HostArray, options: DataOptions) -> StagingResult<()> {
        self.check_rank(data.shape())?;
        Self::check_convertible(data)?;
        let format = self.resolve_format(data.shape(), options.format)?;

        self.pending_regions.clear();
        self.pending_full = Some(PendingFull::Data {
            data: data.clone(),
            options,
        });
        self.shape = Some(data.shape().to_vec());
        self.format = Some(format);
        self.lifecycle.mark_dirty();
        Ok(())
    }

    /// Queue `data` to be written at `offset` (one entry per spatial axis).
    ///
    /// # Errors
    ///
    /// Fails if the texture has no shape yet, or if the region does not
    /// lie entirely inside the texture.
    pub fn set_subdata(
        &mut self,
        offset: &[usize],
        data: &HostArray,
        options: DataOptions,
    ) -> StagingResult<()> {
        let shape = self.shape.as_deref().ok_or_else(|| {
            StagingError::InvalidOperation(
                "cannot set sub-data before data or storage is set".to_string(),
            )
        })?;
        self.check_rank(data.shape())?;
        Self::check_convertible(data)?;
        let ndim = self.target.ndim();
        if offset.len() != ndim {
            return Err(StagingError::InvalidData(format!(
                "a {} texture needs {ndim} offsets, got {}",
                self.target,
                offset.len()
            )));
        }
        for axis in 0..ndim {
            let end = offset[axis].checked_add(data.shape()[axis]);
            if end.map_or(true, |end| end > shape[axis]) {
                return Err(StagingError::Bounds(format!(
                    "region of shape {:?} at offset {offset:?} exceeds texture shape {shape:?}",
                    data.shape()
                )));
            }
        }
        self.resolve_format(data.shape(), options.format)?;

        self.pending_regions.push_back(PendingRegion {
            data: data.clone(),
            offset: offset.to_vec(),
            options,
        });
        self.lifecycle.mark_dirty();
        Ok(())
    }

    /// Allocate storage for `shape` without uploading any contents.
    ///
    /// With default options, a call whose spatial shape equals the current
    /// one does nothing.
    ///
    /// # Errors
    ///
    /// Fails if the rank does not fit the target, a dimension is zero, or
    /// the format cannot be inferred.
    pub fn set_storage(&mut self, shape: &[usize], options: StorageOptions) -> StagingResult<()> {
        let ndim = self.target.ndim();
        if options == StorageOptions::default() {
            if let Some(current) = &self.shape {
                if current.iter().take(ndim).eq(shape.iter().take(ndim)) {
                    return Ok(());
                }
            }
        }
        self.check_rank(shape)?;
        if shape.contains(&0) {
            return Err(StagingError::InvalidData(format!(
                "storage shape {shape:?} has an empty dimension"
            )));
        }
        let format = self.resolve_format(shape, options.format)?;

        self.pending_full = Some(PendingFull::Storage {
            shape: shape.to_vec(),
            options,
        });
        self.shape = Some(shape.to_vec());
        self.format = Some(format);
        self.lifecycle.mark_dirty();
        Ok(())
    }

    fn live_handle(&self, device: &dyn GpuDevice) -> StagingResult<TextureHandle> {
        self.lifecycle
            .handle()
            .filter(|&handle| device.is_texture(handle))
            .ok_or_else(|| {
                StagingError::DeviceConsistency(format!(
                    "{} texture handle {:?} is not a live texture",
                    self.target,
                    self.lifecycle.handle()
                ))
            })
    }

    /// Delete and recreate the GPU object if it already holds contents.
    fn recreate_if_uploaded(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        if !self.uploaded {
            return Ok(());
        }
        if let Some(old) = self.lifecycle.handle() {
            device.delete_texture(old);
            let new = device.create_texture()?;
            log::debug!("replaced {old} with {new} for a full upload");
            self.lifecycle.set_handle(Some(new));
        }
        Ok(())
    }

    fn apply_full(&mut self, device: &mut dyn GpuDevice, full: PendingFull) -> StagingResult<()> {
        let ndim = self.target.ndim();
        match full {
            PendingFull::Data { data, options } => {
                let converted = convert_data(&data, options.limits, &*device)?;
                let format = self.resolve_format(converted.shape(), options.format)?;
                let ty = pixel_type(&converted)?;
                let allocation = Allocation {
                    shape: converted.shape().to_vec(),
                    format,
                    level: options.level,
                };
                if self.uploaded && self.allocation.as_ref() == Some(&allocation) {
                    log::trace!("same-shape {} texture data, updating in place", self.target);
                    let origin = vec![0; ndim];
                    return self.upload_region(device, &converted, &origin, options.level, format, ty);
                }
                self.recreate_if_uploaded(device)?;
                device.bind_texture(self.target, self.lifecycle.handle());
                self.upload_full(device, &converted, options.level, format, ty)?;
                self.allocation = Some(allocation);
            }
            PendingFull::Storage { shape, options } => {
                let format = self.resolve_format(&shape, options.format)?;
                self.recreate_if_uploaded(device)?;
                device.bind_texture(self.target, self.lifecycle.handle());
                device.allocate_texture_storage(
                    self.target,
                    options.level,
                    format,
                    Extent3d::from_shape(&shape, ndim),
                )?;
                self.allocation = Some(Allocation {
                    shape,
                    format,
                    level: options.level,
                });
            }
        }
        self.uploaded = true;

        // A fresh object has default sampling state; re-apply everything.
        for (&parameter, &value) in &self.parameters {
            device.set_texture_parameter(self.target, parameter, value);
        }
        self.pending_parameters.clear();
        Ok(())
    }

    fn apply_region(&mut self, device: &mut dyn GpuDevice, region: PendingRegion) -> StagingResult<()> {
        let converted = convert_data(&region.data, region.options.limits, &*device)?;
        let format = self.resolve_format(converted.shape(), region.options.format)?;
        let ty = pixel_type(&converted)?;
        let handle = self.live_handle(&*device)?;
        device.bind_texture(self.target, Some(handle));
        self.upload_region(
            device,
            &converted,
            &region.offset,
            region.options.level,
            format,
            ty,
        )
    }

    fn upload_full(
        &self,
        device: &mut dyn GpuDevice,
        data: &HostArray,
        level: u32,
        format: TextureFormat,
        ty: PixelType,
    ) -> StagingResult<()> {
        let size = Extent3d::from_shape(data.shape(), self.target.ndim());
        let alignment = self.alignment_for(data, ty);
        if alignment != 4 {
            device.set_unpack_alignment(alignment);
        }
        let result = device.upload_texture(self.target, level, format, size, ty, &data.bytes());
        if alignment != 4 {
            device.set_unpack_alignment(4);
        }
        result
    }

    fn upload_region(
        &self,
        device: &mut dyn GpuDevice,
        data: &HostArray,
        offset: &[usize],
        level: u32,
        format: TextureFormat,
        ty: PixelType,
    ) -> StagingResult<()> {
        let size = Extent3d::from_shape(data.shape(), self.target.ndim());
        let origin = Origin3d::from_offset(offset);
        let alignment = self.alignment_for(data, ty);
        if alignment != 4 {
            device.set_unpack_alignment(alignment);
        }
        let result = device.upload_texture_subregion(
            self.target,
            level,
            origin,
            size,
            format,
            ty,
            &data.bytes(),
        );
        if alignment != 4 {
            device.set_unpack_alignment(4);
        }
        result
    }

    fn alignment_for(&self, data: &HostArray, ty: PixelType) -> u32 {
        let ndim = self.target.ndim();
        let shape = data.shape();
        let channels = shape.get(ndim).copied().unwrap_or(1);
        unpack_alignment(shape[ndim - 1] * channels * ty.size())
    }
}

fn pixel_type(data: &HostArray) -> StagingResult<PixelType> {
    data.scalar_type()
        .and_then(PixelType::from_scalar)
        .ok_or_else(|| {
            StagingError::Conversion(format!("cannot upload {} texture data", data.dtype()))
        })
}

impl GpuObject for Texture {
    type Handle = TextureHandle;

    fn lifecycle(&self) -> &Lifecycle<TextureHandle> {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle<TextureHandle> {
        &mut self.lifecycle
    }

    fn create_object(&mut self, device: &mut dyn GpuDevice) -> StagingResult<TextureHandle> {
        device.create_texture()
    }

    fn delete_object(&mut self, device: &mut dyn GpuDevice, handle: TextureHandle) {
        device.delete_texture(handle);
    }

    fn bind(&self, device: &mut dyn GpuDevice, handle: Option<TextureHandle>) {
        device.bind_texture(self.target, handle);
    }

    fn flush(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        if let Some(full) = self.pending_full.take() {
            self.apply_full(device, full)?;
            let alive = self
                .lifecycle
                .handle()
                .is_some_and(|handle| device.is_texture(handle));
            if !alive {
                log::warn!(
                    "{} texture is not valid after upload; leaving it inert",
                    self.target
                );
                self.lifecycle.invalidate();
                self.pending_regions.clear();
                self.allocation = None;
                self.uploaded = false;
                return Ok(());
            }
        }

        while let Some(region) = self.pending_regions.pop_front() {
            self.apply_region(device, region)?;
        }

        let handle = self.live_handle(&*device)?;
        device.bind_texture(self.target, Some(handle));
        for (parameter, value) in std::mem::take(&mut self.pending_parameters) {
            device.set_texture_parameter(self.target, parameter, value);
        }
        Ok(())
    }

    fn on_deleted(&mut self) {
        self.pending_parameters = self.parameters.clone();
        // Queued regions need storage on the next object.
        if self.pending_full.is_none() {
            let storage = match (self.allocation.take(), &self.shape, self.format) {
                (Some(allocation), _, _) => Some((
                    allocation.shape,
                    StorageOptions {
                        level: allocation.level,
                        format: Some(allocation.format),
                    },
                )),
                (None, Some(shape), Some(format)) => Some((
                    shape.clone(),
                    StorageOptions {
                        level: 0,
                        format: Some(format),
                    },
                )),
                _ => None,
            };
            if let Some((shape, options)) = storage {
                self.pending_full = Some(PendingFull::Storage { shape, options });
            }
        }
        self.allocation = None;
        self.uploaded = false;
        self.lifecycle.mark_dirty();
    }

    fn check_capabilities(&self, device: &dyn GpuDevice) -> StagingResult<()> {
        if self.target == TextureTarget::D3 && !device.extension_available(Extension::Texture3D) {
            return Err(StagingError::Capability(format!(
                "3D textures are not available on {}",
                device.name()
            )));
        }
        Ok(())
    }
}

impl Resource for Texture {
    fn create(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.check_capabilities(&*device)?;
        lifecycle::create(self, device)
    }

    fn delete(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::delete(self, device);
        Ok(())
    }

    fn activate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::activate(self, device)
    }

    fn deactivate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::deactivate(self, device);
        Ok(())
    }

    fn update(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::update(self, device)
    }

    fn is_valid(&self) -> bool {
        self.lifecycle.is_valid()
    }

    fn needs_update(&self) -> bool {
        self.lifecycle.needs_update()
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("target", &self.target)
            .field("handle", &self.lifecycle.handle())
            .field("shape", &self.shape)
            .field("format", &self.format)
            .field("pending_data", &self.pending_full.is_some())
            .field("pending_regions", &self.pending_regions.len())
            .field("pending_parameters", &self.pending_parameters.len())
            .finish()
    }
}
