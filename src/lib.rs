//! # RedLilium Staging
//!
//! Deferred GPU buffer and texture staging for the RedLilium engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`HostArray`] - Host-side numeric arrays with structured element types
//! - [`DataBuffer`] - Vertex and index buffers with a fixed element contract
//! - [`BufferView`] - Field views that share their parent buffer's GPU object
//! - [`ClientBuffer`] - Host-only buffers for client-side draw sourcing
//! - [`Texture`] - 2D/3D textures with deferred uploads and parameters
//! - [`GpuDevice`] - Trait for the device the resources are staged onto
//! - A recording [`DummyDevice`] for tests (feature `dummy`)
//!
//! Setters only record pending state. The device is touched when a resource
//! is created, deleted, activated, deactivated or updated.
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_staging::{DataBuffer, DummyDevice, HostArray, Resource};
//!
//! let mut device = DummyDevice::new();
//! let mut indices = DataBuffer::new_index(&HostArray::from_1d(&[0u16, 1, 2]))?;
//! indices.set_subdata(1, &HostArray::from_1d(&[5u16]))?;
//! indices.activate(&mut device)?; // create, allocate, upload both writes
//! ```

pub mod array;
pub mod backend;
pub mod error;
pub mod format;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use array::{ElementType, Field, HostArray, Scalar, ScalarType};
pub use backend::{
    BufferHandle, CapabilityQuery, Extension, GpuDevice, StaticCapabilities, TextureHandle,
};
#[cfg(feature = "dummy")]
pub use backend::{DeviceCall, DeviceExtensions, DummyDevice};
pub use error::{StagingError, StagingResult};
pub use format::{convert_data, get_format};
pub use resources::{
    AttributeBinding, AttributeSource, BufferKind, BufferRange, BufferView, ByteBuffer,
    ClientBuffer, DataBuffer, DataOptions, ElementLayout, Resource, StorageOptions, Texture,
};
pub use types::{
    BufferTarget, BufferUsageHint, Extent3d, FilterMode, IndexFormat, Origin3d, ParameterValue,
    PixelType, TextureFormat, TextureParameter, TextureTarget, WrapMode,
};

/// Staging library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the staging subsystem.
pub fn init() {
    log::info!("RedLilium Staging v{} initialized", VERSION);
}
