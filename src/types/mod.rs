//! Common types shared between resources and devices.
//!
//! This module contains target enums, format enums, sampling parameters,
//! usage hints and extent types used throughout the staging system.

mod buffer;
mod common;
mod sampler;
mod texture;

pub use buffer::{BufferTarget, BufferUsageHint, IndexFormat};
pub use common::{Extent3d, Origin3d};
pub use sampler::{FilterMode, ParameterValue, TextureParameter, WrapMode};
pub use texture::{PixelType, TextureFormat, TextureTarget};
