//! Common utilities for staging integration tests.
//!
//! Provides a [`TestContext`] over the recording dummy device plus helpers
//! for building host data and inspecting the recorded device calls.

#![allow(dead_code)]

use redlilium_staging::{
    DeviceCall, DeviceExtensions, DummyDevice, ElementType, HostArray, ScalarType,
};

// ============================================================================
// Device Profiles
// ============================================================================

/// Extension sets the tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Every extension available.
    Full,
    /// No float textures; data is converted to 8-bit.
    NoFloat,
    /// Nothing optional.
    Minimal,
}

impl Profile {
    /// Extensions advertised under this profile.
    pub fn extensions(self) -> DeviceExtensions {
        match self {
            Profile::Full => DeviceExtensions::all(),
            Profile::NoFloat => DeviceExtensions::TEXTURE_3D,
            Profile::Minimal => DeviceExtensions::empty(),
        }
    }

    /// Whether float texture uploads stay float.
    pub fn has_float(self) -> bool {
        self.extensions().contains(DeviceExtensions::TEXTURE_FLOAT)
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context owning a recording device.
pub struct TestContext {
    /// Profile the device was created with.
    pub profile: Profile,
    /// The device resources are staged onto.
    pub device: DummyDevice,
}

impl TestContext {
    /// Create a context for `profile`, installing the test logger.
    pub fn new(profile: Profile) -> Self {
        init_logging();
        Self {
            profile,
            device: DummyDevice::with_extensions(profile.extensions()),
        }
    }

    /// Create a context with every extension.
    pub fn full() -> Self {
        Self::new(Profile::Full)
    }

    /// Take the calls recorded so far.
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        self.device.take_calls()
    }

    /// Byte payloads of buffer uploads, with their offsets, in call order.
    pub fn buffer_uploads(&self) -> Vec<(usize, Vec<u8>)> {
        self.device
            .calls()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::UploadBufferSubrange { offset, data, .. } => {
                    Some((*offset, data.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls that move data to the device.
    pub fn upload_count(&self) -> usize {
        self.device.calls().iter().filter(|c| c.is_upload()).count()
    }
}

/// Install `env_logger` for test output. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Host Data
// ============================================================================

/// `{position: f32 x 3, color: f32 x 4}`.
pub fn vertex_type() -> ElementType {
    ElementType::structured([
        ("position", ElementType::vector(ScalarType::Float32, 3)),
        ("color", ElementType::vector(ScalarType::Float32, 4)),
    ])
    .expect("valid vertex type")
}

/// `count` vertices whose components count up from zero.
pub fn vertices(count: usize) -> HostArray {
    let values: Vec<f32> = (0..count * 7).map(|i| i as f32).collect();
    HostArray::from_bytes(
        bytemuck::cast_slice(&values).to_vec(),
        vertex_type(),
        &[count],
    )
    .expect("valid vertex data")
}

/// An RGBA8 image filled with `value`.
pub fn rgba8(height: usize, width: usize, value: u8) -> HostArray {
    HostArray::from_slice(&vec![value; height * width * 4], &[height, width, 4])
        .expect("valid image data")
}

/// Little helper to read `f32` values out of an uploaded byte payload.
pub fn as_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect()
}
