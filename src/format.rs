//! Pixel format inference and host-side data conversion for textures.

use crate::array::{HostArray, ScalarType};
use crate::backend::{CapabilityQuery, Extension};
use crate::error::{StagingError, StagingResult};
use crate::types::{TextureFormat, TextureTarget};

/// Infer the pixel format of data with `shape` on `target`.
///
/// The shape holds the spatial axes of the target followed by an optional
/// channel axis. Alpha-only data cannot be inferred and must be requested
/// explicitly.
///
/// # Errors
///
/// Fails if the rank does not fit the target or the channel count is not
/// between one and four.
pub fn get_format(shape: &[usize], target: TextureTarget) -> StagingResult<TextureFormat> {
    let ndim = target.ndim();
    let channels = match shape.len() {
        n if n == ndim => 1,
        n if n == ndim + 1 => shape[ndim],
        n => {
            return Err(StagingError::Format(format!(
                "cannot determine format of rank-{n} data for a {target} texture"
            )))
        }
    };
    match channels {
        1 => Ok(TextureFormat::Luminance),
        2 => Ok(TextureFormat::LuminanceAlpha),
        3 => Ok(TextureFormat::Rgb),
        4 => Ok(TextureFormat::Rgba),
        n => Err(StagingError::Format(format!(
            "cannot determine format: data of shape {shape:?} has {n} channels"
        ))),
    }
}

/// Default contrast limits of an integer type, or `None` for other types.
///
/// Signed types map their full range. Unsigned types map `[0, 2^(bits-1)]`,
/// so values in the upper half of the range saturate.
pub fn default_limits(scalar: ScalarType) -> Option<(f64, f64)> {
    if scalar == ScalarType::UInt8 {
        return None;
    }
    let half = 2f64.powi(scalar.bits() as i32 - 1);
    if scalar.is_signed_int() {
        Some((-half, half - 1.0))
    } else if scalar.is_unsigned_int() {
        Some((0.0, half))
    } else {
        None
    }
}

/// Convert `data` into a type the device can upload, applying contrast
/// limits.
///
/// `uint8` data passes through untouched unless limits are given. Half
/// and single floats pass through when the device supports them and no
/// limits are given. Everything else is rescaled with `limits` (or the
/// type's [`default_limits`]) and ends up as a supported float type, or as
/// `uint8` scaled from `[0, 1]` to `[0, 255]` when float textures are
/// unavailable.
///
/// # Errors
///
/// Fails for structured data.
pub fn convert_data<C>(
    data: &HostArray,
    limits: Option<(f64, f64)>,
    caps: &C,
) -> StagingResult<HostArray>
where
    C: CapabilityQuery + ?Sized,
{
    let scalar = data.scalar_type().ok_or_else(|| {
        StagingError::Conversion(format!("could not convert data of type {}", data.dtype()))
    })?;
    let float32 = caps.extension_available(Extension::TextureFloat);
    let float16 = caps.extension_available(Extension::TextureHalfFloat);

    let (working, limits) = match scalar {
        ScalarType::Bool => return data.astype(ScalarType::UInt8),
        ScalarType::UInt8 if limits.is_none() => return Ok(data.clone()),
        ScalarType::UInt8 => (ScalarType::Float32, limits),
        ScalarType::Float16 if limits.is_none() && float16 => return Ok(data.clone()),
        ScalarType::Float32 if limits.is_none() && float32 => return Ok(data.clone()),
        ScalarType::Float16 | ScalarType::Float32 => (scalar, limits),
        ScalarType::Float64 => (ScalarType::Float32, limits),
        _ => (ScalarType::Float32, limits.or_else(|| default_limits(scalar))),
    };

    let mut values = data.to_f64_vec()?;
    if let Some((lo, hi)) = limits {
        log::trace!("rescaling {scalar} texture data with limits ({lo}, {hi})");
        if lo != 0.0 {
            values.iter_mut().for_each(|v| *v -= lo);
        }
        let range = hi - lo;
        if range != 1.0 {
            values.iter_mut().for_each(|v| *v /= range);
        }
    }

    let supported = match working {
        ScalarType::Float16 => float16,
        _ => float32,
    };
    if supported {
        return HostArray::from_f64_values(&values, working, data.shape());
    }

    log::trace!("float textures unavailable, converting {scalar} data to uint8");
    let bytes = values
        .iter()
        .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
        .collect::<Vec<_>>();
    HostArray::from_slice(&bytes, data.shape())
}

/// Unpack alignment for rows of `row_bytes` bytes: the first of 4, 8, 2
/// and 1 that divides the row length.
pub fn unpack_alignment(row_bytes: usize) -> u32 {
    [4, 8, 2, 1]
        .into_iter()
        .find(|&alignment| row_bytes % alignment as usize == 0)
        .unwrap_or(1)
}
