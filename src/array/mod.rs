//! Host-side numeric arrays.
//!
//! [`HostArray`] is the CPU-side description of data handed to buffers and
//! textures: a shape, an [`ElementType`] and a block of bytes. Arrays can be
//! views into a larger structured array (see [`HostArray::field`]), in which
//! case their elements are not contiguous in memory and are packed on demand
//! with [`HostArray::bytes`] or [`HostArray::to_contiguous`].
//!
//! # Example
//!
//! ```ignore
//! let dtype = ElementType::structured([
//!     ("position", ElementType::vector(ScalarType::Float32, 3)),
//!     ("color", ElementType::vector(ScalarType::Float32, 4)),
//! ])?;
//! let vertices = HostArray::zeros(dtype, &[100]);
//! let positions = vertices.field("position")?; // shape (100, 3), strided
//! ```

mod dtype;

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

pub use dtype::{ElementType, Field, Scalar, ScalarType};

use crate::error::{StagingError, StagingResult};

/// An n-dimensional host array.
///
/// Cloning is cheap: clones share the underlying storage.
#[derive(Clone)]
pub struct HostArray {
    storage: Arc<[u8]>,
    /// Byte offset of the first element in `storage`.
    offset: usize,
    dtype: ElementType,
    shape: Vec<usize>,
    /// Leading axes that step by `record_stride`; trailing axes are packed.
    outer_axes: usize,
    record_stride: usize,
    owned: bool,
}

impl HostArray {
    fn new_owned(bytes: Vec<u8>, dtype: ElementType, mut shape: Vec<usize>) -> Self {
        // Sub-array element types expand into trailing axes.
        let dtype = match dtype {
            ElementType::Array { scalar, shape: sub } => {
                shape.extend_from_slice(&sub);
                ElementType::Scalar(scalar)
            }
            other => other,
        };
        let record_stride = dtype.itemsize();
        Self {
            storage: bytes.into(),
            offset: 0,
            outer_axes: shape.len(),
            dtype,
            shape,
            record_stride,
            owned: true,
        }
    }

    /// Create an array from raw bytes.
    ///
    /// # Errors
    ///
    /// Fails if the byte length does not match `shape` and `dtype`.
    pub fn from_bytes(bytes: Vec<u8>, dtype: ElementType, shape: &[usize]) -> StagingResult<Self> {
        let expected = dtype.itemsize() * shape.iter().product::<usize>();
        if bytes.len() != expected {
            return Err(StagingError::InvalidData(format!(
                "{} bytes given for shape {:?} of {} (expected {})",
                bytes.len(),
                shape,
                dtype,
                expected
            )));
        }
        Ok(Self::new_owned(bytes, dtype, shape.to_vec()))
    }

    /// Create an array by copying typed values.
    ///
    /// # Errors
    ///
    /// Fails if the number of values does not match `shape`.
    pub fn from_slice<T: Scalar>(values: &[T], shape: &[usize]) -> StagingResult<Self> {
        Self::from_bytes(
            bytemuck::cast_slice(values).to_vec(),
            ElementType::Scalar(T::TYPE),
            shape,
        )
    }

    /// Create a one-dimensional array by copying typed values.
    pub fn from_1d<T: Scalar>(values: &[T]) -> Self {
        Self::new_owned(
            bytemuck::cast_slice(values).to_vec(),
            ElementType::Scalar(T::TYPE),
            vec![values.len()],
        )
    }

    /// Create a boolean array.
    ///
    /// # Errors
    ///
    /// Fails if the number of values does not match `shape`.
    pub fn from_bools(values: &[bool], shape: &[usize]) -> StagingResult<Self> {
        let bytes = values.iter().map(|&b| b as u8).collect();
        Self::from_bytes(bytes, ElementType::Scalar(ScalarType::Bool), shape)
    }

    /// Create a zero-filled array.
    pub fn zeros(dtype: ElementType, shape: &[usize]) -> Self {
        let len = dtype.itemsize() * shape.iter().product::<usize>();
        Self::new_owned(vec![0; len], dtype, shape.to_vec())
    }

    /// Create an array of `scalar` values from `f64` values, casting each one.
    ///
    /// # Errors
    ///
    /// Fails if the number of values does not match `shape`.
    pub fn from_f64_values(
        values: &[f64],
        scalar: ScalarType,
        shape: &[usize],
    ) -> StagingResult<Self> {
        let mut bytes = Vec::with_capacity(values.len() * scalar.size());
        for &value in values {
            write_scalar(value, scalar, &mut bytes);
        }
        Self::from_bytes(bytes, ElementType::Scalar(scalar), shape)
    }

    /// Element type of the array.
    pub fn dtype(&self) -> &ElementType {
        &self.dtype
    }

    /// Component scalar type, or `None` for structured arrays.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.dtype.base_scalar()
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of bytes the elements occupy when packed.
    pub fn nbytes(&self) -> usize {
        self.size() * self.dtype.itemsize()
    }

    /// Returns true if this array borrows storage from another array.
    pub fn is_view(&self) -> bool {
        !self.owned
    }

    /// Returns true if the elements are packed back to back in memory.
    pub fn is_contiguous(&self) -> bool {
        self.record_count() <= 1 || self.record_stride == self.record_len()
    }

    fn record_len(&self) -> usize {
        self.dtype.itemsize() * self.shape[self.outer_axes..].iter().product::<usize>()
    }

    fn record_count(&self) -> usize {
        self.shape[..self.outer_axes].iter().product()
    }

    /// The packed bytes of the array. Borrowed when already contiguous.
    pub fn bytes(&self) -> Cow<'_, [u8]> {
        if self.is_contiguous() {
            return Cow::Borrowed(&self.storage[self.offset..self.offset + self.nbytes()]);
        }
        let record_len = self.record_len();
        let mut packed = Vec::with_capacity(self.nbytes());
        for record in 0..self.record_count() {
            let start = self.offset + record * self.record_stride;
            packed.extend_from_slice(&self.storage[start..start + record_len]);
        }
        Cow::Owned(packed)
    }

    /// A packed copy of this array. Contiguous arrays are returned as-is.
    pub fn to_contiguous(&self) -> HostArray {
        if self.is_contiguous() {
            return self.clone();
        }
        Self::new_owned(self.bytes().into_owned(), self.dtype.clone(), self.shape.clone())
    }

    /// A strided view of one named field of a structured array.
    ///
    /// The view's shape is this array's shape followed by the field's
    /// sub-array shape, and its element type is the field's scalar type.
    ///
    /// # Errors
    ///
    /// Fails if the array is not structured or has no such field.
    pub fn field(&self, name: &str) -> StagingResult<HostArray> {
        let field = self.dtype.field(name).ok_or_else(|| {
            StagingError::InvalidData(format!("no field '{name}' in {}", self.dtype))
        })?;
        let mut shape = self.shape.clone();
        shape.extend_from_slice(field.dtype().subarray_shape());
        Ok(Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + field.offset(),
            dtype: field.dtype().base(),
            shape,
            outer_axes: self.outer_axes,
            record_stride: self.record_stride,
            owned: false,
        })
    }

    /// A view of rows `range` along the first axis.
    ///
    /// # Errors
    ///
    /// Fails on zero-dimensional arrays and out-of-range bounds.
    pub fn slice(&self, range: Range<usize>) -> StagingResult<HostArray> {
        if self.ndim() == 0 || self.outer_axes == 0 {
            return Err(StagingError::InvalidData(
                "cannot slice a zero-dimensional array".to_string(),
            ));
        }
        if range.start > range.end || range.end > self.shape[0] {
            return Err(StagingError::Bounds(format!(
                "rows {}..{} out of range for length {}",
                range.start, range.end, self.shape[0]
            )));
        }
        let row_stride = self.record_stride * self.shape[1..self.outer_axes].iter().product::<usize>();
        let mut shape = self.shape.clone();
        shape[0] = range.end - range.start;
        Ok(Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + range.start * row_stride,
            dtype: self.dtype.clone(),
            shape,
            outer_axes: self.outer_axes,
            record_stride: self.record_stride,
            owned: false,
        })
    }

    /// Reinterpret the array with a new shape of the same size.
    ///
    /// # Errors
    ///
    /// Fails if the sizes differ. Non-contiguous arrays are packed first.
    pub fn reshape(&self, shape: &[usize]) -> StagingResult<HostArray> {
        if shape.iter().product::<usize>() != self.size() {
            return Err(StagingError::InvalidData(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        let packed = self.to_contiguous();
        Ok(Self {
            shape: shape.to_vec(),
            outer_axes: shape.len(),
            record_stride: packed.dtype.itemsize(),
            ..packed
        })
    }

    /// A copy of the array converted element-wise to `scalar`.
    ///
    /// # Errors
    ///
    /// Structured arrays cannot be cast.
    pub fn astype(&self, scalar: ScalarType) -> StagingResult<HostArray> {
        let values = self.to_f64_vec()?;
        Self::from_f64_values(&values, scalar, &self.shape)
    }

    /// All elements as `f64`, in row-major order.
    ///
    /// # Errors
    ///
    /// Structured arrays have no scalar value.
    pub fn to_f64_vec(&self) -> StagingResult<Vec<f64>> {
        let scalar = self.scalar_type().ok_or_else(|| {
            StagingError::InvalidData(format!("structured array {} has no scalar values", self.dtype))
        })?;
        let bytes = self.bytes();
        Ok(bytes
            .chunks_exact(scalar.size())
            .map(|chunk| read_scalar(chunk, scalar))
            .collect())
    }

    /// All elements as `T`, in row-major order.
    ///
    /// # Errors
    ///
    /// Fails unless the array's scalar type is exactly `T`.
    pub fn to_vec<T: Scalar>(&self) -> StagingResult<Vec<T>> {
        if self.scalar_type() != Some(T::TYPE) {
            return Err(StagingError::InvalidData(format!(
                "array of {} read as {}",
                self.dtype,
                T::TYPE
            )));
        }
        Ok(self
            .bytes()
            .chunks_exact(T::TYPE.size())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

fn read_scalar(bytes: &[u8], scalar: ScalarType) -> f64 {
    use bytemuck::pod_read_unaligned as read;
    match scalar {
        ScalarType::Bool => f64::from(u8::from(bytes[0] != 0)),
        ScalarType::Int8 => f64::from(read::<i8>(bytes)),
        ScalarType::UInt8 => f64::from(read::<u8>(bytes)),
        ScalarType::Int16 => f64::from(read::<i16>(bytes)),
        ScalarType::UInt16 => f64::from(read::<u16>(bytes)),
        ScalarType::Int32 => f64::from(read::<i32>(bytes)),
        ScalarType::UInt32 => f64::from(read::<u32>(bytes)),
        ScalarType::Int64 => read::<i64>(bytes) as f64,
        ScalarType::UInt64 => read::<u64>(bytes) as f64,
        ScalarType::Float16 => read::<half::f16>(bytes).to_f64(),
        ScalarType::Float32 => f64::from(read::<f32>(bytes)),
        ScalarType::Float64 => read::<f64>(bytes),
    }
}

fn write_scalar(value: f64, scalar: ScalarType, out: &mut Vec<u8>) {
    match scalar {
        ScalarType::Bool => out.push(u8::from(value != 0.0)),
        ScalarType::Int8 => out.extend_from_slice(&(value as i8).to_ne_bytes()),
        ScalarType::UInt8 => out.extend_from_slice(&(value as u8).to_ne_bytes()),
        ScalarType::Int16 => out.extend_from_slice(&(value as i16).to_ne_bytes()),
        ScalarType::UInt16 => out.extend_from_slice(&(value as u16).to_ne_bytes()),
        ScalarType::Int32 => out.extend_from_slice(&(value as i32).to_ne_bytes()),
        ScalarType::UInt32 => out.extend_from_slice(&(value as u32).to_ne_bytes()),
        ScalarType::Int64 => out.extend_from_slice(&(value as i64).to_ne_bytes()),
        ScalarType::UInt64 => out.extend_from_slice(&(value as u64).to_ne_bytes()),
        ScalarType::Float16 => out.extend_from_slice(&half::f16::from_f64(value).to_ne_bytes()),
        ScalarType::Float32 => out.extend_from_slice(&(value as f32).to_ne_bytes()),
        ScalarType::Float64 => out.extend_from_slice(&value.to_ne_bytes()),
    }
}

impl PartialEq for HostArray {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.shape == other.shape && self.bytes() == other.bytes()
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostArray")
            .field("dtype", &self.dtype.to_string())
            .field("shape", &self.shape)
            .field("contiguous", &self.is_contiguous())
            .field("view", &self.is_view())
            .finish()
    }
}
