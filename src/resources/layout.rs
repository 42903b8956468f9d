//! Element layout inference for vertex and index buffers.
//!
//! A buffer's element contract is its element type, vector size and stride.
//! It is derived either from a host array or from a bare element type, and
//! the rules differ per buffer kind.

use std::fmt;

use crate::array::{ElementType, HostArray, ScalarType};
use crate::error::{StagingError, StagingResult};
use crate::types::BufferTarget;

/// Scalar types a vertex buffer may hold.
pub const VERTEX_SCALARS: &[ScalarType] = &[
    ScalarType::Int8,
    ScalarType::UInt8,
    ScalarType::Int16,
    ScalarType::UInt16,
    ScalarType::Float16,
    ScalarType::Float32,
];

/// Scalar types an index buffer may hold.
pub const INDEX_SCALARS: &[ScalarType] = &[ScalarType::UInt8, ScalarType::UInt16, ScalarType::UInt32];

/// Kind of typed buffer. Decides the binding target and the layout rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attributes; structured element types allowed.
    Vertex,
    /// Scalar element indices.
    Index,
}

impl BufferKind {
    /// Binding target for this kind.
    pub fn target(&self) -> BufferTarget {
        match self {
            Self::Vertex => BufferTarget::Vertex,
            Self::Index => BufferTarget::Index,
        }
    }

    /// Scalar types this kind accepts.
    pub fn allowed_scalars(&self) -> &'static [ScalarType] {
        match self {
            Self::Vertex => VERTEX_SCALARS,
            Self::Index => INDEX_SCALARS,
        }
    }

    /// Returns true if `scalar` may be stored in this kind of buffer.
    pub fn allows(&self, scalar: ScalarType) -> bool {
        self.allowed_scalars().contains(&scalar)
    }

    /// Derive the element contract and element count of `data`.
    ///
    /// Returns the (single-field unwrapped) array alongside, since that is
    /// what gets uploaded.
    pub(crate) fn parse_array(&self, data: &HostArray) -> StagingResult<ParsedArray> {
        match self {
            Self::Vertex => parse_vertex_array(data),
            Self::Index => parse_index_array(data),
        }
    }

    /// Derive the element contract of a bare element type.
    pub(crate) fn parse_type(&self, dtype: &ElementType) -> StagingResult<ElementLayout> {
        match self {
            Self::Vertex => parse_vertex_type(dtype),
            Self::Index => parse_index_type(dtype),
        }
    }

    fn check_allowed(&self, dtype: &ElementType) -> StagingResult<()> {
        for scalar in dtype.leaf_scalars() {
            if !self.allows(scalar) {
                return Err(StagingError::Construction(format!(
                    "element type {scalar} is not allowed in a {self} buffer"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Element contract of a typed buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementLayout {
    element_type: ElementType,
    vector_size: usize,
    stride: usize,
}

impl ElementLayout {
    /// Base element type: a scalar, or the full record for structured data.
    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    /// Components per element.
    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    /// Bytes between consecutive elements in GPU memory.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Compare against `other`, naming the first disagreement.
    pub(crate) fn check_matches(&self, other: &ElementLayout) -> StagingResult<()> {
        if self.element_type != other.element_type {
            return Err(StagingError::ContractMismatch(format!(
                "data type {} does not match buffer type {}",
                other.element_type, self.element_type
            )));
        }
        if self.vector_size != other.vector_size {
            return Err(StagingError::ContractMismatch(format!(
                "data vector size {} does not match buffer vector size {}",
                other.vector_size, self.vector_size
            )));
        }
        if self.stride != other.stride {
            return Err(StagingError::ContractMismatch(format!(
                "data stride {} does not match buffer stride {}",
                other.stride, self.stride
            )));
        }
        Ok(())
    }
}

/// Result of parsing a host array.
#[derive(Debug, Clone)]
pub(crate) struct ParsedArray {
    pub(crate) layout: ElementLayout,
    pub(crate) count: usize,
    pub(crate) data: HostArray,
}

/// Replace single-field structured arrays by their only field, repeatedly.
pub(crate) fn unwrap_single_field(data: &HostArray) -> StagingResult<HostArray> {
    let mut data = data.clone();
    while let [only] = data.dtype().fields() {
        let name = only.name().to_string();
        data = data.field(&name)?;
    }
    Ok(data)
}

fn unwrap_single_field_type(dtype: &ElementType) -> ElementType {
    let mut dtype = dtype.clone();
    while let [only] = dtype.fields() {
        dtype = only.dtype().clone();
    }
    dtype
}

fn parse_vertex_array(data: &HostArray) -> StagingResult<ParsedArray> {
    let data = unwrap_single_field(data)?;
    let dtype = data.dtype();
    BufferKind::Vertex.check_allowed(dtype)?;

    if dtype.is_structured() {
        let count = data.size();
        let layout = ElementLayout {
            element_type: dtype.clone(),
            vector_size: dtype.component_count(),
            stride: dtype.itemsize(),
        };
        return Ok(ParsedArray {
            layout,
            count,
            data,
        });
    }

    let (vector_size, count) = match data.shape() {
        [] | [_] => (1, data.size()),
        [outer @ .., last] => (*last, outer.iter().product()),
    };
    // Views are packed before upload, so the GPU stride is always the
    // packed one, whatever the host spacing.
    let scalar = dtype.base();
    let stride = scalar.itemsize() * vector_size;
    Ok(ParsedArray {
        layout: ElementLayout {
            element_type: scalar,
            vector_size,
            stride,
        },
        count,
        data,
    })
}

fn parse_index_array(data: &HostArray) -> StagingResult<ParsedArray> {
    if data.dtype().is_structured() {
        return Err(StagingError::Construction(
            "index buffers do not support structured element types".to_string(),
        ));
    }
    let layout = parse_index_type(data.dtype())?;
    Ok(ParsedArray {
        layout,
        count: data.size(),
        data: data.clone(),
    })
}

fn parse_vertex_type(dtype: &ElementType) -> StagingResult<ElementLayout> {
    let dtype = unwrap_single_field_type(dtype);
    BufferKind::Vertex.check_allowed(&dtype)?;
    let vector_size = dtype.component_count();
    Ok(ElementLayout {
        element_type: dtype.base(),
        vector_size,
        stride: dtype.itemsize(),
    })
}

fn parse_index_type(dtype: &ElementType) -> StagingResult<ElementLayout> {
    if dtype.is_structured() {
        return Err(StagingError::Construction(
            "index buffers do not support structured element types".to_string(),
        ));
    }
    BufferKind::Index.check_allowed(dtype)?;
    Ok(ElementLayout {
        element_type: dtype.base(),
        vector_size: 1,
        stride: dtype.itemsize(),
    })
}
