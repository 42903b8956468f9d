//! Element type descriptors for host arrays.
//!
//! An [`ElementType`] describes one element of a host array: a plain scalar,
//! a fixed-size sub-array of scalars (for example three `float32` making up a
//! position), or a structured record of named fields laid out back to back.

use std::collections::HashSet;
use std::fmt;

use crate::error::{StagingError, StagingResult};

/// Base numeric type of host data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean, one byte.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE half-precision float.
    Float16,
    /// IEEE single-precision float.
    Float32,
    /// IEEE double-precision float.
    Float64,
}

impl ScalarType {
    /// Size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Width in bits.
    pub fn bits(&self) -> u32 {
        self.size() as u32 * 8
    }

    /// Lowercase type name, e.g. `float32`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Returns true for floating-point types.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns true for signed integer types.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns true for unsigned integer types.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust types that can back a host array.
pub trait Scalar: bytemuck::Pod {
    /// The matching scalar type tag.
    const TYPE: ScalarType;
}

macro_rules! impl_scalar {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const TYPE: ScalarType = ScalarType::$tag;
            }
        )*
    };
}

impl_scalar! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    half::f16 => Float16,
    f32 => Float32,
    f64 => Float64,
}

/// A named field of a structured element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    dtype: ElementType,
    offset: usize,
}

impl Field {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field element type (may be a sub-array, e.g. three `float32`).
    pub fn dtype(&self) -> &ElementType {
        &self.dtype
    }

    /// Byte offset of the field inside the record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Type of one element of a host array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// A single scalar.
    Scalar(ScalarType),
    /// A fixed-shape block of scalars.
    Array {
        /// Component type.
        scalar: ScalarType,
        /// Row-major shape of the block.
        shape: Vec<usize>,
    },
    /// A record of named fields, packed without padding.
    Structured(Vec<Field>),
}

impl ElementType {
    /// A plain scalar element.
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::Scalar(scalar)
    }

    /// A vector of `size` scalars. A size of one is a plain scalar.
    pub fn vector(scalar: ScalarType, size: usize) -> Self {
        Self::array(scalar, &[size])
    }

    /// A fixed-shape block of scalars. An empty or all-ones shape collapses
    /// to a plain scalar.
    pub fn array(scalar: ScalarType, shape: &[usize]) -> Self {
        if shape.iter().all(|&n| n == 1) {
            Self::Scalar(scalar)
        } else {
            Self::Array {
                scalar,
                shape: shape.to_vec(),
            }
        }
    }

    /// A structured record. Fields are packed in declaration order.
    ///
    /// # Errors
    ///
    /// Fails when no fields are given or a field name repeats.
    pub fn structured<I, S>(fields: I) -> StagingResult<Self>
    where
        I: IntoIterator<Item = (S, ElementType)>,
        S: Into<String>,
    {
        let mut names = HashSet::new();
        let mut offset = 0;
        let mut packed = Vec::new();
        for (name, dtype) in fields {
            let name = name.into();
            if !names.insert(name.clone()) {
                return Err(StagingError::Construction(format!(
                    "duplicate field name '{name}'"
                )));
            }
            let size = dtype.itemsize();
            packed.push(Field {
                name,
                dtype,
                offset,
            });
            offset += size;
        }
        if packed.is_empty() {
            return Err(StagingError::Construction(
                "structured type needs at least one field".to_string(),
            ));
        }
        Ok(Self::Structured(packed))
    }

    /// Size of one element in bytes.
    pub fn itemsize(&self) -> usize {
        match self {
            Self::Scalar(scalar) => scalar.size(),
            Self::Array { scalar, shape } => scalar.size() * shape.iter().product::<usize>(),
            Self::Structured(fields) => fields.iter().map(|f| f.dtype.itemsize()).sum(),
        }
    }

    /// The element type with any sub-array shape stripped. Structured types
    /// are their own base.
    pub fn base(&self) -> ElementType {
        match self {
            Self::Array { scalar, .. } => Self::Scalar(*scalar),
            other => other.clone(),
        }
    }

    /// The component scalar type, if this is not a structured type.
    pub fn base_scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(scalar) | Self::Array { scalar, .. } => Some(*scalar),
            Self::Structured(_) => None,
        }
    }

    /// Sub-array shape (empty for scalars and structured types).
    pub fn subarray_shape(&self) -> &[usize] {
        match self {
            Self::Array { shape, .. } => shape,
            _ => &[],
        }
    }

    /// Number of scalar components in one element, flattening every field.
    pub fn component_count(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Array { shape, .. } => shape.iter().product(),
            Self::Structured(fields) => fields.iter().map(|f| f.dtype.component_count()).sum(),
        }
    }

    /// Returns true for structured (named-field) types.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// The fields of a structured type (empty otherwise).
    pub fn fields(&self) -> &[Field] {
        match self {
            Self::Structured(fields) => fields,
            _ => &[],
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Every scalar type reachable from this element, in field order.
    pub fn leaf_scalars(&self) -> Vec<ScalarType> {
        match self {
            Self::Scalar(scalar) | Self::Array { scalar, .. } => vec![*scalar],
            Self::Structured(fields) => fields.iter().flat_map(|f| f.dtype.leaf_scalars()).collect(),
        }
    }
}

impl From<ScalarType> for ElementType {
    fn from(scalar: ScalarType) -> Self {
        Self::Scalar(scalar)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Array { scalar, shape } => write!(f, "({scalar}, {shape:?})"),
            Self::Structured(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.dtype)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_type() -> ElementType {
        ElementType::structured([
            ("position", ElementType::vector(ScalarType::Float32, 3)),
            ("color", ElementType::vector(ScalarType::Float32, 4)),
        ])
        .unwrap()
    }

    #[test]
    fn test_structured_offsets_are_packed() {
        let dtype = vertex_type();
        assert_eq!(dtype.itemsize(), 28);
        assert_eq!(dtype.field("position").unwrap().offset(), 0);
        assert_eq!(dtype.field("color").unwrap().offset(), 12);
        assert_eq!(dtype.component_count(), 7);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = ElementType::structured([
            ("a", ElementType::scalar(ScalarType::Float32)),
            ("a", ElementType::scalar(ScalarType::Float32)),
        ]);
        assert!(matches!(result, Err(StagingError::Construction(_))));
    }

    #[test]
    fn test_vector_of_one_is_scalar() {
        assert_eq!(
            ElementType::vector(ScalarType::UInt16, 1),
            ElementType::Scalar(ScalarType::UInt16)
        );
        assert_eq!(
            ElementType::vector(ScalarType::Float32, 3).base(),
            ElementType::Scalar(ScalarType::Float32)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ScalarType::Float64.to_string(), "float64");
        assert_eq!(
            vertex_type().to_string(),
            "{position: (float32, [3]), color: (float32, [4])}"
        );
    }
}
