//! Buffer types.

use std::fmt;

use crate::array::ScalarType;

/// Binding target of a buffer. Fixed for the lifetime of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Vertex,
    /// Element indices.
    Index,
}

impl fmt::Display for BufferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Expected update frequency, passed to the device on storage allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsageHint {
    /// Written once, drawn many times.
    Static,
    /// Written repeatedly, drawn many times.
    #[default]
    Dynamic,
    /// Written once, drawn a few times.
    Stream,
}

/// Index format used by draw dispatch for an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 8-bit unsigned indices.
    Uint8,
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Map an index element type to its format, if it is an index type.
    pub fn from_scalar(scalar: ScalarType) -> Option<Self> {
        match scalar {
            ScalarType::UInt8 => Some(Self::Uint8),
            ScalarType::UInt16 => Some(Self::Uint16),
            ScalarType::UInt32 => Some(Self::Uint32),
            _ => None,
        }
    }

    /// Size of one index in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}
