//! Staging error types.

use thiserror::Error;

/// Errors raised by buffer and texture staging.
///
/// Every error is returned synchronously from the call that triggered it and
/// leaves the resource's CPU-side state as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    /// The resource could not be constructed, e.g. for a disallowed element
    /// type.
    #[error("construction failed: {0}")]
    Construction(String),
    /// Data or sub-data disagrees with the element contract of an established buffer.
    #[error("contract mismatch: {0}")]
    ContractMismatch(String),
    /// An offset or extent falls outside the buffer or texture.
    #[error("out of bounds: {0}")]
    Bounds(String),
    /// A required device extension is not available.
    #[error("capability missing: {0}")]
    Capability(String),
    /// A GPU handle is invalid when it must not be.
    #[error("device consistency error: {0}")]
    DeviceConsistency(String),
    /// The operation is not allowed on this kind of resource.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A pixel format could not be derived from a shape.
    #[error("format error: {0}")]
    Format(String),
    /// Host data could not be converted to an uploadable type.
    #[error("conversion error: {0}")]
    Conversion(String),
    /// Host data is malformed for the requested operation.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// The device failed to service a call.
    #[error("device error: {0}")]
    Device(String),
}

/// Result alias used throughout the crate.
pub type StagingResult<T> = Result<T, StagingError>;
