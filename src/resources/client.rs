//! Client-side buffers.
//!
//! A [`ClientBuffer`] keeps its data in host memory and never creates a GPU
//! object. Draw dispatchers read [`ClientBuffer::data`] directly at the
//! point of use. Type bookkeeping follows the same rules as [`DataBuffer`]
//! so the two are interchangeable as attribute sources.
//!
//! [`DataBuffer`]: super::DataBuffer

use std::fmt;

use crate::array::{ElementType, HostArray, ScalarType};
use crate::backend::GpuDevice;
use crate::error::StagingResult;

use super::data_buffer::{AttributeBinding, AttributeSource, BufferRange};
use super::layout::{BufferKind, ElementLayout};
use super::lifecycle::Resource;
use super::view::BufferView;

/// A buffer whose data always stays in host memory.
pub struct ClientBuffer {
    kind: BufferKind,
    data: HostArray,
    layout: ElementLayout,
    count: usize,
}

impl ClientBuffer {
    /// Wrap `data` as a client buffer of `kind`.
    ///
    /// # Errors
    ///
    /// Fails if the element type is not allowed for `kind`.
    pub fn new(kind: BufferKind, data: HostArray) -> StagingResult<Self> {
        let parsed = kind.parse_array(&data)?;
        Ok(Self {
            kind,
            data,
            layout: parsed.layout,
            count: parsed.count,
        })
    }

    /// Wrap `data` as client-side vertex data.
    pub fn new_vertex(data: HostArray) -> StagingResult<Self> {
        Self::new(BufferKind::Vertex, data)
    }

    /// Wrap `data` as client-side indices.
    pub fn new_index(data: HostArray) -> StagingResult<Self> {
        Self::new(BufferKind::Index, data)
    }

    /// The host data, as given.
    pub fn data(&self) -> &HostArray {
        &self.data
    }

    /// Buffer kind.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Base element type.
    pub fn element_type(&self) -> &ElementType {
        self.layout.element_type()
    }

    /// Component scalar type, or `None` for structured data.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.layout.element_type().base_scalar()
    }

    /// Components per element.
    pub fn vector_size(&self) -> usize {
        self.layout.vector_size()
    }

    /// Bytes between consecutive elements.
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Always 0.
    pub fn offset(&self) -> usize {
        0
    }

    /// Client buffers have no field views.
    pub fn view(&self, _name: &str) -> Option<BufferView> {
        None
    }

    /// Ignored; client data is supplied as a whole at draw time.
    pub fn write(&mut self, _range: impl Into<BufferRange>, _data: &HostArray) -> StagingResult<()> {
        Ok(())
    }
}

impl Resource for ClientBuffer {
    fn create(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn delete(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn activate(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn deactivate(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn update(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn needs_update(&self) -> bool {
        false
    }
}

impl AttributeSource for ClientBuffer {
    fn binding(&self) -> StagingResult<AttributeBinding> {
        Ok(AttributeBinding {
            target: self.kind.target(),
            element_type: self.layout.element_type().clone(),
            vector_size: self.layout.vector_size(),
            stride: self.layout.stride(),
            count: self.count,
            offset: 0,
            handle: None,
        })
    }
}

impl fmt::Debug for ClientBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuffer")
            .field("kind", &self.kind)
            .field("data", &self.data)
            .field("count", &self.count)
            .finish()
    }
}
