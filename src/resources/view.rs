//! Views onto one field of a structured buffer.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::array::{ElementType, HostArray, ScalarType};
use crate::backend::{BufferHandle, GpuDevice};
use crate::error::{StagingError, StagingResult};

use super::data_buffer::{AttributeBinding, AttributeSource, BufferState, DataBuffer};
use super::layout::{BufferKind, ElementLayout};
use super::lifecycle::Resource;

/// A non-owning alias of one named field of a structured [`DataBuffer`].
///
/// The view shares the parent's GPU handle. Its stride, count and handle
/// are read from the parent on every access, so they follow resizes and
/// recreation of the parent. Once the parent is dropped every access fails.
pub struct BufferView {
    parent: Weak<RefCell<BufferState>>,
    name: String,
    layout: ElementLayout,
    offset: usize,
}

impl BufferView {
    pub(crate) fn new(
        parent: Weak<RefCell<BufferState>>,
        name: &str,
        field_type: &ElementType,
        offset: usize,
    ) -> StagingResult<Self> {
        let layout = BufferKind::Vertex.parse_type(field_type)?;
        Ok(Self {
            parent,
            name: name.to_string(),
            layout,
            offset,
        })
    }

    fn parent(&self) -> StagingResult<Rc<RefCell<BufferState>>> {
        self.parent.upgrade().ok_or_else(|| {
            StagingError::InvalidOperation(format!(
                "view '{}' outlived its buffer",
                self.name
            ))
        })
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component type of the field.
    pub fn element_type(&self) -> &ElementType {
        self.layout.element_type()
    }

    /// Component scalar type of the field.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.layout.element_type().base_scalar()
    }

    /// Components per element of the field.
    pub fn vector_size(&self) -> usize {
        self.layout.vector_size()
    }

    /// Byte offset of the field inside each parent element.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The parent's stride.
    pub fn stride(&self) -> StagingResult<usize> {
        Ok(self.parent()?.borrow().layout.stride())
    }

    /// The parent's element count.
    pub fn count(&self) -> StagingResult<usize> {
        Ok(self.parent()?.borrow().count)
    }

    /// The parent's GPU handle.
    pub fn handle(&self) -> StagingResult<Option<BufferHandle>> {
        Ok(self.parent()?.borrow().bytes.handle())
    }

    /// The parent buffer, if it is still alive.
    pub fn base(&self) -> Option<DataBuffer> {
        self.parent.upgrade().map(DataBuffer::from_shared)
    }

    /// Views cannot be resized.
    pub fn set_count(&mut self, _count: usize) -> StagingResult<()> {
        Err(self.read_only("set the count of"))
    }

    /// Views cannot receive data; write through the parent instead.
    pub fn set_data(&mut self, _data: &HostArray) -> StagingResult<()> {
        Err(self.read_only("set data on"))
    }

    /// Views cannot receive data; write through the parent instead.
    pub fn set_subdata(&mut self, _offset: usize, _data: &HostArray) -> StagingResult<()> {
        Err(self.read_only("set sub-data on"))
    }

    fn read_only(&self, action: &str) -> StagingError {
        StagingError::InvalidOperation(format!("cannot {action} buffer view '{}'", self.name))
    }
}

impl Resource for BufferView {
    fn create(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.parent()?.borrow_mut().bytes.create(device)
    }

    fn delete(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.parent()?.borrow_mut().bytes.delete(device)
    }

    fn activate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.parent()?.borrow_mut().bytes.activate(device)
    }

    fn deactivate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.parent()?.borrow_mut().bytes.deactivate(device)
    }

    /// No-op: activating the parent flushes it.
    fn update(&mut self, _device: &mut dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.parent.upgrade().is_some_and(|parent| {
            let state = parent.borrow();
            state.bytes.is_valid()
        })
    }

    fn needs_update(&self) -> bool {
        false
    }
}

impl AttributeSource for BufferView {
    fn binding(&self) -> StagingResult<AttributeBinding> {
        let parent = self.parent()?;
        let parent = parent.borrow();
        Ok(AttributeBinding {
            target: parent.kind.target(),
            element_type: self.layout.element_type().clone(),
            vector_size: self.layout.vector_size(),
            stride: parent.layout.stride(),
            count: parent.count,
            offset: self.offset,
            handle: parent.bytes.handle(),
        })
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("name", &self.name)
            .field("element_type", &self.layout.element_type().to_string())
            .field("vector_size", &self.layout.vector_size())
            .field("offset", &self.offset)
            .field("parent_alive", &(self.parent.strong_count() > 0))
            .finish()
    }
}

static_assertions::assert_not_impl_any!(BufferView: Send, Sync);
