//! Typed vertex and index buffers.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Range, RangeFull};
use std::rc::Rc;

use crate::array::{ElementType, HostArray, ScalarType};
use crate::backend::{BufferHandle, GpuDevice};
use crate::error::{StagingError, StagingResult};
use crate::types::{BufferTarget, BufferUsageHint, IndexFormat};

use super::byte_buffer::ByteBuffer;
use super::layout::{BufferKind, ElementLayout};
use super::lifecycle::Resource;
use super::view::BufferView;

/// Element range addressed by [`DataBuffer::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRange {
    /// The whole buffer, starting at element 0.
    Whole,
    /// Elements `start..stop`.
    Range {
        /// First element.
        start: usize,
        /// One past the last element.
        stop: usize,
    },
    /// Elements `start..stop` taking every `step`-th one. Only a step of
    /// one is writable.
    Stepped {
        /// First element.
        start: usize,
        /// One past the last element.
        stop: usize,
        /// Distance between addressed elements.
        step: usize,
    },
}

impl From<Range<usize>> for BufferRange {
    fn from(range: Range<usize>) -> Self {
        Self::Range {
            start: range.start,
            stop: range.end,
        }
    }
}

impl From<RangeFull> for BufferRange {
    fn from(_: RangeFull) -> Self {
        Self::Whole
    }
}

/// Layout and binding data a draw dispatcher needs to source one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBinding {
    /// Binding target.
    pub target: BufferTarget,
    /// Base element type (a scalar, or a record for structured buffers).
    pub element_type: ElementType,
    /// Components per element.
    pub vector_size: usize,
    /// Bytes between consecutive elements.
    pub stride: usize,
    /// Number of elements.
    pub count: usize,
    /// Byte offset of the attribute inside each element.
    pub offset: usize,
    /// GPU handle, or `None` when data is sourced from host memory.
    pub handle: Option<BufferHandle>,
}

/// Anything a vertex attribute or index list can be sourced from.
pub trait AttributeSource {
    /// Snapshot of the current layout and handle.
    ///
    /// # Errors
    ///
    /// Fails if the source depends on a buffer that no longer exists.
    fn binding(&self) -> StagingResult<AttributeBinding>;
}

/// State shared between a buffer and its views.
pub(crate) struct BufferState {
    pub(crate) bytes: ByteBuffer,
    pub(crate) kind: BufferKind,
    pub(crate) layout: ElementLayout,
    pub(crate) count: usize,
}

impl BufferState {
    fn set_count(&mut self, count: usize) -> StagingResult<()> {
        let capacity = count.checked_mul(self.layout.stride()).ok_or_else(|| {
            StagingError::Bounds(format!(
                "{count} elements of {} bytes overflow the address space",
                self.layout.stride()
            ))
        })?;
        self.count = count;
        self.bytes.set_capacity(capacity);
        Ok(())
    }
}

/// A GPU buffer with a fixed element contract.
///
/// The element type, vector size and stride are fixed at construction;
/// later data must match them exactly. The capacity in bytes always equals
/// `count * stride`.
///
/// Views created with [`DataBuffer::view`] share this buffer's state and
/// read its stride, count and handle through on every access.
pub struct DataBuffer {
    state: Rc<RefCell<BufferState>>,
}

impl DataBuffer {
    /// Create a buffer of `kind` holding `data`.
    ///
    /// # Errors
    ///
    /// Fails if the element type is not allowed for `kind`.
    pub fn new(kind: BufferKind, data: &HostArray) -> StagingResult<Self> {
        let parsed = kind.parse_array(data)?;
        let mut bytes = ByteBuffer::new(kind.target());
        bytes.set_data(&parsed.data.bytes());
        log::debug!(
            "new {kind} buffer: {} x {} (stride {})",
            parsed.count,
            parsed.layout.element_type(),
            parsed.layout.stride()
        );
        Ok(Self::from_state(BufferState {
            bytes,
            kind,
            layout: parsed.layout,
            count: parsed.count,
        }))
    }

    /// Create a vertex buffer holding `data`.
    pub fn new_vertex(data: &HostArray) -> StagingResult<Self> {
        Self::new(BufferKind::Vertex, data)
    }

    /// Create an index buffer holding `data`.
    pub fn new_index(data: &HostArray) -> StagingResult<Self> {
        Self::new(BufferKind::Index, data)
    }

    /// Create an empty buffer of `kind` for elements of `dtype`.
    ///
    /// The count starts at zero; use [`set_count`](Self::set_count) or
    /// [`set_data`](Self::set_data) to give it storage.
    pub fn from_type(kind: BufferKind, dtype: &ElementType) -> StagingResult<Self> {
        let layout = kind.parse_type(dtype)?;
        Ok(Self::from_state(BufferState {
            bytes: ByteBuffer::new(kind.target()),
            kind,
            layout,
            count: 0,
        }))
    }

    fn from_state(state: BufferState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub(crate) fn from_shared(state: Rc<RefCell<BufferState>>) -> Self {
        Self { state }
    }

    fn state(&self) -> Ref<'_, BufferState> {
        self.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, BufferState> {
        self.state.borrow_mut()
    }

    /// Buffer kind.
    pub fn kind(&self) -> BufferKind {
        self.state().kind
    }

    /// Binding target.
    pub fn target(&self) -> BufferTarget {
        self.state().kind.target()
    }

    /// Element contract.
    pub fn layout(&self) -> ElementLayout {
        self.state().layout.clone()
    }

    /// Base element type.
    pub fn element_type(&self) -> ElementType {
        self.state().layout.element_type().clone()
    }

    /// Component scalar type, or `None` for structured buffers.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.state().layout.element_type().base_scalar()
    }

    /// Components per element.
    pub fn vector_size(&self) -> usize {
        self.state().layout.vector_size()
    }

    /// Bytes between consecutive elements.
    pub fn stride(&self) -> usize {
        self.state().layout.stride()
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.state().count
    }

    /// Byte offset of the data inside each element. Always 0 for a buffer.
    pub fn offset(&self) -> usize {
        0
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.state().bytes.capacity()
    }

    /// Current GPU handle, if created.
    pub fn handle(&self) -> Option<BufferHandle> {
        self.state().bytes.handle()
    }

    /// Usage hint.
    pub fn usage(&self) -> BufferUsageHint {
        self.state().bytes.usage()
    }

    /// Set the usage hint used by the next storage allocation.
    pub fn set_usage(&mut self, usage: BufferUsageHint) {
        self.state_mut().bytes.set_usage(usage);
    }

    /// Number of writes waiting for the next flush.
    pub fn pending_writes(&self) -> usize {
        self.state().bytes.pending_writes()
    }

    /// Returns true if storage will be reallocated at the next flush.
    pub fn needs_resize(&self) -> bool {
        self.state().bytes.needs_resize()
    }

    /// Index format for draw dispatch. `None` for vertex buffers.
    pub fn index_format(&self) -> Option<IndexFormat> {
        let state = self.state();
        match state.kind {
            BufferKind::Index => state
                .layout
                .element_type()
                .base_scalar()
                .and_then(IndexFormat::from_scalar),
            BufferKind::Vertex => None,
        }
    }

    /// Resize to `count` elements. A change discards queued writes.
    ///
    /// # Errors
    ///
    /// Fails with a bounds error if the byte size would overflow.
    pub fn set_count(&mut self, count: usize) -> StagingResult<()> {
        self.state_mut().set_count(count)
    }

    /// Replace the contents with `data`, which must match the element
    /// contract. The count follows the data.
    ///
    /// # Errors
    ///
    /// Fails with a contract mismatch if the element type, vector size or
    /// stride of `data` differs from the buffer's.
    pub fn set_data(&mut self, data: &HostArray) -> StagingResult<()> {
        let mut state = self.state_mut();
        let parsed = state.kind.parse_array(data).map_err(as_mismatch)?;
        state.layout.check_matches(&parsed.layout)?;
        state.set_count(parsed.count)?;
        state.bytes.set_data(&parsed.data.bytes());
        Ok(())
    }

    /// Queue `data` to be written starting at element `offset`.
    ///
    /// # Errors
    ///
    /// Fails with a contract mismatch as [`set_data`](Self::set_data) does,
    /// and with a bounds error if the data does not fit.
    pub fn set_subdata(&mut self, offset: usize, data: &HostArray) -> StagingResult<()> {
        let mut state = self.state_mut();
        let parsed = state.kind.parse_array(data).map_err(as_mismatch)?;
        state.layout.check_matches(&parsed.layout)?;
        let end = offset.checked_add(parsed.count);
        if end.map_or(true, |end| end > state.count) {
            return Err(StagingError::Bounds(format!(
                "{} elements at offset {offset} exceed count {}",
                parsed.count, state.count
            )));
        }
        // In range, so the byte offset is below the capacity.
        let byte_offset = offset * state.layout.stride();
        let bytes = parsed.data.bytes();
        state.bytes.set_subdata(byte_offset, &bytes)
    }

    /// Write `data` into `range`.
    ///
    /// The byte size of `data` must equal the byte size of the range. Data
    /// of another scalar type is converted to the buffer's type first.
    ///
    /// # Errors
    ///
    /// Fails for steps other than one, size mismatches, and structured data
    /// whose type differs from the buffer's.
    pub fn write(&mut self, range: impl Into<BufferRange>, data: &HostArray) -> StagingResult<()> {
        let (start, nbytes) = match range.into() {
            BufferRange::Whole => (0, data.nbytes()),
            BufferRange::Stepped { start, stop, step: 1 } | BufferRange::Range { start, stop } => {
                if stop < start {
                    return Err(StagingError::Bounds(format!("empty range {start}..{stop}")));
                }
                (start, (stop - start) * self.stride())
            }
            BufferRange::Stepped { step, .. } => {
                return Err(StagingError::InvalidOperation(format!(
                    "cannot write with step {step}; only contiguous ranges are writable"
                )));
            }
        };
        if data.nbytes() != nbytes {
            return Err(StagingError::ContractMismatch(format!(
                "{} bytes given for a range of {nbytes} bytes",
                data.nbytes()
            )));
        }

        let element_type = self.element_type();
        if data.dtype() == &element_type {
            return self.set_subdata(start, data);
        }
        match (element_type.base_scalar(), data.scalar_type()) {
            (Some(target), Some(_)) => {
                log::trace!("casting {} data to {target} for buffer write", data.dtype());
                let cast = data.astype(target)?;
                self.set_subdata(start, &cast)
            }
            _ => Err(StagingError::ContractMismatch(format!(
                "data type {} does not match buffer type {element_type}",
                data.dtype()
            ))),
        }
    }

    /// A view of the named field of a structured buffer.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is not structured or has no such field.
    pub fn view(&self, name: &str) -> StagingResult<BufferView> {
        let state = self.state();
        let element_type = state.layout.element_type();
        if !element_type.is_structured() {
            return Err(StagingError::InvalidOperation(format!(
                "cannot view field '{name}' of a buffer of {element_type}"
            )));
        }
        let field = element_type.field(name).ok_or_else(|| {
            StagingError::InvalidOperation(format!("no field '{name}' in {element_type}"))
        })?;
        BufferView::new(Rc::downgrade(&self.state), name, field.dtype(), field.offset())
    }

    /// Field names of a structured buffer.
    pub fn field_names(&self) -> Vec<String> {
        self.state()
            .layout
            .element_type()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }
}

fn as_mismatch(err: StagingError) -> StagingError {
    match err {
        StagingError::Construction(message) => StagingError::ContractMismatch(message),
        other => other,
    }
}

impl Resource for DataBuffer {
    fn create(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.state_mut().bytes.create(device)
    }

    fn delete(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.state_mut().bytes.delete(device)
    }

    fn activate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.state_mut().bytes.activate(device)
    }

    fn deactivate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.state_mut().bytes.deactivate(device)
    }

    fn update(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        self.state_mut().bytes.update(device)
    }

    fn is_valid(&self) -> bool {
        self.state().bytes.is_valid()
    }

    fn needs_update(&self) -> bool {
        self.state().bytes.needs_update()
    }
}

impl AttributeSource for DataBuffer {
    fn binding(&self) -> StagingResult<AttributeBinding> {
        let state = self.state();
        Ok(AttributeBinding {
            target: state.kind.target(),
            element_type: state.layout.element_type().clone(),
            vector_size: state.layout.vector_size(),
            stride: state.layout.stride(),
            count: state.count,
            offset: 0,
            handle: state.bytes.handle(),
        })
    }
}

impl fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("DataBuffer")
            .field("kind", &state.kind)
            .field("element_type", &state.layout.element_type().to_string())
            .field("vector_size", &state.layout.vector_size())
            .field("stride", &state.layout.stride())
            .field("count", &state.count)
            .field("bytes", &state.bytes)
            .finish()
    }
}

// Buffers are tied to the thread owning the device context.
static_assertions::assert_not_impl_any!(DataBuffer: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    fn vertex_type() -> ElementType {
        ElementType::structured([
            ("position", ElementType::vector(ScalarType::Float32, 3)),
            ("color", ElementType::vector(ScalarType::Float32, 4)),
        ])
        .unwrap()
    }

    #[test]
    fn test_capacity_tracks_count() {
        let mut buffer = DataBuffer::new_vertex(&HostArray::zeros(vertex_type(), &[100])).unwrap();
        assert_eq!(buffer.capacity(), 100 * 28);

        buffer.set_count(10).unwrap();
        assert_eq!(buffer.count(), 10);
        assert_eq!(buffer.capacity(), 280);
        assert_eq!(buffer.pending_writes(), 0);

        buffer.set_data(&HostArray::zeros(vertex_type(), &[3])).unwrap();
        assert_eq!(buffer.capacity(), buffer.count() * buffer.stride());
    }

    #[test]
    fn test_set_data_rejects_same_size_other_contract() {
        let mut buffer = DataBuffer::new_vertex(&HostArray::from_slice(&[0.0f32; 12], &[4, 3]).unwrap()).unwrap();

        // Same byte size, different vector size.
        let reshaped = HostArray::from_slice(&[0.0f32; 12], &[3, 4]).unwrap();
        assert!(matches!(buffer.set_data(&reshaped), Err(StagingError::ContractMismatch(_))));

        // Same byte size, different type.
        let ints = HostArray::from_slice(&[0i16; 24], &[8, 3]).unwrap();
        assert!(matches!(buffer.set_data(&ints), Err(StagingError::ContractMismatch(_))));

        // Disallowed type is a mismatch, not a construction failure.
        let doubles = HostArray::from_slice(&[0.0f64; 6], &[2, 3]).unwrap();
        assert!(matches!(buffer.set_data(&doubles), Err(StagingError::ContractMismatch(_))));
        assert_eq!(buffer.count(), 4);
    }

    #[test]
    fn test_from_type_starts_empty() {
        let mut buffer = DataBuffer::from_type(BufferKind::Index, &ScalarType::UInt32.into()).unwrap();
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.stride(), 4);
        assert_eq!(buffer.index_format(), Some(IndexFormat::Uint32));
        assert!(buffer.set_subdata(0, &HostArray::from_1d(&[1u32])).is_err());

        buffer.set_count(8).unwrap();
        assert!(buffer.set_subdata(7, &HostArray::from_1d(&[1u32])).is_ok());
    }

    #[test]
    fn test_set_count_rejects_overflowing_size() {
        let mut buffer = DataBuffer::new_index(&HostArray::from_1d(&[0u32; 4])).unwrap();
        assert!(matches!(buffer.set_count(usize::MAX), Err(StagingError::Bounds(_))));
        assert_eq!(buffer.count(), 4);
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_write_ranges() {
        let mut buffer = DataBuffer::new_vertex(&HostArray::from_1d(&[0.0f32; 8])).unwrap();

        buffer.write(2..4, &HostArray::from_1d(&[1.0f32, 2.0])).unwrap();
        buffer.write(.., &HostArray::from_1d(&[3.0f32; 8])).unwrap();
        assert_eq!(buffer.pending_writes(), 3);

        // Wrong size for the range.
        assert!(buffer.write(0..3, &HostArray::from_1d(&[1.0f32])).is_err());

        let stepped = BufferRange::Stepped { start: 0, stop: 8, step: 2 };
        assert!(matches!(
            buffer.write(stepped, &HostArray::from_1d(&[0.0f32; 4])),
            Err(StagingError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_write_casts_scalar_data() {
        let mut buffer = DataBuffer::new_vertex(&HostArray::from_1d(&[0.0f32; 4])).unwrap();
        // 2 x i64 occupies the 16 bytes of the whole range and is cast to f32.
        buffer.write(0..4, &HostArray::from_1d(&[5i64, 6])).unwrap();
        assert_eq!(buffer.pending_writes(), 2);

        let mut device = DummyDevice::new();
        buffer.activate(&mut device).unwrap();
        assert!(!buffer.needs_update());
    }

    #[test]
    fn test_view_requires_structured_buffer() {
        let plain = DataBuffer::new_vertex(&HostArray::from_1d(&[0u8; 4])).unwrap();
        assert!(matches!(plain.view("x"), Err(StagingError::InvalidOperation(_))));

        let structured = DataBuffer::new_vertex(&HostArray::zeros(vertex_type(), &[4])).unwrap();
        assert!(structured.view("normal").is_err());
        assert_eq!(structured.field_names(), vec!["position", "color"]);
        assert_eq!(structured.index_format(), None);
    }
}
