//! Raw byte buffers with deferred writes.

use std::collections::VecDeque;
use std::fmt;

use crate::backend::{BufferHandle, GpuDevice};
use crate::error::{StagingError, StagingResult};
use crate::types::{BufferTarget, BufferUsageHint};

use super::lifecycle::{self, GpuObject, Lifecycle, Resource};

/// A queued byte write, applied at the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingWrite {
    pub(crate) offset: usize,
    pub(crate) data: Vec<u8>,
}

/// A GPU buffer addressed in bytes.
///
/// Writes are queued and applied in order when the buffer is activated or
/// updated. Changing the capacity discards every queued write, since those
/// addressed the old storage.
pub struct ByteBuffer {
    lifecycle: Lifecycle<BufferHandle>,
    target: BufferTarget,
    usage: BufferUsageHint,
    capacity: usize,
    needs_resize: bool,
    pending: VecDeque<PendingWrite>,
}

impl ByteBuffer {
    /// Create an empty buffer bound to `target`.
    pub fn new(target: BufferTarget) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            target,
            usage: BufferUsageHint::default(),
            capacity: 0,
            needs_resize: false,
            pending: VecDeque::new(),
        }
    }

    /// Binding target.
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Current GPU handle, if created.
    pub fn handle(&self) -> Option<BufferHandle> {
        self.lifecycle.handle()
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Usage hint passed to the next storage allocation.
    pub fn usage(&self) -> BufferUsageHint {
        self.usage
    }

    /// Set the usage hint. Takes effect at the next storage allocation.
    pub fn set_usage(&mut self, usage: BufferUsageHint) {
        self.usage = usage;
    }

    /// Returns true if storage will be reallocated at the next flush.
    pub fn needs_resize(&self) -> bool {
        self.needs_resize
    }

    /// Number of writes waiting for the next flush.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Set the capacity in bytes. A change discards all queued writes.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity != self.capacity {
            log::trace!(
                "{} buffer capacity {} -> {capacity}, dropping {} queued writes",
                self.target,
                self.capacity,
                self.pending.len()
            );
            self.capacity = capacity;
            self.needs_resize = true;
            self.pending.clear();
            self.lifecycle.mark_dirty();
        }
    }

    /// Replace the whole contents with `data`.
    pub fn set_data(&mut self, data: &[u8]) {
        self.set_capacity(data.len());
        self.pending.clear();
        self.pending.push_back(PendingWrite {
            offset: 0,
            data: data.to_vec(),
        });
        self.lifecycle.mark_dirty();
    }

    /// Queue a write of `data` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Fails if no capacity has been set or the write does not fit.
    pub fn set_subdata(&mut self, offset: usize, data: &[u8]) -> StagingResult<()> {
        if self.capacity == 0 {
            return Err(StagingError::InvalidOperation(format!(
                "{} buffer has no storage yet; set data or capacity first",
                self.target
            )));
        }
        let end = offset.checked_add(data.len()).ok_or_else(|| {
            StagingError::Bounds(format!("offset {offset} overflows"))
        })?;
        if end > self.capacity {
            return Err(StagingError::Bounds(format!(
                "write of {} bytes at offset {offset} exceeds capacity {}",
                data.len(),
                self.capacity
            )));
        }
        self.pending.push_back(PendingWrite {
            offset,
            data: data.to_vec(),
        });
        self.lifecycle.mark_dirty();
        Ok(())
    }
}

impl GpuObject for ByteBuffer {
    type Handle = BufferHandle;

    fn lifecycle(&self) -> &Lifecycle<BufferHandle> {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle<BufferHandle> {
        &mut self.lifecycle
    }

    fn create_object(&mut self, device: &mut dyn GpuDevice) -> StagingResult<BufferHandle> {
        device.create_buffer()
    }

    fn delete_object(&mut self, device: &mut dyn GpuDevice, handle: BufferHandle) {
        device.delete_buffer(handle);
    }

    fn bind(&self, device: &mut dyn GpuDevice, handle: Option<BufferHandle>) {
        device.bind_buffer(self.target, handle);
    }

    fn flush(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        if self.needs_resize {
            device.allocate_buffer_storage(self.target, self.capacity, self.usage)?;
            self.needs_resize = false;
        }
        while let Some(write) = self.pending.pop_front() {
            log::trace!(
                "flushing {} bytes at offset {} to {} buffer",
                write.data.len(),
                write.offset,
                self.target
            );
            device.upload_buffer_subrange(self.target, write.offset, &write.data)?;
        }
        Ok(())
    }

    fn on_deleted(&mut self) {
        // The storage went with the handle.
        if self.capacity > 0 {
            self.needs_resize = true;
            self.lifecycle.mark_dirty();
        }
    }
}

impl Resource for ByteBuffer {
    fn create(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::create(self, device)
    }

    fn delete(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::delete(self, device);
        Ok(())
    }

    fn activate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::activate(self, device)
    }

    fn deactivate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::deactivate(self, device);
        Ok(())
    }

    fn update(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()> {
        lifecycle::update(self, device)
    }

    fn is_valid(&self) -> bool {
        self.lifecycle.is_valid()
    }

    fn needs_update(&self) -> bool {
        self.lifecycle.needs_update()
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("target", &self.target)
            .field("handle", &self.lifecycle.handle())
            .field("capacity", &self.capacity)
            .field("needs_resize", &self.needs_resize)
            .field("pending_writes", &self.pending.len())
            .finish()
    }
}
