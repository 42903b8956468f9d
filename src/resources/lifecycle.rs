//! Shared GPU object lifecycle.
//!
//! Every GPU-backed resource follows the same state machine:
//!
//! ```text
//!   uncreated --create--> live --delete--> uncreated
//!                          |  ^
//!                   activate  deactivate
//! ```
//!
//! Setters only mutate CPU-side pending state and raise `needs_update`.
//! The device is touched exclusively from `create`, `delete`, `activate`,
//! `deactivate` and `update`.

use crate::backend::GpuDevice;
use crate::error::StagingResult;

/// Handle, validity and dirty state of one GPU object.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle<H> {
    handle: Option<H>,
    valid: bool,
    needs_update: bool,
}

impl<H: Copy> Lifecycle<H> {
    pub(crate) fn new() -> Self {
        Self {
            handle: None,
            valid: false,
            needs_update: false,
        }
    }

    pub(crate) fn handle(&self) -> Option<H> {
        self.handle
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    pub(crate) fn set_handle(&mut self, handle: Option<H>) {
        self.valid = handle.is_some();
        self.handle = handle;
    }

    /// Drop the handle without releasing it (the device already lost it).
    pub(crate) fn invalidate(&mut self) {
        self.handle = None;
        self.valid = false;
    }
}

/// Device hooks of a concrete GPU object. The free functions in this module
/// drive the shared state machine through these hooks.
pub(crate) trait GpuObject {
    type Handle: Copy + std::fmt::Display;

    fn lifecycle(&self) -> &Lifecycle<Self::Handle>;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle<Self::Handle>;

    fn create_object(&mut self, device: &mut dyn GpuDevice) -> StagingResult<Self::Handle>;
    fn delete_object(&mut self, device: &mut dyn GpuDevice, handle: Self::Handle);
    fn bind(&self, device: &mut dyn GpuDevice, handle: Option<Self::Handle>);

    /// Apply all pending state. Runs with the object created and bound.
    fn flush(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Called after the handle has been released.
    fn on_deleted(&mut self) {}

    /// Fail before any device call if the object cannot work on this device.
    fn check_capabilities(&self, _device: &dyn GpuDevice) -> StagingResult<()> {
        Ok(())
    }
}

/// Allocate the GPU handle if absent.
pub(crate) fn create<T: GpuObject + ?Sized>(
    object: &mut T,
    device: &mut dyn GpuDevice,
) -> StagingResult<()> {
    if object.lifecycle().handle().is_some() {
        return Ok(());
    }
    let handle = object.create_object(device)?;
    log::debug!("created {handle} on {}", device.name());
    object.lifecycle_mut().set_handle(Some(handle));
    Ok(())
}

/// Release the GPU handle. Safe to call repeatedly.
pub(crate) fn delete<T: GpuObject + ?Sized>(object: &mut T, device: &mut dyn GpuDevice) {
    if let Some(handle) = object.lifecycle().handle() {
        object.delete_object(device, handle);
        log::debug!("deleted {handle}");
        object.lifecycle_mut().set_handle(None);
        object.on_deleted();
    }
}

/// Create if needed, bind, then flush pending state.
pub(crate) fn activate<T: GpuObject + ?Sized>(
    object: &mut T,
    device: &mut dyn GpuDevice,
) -> StagingResult<()> {
    object.check_capabilities(&*device)?;
    create(object, device)?;
    let handle = object.lifecycle().handle();
    object.bind(device, handle);
    if object.lifecycle().needs_update() {
        object.flush(device)?;
        object.lifecycle_mut().needs_update = false;
    }
    Ok(())
}

/// Unbind the object's target.
pub(crate) fn deactivate<T: GpuObject + ?Sized>(object: &mut T, device: &mut dyn GpuDevice) {
    object.bind(device, None);
}

/// Flush pending state without leaving a caller-visible binding contract.
pub(crate) fn update<T: GpuObject + ?Sized>(
    object: &mut T,
    device: &mut dyn GpuDevice,
) -> StagingResult<()> {
    object.check_capabilities(&*device)?;
    if !object.lifecycle().needs_update() {
        return Ok(());
    }
    create(object, device)?;
    let handle = object.lifecycle().handle();
    object.bind(device, handle);
    object.flush(device)?;
    object.lifecycle_mut().needs_update = false;
    Ok(())
}

/// Public lifecycle of every staged resource.
///
/// The device is passed to each call; resources never hold on to it.
pub trait Resource {
    /// Allocate the GPU object if it does not exist yet.
    fn create(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Release the GPU object. Idempotent.
    fn delete(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Create if needed, flush pending state and bind.
    fn activate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Unbind.
    fn deactivate(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Flush pending state now.
    fn update(&mut self, device: &mut dyn GpuDevice) -> StagingResult<()>;

    /// Returns true while the resource owns a live GPU object.
    fn is_valid(&self) -> bool;

    /// Returns true if CPU-side changes are waiting for the next flush.
    fn needs_update(&self) -> bool;
}
