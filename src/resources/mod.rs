//! Staged GPU resources.
//!
//! - [`ByteBuffer`] - raw bytes with a FIFO queue of pending writes
//! - [`DataBuffer`] - typed vertex or index buffer over a byte buffer
//! - [`BufferView`] - one field of a structured [`DataBuffer`]
//! - [`ClientBuffer`] - host-only data, never uploaded
//! - [`Texture`] - 2D/3D texture with deferred data and parameters
//!
//! All of them implement [`Resource`]; none touches the device outside of
//! the [`Resource`] methods.

mod byte_buffer;
mod client;
mod data_buffer;
mod layout;
mod lifecycle;
mod texture;
mod view;

pub use byte_buffer::ByteBuffer;
pub use client::ClientBuffer;
pub use data_buffer::{AttributeBinding, AttributeSource, BufferRange, DataBuffer};
pub use layout::{BufferKind, ElementLayout, INDEX_SCALARS, VERTEX_SCALARS};
pub use lifecycle::Resource;
pub use texture::{DataOptions, StorageOptions, Texture};
pub use view::BufferView;
