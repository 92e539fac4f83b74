//! Type declarations for the glint renderer.
//!
//! This is reexported in the glint crate proper and holds everything an
//! application builds a frame out of: the holders describing GPU objects,
//! the [`StateTable`], uniforms and attributes, and the [`Node`] tree.
//!
//! Holders are shared through `Arc` and mutated through `&self`. Every
//! mutation sets a change bit on the per-context resources observing the
//! holder; the renderer picks those bits up lazily the next time it touches
//! the resource.

/// Reexport of the glam version glint is using.
pub use glam;

mod attribute;
mod buffer;
mod data;
mod framebuffer;
mod holder;
mod image;
mod node;
mod registry;
mod sampler;
mod shader;
mod shape;
mod state_table;
mod texture;
mod uniform;

pub use attribute::*;
pub use buffer::*;
pub use data::*;
pub use framebuffer::*;
pub use holder::{
    Holder, HolderBase, HolderId, Notifier, ResourceObserver, FIRST_HOLDER_CHANGE, LABEL_CHANGED, RESOURCE_CHANGED,
};
pub use image::*;
pub use node::*;
pub use registry::*;
pub use sampler::*;
pub use shader::*;
pub use shape::*;
pub use state_table::*;
pub use texture::*;
pub use uniform::*;
