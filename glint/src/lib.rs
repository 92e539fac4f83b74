//! Retained-mode resource binding and state synchronization on top of an
//! OpenGL-style driver.
//!
//! Applications describe a frame as a tree of [`types::Node`]s holding
//! [`types::StateTable`]s, shader programs, uniforms and shapes. Every GPU
//! object is described by a holder in [`types`]. A [`Renderer`] walks the
//! tree and keeps one [`ResourceBinder`] per context it draws on. The binder
//! lazily creates and updates a resource for each holder it meets, sending
//! only what changed since the last frame and only driver state that differs
//! from its shadow of the context.
//!
//! All driver access goes through the [`GraphicsManager`] trait.

pub mod binder;
mod context_registry;
mod error;
mod gl;
mod image_units;
pub mod manager;
mod options;
mod renderer;
mod resources;
mod thread_key;
pub mod util;

/// Reexport of glint-types, the holder and scene description crate.
pub use glint_types as types;

pub use binder::ResourceBinder;
pub use context_registry::{ContextRegistry, RendererId, SharedBinder, DEFAULT_BINDER_WARNING_THRESHOLD};
pub use error::ResourceError;
pub use gl::*;
pub use manager::{ResourceHolder, ResourceManager};
pub use options::{RenderFlags, RendererOptions};
pub use renderer::Renderer;
pub use resources::ResourceKind;
pub use thread_key::ThreadKey;
