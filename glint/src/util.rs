//! Utilities shared by the rest of the crate.

pub(crate) mod registry;
pub mod typedefs;
