use thiserror::Error;

use crate::{resources::ResourceKind, util::typedefs::SsoString};
use glint_types::ShaderStage;

/// Reason a resource could not be brought up to date.
///
/// These never leave the renderer: they are logged where the walk absorbs
/// them and the affected resource is skipped.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Driver failed to create {kind:?} \"{label}\"")]
    CreationFailed { kind: ResourceKind, label: SsoString },
    #[error("Unable to compile {stage:?} shader \"{label}\": {log}")]
    CompileFailed {
        stage: ShaderStage,
        label: SsoString,
        log: String,
    },
    #[error("Unable to link shader program \"{label}\": {log}")]
    LinkFailed { label: SsoString, log: String },
    #[error("Shader program \"{0}\" has no vertex shader")]
    MissingVertexShader(SsoString),
    #[error("Shader program \"{0}\" is unusable until its shaders compile and link")]
    UnusableProgram(SsoString),
    #[error("{kind:?} \"{label}\" is incomplete: {reason}")]
    Incomplete {
        kind: ResourceKind,
        label: SsoString,
        reason: &'static str,
    },
    #[error("{kind:?} \"{label}\" is misconfigured: {reason}")]
    InvalidConfiguration {
        kind: ResourceKind,
        label: SsoString,
        reason: SsoString,
    },
    #[error("Framebuffer \"{label}\" is incomplete: {status:?}")]
    FramebufferIncomplete {
        label: SsoString,
        status: crate::gl::FramebufferStatus,
    },
}

impl ResourceError {
    /// Driver failures are errors, everything caused by how the holders are
    /// configured is a warning.
    pub fn level(&self) -> log::Level {
        match self {
            ResourceError::CreationFailed { .. }
            | ResourceError::CompileFailed { .. }
            | ResourceError::LinkFailed { .. }
            | ResourceError::FramebufferIncomplete { .. } => log::Level::Error,
            ResourceError::MissingVertexShader(_)
            | ResourceError::UnusableProgram(_)
            | ResourceError::Incomplete { .. }
            | ResourceError::InvalidConfiguration { .. } => log::Level::Warn,
        }
    }
}
