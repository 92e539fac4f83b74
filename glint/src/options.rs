use std::ops::RangeInclusive;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behaviour of [`Renderer::draw_scene`](crate::Renderer::draw_scene).
    ///
    /// The `CLEAR_*` flags unbind driver state once a frame has been drawn,
    /// for embedding applications that issue their own calls afterwards.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RenderFlags: u32 {
        const PROCESS_RELEASES = 1 << 0;
        const PROCESS_INFO_REQUESTS = 1 << 1;
        const CLEAR_ACTIVE_TEXTURE = 1 << 2;
        const CLEAR_ARRAY_BUFFER = 1 << 3;
        const CLEAR_ELEMENT_ARRAY_BUFFER = 1 << 4;
        const CLEAR_FRAMEBUFFER = 1 << 5;
        const CLEAR_SAMPLERS = 1 << 6;
        const CLEAR_SHADER_PROGRAM = 1 << 7;
        const CLEAR_TEXTURES = 1 << 8;
        const CLEAR_VERTEX_ARRAY = 1 << 9;
    }
}

impl RenderFlags {
    pub const ALL_CLEAR_FLAGS: Self = Self::CLEAR_ACTIVE_TEXTURE
        .union(Self::CLEAR_ARRAY_BUFFER)
        .union(Self::CLEAR_ELEMENT_ARRAY_BUFFER)
        .union(Self::CLEAR_FRAMEBUFFER)
        .union(Self::CLEAR_SAMPLERS)
        .union(Self::CLEAR_SHADER_PROGRAM)
        .union(Self::CLEAR_TEXTURES)
        .union(Self::CLEAR_VERTEX_ARRAY);
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self::PROCESS_RELEASES | Self::PROCESS_INFO_REQUESTS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    pub flags: RenderFlags,
    /// First and last image unit textures may be bound to. `None` uses every
    /// unit the driver reports.
    pub image_unit_range: Option<(u32, u32)>,
}

impl RendererOptions {
    pub fn image_unit_range(&self) -> Option<RangeInclusive<u32>> {
        self.image_unit_range.map(|(first, last)| first..=last)
    }
}
