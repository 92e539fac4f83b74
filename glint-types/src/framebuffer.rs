use std::sync::Arc;

use parking_lot::RwLock;

use crate::{holder::impl_holder, CubeFace, CubeMapTexture, HolderBase, ImageFormat, Texture, FIRST_HOLDER_CHANGE};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color0,
    Depth,
    Stencil,
}

impl AttachmentPoint {
    pub const ALL: [AttachmentPoint; 3] = [AttachmentPoint::Color0, AttachmentPoint::Depth, AttachmentPoint::Stencil];
}

/// What an attachment point of a framebuffer renders into.
#[derive(Debug, Clone, Default)]
pub enum Attachment {
    #[default]
    Unbound,
    /// A renderbuffer owned by the framebuffer resource.
    Renderbuffer(ImageFormat),
    Texture { texture: Arc<Texture>, mip_level: u32 },
    CubeMapFace {
        texture: Arc<CubeMapTexture>,
        face: CubeFace,
        mip_level: u32,
    },
}

impl Attachment {
    pub fn is_bound(&self) -> bool {
        !matches!(self, Attachment::Unbound)
    }
}

#[derive(Debug)]
struct FramebufferState {
    width: u32,
    height: u32,
    color: Attachment,
    depth: Attachment,
    stencil: Attachment,
}

/// An offscreen render target.
#[derive(Debug)]
pub struct FramebufferObject {
    base: HolderBase,
    state: RwLock<FramebufferState>,
}
impl_holder!(FramebufferObject);

impl FramebufferObject {
    pub const DIMENSIONS_CHANGED: u32 = FIRST_HOLDER_CHANGE;
    pub const COLOR_ATTACHMENT_CHANGED: u32 = FIRST_HOLDER_CHANGE + 1;
    pub const DEPTH_ATTACHMENT_CHANGED: u32 = FIRST_HOLDER_CHANGE + 2;
    pub const STENCIL_ATTACHMENT_CHANGED: u32 = FIRST_HOLDER_CHANGE + 3;

    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            state: RwLock::new(FramebufferState {
                width,
                height,
                color: Attachment::Unbound,
                depth: Attachment::Unbound,
                stencil: Attachment::Unbound,
            }),
        })
    }

    pub fn width(&self) -> u32 {
        self.state.read().width
    }

    pub fn height(&self) -> u32 {
        self.state.read().height
    }

    pub fn resize(&self, width: u32, height: u32) {
        {
            let mut state = self.state.write();
            state.width = width;
            state.height = height;
        }
        self.base.notify(Self::DIMENSIONS_CHANGED);
    }

    pub fn change_bit(point: AttachmentPoint) -> u32 {
        match point {
            AttachmentPoint::Color0 => Self::COLOR_ATTACHMENT_CHANGED,
            AttachmentPoint::Depth => Self::DEPTH_ATTACHMENT_CHANGED,
            AttachmentPoint::Stencil => Self::STENCIL_ATTACHMENT_CHANGED,
        }
    }

    pub fn attachment(&self, point: AttachmentPoint) -> Attachment {
        let state = self.state.read();
        match point {
            AttachmentPoint::Color0 => state.color.clone(),
            AttachmentPoint::Depth => state.depth.clone(),
            AttachmentPoint::Stencil => state.stencil.clone(),
        }
    }

    pub fn set_attachment(&self, point: AttachmentPoint, attachment: Attachment) {
        {
            let mut state = self.state.write();
            let slot = match point {
                AttachmentPoint::Color0 => &mut state.color,
                AttachmentPoint::Depth => &mut state.depth,
                AttachmentPoint::Stencil => &mut state.stencil,
            };
            *slot = attachment;
        }
        self.base.notify(Self::change_bit(point));
    }
}
