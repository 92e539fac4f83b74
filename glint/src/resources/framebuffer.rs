use std::sync::Arc;

use glint_types::{
    Attachment, AttachmentPoint, FramebufferObject, Holder, ImageFormat, TexImageTarget, LABEL_CHANGED,
    RESOURCE_CHANGED,
};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, FramebufferStatus, GLuint, GraphicsManager, ObjectKind},
    resources::{is_set, Resource, ResourceKind, ResourceLink},
};

/// What the driver has attached to one attachment point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum AttachedImage {
    #[default]
    None,
    Renderbuffer {
        id: GLuint,
        format: ImageFormat,
    },
    Texture {
        target: TexImageTarget,
        id: GLuint,
        level: u32,
    },
}

impl AttachedImage {
    pub fn gl_id(self) -> GLuint {
        match self {
            AttachedImage::None => 0,
            AttachedImage::Renderbuffer { id, .. } | AttachedImage::Texture { id, .. } => id,
        }
    }
}

/// A driver framebuffer object with the renderbuffers it owns.
#[derive(Debug)]
pub(crate) struct FramebufferResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    attached: [AttachedImage; 3],
    status: FramebufferStatus,
    memory: usize,
}

impl FramebufferResource {
    fn new(link: Arc<ResourceLink>) -> Self {
        Self {
            link,
            gl_id: 0,
            attached: [AttachedImage::None; 3],
            status: FramebufferStatus::IncompleteMissingAttachment,
            memory: 0,
        }
    }

    pub fn attached(&self, point: AttachmentPoint) -> AttachedImage {
        self.attached[point as usize]
    }

    pub fn status(&self) -> FramebufferStatus {
        self.status
    }
}

impl Resource for FramebufferResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn gpu_memory(&self) -> usize {
        self.memory
    }

    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow) {
        for attached in self.attached {
            if let AttachedImage::Renderbuffer { id, .. } = attached {
                bindings.unbind_renderbuffer(gm, id);
                gm.delete_renderbuffer(id);
            }
        }
        if self.gl_id != 0 {
            bindings.unbind_framebuffer(gm, self.gl_id);
            gm.delete_framebuffer(self.gl_id);
        }
    }
}

/// What an attachment should look like once textures are up to date.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DesiredImage {
    None,
    Renderbuffer(ImageFormat),
    Texture { target: TexImageTarget, id: GLuint, level: u32 },
}

impl DesiredImage {
    /// Whether `attached` already renders into the desired image. Renderbuffer
    /// format changes always come with a change bit.
    fn is_attached(self, attached: AttachedImage) -> bool {
        match (self, attached) {
            (DesiredImage::None, AttachedImage::None)
            | (DesiredImage::Renderbuffer(_), AttachedImage::Renderbuffer { .. }) => true,
            (DesiredImage::Texture { target, id, level }, attached) => {
                attached == AttachedImage::Texture { target, id, level }
            }
            _ => false,
        }
    }
}

impl ResourceBinder {
    /// Resolves an attachment, updating the texture it renders into.
    fn desired_image(&mut self, attachment: Attachment) -> Result<DesiredImage, ResourceError> {
        let unit = self.bindings.active_unit().unwrap_or(0);
        Ok(match attachment {
            Attachment::Unbound => DesiredImage::None,
            Attachment::Renderbuffer(format) => DesiredImage::Renderbuffer(format),
            Attachment::Texture { texture, mip_level } => DesiredImage::Texture {
                target: TexImageTarget::Texture2D,
                id: self.update_texture(&texture, unit)?,
                level: mip_level,
            },
            Attachment::CubeMapFace {
                texture,
                face,
                mip_level,
            } => DesiredImage::Texture {
                target: TexImageTarget::CubeFace(face),
                id: self.update_texture(&texture, unit)?,
                level: mip_level,
            },
        })
    }

    /// Brings the framebuffer object of `framebuffer` up to date. Leaves it
    /// bound.
    pub(crate) fn update_framebuffer(&mut self, framebuffer: &Arc<FramebufferObject>) -> Result<GLuint, ResourceError> {
        profiling::scope!("ResourceBinder::update_framebuffer");
        let mut desired = [DesiredImage::None; 3];
        for point in AttachmentPoint::ALL {
            desired[point as usize] = self.desired_image(framebuffer.attachment(point))?;
        }

        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let gm = &*self.gm;
        let bindings = &mut self.bindings;
        let resource = self.resources.framebuffers.get_or_insert_with(framebuffer.id(), framebuffer, || {
            FramebufferResource::new(ResourceLink::observe(
                &**framebuffer,
                ResourceKind::FramebufferObject,
                releases,
            ))
        });
        let label = || format_sso!("{}", framebuffer.label());

        let bits = resource.link.take_dirty();
        let attachments_match = AttachmentPoint::ALL
            .into_iter()
            .all(|point| desired[point as usize].is_attached(resource.attached[point as usize]));
        if bits == 0 && resource.gl_id != 0 && attachments_match {
            bindings.bind_framebuffer(gm, resource.gl_id);
            return match resource.status {
                FramebufferStatus::Complete => Ok(resource.gl_id),
                status => Err(ResourceError::FramebufferIncomplete { label: label(), status }),
            };
        }

        if resource.gl_id == 0 {
            resource.gl_id = gm.gen_framebuffer();
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: ResourceKind::FramebufferObject,
                    label: label(),
                });
            }
            log::trace!("Created framebuffer {} for {:?}", resource.gl_id, framebuffer.id());
        }
        bindings.bind_framebuffer(gm, resource.gl_id);

        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Framebuffer, resource.gl_id, &framebuffer.label());
        }

        let resized = is_set(bits, RESOURCE_CHANGED) || is_set(bits, FramebufferObject::DIMENSIONS_CHANGED);
        let (width, height) = (framebuffer.width(), framebuffer.height());
        for point in AttachmentPoint::ALL {
            let index = point as usize;
            let current = resource.attached[index];
            let changed = is_set(bits, FramebufferObject::change_bit(point));
            match desired[index] {
                DesiredImage::None => {
                    match current {
                        AttachedImage::None => {}
                        AttachedImage::Renderbuffer { id, .. } => {
                            gm.framebuffer_renderbuffer(point, 0);
                            bindings.unbind_renderbuffer(gm, id);
                            gm.delete_renderbuffer(id);
                        }
                        AttachedImage::Texture { target, .. } => gm.framebuffer_texture_2d(point, target, 0, 0),
                    }
                    resource.attached[index] = AttachedImage::None;
                }
                DesiredImage::Renderbuffer(format) => {
                    let existing = match current {
                        AttachedImage::Renderbuffer { id, format: old } => Some((id, old)),
                        _ => None,
                    };
                    if existing.is_some() && !resized && !changed && existing.map(|(_, old)| old) == Some(format) {
                        continue;
                    }
                    let id = match existing {
                        Some((id, _)) => id,
                        None => gm.gen_renderbuffer(),
                    };
                    if id == 0 {
                        resource.link.restore_dirty(bits);
                        return Err(ResourceError::CreationFailed {
                            kind: ResourceKind::FramebufferObject,
                            label: format_sso!("{} {:?} renderbuffer", framebuffer.label(), point),
                        });
                    }
                    bindings.bind_renderbuffer(gm, id);
                    gm.renderbuffer_storage(format, width, height);
                    gm.framebuffer_renderbuffer(point, id);
                    resource.attached[index] = AttachedImage::Renderbuffer { id, format };
                }
                DesiredImage::Texture { target, id, level } => {
                    if let AttachedImage::Renderbuffer { id: old, .. } = current {
                        bindings.unbind_renderbuffer(gm, old);
                        gm.delete_renderbuffer(old);
                    }
                    let attached = AttachedImage::Texture { target, id, level };
                    if current != attached || changed {
                        gm.framebuffer_texture_2d(point, target, id, level);
                        resource.attached[index] = attached;
                    }
                }
            }
        }

        resource.memory = resource
            .attached
            .iter()
            .map(|attached| match attached {
                AttachedImage::Renderbuffer { format, .. } => {
                    format.bytes_per_pixel() * width as usize * height as usize
                }
                _ => 0,
            })
            .sum();

        resource.status = gm.check_framebuffer_status();
        match resource.status {
            FramebufferStatus::Complete => Ok(resource.gl_id),
            status => Err(ResourceError::FramebufferIncomplete { label: label(), status }),
        }
    }
}
