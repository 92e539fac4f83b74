use std::sync::Arc;

use glam::UVec2;
use glint_types::{
    CubeMapTexture, Holder, HolderId, Image, Sampler, SamplerParameters, TexImageTarget, Texture,
    TextureHolder, TextureTarget, WrapMode, LABEL_CHANGED, RESOURCE_CHANGED,
};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, GLuint, GraphicsManager, ObjectKind, TextureParameter},
    image_units::UnitKey,
    resources::{is_set, sampler::supported_changes, Resource, ResourceKind, ResourceLink, ResourceTable},
    util::registry::HolderRegistry,
};

const DEFAULT_BASE_LEVEL: i32 = 0;
const DEFAULT_MAX_LEVEL: i32 = 1000;

/// Texture holders that are mirrored by a [`TextureResource`].
pub(crate) trait TextureResourceHolder: TextureHolder + Sized {
    const KIND: ResourceKind;
    const IMAGE_BIT: u32;

    fn registry(table: &mut ResourceTable) -> &mut HolderRegistry<TextureResource, Self>;
}

impl TextureResourceHolder for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;
    const IMAGE_BIT: u32 = Texture::IMAGE_CHANGED;

    fn registry(table: &mut ResourceTable) -> &mut HolderRegistry<TextureResource, Self> {
        &mut table.textures
    }
}

impl TextureResourceHolder for CubeMapTexture {
    const KIND: ResourceKind = ResourceKind::CubeMapTexture;
    const IMAGE_BIT: u32 = CubeMapTexture::IMAGE_CHANGED;

    fn registry(table: &mut ResourceTable) -> &mut HolderRegistry<TextureResource, Self> {
        &mut table.cube_maps
    }
}

/// A driver texture object, 2D or cubemap.
#[derive(Debug)]
pub(crate) struct TextureResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    target: TextureTarget,
    next_sub_image: u64,
    base_level: i32,
    max_level: i32,
    mipmaps_generated: bool,
    /// Sampler parameters last applied to the texture itself, when the
    /// driver has no sampler objects.
    parameters: SamplerParameters,
    size: Option<UVec2>,
    memory: usize,
}

impl TextureResource {
    fn new(link: Arc<ResourceLink>, target: TextureTarget) -> Self {
        Self {
            link,
            gl_id: 0,
            target,
            next_sub_image: 0,
            base_level: DEFAULT_BASE_LEVEL,
            max_level: DEFAULT_MAX_LEVEL,
            mipmaps_generated: false,
            parameters: SamplerParameters::default(),
            size: None,
            memory: 0,
        }
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn size(&self) -> Option<UVec2> {
        self.size
    }
}

impl Resource for TextureResource {
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
        if self.gl_id != 0 {
            bindings.unbind_texture(gm, self.target, self.gl_id);
            gm.delete_texture(self.gl_id);
        }
    }
}

fn upload_image(
    gm: &dyn GraphicsManager,
    target: TexImageTarget,
    level: usize,
    image: &Image,
    uploader: u64,
    interested: usize,
) {
    let data = image.data();
    {
        let bytes = data.and_then(|data| data.data());
        gm.tex_image_2d(
            target,
            level,
            image.format(),
            image.width(),
            image.height(),
            bytes.as_deref(),
        );
    }
    if let Some(data) = data {
        data.mark_uploaded(uploader, interested);
    }
}

/// Why a texture cannot be sampled as configured, if it cannot.
fn incompleteness<T: TextureHolder>(texture: &T, sampler: Option<&Sampler>, npot: bool) -> Option<&'static str> {
    if !texture.has_level_zero() {
        return Some("no level 0 image");
    }
    if npot {
        return None;
    }
    let size = texture.level_zero_size()?;
    if size.x.is_power_of_two() && size.y.is_power_of_two() {
        return None;
    }
    let parameters = sampler.map(Sampler::parameters).unwrap_or_default();
    let repeats = [parameters.wrap_s, parameters.wrap_t]
        .into_iter()
        .any(|mode| mode != WrapMode::ClampToEdge);
    if repeats || parameters.min_filter.uses_mipmaps() {
        return Some("non-power-of-two size with mipmapping or repeat wrapping is unsupported by the driver");
    }
    None
}

impl ResourceBinder {
    /// Brings the texture object of `texture` up to date, binding it to
    /// `unit` to do so.
    pub(crate) fn update_texture<T: TextureResourceHolder>(
        &mut self,
        texture: &Arc<T>,
        unit: u32,
    ) -> Result<GLuint, ResourceError> {
        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let npot = self.has_feature(Feature::NpotTextures);
        let gm = &*self.gm;
        let bindings = &mut self.bindings;
        let resource = T::registry(&mut self.resources).get_or_insert_with(texture.id(), texture, || {
            TextureResource::new(ResourceLink::observe(&**texture, T::KIND, releases), texture.target())
        });

        let bits = resource.link.take_dirty();
        if bits == 0 && resource.gl_id != 0 {
            return Ok(resource.gl_id);
        }

        let label = || format_sso!("{}", texture.label());
        let sampler = texture.sampler();
        if let Some(reason) = incompleteness(&**texture, sampler.as_deref(), npot) {
            resource.link.restore_dirty(bits);
            return Err(ResourceError::Incomplete {
                kind: T::KIND,
                label: label(),
                reason,
            });
        }

        if resource.gl_id == 0 {
            resource.gl_id = gm.gen_texture();
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: T::KIND,
                    label: label(),
                });
            }
            log::trace!("Created {:?} {} for {:?}", T::KIND, resource.gl_id, texture.id());
        }
        bindings.bind_texture(gm, unit, resource.target, resource.gl_id);

        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Texture, resource.gl_id, &texture.label());
        }

        let wants_mipmaps = sampler
            .as_ref()
            .map_or(false, |sampler| sampler.parameters().min_filter.uses_mipmaps());
        if is_set(bits, RESOURCE_CHANGED) || is_set(bits, T::IMAGE_BIT) {
            profiling::scope!("upload texture images");
            let mut memory = 0;
            for (target, level, image) in texture.images() {
                upload_image(gm, target, level, &image, resource.link.id(), texture.observer_count());
                memory += image.data_size();
            }
            resource.mipmaps_generated = false;
            resource.size = texture.level_zero_size();
            resource.memory = memory;
        }
        if wants_mipmaps && !resource.mipmaps_generated && !texture.has_explicit_mipmaps() {
            gm.generate_mipmap(resource.target);
            resource.mipmaps_generated = true;
            // A full chain adds a third of the base level.
            resource.memory += resource.memory / 3;
        }

        let (sub_images, next) = texture.sub_images_since(resource.next_sub_image);
        for sub_image in sub_images {
            let image = &sub_image.image;
            if let Some(bytes) = image.data().and_then(|data| data.data()) {
                gm.tex_sub_image_2d(
                    sub_image.target,
                    sub_image.level,
                    sub_image.offset.x,
                    sub_image.offset.y,
                    image.width(),
                    image.height(),
                    image.format(),
                    &bytes,
                );
            }
        }
        resource.next_sub_image = next;

        let (base_level, max_level) = (texture.base_level(), texture.max_level());
        if base_level != resource.base_level {
            gm.tex_parameter(resource.target, TextureParameter::BaseLevel(base_level));
            resource.base_level = base_level;
        }
        if max_level != resource.max_level {
            gm.tex_parameter(resource.target, TextureParameter::MaxLevel(max_level));
            resource.max_level = max_level;
        }

        Ok(resource.gl_id)
    }

    /// Assigns an image unit to `texture` and its sampler, brings both up to
    /// date, and binds them to that unit. Returns the unit, or `None` if the
    /// texture cannot be sampled.
    pub(crate) fn bind_texture_unit<T: TextureResourceHolder>(&mut self, texture: &Arc<T>) -> Option<u32> {
        let Some(sampler) = texture.sampler() else {
            self.warn_once(format_sso!("no-sampler-{}", texture.id().get()), || {
                format!("{:?} \"{}\" has no sampler and cannot be bound", T::KIND, texture.label())
            });
            return None;
        };

        let key = UnitKey {
            texture: texture.id(),
            sampler: Some(sampler.id()),
        };
        let Some(assignment) = self.image_units.assign(key) else {
            self.warn_once("no-image-units".into(), || {
                String::from("No image units are available, textures cannot be bound")
            });
            return None;
        };
        if let Some(evicted) = assignment.evicted {
            log::trace!("Image unit {} evicted {:?} for {:?}", assignment.unit, evicted, key);
        }
        let unit = assignment.unit;

        let gl_id = match self.update_texture(texture, unit) {
            Ok(gl_id) => gl_id,
            Err(error) => {
                self.report(error);
                return None;
            }
        };
        let gm = Arc::clone(&self.gm);
        self.bindings.bind_texture(&*gm, unit, texture.target(), gl_id);

        if self.has_feature(Feature::SamplerObjects) {
            match self.update_sampler(&sampler) {
                Ok(sampler_id) => self.bindings.bind_sampler(&*gm, unit, sampler_id),
                Err(error) => {
                    self.report(error);
                    return None;
                }
            }
        } else {
            self.apply_texture_parameters::<T>(texture.id(), &sampler);
        }
        Some(unit)
    }

    /// Sends the parameters of `sampler` that differ from what the texture
    /// was last given. The texture must be bound.
    fn apply_texture_parameters<T: TextureResourceHolder>(&mut self, texture: HolderId, sampler: &Sampler) {
        let anisotropy = self.has_feature(Feature::TextureFilterAnisotropic);
        let gm = &*self.gm;
        let Some(resource) = T::registry(&mut self.resources).get_mut(texture) else {
            return;
        };
        let parameters = sampler.parameters();
        for parameter in supported_changes(&parameters, Some(&resource.parameters), anisotropy) {
            gm.tex_parameter(resource.target, TextureParameter::Sampler(parameter));
        }
        resource.parameters = parameters;
    }
}
