//! Queued queries of what the driver holds for each holder.
//!
//! Requests are collected on any thread and answered on the drawing thread
//! the next time the renderer processes them, since only that thread may
//! talk to the context.

use std::sync::{Arc, Weak};

use glint_types::{
    AttachmentPoint, AttributeArray, BufferObject, BufferTarget, BufferUsage, CubeMapTexture, FramebufferObject,
    Holder, ImageFormat, Sampler, SamplerParameters, Shader, ShaderProgram, ShaderStage, Texture,
    TextureTarget, UniformType,
};
use parking_lot::Mutex;

use crate::{
    binder::ResourceBinder,
    error::ResourceError,
    gl::{ActiveInput, Constant, Feature, FramebufferStatus, GLuint, GraphicsManager, StringName},
    image_units::UnitKey,
    resources::{Resource, ResourceKind, TextureResource, TextureResourceHolder},
    util::registry::HolderRegistry,
};

/// What every info struct reports about its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub kind: ResourceKind,
    /// Driver name, 0 if the driver does not recognise it.
    pub id: GLuint,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    pub resource: ResourceInfo,
    pub target: BufferTarget,
    pub size: usize,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub resource: ResourceInfo,
    pub target: TextureTarget,
    /// Image unit the texture is assigned to with its sampler.
    pub unit: Option<u32>,
    /// Sampler object bound with the texture, 0 without sampler objects.
    pub sampler: GLuint,
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerInfo {
    pub resource: ResourceInfo,
    pub parameters: SamplerParameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInfo {
    pub resource: ResourceInfo,
    pub stage: ShaderStage,
    pub compiled: bool,
    pub info_log: String,
}

/// A uniform of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramUniformInfo {
    pub name: String,
    pub value_type: UniformType,
    pub location: i32,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub resource: ResourceInfo,
    pub shaders: Vec<GLuint>,
    pub linked: bool,
    pub info_log: String,
    pub attributes: Vec<ActiveInput>,
    pub uniforms: Vec<ProgramUniformInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInfo {
    pub resource: ResourceInfo,
    pub vertex_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub resource: ResourceInfo,
    pub color: GLuint,
    pub depth: GLuint,
    pub stencil: GLuint,
    pub status: FramebufferStatus,
}

impl FramebufferInfo {
    pub fn is_complete(&self) -> bool {
        self.status == FramebufferStatus::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub extensions: Vec<String>,
    pub limits: Vec<(Constant, i32)>,
    pub features: Vec<Feature>,
}

impl PlatformInfo {
    fn query(gm: &dyn GraphicsManager) -> Self {
        Self {
            vendor: gm.get_string(StringName::Vendor),
            renderer: gm.get_string(StringName::Renderer),
            version: gm.get_string(StringName::Version),
            extensions: gm
                .get_string(StringName::Extensions)
                .split_whitespace()
                .map(String::from)
                .collect(),
            limits: Constant::ALL
                .into_iter()
                .map(|constant| (constant, gm.get_constant(constant)))
                .collect(),
            features: Feature::ALL
                .into_iter()
                .filter(|&feature| gm.is_feature_available(feature))
                .collect(),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Holders the renderer keeps per-context resources for.
///
/// Implemented for every holder kind in `glint-types`; the methods are the
/// glue the [`Renderer`](crate::Renderer) and [`ResourceManager`] go
/// through and are not meant to be called directly.
pub trait ResourceHolder: Holder + sealed::Sealed {
    const KIND: ResourceKind;
    type Info: Send + 'static;

    #[doc(hidden)]
    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError>;

    /// Info about the resource of `holder`, `None` if the binder has none.
    #[doc(hidden)]
    fn info(holder: &Self, binder: &ResourceBinder) -> Option<Self::Info>;

    /// Every live holder with a resource in `binder`.
    #[doc(hidden)]
    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>>;
}

fn live_holders<T, H>(registry: &HolderRegistry<T, H>) -> Vec<Arc<H>> {
    registry.keys().filter_map(|&key| registry.holder(key)).collect()
}

/// `id` if the driver still knows it, else 0.
fn checked(id: GLuint, exists: impl FnOnce(GLuint) -> bool) -> GLuint {
    match id != 0 && exists(id) {
        true => id,
        false => 0,
    }
}

fn resource_info<H: Holder>(kind: ResourceKind, holder: &H, id: GLuint) -> ResourceInfo {
    ResourceInfo {
        kind,
        id,
        label: holder.label(),
    }
}

impl sealed::Sealed for BufferObject {}
impl ResourceHolder for BufferObject {
    const KIND: ResourceKind = ResourceKind::BufferObject;
    type Info = BufferInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        binder.update_buffer(holder).map(drop)
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<BufferInfo> {
        let resource = binder.resources.buffers.get(holder.id())?;
        let id = checked(resource.gl_id(), |id| binder.gm.is_buffer(id));
        Some(BufferInfo {
            resource: resource_info(Self::KIND, holder, id),
            target: resource.target(),
            size: resource.size(),
            usage: resource.usage(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.buffers)
    }
}

fn texture_info<T: TextureResourceHolder>(holder: &T, resource: &TextureResource, binder: &ResourceBinder) -> TextureInfo {
    let sampler = holder.sampler();
    let unit = binder.image_units.unit_of(UnitKey {
        texture: holder.id(),
        sampler: sampler.as_ref().map(|sampler| sampler.id()),
    });
    let sampler_id = sampler.map_or(0, |sampler| {
        checked(binder.gl_id(ResourceKind::Sampler, sampler.id()), |id| {
            binder.gm.is_sampler(id)
        })
    });
    let size = resource.size().unwrap_or_default();
    TextureInfo {
        resource: resource_info(
            T::KIND,
            holder,
            checked(resource.gl_id(), |id| binder.gm.is_texture(id)),
        ),
        target: resource.target(),
        unit,
        sampler: sampler_id,
        width: size.x,
        height: size.y,
        format: holder
            .images()
            .into_iter()
            .find(|(_, level, _)| *level == 0)
            .map(|(_, _, image)| image.format()),
    }
}

impl sealed::Sealed for Texture {}
impl ResourceHolder for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;
    type Info = TextureInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        binder.bind_texture_unit(holder);
        Ok(())
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<TextureInfo> {
        let resource = binder.resources.textures.get(holder.id())?;
        Some(texture_info(holder, resource, binder))
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.textures)
    }
}

impl sealed::Sealed for CubeMapTexture {}
impl ResourceHolder for CubeMapTexture {
    const KIND: ResourceKind = ResourceKind::CubeMapTexture;
    type Info = TextureInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        binder.bind_texture_unit(holder);
        Ok(())
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<TextureInfo> {
        let resource = binder.resources.cube_maps.get(holder.id())?;
        Some(texture_info(holder, resource, binder))
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.cube_maps)
    }
}

impl sealed::Sealed for Sampler {}
impl ResourceHolder for Sampler {
    const KIND: ResourceKind = ResourceKind::Sampler;
    type Info = SamplerInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        if binder.has_feature(Feature::SamplerObjects) {
            binder.update_sampler(holder)?;
        }
        Ok(())
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<SamplerInfo> {
        let resource = binder.resources.samplers.get(holder.id())?;
        Some(SamplerInfo {
            resource: resource_info(
                Self::KIND,
                holder,
                checked(resource.gl_id(), |id| binder.gm.is_sampler(id)),
            ),
            parameters: holder.parameters(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.samplers)
    }
}

impl sealed::Sealed for Shader {}
impl ResourceHolder for Shader {
    const KIND: ResourceKind = ResourceKind::Shader;
    type Info = ShaderInfo;

    /// Shaders only learn their stage from a program, so only shaders that
    /// were already used by one are updated.
    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        match binder.resources.shaders.get(holder.id()).map(|resource| resource.stage()) {
            Some(stage) => binder.update_shader(holder, stage).map(drop),
            None => Ok(()),
        }
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<ShaderInfo> {
        let resource = binder.resources.shaders.get(holder.id())?;
        Some(ShaderInfo {
            resource: resource_info(
                Self::KIND,
                holder,
                checked(resource.gl_id(), |id| binder.gm.is_shader(id)),
            ),
            stage: resource.stage(),
            compiled: resource.is_compiled(),
            info_log: resource.info_log().to_owned(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.shaders)
    }
}

impl sealed::Sealed for ShaderProgram {}
impl ResourceHolder for ShaderProgram {
    const KIND: ResourceKind = ResourceKind::ShaderProgram;
    type Info = ProgramInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        binder.update_program(holder).map(drop)
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<ProgramInfo> {
        let resource = binder.resources.programs.get(holder.id())?;
        Some(ProgramInfo {
            resource: resource_info(
                Self::KIND,
                holder,
                checked(resource.gl_id(), |id| binder.gm.is_program(id)),
            ),
            shaders: resource.shader_ids().collect(),
            linked: resource.is_linked(),
            info_log: resource.info_log().to_owned(),
            attributes: resource.attributes.clone(),
            uniforms: resource
                .uniforms
                .iter()
                .map(|uniform| ProgramUniformInfo {
                    name: uniform.name.to_string(),
                    value_type: uniform.value_type,
                    location: uniform.location,
                    size: uniform.size,
                })
                .collect(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.programs)
    }
}

impl sealed::Sealed for AttributeArray {}
impl ResourceHolder for AttributeArray {
    const KIND: ResourceKind = ResourceKind::AttributeArray;
    type Info = ArrayInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        binder.update_attribute_array(holder).map(drop)
    }

    /// Info about the vertex array of the binder's current thread key.
    fn info(holder: &Self, binder: &ResourceBinder) -> Option<ArrayInfo> {
        let resource = binder.resources.vertex_arrays.get((holder.id(), binder.thread_key))?;
        Some(ArrayInfo {
            resource: resource_info(
                Self::KIND,
                holder,
                checked(resource.gl_id(), |id| binder.gm.is_vertex_array(id)),
            ),
            vertex_count: resource.vertex_count(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        let registry = &binder.resources.vertex_arrays;
        registry
            .keys()
            .filter(|(_, thread)| *thread == binder.thread_key)
            .filter_map(|&key| registry.holder(key))
            .collect()
    }
}

impl sealed::Sealed for FramebufferObject {}
impl ResourceHolder for FramebufferObject {
    const KIND: ResourceKind = ResourceKind::FramebufferObject;
    type Info = FramebufferInfo;

    fn update(holder: &Arc<Self>, binder: &mut ResourceBinder) -> Result<(), ResourceError> {
        let result = binder.update_framebuffer(holder).map(drop);
        // Updating binds the framebuffer, put the render target back.
        binder.bind_current_framebuffer();
        result
    }

    fn info(holder: &Self, binder: &ResourceBinder) -> Option<FramebufferInfo> {
        let resource = binder.resources.framebuffers.get(holder.id())?;
        let attached = |point| resource.attached(point).gl_id();
        Some(FramebufferInfo {
            resource: resource_info(
                Self::KIND,
                holder,
                checked(resource.gl_id(), |id| binder.gm.is_framebuffer(id)),
            ),
            color: attached(AttachmentPoint::Color0),
            depth: attached(AttachmentPoint::Depth),
            stencil: attached(AttachmentPoint::Stencil),
            status: resource.status(),
        })
    }

    fn holders(binder: &ResourceBinder) -> Vec<Arc<Self>> {
        live_holders(&binder.resources.framebuffers)
    }
}

/// Runs a callback with infos gathered earlier, once the binder is unlocked.
pub(crate) type InfoAnswer = Box<dyn FnOnce() + Send>;

type InfoRequest = Box<dyn FnOnce(&ResourceBinder) -> InfoAnswer + Send>;

/// Collects info requests until a binder answers them.
#[derive(Default)]
pub struct ResourceManager {
    requests: Mutex<Vec<InfoRequest>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks for the info of the resource of `holder`. `callback` gets one
    /// entry, or none if the holder is gone or has no resource by then.
    pub fn request_resource_info<H, F>(&self, holder: &Arc<H>, callback: F)
    where
        H: ResourceHolder,
        F: FnOnce(Vec<H::Info>) + Send + 'static,
    {
        let holder: Weak<H> = Arc::downgrade(holder);
        self.push(Box::new(move |binder: &ResourceBinder| -> InfoAnswer {
            let infos = holder
                .upgrade()
                .and_then(|holder| H::info(&holder, binder))
                .into_iter()
                .collect();
            Box::new(move || callback(infos))
        }));
    }

    /// Asks for the info of every resource of kind `H`.
    pub fn request_all_resource_infos<H, F>(&self, callback: F)
    where
        H: ResourceHolder,
        F: FnOnce(Vec<H::Info>) + Send + 'static,
    {
        self.push(Box::new(move |binder: &ResourceBinder| -> InfoAnswer {
            let infos = H::holders(binder)
                .iter()
                .filter_map(|holder| H::info(holder, binder))
                .collect();
            Box::new(move || callback(infos))
        }));
    }

    /// Asks for the strings, limits and features of the driver.
    pub fn request_platform_info<F>(&self, callback: F)
    where
        F: FnOnce(PlatformInfo) + Send + 'static,
    {
        self.push(Box::new(move |binder: &ResourceBinder| -> InfoAnswer {
            let info = PlatformInfo::query(&*binder.gm);
            Box::new(move || callback(info))
        }));
    }

    fn push(&self, request: InfoRequest) {
        self.requests.lock().push(request);
    }

    pub fn pending_request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Gathers the infos of every queued request from `binder`. The
    /// returned answers run the callbacks and must be called after the
    /// binder is unlocked. Requests queued by the callbacks wait for the
    /// next call.
    pub(crate) fn gather_answers(&self, binder: &ResourceBinder) -> Vec<InfoAnswer> {
        profiling::scope!("ResourceManager::gather_answers");
        let requests = std::mem::take(&mut *self.requests.lock());
        requests.into_iter().map(|request| request(binder)).collect()
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("pending_requests", &self.pending_request_count())
            .finish()
    }
}
