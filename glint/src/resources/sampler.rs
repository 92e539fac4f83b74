use std::sync::Arc;

use glint_types::{Holder, Sampler, SamplerParameter, SamplerParameters, LABEL_CHANGED};

use crate::{
    binder::{bindings::BindingShadow, ResourceBinder},
    error::ResourceError,
    format_sso,
    gl::{Feature, GLuint, GraphicsManager, ObjectKind},
    resources::{is_set, Resource, ResourceKind, ResourceLink},
};

/// A driver sampler object.
#[derive(Debug)]
pub(crate) struct SamplerResource {
    link: Arc<ResourceLink>,
    gl_id: GLuint,
    /// Parameters the sampler object currently holds.
    parameters: Option<SamplerParameters>,
}

impl SamplerResource {
    fn new(link: Arc<ResourceLink>) -> Self {
        Self {
            link,
            gl_id: 0,
            parameters: None,
        }
    }
}

impl Resource for SamplerResource {
    fn link(&self) -> &Arc<ResourceLink> {
        &self.link
    }

    fn gl_id(&self) -> GLuint {
        self.gl_id
    }

    fn destroy(self, gm: &dyn GraphicsManager, bindings: &mut BindingShadow) {
        if self.gl_id != 0 {
            bindings.unbind_sampler(gm, self.gl_id);
            gm.delete_sampler(self.gl_id);
        }
    }
}

/// Parameters of `parameters` that differ from `previous`, leaving out
/// anisotropy when the driver cannot filter anisotropically.
pub(crate) fn supported_changes(
    parameters: &SamplerParameters,
    previous: Option<&SamplerParameters>,
    anisotropy: bool,
) -> impl Iterator<Item = SamplerParameter> {
    parameters
        .changes_from(previous)
        .into_iter()
        .filter(move |parameter| anisotropy || !matches!(parameter, SamplerParameter::MaxAnisotropy(_)))
}

impl ResourceBinder {
    /// Brings the sampler object of `sampler` up to date. Only valid when
    /// the driver has sampler objects.
    pub(crate) fn update_sampler(&mut self, sampler: &Arc<Sampler>) -> Result<GLuint, ResourceError> {
        let releases = self.releases();
        let labels = self.has_feature(Feature::DebugLabel);
        let anisotropy = self.has_feature(Feature::TextureFilterAnisotropic);
        let gm = &*self.gm;
        let resource = self.resources.samplers.get_or_insert_with(sampler.id(), sampler, || {
            SamplerResource::new(ResourceLink::observe(&**sampler, ResourceKind::Sampler, releases))
        });

        let bits = resource.link.take_dirty();
        if bits == 0 && resource.gl_id != 0 {
            return Ok(resource.gl_id);
        }

        if resource.gl_id == 0 {
            resource.gl_id = gm.gen_sampler();
            if resource.gl_id == 0 {
                resource.link.restore_dirty(bits);
                return Err(ResourceError::CreationFailed {
                    kind: ResourceKind::Sampler,
                    label: format_sso!("{}", sampler.label()),
                });
            }
            log::trace!("Created sampler {} for {:?}", resource.gl_id, sampler.id());
        }

        if labels && is_set(bits, LABEL_CHANGED) {
            gm.object_label(ObjectKind::Sampler, resource.gl_id, &sampler.label());
        }

        let parameters = sampler.parameters();
        for parameter in supported_changes(&parameters, resource.parameters.as_ref(), anisotropy) {
            gm.sampler_parameter(resource.gl_id, parameter);
        }
        resource.parameters = Some(parameters);

        Ok(resource.gl_id)
    }
}
