use glint_types::{Capability, StateTable, StateValue};

use crate::gl::{GraphicsManager, StencilFace};

/// Shadow of the pipeline state of one context.
///
/// Capabilities are tri-state: until a capability has been sent once its
/// driver value is treated as unknown, so the first table that sets it
/// always reaches the driver.
#[derive(Debug, Clone)]
pub(crate) struct GlStateShadow {
    table: StateTable,
    capabilities: [Option<bool>; Capability::COUNT],
    known_values: [bool; StateValue::COUNT],
}

impl GlStateShadow {
    pub fn new() -> Self {
        let mut known_values = [true; StateValue::COUNT];
        // The size of the default framebuffer is not ours to know.
        known_values[StateValue::Viewport as usize] = false;
        known_values[StateValue::ScissorBox as usize] = false;
        Self {
            table: StateTable::new(),
            capabilities: [None; Capability::COUNT],
            known_values,
        }
    }

    /// Copy of the shadow. Everything the renderer sent is marked set.
    pub fn table(&self) -> &StateTable {
        &self.table
    }

    /// Forgets every capability and value.
    pub fn invalidate(&mut self) {
        self.capabilities = [None; Capability::COUNT];
        self.known_values = [false; StateValue::COUNT];
    }

    /// Sends every explicitly set entry of `source` that differs from the
    /// shadow, except the clear values which only matter to [`Self::clear`].
    pub fn update_from(&mut self, gm: &dyn GraphicsManager, source: &StateTable) {
        profiling::scope!("GlStateShadow::update_from");
        let enforce = source.are_settings_enforced();

        for capability in source.set_capabilities() {
            let enabled = source.is_enabled(capability);
            let shadow = &mut self.capabilities[capability.index()];
            if enforce || *shadow != Some(enabled) {
                match enabled {
                    true => gm.enable(capability),
                    false => gm.disable(capability),
                }
                *shadow = Some(enabled);
                self.table.enable(capability, enabled);
            }
        }

        for value in source.set_values() {
            if is_clear_value(value) {
                continue;
            }
            self.update_value(gm, source, value, enforce);
        }
    }

    fn update_value(&mut self, gm: &dyn GraphicsManager, source: &StateTable, value: StateValue, enforce: bool) {
        let known = self.known_values[value as usize];
        if !enforce && known && self.table.value_matches(source, value) {
            return;
        }
        send_value(gm, source, &self.table, value, enforce || !known);
        self.table.copy_value_from(source, value);
        self.known_values[value as usize] = true;
    }

    /// Clears the buffers whose clear values `source` sets, sending those
    /// values first where they differ from the shadow.
    pub fn clear(&mut self, gm: &dyn GraphicsManager, source: &StateTable) {
        let mask = source.clear_mask();
        if mask.is_empty() {
            return;
        }
        let enforce = source.are_settings_enforced();
        for value in [StateValue::ClearColor, StateValue::ClearDepth, StateValue::ClearStencil] {
            if source.is_value_set(value) {
                self.update_value(gm, source, value, enforce);
            }
        }
        gm.clear(mask);
    }

    #[cfg(test)]
    pub fn is_capability_enabled(&self, capability: Capability) -> Option<bool> {
        self.capabilities[capability.index()]
    }
}

impl Default for GlStateShadow {
    fn default() -> Self {
        Self::new()
    }
}

fn is_clear_value(value: StateValue) -> bool {
    matches!(
        value,
        StateValue::ClearColor | StateValue::ClearDepth | StateValue::ClearStencil
    )
}

/// Issues the call setting `value` to what `new` holds. Per-face stencil
/// state only sends the faces that differ from `old` unless `all_faces`.
fn send_value(gm: &dyn GraphicsManager, new: &StateTable, old: &StateTable, value: StateValue, all_faces: bool) {
    match value {
        StateValue::BlendColor => gm.blend_color(new.blend_color()),
        StateValue::BlendEquations => gm.blend_equation_separate(new.blend_equations()),
        StateValue::BlendFunctions => gm.blend_func_separate(new.blend_functions()),
        StateValue::ClearColor => gm.clear_color(new.clear_color()),
        StateValue::ClearDepth => gm.clear_depth(new.clear_depth()),
        StateValue::ClearStencil => gm.clear_stencil(new.clear_stencil()),
        StateValue::ColorWriteMasks => gm.color_mask(new.color_write_masks()),
        StateValue::CullFaceMode => gm.cull_face(new.cull_face_mode()),
        StateValue::FrontFaceMode => gm.front_face(new.front_face_mode()),
        StateValue::DepthFunction => gm.depth_func(new.depth_function()),
        StateValue::DepthRange => gm.depth_range(new.depth_range()),
        StateValue::DepthWriteMask => gm.depth_mask(new.depth_write_mask()),
        StateValue::GenerateMipmapHint => gm.hint_generate_mipmap(new.generate_mipmap_hint()),
        StateValue::LineWidth => gm.line_width(new.line_width()),
        StateValue::MinSampleShading => gm.min_sample_shading(new.min_sample_shading()),
        StateValue::PolygonOffset => gm.polygon_offset(new.polygon_offset()),
        StateValue::SampleCoverage => gm.sample_coverage(new.sample_coverage()),
        StateValue::ScissorBox => gm.scissor(new.scissor_box()),
        StateValue::StencilFunctions => {
            let (new, old) = (new.stencil_functions(), old.stencil_functions());
            if all_faces || new.front != old.front {
                gm.stencil_func_separate(StencilFace::Front, new.front);
            }
            if all_faces || new.back != old.back {
                gm.stencil_func_separate(StencilFace::Back, new.back);
            }
        }
        StateValue::StencilOperations => {
            let (new, old) = (new.stencil_operations(), old.stencil_operations());
            if all_faces || new.front != old.front {
                gm.stencil_op_separate(StencilFace::Front, new.front);
            }
            if all_faces || new.back != old.back {
                gm.stencil_op_separate(StencilFace::Back, new.back);
            }
        }
        StateValue::StencilWriteMasks => {
            let (new, old) = (new.stencil_write_masks(), old.stencil_write_masks());
            if all_faces || new.front != old.front {
                gm.stencil_mask_separate(StencilFace::Front, new.front);
            }
            if all_faces || new.back != old.back {
                gm.stencil_mask_separate(StencilFace::Back, new.back);
            }
        }
        StateValue::Viewport => gm.viewport(new.viewport()),
    }
}

#[cfg(test)]
mod tests {
    use glint_types::Rect;

    use super::*;

    #[test]
    fn capabilities_start_unknown() {
        let shadow = GlStateShadow::new();
        assert_eq!(shadow.is_capability_enabled(Capability::Blend), None);
        assert_eq!(shadow.is_capability_enabled(Capability::Dither), None);
    }

    #[test]
    fn viewport_is_unknown_until_sent() {
        let shadow = GlStateShadow::new();
        assert!(!shadow.known_values[StateValue::Viewport as usize]);
        assert!(shadow.known_values[StateValue::DepthFunction as usize]);

        let mut table = StateTable::new();
        table.set_viewport(Rect::new(0, 0, 0, 0));
        // Matches the shadow's default, but still has to be sent once.
        assert!(shadow.table().value_matches(&table, StateValue::Viewport));
    }
}
