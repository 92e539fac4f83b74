use glint_types::{BufferTarget, TextureTarget};

use crate::gl::{GLuint, GraphicsManager};

/// What is bound on one image unit. `None` means unknown.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct UnitBindings {
    texture_2d: Option<GLuint>,
    cube_map: Option<GLuint>,
    sampler: Option<GLuint>,
}

impl UnitBindings {
    const FRESH: Self = Self {
        texture_2d: Some(0),
        cube_map: Some(0),
        sampler: Some(0),
    };

    fn texture(&mut self, target: TextureTarget) -> &mut Option<GLuint> {
        match target {
            TextureTarget::Texture2D => &mut self.texture_2d,
            TextureTarget::CubeMap => &mut self.cube_map,
        }
    }
}

/// Shadow of the objects bound on one context.
///
/// Every bind the renderer issues goes through here, so whenever a binding
/// is known it matches the driver. `None` entries are unknown and the next
/// bind to them is always sent.
#[derive(Debug)]
pub(crate) struct BindingShadow {
    default_framebuffer: GLuint,
    buffers: [Option<GLuint>; 4],
    framebuffer: Option<GLuint>,
    renderbuffer: Option<GLuint>,
    program: Option<GLuint>,
    vertex_array: Option<GLuint>,
    active_unit: Option<u32>,
    units: Vec<UnitBindings>,
}

impl BindingShadow {
    /// The bindings of a context nothing has been done with yet.
    pub fn new(unit_count: u32, framebuffer: GLuint) -> Self {
        Self {
            default_framebuffer: framebuffer,
            buffers: [Some(0); 4],
            framebuffer: Some(framebuffer),
            renderbuffer: Some(0),
            program: Some(0),
            vertex_array: Some(0),
            active_unit: Some(0),
            units: vec![UnitBindings::FRESH; unit_count as usize],
        }
    }

    /// Forgets everything, after somebody else issued driver calls.
    pub fn invalidate(&mut self) {
        self.buffers = [None; 4];
        self.framebuffer = None;
        self.renderbuffer = None;
        self.program = None;
        self.vertex_array = None;
        self.active_unit = None;
        self.units.fill(UnitBindings::default());
    }

    pub fn bind_buffer(&mut self, gm: &dyn GraphicsManager, target: BufferTarget, id: GLuint) {
        let slot = &mut self.buffers[target.index()];
        if *slot != Some(id) {
            gm.bind_buffer(target, id);
            *slot = Some(id);
        }
    }

    /// Forgets the element buffer binding, which belongs to the vertex array
    /// that was bound when it was made.
    pub fn forget_element_buffer(&mut self) {
        self.buffers[BufferTarget::ElementArray.index()] = None;
    }

    pub fn bind_vertex_array(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.vertex_array != Some(id) {
            gm.bind_vertex_array(id);
            self.vertex_array = Some(id);
            self.forget_element_buffer();
        }
    }

    pub fn use_program(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.program != Some(id) {
            gm.use_program(id);
            self.program = Some(id);
        }
    }

    /// The framebuffer that was bound when the context was first used.
    pub fn default_framebuffer(&self) -> GLuint {
        self.default_framebuffer
    }

    pub fn bind_framebuffer(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.framebuffer != Some(id) {
            gm.bind_framebuffer(id);
            self.framebuffer = Some(id);
        }
    }

    pub fn bind_renderbuffer(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.renderbuffer != Some(id) {
            gm.bind_renderbuffer(id);
            self.renderbuffer = Some(id);
        }
    }

    pub fn active_unit(&self) -> Option<u32> {
        self.active_unit
    }

    pub fn activate_unit(&mut self, gm: &dyn GraphicsManager, unit: u32) {
        if self.active_unit != Some(unit) {
            gm.active_texture(unit);
            self.active_unit = Some(unit);
        }
    }

    fn unit_mut(&mut self, unit: u32) -> &mut UnitBindings {
        let index = unit as usize;
        if self.units.len() <= index {
            self.units.resize(index + 1, UnitBindings::default());
        }
        &mut self.units[index]
    }

    pub fn bound_texture(&self, unit: u32, target: TextureTarget) -> Option<GLuint> {
        let mut bindings = self.units.get(unit as usize).copied()?;
        *bindings.texture(target)
    }

    pub fn bind_texture(&mut self, gm: &dyn GraphicsManager, unit: u32, target: TextureTarget, id: GLuint) {
        if *self.unit_mut(unit).texture(target) != Some(id) {
            self.activate_unit(gm, unit);
            gm.bind_texture(target, id);
            *self.unit_mut(unit).texture(target) = Some(id);
        }
    }

    pub fn bound_sampler(&self, unit: u32) -> Option<GLuint> {
        self.units.get(unit as usize).and_then(|bindings| bindings.sampler)
    }

    pub fn bind_sampler(&mut self, gm: &dyn GraphicsManager, unit: u32, id: GLuint) {
        let slot = &mut self.unit_mut(unit).sampler;
        if *slot != Some(id) {
            gm.bind_sampler(unit, id);
            *slot = Some(id);
        }
    }

    /// Unbinds a buffer that is about to be deleted.
    pub fn unbind_buffer(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        for target in BufferTarget::ALL {
            if self.buffers[target.index()] == Some(id) {
                self.bind_buffer(gm, target, 0);
            }
        }
    }

    pub fn unbind_vertex_array(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.vertex_array == Some(id) {
            self.bind_vertex_array(gm, 0);
        }
    }

    pub fn unbind_program(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.program == Some(id) {
            self.use_program(gm, 0);
        }
    }

    /// Unbinds a framebuffer that is about to be deleted, going back to the
    /// default one.
    pub fn unbind_framebuffer(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.framebuffer == Some(id) {
            self.bind_framebuffer(gm, self.default_framebuffer);
        }
    }

    pub fn unbind_renderbuffer(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        if self.renderbuffer == Some(id) {
            self.bind_renderbuffer(gm, 0);
        }
    }

    pub fn unbind_texture(&mut self, gm: &dyn GraphicsManager, target: TextureTarget, id: GLuint) {
        for unit in 0..self.units.len() as u32 {
            if self.bound_texture(unit, target) == Some(id) {
                self.bind_texture(gm, unit, target, 0);
            }
        }
    }

    pub fn unbind_sampler(&mut self, gm: &dyn GraphicsManager, id: GLuint) {
        for unit in 0..self.units.len() as u32 {
            if self.bound_sampler(unit) == Some(id) {
                self.bind_sampler(gm, unit, 0);
            }
        }
    }

    /// Units that currently have anything but 0 bound, as far as known.
    pub fn units_in_use(&self) -> impl Iterator<Item = u32> + '_ {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, bindings)| **bindings != UnitBindings::FRESH)
            .map(|(unit, _)| unit as u32)
    }
}
