use std::sync::Arc;

use glint_types::{Holder, HolderId, ShaderProgram, Uniform, UniformValue};
use smallvec::{smallvec, SmallVec};

use crate::{
    binder::ResourceBinder,
    format_sso,
    gl::GraphicsManager,
    util::typedefs::FastHashMap,
    ThreadKey,
};

type StackKey = (HolderId, usize);

/// The uniform values in effect at the current point of a walk.
///
/// Every registry slot has its own stack; the top of a stack is the value
/// the nearest ancestor (or the node itself) supplied.
#[derive(Debug, Default)]
pub(crate) struct UniformStacks {
    stacks: FastHashMap<StackKey, SmallVec<[Uniform; 4]>>,
    pushed: Vec<StackKey>,
}

impl UniformStacks {
    /// Empties every stack and pushes the bottom-of-stack values.
    pub fn reset(&mut self, initial: &[Uniform]) {
        self.stacks.clear();
        self.pushed.clear();
        for uniform in initial {
            self.push(uniform);
        }
        // Initial values are never popped.
        self.pushed.clear();
    }

    pub fn mark(&self) -> usize {
        self.pushed.len()
    }

    /// Pushes `uniform`, combined with the value it shadows if its spec has
    /// a combine function, followed by whatever its generate function
    /// derives from the result.
    pub fn push(&mut self, uniform: &Uniform) {
        let value = self.push_single(uniform);
        let generate = uniform.spec().and_then(|spec| spec.generate.clone());
        if let Some(generate) = generate {
            for generated in generate(&value) {
                self.push_single(&generated);
            }
        }
    }

    fn push_single(&mut self, uniform: &Uniform) -> Uniform {
        let key = (uniform.registry().id(), uniform.index());
        let stack = self.stacks.entry(key).or_default();
        let combine = uniform.spec().and_then(|spec| spec.combine.clone());
        let value = match (combine, stack.last()) {
            (Some(combine), Some(top)) => combine(top, uniform),
            _ => uniform.clone(),
        };
        stack.push(value.clone());
        self.pushed.push(key);
        value
    }

    /// Pops everything pushed since `mark`.
    pub fn pop_to(&mut self, mark: usize) {
        while self.pushed.len() > mark {
            let Some(key) = self.pushed.pop() else {
                break;
            };
            if let Some(stack) = self.stacks.get_mut(&key) {
                stack.pop();
            }
        }
    }

    pub fn top(&self, registry: HolderId, index: usize) -> Option<&Uniform> {
        self.stacks.get(&(registry, index)).and_then(|stack| stack.last())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct UniformCacheKey {
    pub program: HolderId,
    /// Index of the uniform in the program's active uniform list.
    pub slot: usize,
    /// Set for concurrent programs only.
    pub thread: Option<ThreadKey>,
}

#[derive(Debug, Default)]
struct UniformCacheEntry {
    stamp: u64,
    bytes: Option<SmallVec<[u8; 64]>>,
    units: Option<SmallVec<[i32; 4]>>,
    warned_missing: bool,
}

/// Last values sent for every uniform of every program, used to skip sends
/// that would not change anything.
#[derive(Debug, Default)]
pub(crate) struct UniformDiffCache {
    entries: FastHashMap<UniformCacheKey, UniformCacheEntry>,
}

impl UniformDiffCache {
    /// Records `uniform` as the value of `key`, returning whether it differs
    /// from what was sent last.
    pub fn value_changed(&mut self, key: UniformCacheKey, uniform: &Uniform) -> bool {
        let entry = self.entries.entry(key).or_default();
        entry.warned_missing = false;
        if entry.bytes.is_some() && entry.stamp == uniform.stamp() {
            return false;
        }
        let bytes = uniform.value().to_bytes();
        entry.stamp = uniform.stamp();
        if entry.bytes.as_ref() == Some(&bytes) {
            return false;
        }
        entry.bytes = Some(bytes);
        true
    }

    /// Records the image units a sampler uniform resolved to.
    pub fn units_changed(&mut self, key: UniformCacheKey, units: &[i32]) -> bool {
        let entry = self.entries.entry(key).or_default();
        entry.warned_missing = false;
        if entry.units.as_deref() == Some(units) {
            return false;
        }
        entry.units = Some(SmallVec::from_slice(units));
        true
    }

    /// Returns true the first time `key` is found without a value since it
    /// last had one.
    pub fn note_missing(&mut self, key: UniformCacheKey) -> bool {
        let entry = self.entries.entry(key).or_default();
        !std::mem::replace(&mut entry.warned_missing, true)
    }

    /// Forgets every value sent to `program`, after a relink or release.
    pub fn invalidate_program(&mut self, program: HolderId) {
        self.entries.retain(|key, _| key.program != program);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Issues the call setting the uniform at `location` to `value`, sending at
/// most `max_count` array elements.
pub(crate) fn send_uniform_value(gm: &dyn GraphicsManager, location: i32, value: &UniformValue, max_count: usize) {
    fn clamp<T>(values: &[T], max_count: usize) -> &[T] {
        &values[..values.len().min(max_count.max(1))]
    }

    match value {
        UniformValue::Int(v) => gm.uniform_1iv(location, &[*v]),
        UniformValue::UnsignedInt(v) => gm.uniform_1uiv(location, &[*v]),
        UniformValue::Float(v) => gm.uniform_1fv(location, &[*v]),
        UniformValue::IntVector2(v) => gm.uniform_2iv(location, &v.to_array()),
        UniformValue::IntVector3(v) => gm.uniform_3iv(location, &v.to_array()),
        UniformValue::IntVector4(v) => gm.uniform_4iv(location, &v.to_array()),
        UniformValue::FloatVector2(v) => gm.uniform_2fv(location, &v.to_array()),
        UniformValue::FloatVector3(v) => gm.uniform_3fv(location, &v.to_array()),
        UniformValue::FloatVector4(v) => gm.uniform_4fv(location, &v.to_array()),
        UniformValue::Matrix2(m) => gm.uniform_matrix_2fv(location, &m.to_cols_array()),
        UniformValue::Matrix3(m) => gm.uniform_matrix_3fv(location, &m.to_cols_array()),
        UniformValue::Matrix4(m) => gm.uniform_matrix_4fv(location, &m.to_cols_array()),
        UniformValue::IntArray(v) => gm.uniform_1iv(location, clamp(v, max_count)),
        UniformValue::FloatArray(v) => gm.uniform_1fv(location, clamp(v, max_count)),
        UniformValue::FloatVector2Array(v) => gm.uniform_2fv(location, bytemuck::cast_slice(clamp(v, max_count))),
        UniformValue::FloatVector3Array(v) => gm.uniform_3fv(location, bytemuck::cast_slice(clamp(v, max_count))),
        UniformValue::FloatVector4Array(v) => gm.uniform_4fv(location, bytemuck::cast_slice(clamp(v, max_count))),
        UniformValue::Matrix4Array(v) => {
            gm.uniform_matrix_4fv(location, bytemuck::cast_slice(clamp(v, max_count)))
        }
        // Sampler uniforms are sent as image units.
        UniformValue::Texture(_)
        | UniformValue::CubeMapTexture(_)
        | UniformValue::TextureArray(_)
        | UniformValue::CubeMapTextureArray(_) => {}
    }
}

impl ResourceBinder {
    /// Sends the uniforms of `program` whose effective value differs from
    /// what the program last received. The program must be in use.
    pub(crate) fn send_program_uniforms(&mut self, program: &Arc<ShaderProgram>) {
        profiling::scope!("ResourceBinder::send_program_uniforms");
        let Some(resource) = self.resources.programs.get(program.id()) else {
            return;
        };
        let uniforms = Arc::clone(&resource.uniforms);
        let thread = program.is_concurrent().then_some(self.thread_key);
        let gm = Arc::clone(&self.gm);

        for (slot, active) in uniforms.iter().enumerate() {
            let key = UniformCacheKey {
                program: program.id(),
                slot,
                thread,
            };
            let Some(uniform) = self.uniform_stacks.top(active.registry, active.spec_index).cloned() else {
                if self.uniform_cache.note_missing(key) {
                    log::warn!(
                        "No value set for uniform '{}' of shader program '{}'",
                        active.name,
                        program.label()
                    );
                }
                continue;
            };

            if uniform.value().uniform_type().is_texture() {
                let Some(units) = self.bind_texture_uniform(uniform.value(), active.size as usize) else {
                    continue;
                };
                if self.uniform_cache.units_changed(key, &units) {
                    gm.uniform_1iv(active.location, &units);
                }
            } else if self.uniform_cache.value_changed(key, &uniform) {
                send_uniform_value(&*gm, active.location, uniform.value(), active.size.max(1) as usize);
            }
        }
    }

    /// Assigns image units to every texture of a sampler uniform and binds
    /// them. Returns `None` if any of them cannot be bound.
    fn bind_texture_uniform(&mut self, value: &UniformValue, max_count: usize) -> Option<SmallVec<[i32; 4]>> {
        let units: Option<SmallVec<[i32; 4]>> = match value {
            UniformValue::Texture(texture) => self.bind_texture_unit(texture).map(|unit| smallvec![unit as i32]),
            UniformValue::CubeMapTexture(texture) => self.bind_texture_unit(texture).map(|unit| smallvec![unit as i32]),
            UniformValue::TextureArray(textures) => textures
                .iter()
                .take(max_count.max(1))
                .map(|texture| self.bind_texture_unit(texture).map(|unit| unit as i32))
                .collect(),
            UniformValue::CubeMapTextureArray(textures) => textures
                .iter()
                .take(max_count.max(1))
                .map(|texture| self.bind_texture_unit(texture).map(|unit| unit as i32))
                .collect(),
            _ => None,
        };
        if units.is_none() {
            let labels: Vec<(u64, String)> = match value {
                UniformValue::Texture(texture) => vec![(texture.id().get(), texture.label())],
                UniformValue::CubeMapTexture(texture) => vec![(texture.id().get(), texture.label())],
                UniformValue::TextureArray(textures) => {
                    textures.iter().map(|texture| (texture.id().get(), texture.label())).collect()
                }
                UniformValue::CubeMapTextureArray(textures) => {
                    textures.iter().map(|texture| (texture.id().get(), texture.label())).collect()
                }
                _ => Vec::new(),
            };
            let ids: Vec<u64> = labels.iter().map(|(id, _)| *id).collect();
            self.warn_once(format_sso!("unbindable-textures-{:?}", ids), || {
                let names: Vec<&str> = labels.iter().map(|(_, label)| label.as_str()).collect();
                format!("Textures {:?} could not be bound to image units", names)
            });
        }
        units
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;
    use glint_types::{ShaderInputRegistry, UniformSpec, UniformType};

    use super::*;

    fn registry() -> Arc<ShaderInputRegistry> {
        let registry = ShaderInputRegistry::new();
        registry
            .add_uniform_spec(UniformSpec::new("uScale", UniformType::Float))
            .unwrap();
        registry
            .add_uniform_spec(
                UniformSpec::new("uModel", UniformType::Matrix4)
                    .with_combine(Arc::new(|old: &Uniform, new: &Uniform| {
                        let (UniformValue::Matrix4(a), UniformValue::Matrix4(b)) = (old.value(), new.value()) else {
                            return new.clone();
                        };
                        let mut combined = new.clone();
                        combined.set_value(UniformValue::Matrix4(*a * *b)).unwrap();
                        combined
                    })),
            )
            .unwrap();
        registry
    }

    #[test]
    fn nearest_value_wins_and_pops() {
        let registry = registry();
        let mut stacks = UniformStacks::default();
        stacks.reset(&[registry.create_uniform("uScale", UniformValue::Float(1.0)).unwrap()]);

        let mark = stacks.mark();
        stacks.push(&registry.create_uniform("uScale", UniformValue::Float(2.0)).unwrap());
        let top = stacks.top(registry.id(), 0).unwrap();
        assert!(matches!(top.value(), UniformValue::Float(v) if *v == 2.0));

        stacks.pop_to(mark);
        let top = stacks.top(registry.id(), 0).unwrap();
        assert!(matches!(top.value(), UniformValue::Float(v) if *v == 1.0));
    }

    #[test]
    fn combine_uses_inherited_value() {
        let registry = registry();
        let mut stacks = UniformStacks::default();
        stacks.reset(&[]);
        let scale = Mat4::from_scale([2.0; 3].into());
        stacks.push(&registry.create_uniform("uModel", UniformValue::Matrix4(scale)).unwrap());
        stacks.push(&registry.create_uniform("uModel", UniformValue::Matrix4(scale)).unwrap());

        let top = stacks.top(registry.id(), 1).unwrap();
        assert!(matches!(top.value(), UniformValue::Matrix4(m) if *m == scale * scale));
    }

    #[test]
    fn cache_suppresses_identical_values() {
        let registry = registry();
        let mut cache = UniformDiffCache::default();
        let key = UniformCacheKey {
            program: registry.id(),
            slot: 0,
            thread: None,
        };
        let first = registry.create_uniform("uScale", UniformValue::Float(1.0)).unwrap();
        let same = registry.create_uniform("uScale", UniformValue::Float(1.0)).unwrap();
        let other = registry.create_uniform("uScale", UniformValue::Float(3.0)).unwrap();

        assert!(cache.value_changed(key, &first));
        assert!(!cache.value_changed(key, &first));
        assert!(!cache.value_changed(key, &same));
        assert!(cache.value_changed(key, &other));

        cache.invalidate_program(registry.id());
        assert!(cache.value_changed(key, &other));
    }

    #[test]
    fn missing_values_are_noted_once_until_set() {
        let registry = registry();
        let mut cache = UniformDiffCache::default();
        let key = UniformCacheKey {
            program: registry.id(),
            slot: 0,
            thread: None,
        };
        assert!(cache.note_missing(key));
        assert!(!cache.note_missing(key));
        cache.units_changed(key, &[0]);
        assert!(cache.note_missing(key));
    }
}
