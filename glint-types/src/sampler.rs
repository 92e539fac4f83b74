use std::sync::Arc;

use parking_lot::RwLock;

use crate::{holder::impl_holder, CompareFunction, HolderBase, FIRST_HOLDER_CHANGE};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

impl FilterMode {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, FilterMode::Nearest | FilterMode::Linear)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompareMode {
    None,
    CompareToTexture,
}

/// Every parameter a sampler controls.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SamplerParameters {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub min_lod: f32,
    pub max_lod: f32,
    pub compare_mode: CompareMode,
    pub compare_function: CompareFunction,
    pub max_anisotropy: f32,
}

impl Default for SamplerParameters {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
            min_filter: FilterMode::NearestMipmapLinear,
            mag_filter: FilterMode::Linear,
            min_lod: -1000.0,
            max_lod: 1000.0,
            compare_mode: CompareMode::None,
            compare_function: CompareFunction::Less,
            max_anisotropy: 1.0,
        }
    }
}

/// A single parameter as sent to the driver.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SamplerParameter {
    WrapS(WrapMode),
    WrapT(WrapMode),
    WrapR(WrapMode),
    MinFilter(FilterMode),
    MagFilter(FilterMode),
    MinLod(f32),
    MaxLod(f32),
    CompareMode(CompareMode),
    CompareFunction(CompareFunction),
    MaxAnisotropy(f32),
}

impl SamplerParameters {
    /// Parameters of `self` that differ from `previous`. With no previous
    /// state every parameter is returned.
    pub fn changes_from(&self, previous: Option<&SamplerParameters>) -> Vec<SamplerParameter> {
        let all = [
            SamplerParameter::WrapS(self.wrap_s),
            SamplerParameter::WrapT(self.wrap_t),
            SamplerParameter::WrapR(self.wrap_r),
            SamplerParameter::MinFilter(self.min_filter),
            SamplerParameter::MagFilter(self.mag_filter),
            SamplerParameter::MinLod(self.min_lod),
            SamplerParameter::MaxLod(self.max_lod),
            SamplerParameter::CompareMode(self.compare_mode),
            SamplerParameter::CompareFunction(self.compare_function),
            SamplerParameter::MaxAnisotropy(self.max_anisotropy),
        ];
        let Some(previous) = previous else {
            return all.to_vec();
        };
        let old = previous.changes_from(None);
        all.into_iter().zip(old).filter(|(new, old)| new != old).map(|(new, _)| new).collect()
    }
}

/// How a texture is sampled.
#[derive(Debug)]
pub struct Sampler {
    base: HolderBase,
    parameters: RwLock<SamplerParameters>,
}
impl_holder!(Sampler);

macro_rules! sampler_setters {
    ($($setter:ident, $field:ident: $ty:ty, $bit:ident;)*) => {
        impl Sampler {
            $(
                pub fn $setter(&self, value: $ty) {
                    let changed = {
                        let mut parameters = self.parameters.write();
                        let changed = parameters.$field != value;
                        parameters.$field = value;
                        changed
                    };
                    if changed {
                        self.base.notify(Self::$bit);
                    }
                }
            )*
        }
    };
}

impl Sampler {
    pub const WRAP_S_CHANGED: u32 = FIRST_HOLDER_CHANGE;
    pub const WRAP_T_CHANGED: u32 = FIRST_HOLDER_CHANGE + 1;
    pub const WRAP_R_CHANGED: u32 = FIRST_HOLDER_CHANGE + 2;
    pub const MIN_FILTER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 3;
    pub const MAG_FILTER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 4;
    pub const MIN_LOD_CHANGED: u32 = FIRST_HOLDER_CHANGE + 5;
    pub const MAX_LOD_CHANGED: u32 = FIRST_HOLDER_CHANGE + 6;
    pub const COMPARE_MODE_CHANGED: u32 = FIRST_HOLDER_CHANGE + 7;
    pub const COMPARE_FUNCTION_CHANGED: u32 = FIRST_HOLDER_CHANGE + 8;
    pub const MAX_ANISOTROPY_CHANGED: u32 = FIRST_HOLDER_CHANGE + 9;

    pub fn new() -> Arc<Self> {
        Self::with_parameters(SamplerParameters::default())
    }

    pub fn with_parameters(parameters: SamplerParameters) -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            parameters: RwLock::new(parameters),
        })
    }

    pub fn parameters(&self) -> SamplerParameters {
        *self.parameters.read()
    }

    /// Sets the wrap mode of all three coordinates at once.
    pub fn set_wrap_modes(&self, mode: WrapMode) {
        self.set_wrap_s(mode);
        self.set_wrap_t(mode);
        self.set_wrap_r(mode);
    }
}

sampler_setters! {
    set_wrap_s, wrap_s: WrapMode, WRAP_S_CHANGED;
    set_wrap_t, wrap_t: WrapMode, WRAP_T_CHANGED;
    set_wrap_r, wrap_r: WrapMode, WRAP_R_CHANGED;
    set_min_filter, min_filter: FilterMode, MIN_FILTER_CHANGED;
    set_mag_filter, mag_filter: FilterMode, MAG_FILTER_CHANGED;
    set_min_lod, min_lod: f32, MIN_LOD_CHANGED;
    set_max_lod, max_lod: f32, MAX_LOD_CHANGED;
    set_compare_mode, compare_mode: CompareMode, COMPARE_MODE_CHANGED;
    set_compare_function, compare_function: CompareFunction, COMPARE_FUNCTION_CHANGED;
    set_max_anisotropy, max_anisotropy: f32, MAX_ANISOTROPY_CHANGED;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_only_lists_differences() {
        let old = SamplerParameters::default();
        let mut new = old;
        new.min_filter = FilterMode::Linear;
        new.wrap_t = WrapMode::ClampToEdge;

        assert_eq!(
            new.changes_from(Some(&old)),
            vec![
                SamplerParameter::WrapT(WrapMode::ClampToEdge),
                SamplerParameter::MinFilter(FilterMode::Linear),
            ]
        );
        assert_eq!(new.changes_from(None).len(), 10);
        assert!(old.changes_from(Some(&old)).is_empty());
    }
}
