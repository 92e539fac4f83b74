use bitflags::bitflags;
use glam::{Vec2, Vec4};

/// Pipeline capabilities that can be switched on and off.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Capability {
    Blend,
    ClipDistance0,
    ClipDistance1,
    ClipDistance2,
    ClipDistance3,
    ClipDistance4,
    ClipDistance5,
    ClipDistance6,
    ClipDistance7,
    CullFace,
    DebugOutputSynchronous,
    DepthTest,
    Dither,
    Multisample,
    PolygonOffsetFill,
    RasterizerDiscard,
    SampleAlphaToCoverage,
    SampleCoverage,
    SampleShading,
    ScissorTest,
    StencilTest,
}

impl Capability {
    pub const ALL: [Capability; 21] = [
        Capability::Blend,
        Capability::ClipDistance0,
        Capability::ClipDistance1,
        Capability::ClipDistance2,
        Capability::ClipDistance3,
        Capability::ClipDistance4,
        Capability::ClipDistance5,
        Capability::ClipDistance6,
        Capability::ClipDistance7,
        Capability::CullFace,
        Capability::DebugOutputSynchronous,
        Capability::DepthTest,
        Capability::Dither,
        Capability::Multisample,
        Capability::PolygonOffsetFill,
        Capability::RasterizerDiscard,
        Capability::SampleAlphaToCoverage,
        Capability::SampleCoverage,
        Capability::SampleShading,
        Capability::ScissorTest,
        Capability::StencilTest,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    /// Driver default. Only dithering and multisampling start enabled.
    pub fn default_enabled(self) -> bool {
        matches!(self, Capability::Dither | Capability::Multisample)
    }

    fn bit(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    ReverseSubtract,
    Subtract,
    Min,
    Max,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CullFaceMode {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrontFaceMode {
    Clockwise,
    CounterClockwise,
}

/// Comparison used by depth and stencil tests and by depth-compare samplers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementAndWrap,
    Decrement,
    DecrementAndWrap,
    Invert,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HintMode {
    Fastest,
    Nicest,
    DontCare,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendEquations {
    pub rgb: BlendEquation,
    pub alpha: BlendEquation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendFunctions {
    pub rgb_source: BlendFactor,
    pub rgb_destination: BlendFactor,
    pub alpha_source: BlendFactor,
    pub alpha_destination: BlendFactor,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilFunction {
    pub function: CompareFunction,
    pub reference: i32,
    pub mask: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilFunctions {
    pub front: StencilFunction,
    pub back: StencilFunction,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilOperations {
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilFaceOperations {
    pub front: StencilOperations,
    pub back: StencilOperations,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilWriteMasks {
    pub front: u32,
    pub back: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SampleCoverage {
    pub value: f32,
    pub invert: bool,
}

/// Integer rectangle used for viewports, scissor boxes and read-back regions.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

bitflags! {
    /// Buffers affected by a clear.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

const STENCIL_ALWAYS: StencilFunction = StencilFunction {
    function: CompareFunction::Always,
    reference: 0,
    mask: u32::MAX,
};

const STENCIL_KEEP: StencilOperations = StencilOperations {
    fail: StencilOperation::Keep,
    depth_fail: StencilOperation::Keep,
    pass: StencilOperation::Keep,
};

macro_rules! state_values {
    ($size:ident; $($variant:ident => $field:ident, $setter:ident: $ty:ty = $default:expr;)*) => {
        /// Pipeline values that can be set on a [`StateTable`].
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum StateValue {
            $($variant,)*
        }

        impl StateValue {
            pub const ALL: &'static [StateValue] = &[$(StateValue::$variant,)*];
            pub const COUNT: usize = Self::ALL.len();

            fn bit(self) -> u32 {
                1 << self as u32
            }
        }

        #[derive(Debug, Copy, Clone, PartialEq)]
        struct StateValues {
            $($field: $ty,)*
        }

        impl StateValues {
            fn defaults($size: Rect) -> Self {
                Self {
                    $($field: $default,)*
                }
            }

            fn value_eq(&self, other: &Self, value: StateValue) -> bool {
                match value {
                    $(StateValue::$variant => self.$field == other.$field,)*
                }
            }

            fn copy_value(&mut self, other: &Self, value: StateValue) {
                match value {
                    $(StateValue::$variant => self.$field = other.$field,)*
                }
            }
        }

        impl StateTable {
            $(
                pub fn $setter(&mut self, value: $ty) {
                    self.values.$field = value;
                    self.values_set |= StateValue::$variant.bit();
                }

                pub fn $field(&self) -> $ty {
                    self.values.$field
                }
            )*
        }
    };
}

state_values! {
    size;
    BlendColor => blend_color, set_blend_color: Vec4 = Vec4::ZERO;
    BlendEquations => blend_equations, set_blend_equations: BlendEquations = BlendEquations {
        rgb: BlendEquation::Add,
        alpha: BlendEquation::Add,
    };
    BlendFunctions => blend_functions, set_blend_functions: BlendFunctions = BlendFunctions {
        rgb_source: BlendFactor::One,
        rgb_destination: BlendFactor::Zero,
        alpha_source: BlendFactor::One,
        alpha_destination: BlendFactor::Zero,
    };
    ClearColor => clear_color, set_clear_color: Vec4 = Vec4::ZERO;
    ClearDepth => clear_depth, set_clear_depth: f32 = 1.0;
    ClearStencil => clear_stencil, set_clear_stencil: i32 = 0;
    ColorWriteMasks => color_write_masks, set_color_write_masks: [bool; 4] = [true; 4];
    CullFaceMode => cull_face_mode, set_cull_face_mode: CullFaceMode = CullFaceMode::Back;
    FrontFaceMode => front_face_mode, set_front_face_mode: FrontFaceMode = FrontFaceMode::CounterClockwise;
    DepthFunction => depth_function, set_depth_function: CompareFunction = CompareFunction::Less;
    DepthRange => depth_range, set_depth_range: Vec2 = Vec2::new(0.0, 1.0);
    DepthWriteMask => depth_write_mask, set_depth_write_mask: bool = true;
    GenerateMipmapHint => generate_mipmap_hint, set_generate_mipmap_hint: HintMode = HintMode::DontCare;
    LineWidth => line_width, set_line_width: f32 = 1.0;
    MinSampleShading => min_sample_shading, set_min_sample_shading: f32 = 0.0;
    PolygonOffset => polygon_offset, set_polygon_offset: PolygonOffset = PolygonOffset { factor: 0.0, units: 0.0 };
    SampleCoverage => sample_coverage, set_sample_coverage: SampleCoverage = SampleCoverage { value: 1.0, invert: false };
    ScissorBox => scissor_box, set_scissor_box: Rect = size;
    StencilFunctions => stencil_functions, set_stencil_functions: StencilFunctions = StencilFunctions {
        front: STENCIL_ALWAYS,
        back: STENCIL_ALWAYS,
    };
    StencilOperations => stencil_operations, set_stencil_operations: StencilFaceOperations = StencilFaceOperations {
        front: STENCIL_KEEP,
        back: STENCIL_KEEP,
    };
    StencilWriteMasks => stencil_write_masks, set_stencil_write_masks: StencilWriteMasks = StencilWriteMasks {
        front: u32::MAX,
        back: u32::MAX,
    };
    Viewport => viewport, set_viewport: Rect = size;
}

/// A partial record of pipeline state.
///
/// Every capability and value is either explicitly set or unset. Unset
/// entries still answer queries with the driver default, but are ignored
/// when the table is merged or diffed, which is what lets only the nodes
/// that care about a piece of state pay for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTable {
    capabilities: u32,
    capabilities_set: u32,
    values: StateValues,
    values_set: u32,
    default_size: Rect,
    enforce_settings: bool,
}

impl StateTable {
    pub fn new() -> Self {
        Self::with_size(0, 0)
    }

    /// A table whose default viewport and scissor box cover `width` x
    /// `height`.
    pub fn with_size(width: i32, height: i32) -> Self {
        let default_size = Rect::new(0, 0, width, height);
        Self {
            capabilities: Self::default_capabilities(),
            capabilities_set: 0,
            values: StateValues::defaults(default_size),
            values_set: 0,
            default_size,
            enforce_settings: false,
        }
    }

    fn default_capabilities() -> u32 {
        Capability::ALL
            .iter()
            .filter(|cap| cap.default_enabled())
            .fold(0, |acc, cap| acc | cap.bit())
    }

    pub fn default_size(&self) -> Rect {
        self.default_size
    }

    /// Unsets everything and restores all defaults. The enforce flag is kept.
    pub fn reset(&mut self) {
        self.capabilities = Self::default_capabilities();
        self.capabilities_set = 0;
        self.values = StateValues::defaults(self.default_size);
        self.values_set = 0;
    }

    pub fn enable(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.capabilities |= capability.bit();
        } else {
            self.capabilities &= !capability.bit();
        }
        self.capabilities_set |= capability.bit();
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities & capability.bit() != 0
    }

    pub fn is_capability_set(&self, capability: Capability) -> bool {
        self.capabilities_set & capability.bit() != 0
    }

    pub fn reset_capability(&mut self, capability: Capability) {
        self.enable(capability, capability.default_enabled());
        self.capabilities_set &= !capability.bit();
    }

    pub fn set_capability_count(&self) -> usize {
        self.capabilities_set.count_ones() as usize
    }

    /// Iterates over the capabilities that are explicitly set.
    pub fn set_capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|&cap| self.is_capability_set(cap))
    }

    pub fn is_value_set(&self, value: StateValue) -> bool {
        self.values_set & value.bit() != 0
    }

    pub fn reset_value(&mut self, value: StateValue) {
        let defaults = StateValues::defaults(self.default_size);
        self.values.copy_value(&defaults, value);
        self.values_set &= !value.bit();
    }

    pub fn set_value_count(&self) -> usize {
        self.values_set.count_ones() as usize
    }

    /// Iterates over the values that are explicitly set.
    pub fn set_values(&self) -> impl Iterator<Item = StateValue> + '_ {
        StateValue::ALL.iter().copied().filter(|&value| self.is_value_set(value))
    }

    /// Whether `value` holds the same setting in both tables, regardless of
    /// whether either has it explicitly set.
    pub fn value_matches(&self, other: &StateTable, value: StateValue) -> bool {
        self.values.value_eq(&other.values, value)
    }

    /// Copies a single value from `other` and marks it set.
    pub fn copy_value_from(&mut self, other: &StateTable, value: StateValue) {
        self.values.copy_value(&other.values, value);
        self.values_set |= value.bit();
    }

    /// Copies the explicitly set entries of this table onto `target`,
    /// marking them set there as well. Entries this table leaves unset are
    /// not touched.
    pub fn merge_onto(&self, target: &mut StateTable) {
        for cap in self.set_capabilities() {
            target.enable(cap, self.is_enabled(cap));
        }
        for value in self.set_values() {
            target.copy_value_from(self, value);
        }
    }

    /// Buffers a clear driven by this table would touch.
    pub fn clear_mask(&self) -> ClearMask {
        let mut mask = ClearMask::empty();
        mask.set(ClearMask::COLOR, self.is_value_set(StateValue::ClearColor));
        mask.set(ClearMask::DEPTH, self.is_value_set(StateValue::ClearDepth));
        mask.set(ClearMask::STENCIL, self.is_value_set(StateValue::ClearStencil));
        mask
    }

    /// When set, every explicitly set entry is sent to the driver even if the
    /// shadow already holds the same setting.
    pub fn set_enforce_settings(&mut self, enforce: bool) {
        self.enforce_settings = enforce;
    }

    pub fn are_settings_enforced(&self) -> bool {
        self.enforce_settings
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_report_defaults() {
        let table = StateTable::with_size(640, 480);
        assert!(table.is_enabled(Capability::Dither));
        assert!(table.is_enabled(Capability::Multisample));
        assert!(!table.is_enabled(Capability::Blend));
        assert_eq!(table.viewport(), Rect::new(0, 0, 640, 480));
        assert_eq!(table.clear_depth(), 1.0);
        assert_eq!(table.set_capability_count(), 0);
        assert_eq!(table.set_value_count(), 0);
    }

    #[test]
    fn reset_restores_default() {
        let mut table = StateTable::new();
        table.enable(Capability::Dither, false);
        table.set_line_width(4.0);
        table.reset_capability(Capability::Dither);
        table.reset_value(StateValue::LineWidth);
        assert!(table.is_enabled(Capability::Dither));
        assert!(!table.is_capability_set(Capability::Dither));
        assert_eq!(table.line_width(), 1.0);
        assert!(!table.is_value_set(StateValue::LineWidth));
    }

    #[test]
    fn merge_only_touches_set_fields() {
        let mut parent = StateTable::new();
        parent.enable(Capability::DepthTest, true);
        parent.set_clear_color(Vec4::ONE);

        let mut child = StateTable::new();
        child.enable(Capability::Blend, true);
        child.set_clear_color(Vec4::new(0.0, 0.0, 1.0, 1.0));

        child.merge_onto(&mut parent);
        assert!(parent.is_enabled(Capability::DepthTest));
        assert!(parent.is_enabled(Capability::Blend));
        assert!(parent.is_capability_set(Capability::Blend));
        assert_eq!(parent.clear_color(), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert!(!parent.is_value_set(StateValue::Viewport));
    }

    #[test]
    fn clear_mask_follows_set_values() {
        let mut table = StateTable::new();
        assert!(table.clear_mask().is_empty());
        table.set_clear_depth(0.5);
        table.set_clear_stencil(1);
        assert_eq!(table.clear_mask(), ClearMask::DEPTH | ClearMask::STENCIL);
    }
}
