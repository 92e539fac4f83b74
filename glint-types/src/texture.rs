use std::sync::Arc;

use glam::UVec2;
use parking_lot::RwLock;

use crate::{holder::impl_holder, Holder, HolderBase, Image, Sampler, FIRST_HOLDER_CHANGE};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CubeFace {
    NegativeX,
    NegativeY,
    NegativeZ,
    PositiveX,
    PositiveY,
    PositiveZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::NegativeX,
        CubeFace::NegativeY,
        CubeFace::NegativeZ,
        CubeFace::PositiveX,
        CubeFace::PositiveY,
        CubeFace::PositiveZ,
    ];
}

/// Destination of an image upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TexImageTarget {
    Texture2D,
    CubeFace(CubeFace),
}

/// A rectangle of a texture level replaced by a new image.
#[derive(Debug, Clone)]
pub struct SubImage {
    pub target: TexImageTarget,
    pub level: usize,
    pub offset: UVec2,
    pub image: Arc<Image>,
}

/// Behaviour shared by 2D textures and cubemaps.
pub trait TextureHolder: Holder {
    fn target(&self) -> TextureTarget;
    fn sampler(&self) -> Option<Arc<Sampler>>;
    fn base_level(&self) -> i32;
    fn max_level(&self) -> i32;
    /// Every image that is set, with its upload target and mip level.
    fn images(&self) -> Vec<(TexImageTarget, usize, Arc<Image>)>;
    /// Whether every face has a level 0 image.
    fn has_level_zero(&self) -> bool;
    /// Whether any level above 0 is set explicitly.
    fn has_explicit_mipmaps(&self) -> bool;
    /// Sub-images with a sequence number of at least `since`, and the
    /// sequence number following the last of them.
    fn sub_images_since(&self, since: u64) -> (Vec<SubImage>, u64);

    /// Size of the level 0 image of the first face.
    fn level_zero_size(&self) -> Option<UVec2> {
        self.images()
            .into_iter()
            .find(|(_, level, _)| *level == 0)
            .map(|(_, _, image)| UVec2::new(image.width(), image.height()))
    }
}

#[derive(Debug)]
struct TextureState {
    sampler: Option<Arc<Sampler>>,
    base_level: i32,
    max_level: i32,
    sub_images: Vec<(u64, SubImage)>,
    next_sub_image: u64,
}

impl Default for TextureState {
    fn default() -> Self {
        Self {
            sampler: None,
            base_level: 0,
            max_level: 1000,
            sub_images: Vec::new(),
            next_sub_image: 0,
        }
    }
}

impl TextureState {
    fn sub_images_since(&self, since: u64) -> (Vec<SubImage>, u64) {
        let entries = self
            .sub_images
            .iter()
            .filter(|(sequence, _)| *sequence >= since)
            .map(|(_, sub_image)| sub_image.clone())
            .collect();
        (entries, self.next_sub_image)
    }
}

fn set_level(levels: &mut Vec<Option<Arc<Image>>>, level: usize, image: Option<Arc<Image>>) {
    if levels.len() <= level {
        levels.resize(level + 1, None);
    }
    levels[level] = image;
}

macro_rules! texture_common {
    ($ty:ty) => {
        impl $ty {
            pub const IMAGE_CHANGED: u32 = FIRST_HOLDER_CHANGE;
            pub const SAMPLER_CHANGED: u32 = FIRST_HOLDER_CHANGE + 1;
            pub const BASE_LEVEL_CHANGED: u32 = FIRST_HOLDER_CHANGE + 2;
            pub const MAX_LEVEL_CHANGED: u32 = FIRST_HOLDER_CHANGE + 3;
            pub const SUB_IMAGE_CHANGED: u32 = FIRST_HOLDER_CHANGE + 4;

            pub fn set_sampler(&self, sampler: Option<Arc<Sampler>>) {
                self.state.write().sampler = sampler;
                self.base.notify(Self::SAMPLER_CHANGED);
            }

            pub fn set_base_level(&self, level: i32) {
                self.state.write().base_level = level;
                self.base.notify(Self::BASE_LEVEL_CHANGED);
            }

            pub fn set_max_level(&self, level: i32) {
                self.state.write().max_level = level;
                self.base.notify(Self::MAX_LEVEL_CHANGED);
            }

            fn push_sub_image(&self, sub_image: SubImage) {
                {
                    let mut state = self.state.write();
                    let sequence = state.next_sub_image;
                    state.next_sub_image += 1;
                    state.sub_images.push((sequence, sub_image));
                }
                self.base.notify(Self::SUB_IMAGE_CHANGED);
            }

            pub fn clear_sub_images(&self) {
                self.state.write().sub_images.clear();
            }
        }
    };
}

/// A 2D texture with optional explicit mip levels.
#[derive(Debug)]
pub struct Texture {
    base: HolderBase,
    levels: RwLock<Vec<Option<Arc<Image>>>>,
    state: RwLock<TextureState>,
}
impl_holder!(Texture);
texture_common!(Texture);

impl Texture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            levels: RwLock::new(Vec::new()),
            state: RwLock::new(TextureState::default()),
        })
    }

    /// Sets the image of mip `level`. Level 0 is the base image. Pending
    /// sub-images are dropped.
    pub fn set_image(&self, level: usize, image: Option<Arc<Image>>) {
        set_level(&mut self.levels.write(), level, image);
        self.state.write().sub_images.clear();
        self.base.notify(Self::IMAGE_CHANGED);
    }

    pub fn image(&self, level: usize) -> Option<Arc<Image>> {
        self.levels.read().get(level).cloned().flatten()
    }

    pub fn set_sub_image(&self, level: usize, offset: UVec2, image: Arc<Image>) {
        self.push_sub_image(SubImage {
            target: TexImageTarget::Texture2D,
            level,
            offset,
            image,
        });
    }
}

impl TextureHolder for Texture {
    fn target(&self) -> TextureTarget {
        TextureTarget::Texture2D
    }

    fn sampler(&self) -> Option<Arc<Sampler>> {
        self.state.read().sampler.clone()
    }

    fn base_level(&self) -> i32 {
        self.state.read().base_level
    }

    fn max_level(&self) -> i32 {
        self.state.read().max_level
    }

    fn images(&self) -> Vec<(TexImageTarget, usize, Arc<Image>)> {
        self.levels
            .read()
            .iter()
            .enumerate()
            .filter_map(|(level, image)| image.clone().map(|image| (TexImageTarget::Texture2D, level, image)))
            .collect()
    }

    fn has_level_zero(&self) -> bool {
        matches!(self.levels.read().first(), Some(Some(_)))
    }

    fn has_explicit_mipmaps(&self) -> bool {
        self.levels.read().iter().skip(1).any(Option::is_some)
    }

    fn sub_images_since(&self, since: u64) -> (Vec<SubImage>, u64) {
        self.state.read().sub_images_since(since)
    }
}

/// A texture with six square faces.
#[derive(Debug)]
pub struct CubeMapTexture {
    base: HolderBase,
    faces: RwLock<[Vec<Option<Arc<Image>>>; 6]>,
    state: RwLock<TextureState>,
}
impl_holder!(CubeMapTexture);
texture_common!(CubeMapTexture);

impl CubeMapTexture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: HolderBase::new(),
            faces: RwLock::new(Default::default()),
            state: RwLock::new(TextureState::default()),
        })
    }

    pub fn set_image(&self, face: CubeFace, level: usize, image: Option<Arc<Image>>) {
        set_level(&mut self.faces.write()[face as usize], level, image);
        self.state.write().sub_images.clear();
        self.base.notify(Self::IMAGE_CHANGED);
    }

    pub fn image(&self, face: CubeFace, level: usize) -> Option<Arc<Image>> {
        self.faces.read()[face as usize].get(level).cloned().flatten()
    }

    pub fn set_sub_image(&self, face: CubeFace, level: usize, offset: UVec2, image: Arc<Image>) {
        self.push_sub_image(SubImage {
            target: TexImageTarget::CubeFace(face),
            level,
            offset,
            image,
        });
    }
}

impl TextureHolder for CubeMapTexture {
    fn target(&self) -> TextureTarget {
        TextureTarget::CubeMap
    }

    fn sampler(&self) -> Option<Arc<Sampler>> {
        self.state.read().sampler.clone()
    }

    fn base_level(&self) -> i32 {
        self.state.read().base_level
    }

    fn max_level(&self) -> i32 {
        self.state.read().max_level
    }

    fn images(&self) -> Vec<(TexImageTarget, usize, Arc<Image>)> {
        let faces = self.faces.read();
        CubeFace::ALL
            .into_iter()
            .flat_map(|face| {
                faces[face as usize]
                    .iter()
                    .enumerate()
                    .filter_map(move |(level, image)| {
                        image.clone().map(|image| (TexImageTarget::CubeFace(face), level, image))
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn has_level_zero(&self) -> bool {
        self.faces.read().iter().all(|levels| matches!(levels.first(), Some(Some(_))))
    }

    fn has_explicit_mipmaps(&self) -> bool {
        self.faces
            .read()
            .iter()
            .any(|levels| levels.iter().skip(1).any(Option::is_some))
    }

    fn sub_images_since(&self, since: u64) -> (Vec<SubImage>, u64) {
        self.state.read().sub_images_since(since)
    }
}
