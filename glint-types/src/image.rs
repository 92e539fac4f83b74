use std::sync::Arc;

use crate::DataContainer;

/// Pixel formats understood by textures, renderbuffers and read-back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Alpha8,
    Luminance8,
    LuminanceAlpha8,
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Rgb565,
    Rgba4444,
    R32f,
    Rgba16f,
    Rgba32f,
    Depth16,
    Depth24,
    Depth32f,
    Depth24Stencil8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Alpha8 | ImageFormat::Luminance8 | ImageFormat::R8 => 1,
            ImageFormat::LuminanceAlpha8
            | ImageFormat::Rg8
            | ImageFormat::Rgb565
            | ImageFormat::Rgba4444
            | ImageFormat::Depth16 => 2,
            ImageFormat::Rgb8 | ImageFormat::Depth24 => 3,
            ImageFormat::Rgba8 | ImageFormat::R32f | ImageFormat::Depth32f | ImageFormat::Depth24Stencil8 => 4,
            ImageFormat::Rgba16f => 8,
            ImageFormat::Rgba32f => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            ImageFormat::Depth16 | ImageFormat::Depth24 | ImageFormat::Depth32f | ImageFormat::Depth24Stencil8
        )
    }
}

/// An immutable 2D image. Holders that use images are updated by setting a
/// new image, never by mutating one in place.
#[derive(Debug)]
pub struct Image {
    format: ImageFormat,
    width: u32,
    height: u32,
    data: Option<Arc<DataContainer>>,
}

impl Image {
    pub fn new(format: ImageFormat, width: u32, height: u32, data: Option<Arc<DataContainer>>) -> Arc<Self> {
        Arc::new(Self {
            format,
            width,
            height,
            data,
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> Option<&Arc<DataContainer>> {
        self.data.as_ref()
    }

    /// Number of bytes the image occupies once uploaded.
    pub fn data_size(&self) -> usize {
        self.format.bytes_per_pixel() * self.width as usize * self.height as usize
    }
}
