//! Image records: an embedded image, its decoded bitmap and its GPU texture.

use super::{ResourceError, document::ByteRange};
use crate::data_structures::{texture::Texture, uid::Uid};

/// Decode `bytes`, trusting `mime_type` when it names a known format.
pub fn decode_bitmap(
    bytes: &[u8],
    mime_type: Option<&str>,
) -> Result<image::RgbaImage, image::ImageError> {
    let img = match mime_type.and_then(image::ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img.to_rgba8())
}

#[derive(Debug)]
pub struct ImageRecord {
    pub uid: Uid,
    pub name: String,
    /// glTF image index.
    pub index: usize,
    pub mime_type: Option<String>,
    pub data: ByteRange,
    bitmap: Option<image::RgbaImage>,
    texture: Option<Texture>,
    loaded: bool,
}

impl ImageRecord {
    pub fn new(
        uid: Uid,
        index: usize,
        name: String,
        mime_type: Option<String>,
        data: ByteRange,
    ) -> Self {
        Self {
            uid,
            name,
            index,
            mime_type,
            data,
            bitmap: None,
            texture: None,
            loaded: false,
        }
    }

    /// Decode the embedded bytes. Runs on the loader's executor; the result is
    /// applied with [`set_bitmap`](Self::set_bitmap).
    pub async fn decode(
        index: usize,
        data: ByteRange,
        mime_type: Option<String>,
    ) -> (usize, Result<image::RgbaImage, ResourceError>) {
        let bitmap = decode_bitmap(data.bytes(), mime_type.as_deref()).map_err(|e| {
            ResourceError::Image {
                index,
                message: e.to_string(),
            }
        });
        (index, bitmap)
    }

    pub fn set_bitmap(&mut self, bitmap: image::RgbaImage) {
        self.bitmap = Some(bitmap);
    }

    pub fn bitmap(&self) -> Option<&image::RgbaImage> {
        self.bitmap.as_ref()
    }

    pub fn is_decoded(&self) -> bool {
        self.bitmap.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Upload the bitmap as a texture. Only the first successful call uploads.
    pub fn store(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<bool, ResourceError> {
        if self.loaded {
            return Ok(false);
        }
        let bitmap = self.bitmap.as_ref().ok_or_else(|| ResourceError::NotReady {
            what: format!("bitmap of image {}", self.name),
        })?;
        self.texture = Some(Texture::from_image(device, queue, bitmap, Some(&self.name)));
        self.loaded = true;
        Ok(true)
    }

    pub fn texture(&self) -> Result<&Texture, ResourceError> {
        self.texture.as_ref().ok_or_else(|| ResourceError::NotReady {
            what: format!("texture of image {}", self.name),
        })
    }

    pub fn view(&self) -> Result<&wgpu::TextureView, ResourceError> {
        Ok(&self.texture()?.view)
    }
}
