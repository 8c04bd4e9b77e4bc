//! Every resource of one loaded scene, in dependency order: images, samplers,
//! textures, meshes.

use futures::future::join_all;

use super::{
    ResourceError,
    document::{SceneData, sampler_config},
    image::ImageRecord,
    loading::CompletionLatch,
    mesh::MeshRecord,
};
use crate::{
    context::{GpuBuffers, GpuHandle},
    data_structures::{
        texture::SamplerConfig,
        uid::{Registry, Uid},
    },
};

/// A glTF texture: which image, sampled how.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub image: usize,
    pub sampler: Option<usize>,
}

#[derive(Debug)]
pub struct SceneContext<B = wgpu::Buffer> {
    pub meshes: Registry<MeshRecord<B>>,
    pub images: Registry<ImageRecord>,
    pub samplers: Vec<SamplerConfig>,
    pub textures: Vec<TextureRef>,
    mesh_uids: Vec<Uid>,
    image_uids: Vec<Uid>,
    decoded: CompletionLatch,
    gpu_samplers: Vec<wgpu::Sampler>,
    default_sampler: Option<wgpu::Sampler>,
}

impl<B> SceneContext<B> {
    /// Read every record out of the document. Images are not decoded yet, see
    /// [`decode_images`](Self::decode_images).
    pub fn new(scene: &SceneData) -> Result<Self, ResourceError> {
        let document = &scene.document;

        let mut images = Registry::new();
        let mut image_uids = Vec::with_capacity(document.images.len());
        for (index, image) in document.images.iter().enumerate() {
            let view = image
                .buffer_view
                .ok_or(ResourceError::ExternalImage(index))?;
            let data = scene.view_bytes(view.value())?;
            let name = image.name.clone().unwrap_or_else(|| format!("image_{index}"));
            let mime_type = image.mime_type.as_ref().map(|m| m.0.clone());
            image_uids.push(
                images.insert_with(|uid| ImageRecord::new(uid, index, name, mime_type, data)),
            );
        }

        let samplers = document.samplers.iter().map(sampler_config).collect();
        let textures = document
            .textures
            .iter()
            .map(|texture| TextureRef {
                image: texture.source.value(),
                sampler: texture.sampler.map(|s| s.value()),
            })
            .collect();

        let mut meshes = Registry::new();
        let mut mesh_uids = Vec::with_capacity(document.meshes.len());
        for index in 0..document.meshes.len() {
            let mut record = MeshRecord::from_document(scene, index)?;
            mesh_uids.push(meshes.insert_with(|uid| {
                record.uid = uid;
                record
            }));
        }

        log::info!(
            "Scene holds {} mesh(es), {} image(s), {} texture(s)",
            mesh_uids.len(),
            image_uids.len(),
            document.textures.len()
        );

        Ok(Self {
            meshes,
            images,
            samplers,
            textures,
            mesh_uids,
            image_uids,
            decoded: CompletionLatch::new(document.images.len()),
            gpu_samplers: Vec::new(),
            default_sampler: None,
        })
    }

    /// Read the document and decode every image.
    pub async fn load(scene: &SceneData) -> Result<Self, ResourceError> {
        let mut context = Self::new(scene)?;
        context.decode_images().await;
        Ok(context)
    }

    /// Decode all images concurrently. Images that fail to decode are logged
    /// and stay unready; the latch still counts them so it always opens.
    pub async fn decode_images(&mut self) {
        let tasks: Vec<_> = self
            .images
            .iter()
            .filter(|(_, image)| !image.is_decoded())
            .map(|(_, image)| {
                ImageRecord::decode(image.index, image.data.clone(), image.mime_type.clone())
            })
            .collect();

        for (index, bitmap) in join_all(tasks).await {
            match bitmap {
                Ok(bitmap) => {
                    if let Some(image) = self.images.get_mut(self.image_uids[index]) {
                        image.set_bitmap(bitmap);
                    }
                }
                Err(e) => log::warn!("{e}"),
            }
            if self.decoded.arrive() {
                log::info!("All scene images decoded");
            }
        }
    }

    /// True once every image decode has finished, successfully or not.
    pub fn images_ready(&self) -> bool {
        self.decoded.is_open()
    }

    pub fn mesh_uid(&self, index: usize) -> Option<Uid> {
        self.mesh_uids.get(index).copied()
    }

    pub fn image_uid(&self, index: usize) -> Option<Uid> {
        self.image_uids.get(index).copied()
    }

    /// Mesh by glTF mesh index.
    pub fn mesh(&self, index: usize) -> Option<&MeshRecord<B>> {
        self.meshes.get(self.mesh_uid(index)?)
    }

    /// Upload every mesh not yet on the GPU. Returns how many were uploaded.
    pub fn store_meshes<G>(&mut self, gpu: &G) -> usize
    where
        G: GpuBuffers<Buffer = B>,
    {
        self.meshes
            .iter_mut()
            .filter_map(|(_, mesh)| mesh.store(gpu).then_some(()))
            .count()
    }

    fn image_of(&self, texture: usize) -> Result<&ImageRecord, ResourceError> {
        let texture = self.textures.get(texture).ok_or(ResourceError::NotReady {
            what: format!("texture {texture}"),
        })?;
        let uid = self
            .image_uid(texture.image)
            .ok_or(ResourceError::ExternalImage(texture.image))?;
        self.images.get(uid).ok_or(ResourceError::UnknownUid(uid))
    }

    /// View of the image behind glTF texture `texture`. Fails until that image
    /// has been decoded and stored.
    pub fn texture_view(&self, texture: usize) -> Result<&wgpu::TextureView, ResourceError> {
        self.image_of(texture)?.view()
    }

    /// Sampler of glTF texture `texture`, or the default sampler when it names
    /// none.
    pub fn sampler(&self, texture: usize) -> Result<&wgpu::Sampler, ResourceError> {
        let not_ready = || ResourceError::NotReady {
            what: format!("sampler of texture {texture}"),
        };
        let sampler = self.textures.get(texture).ok_or_else(not_ready)?.sampler;
        match sampler {
            Some(index) => self.gpu_samplers.get(index).ok_or_else(not_ready),
            None => self.default_sampler.as_ref().ok_or_else(not_ready),
        }
    }
}

impl SceneContext<wgpu::Buffer> {
    /// Upload everything that is ready and not uploaded yet. Safe to call
    /// repeatedly; images still decoding are picked up by a later call.
    pub fn store_all(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> usize {
        if self.default_sampler.is_none() {
            self.default_sampler =
                Some(SamplerConfig::default().create_sampler(device, Some("default_sampler")));
            self.gpu_samplers = self
                .samplers
                .iter()
                .enumerate()
                .map(|(i, config)| config.create_sampler(device, Some(&format!("sampler_{i}"))))
                .collect();
        }

        let mut stored = 0;
        for (_, image) in self.images.iter_mut() {
            if image.is_loaded() || !image.is_decoded() {
                continue;
            }
            match image.store(device, queue) {
                Ok(true) => stored += 1,
                Ok(false) => {}
                Err(e) => log::warn!("{e}"),
            }
        }
        stored + self.store_meshes(&GpuHandle::new(device, queue))
    }
}
