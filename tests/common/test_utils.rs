use std::{cell::RefCell, io::Cursor};

use scene_ngin::{context::GpuBuffers, resources::glb::encode_glb};

/// One node at `[0, 0, -5]` drawing a single triangle, no material.
pub const TRIANGLE_JSON: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "name": "tri", "translation": [0, 0, -5], "mesh": 0 }],
    "meshes": [{
        "name": "triangle",
        "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
    }],
    "buffers": [{ "byteLength": 44 }],
    "bufferViews": [
        { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
        { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
    ],
    "accessors": [
        { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" },
        { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
    ]
}"#;

pub fn triangle_bin() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bin = bytemuck::cast_slice::<f32, u8>(&positions).to_vec();
    bin.extend_from_slice(bytemuck::cast_slice(&indices));
    bin
}

pub fn triangle_glb() -> Vec<u8> {
    encode_glb(TRIANGLE_JSON, &[&triangle_bin()])
}

/// A 2x2 opaque red PNG.
pub fn red_png() -> Vec<u8> {
    let bitmap = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
    let mut bytes = Vec::new();
    bitmap
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// The triangle with a material whose base colour is an embedded PNG behind a
/// nearest-filtering sampler.
pub fn textured_glb() -> Vec<u8> {
    let mut bin = triangle_bin();
    bin.resize(44, 0);
    let png = red_png();
    let png_len = png.len();
    bin.extend_from_slice(&png);

    let json = TRIANGLE_JSON
        .replace(r#""indices": 1 }"#, r#""indices": 1, "material": 0 }"#)
        .replace(
            r#""byteLength": 44 }"#,
            &format!(r#""byteLength": {} }}"#, bin.len()),
        )
        .replace(
            r#"{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }"#,
            &format!(
                r#"{{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
                {{ "buffer": 0, "byteOffset": 44, "byteLength": {png_len} }}"#
            ),
        )
        .replace(
            r#""buffers""#,
            r#""images": [{ "bufferView": 2, "mimeType": "image/png" }],
            "samplers": [{ "magFilter": 9728 }],
            "textures": [{ "source": 0, "sampler": 0 }],
            "materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
            "buffers""#,
        );
    encode_glb(&json, &[&bin])
}

/// Counts allocations and rewrites instead of talking to a GPU. Buffers are
/// indices into the allocation log.
#[derive(Debug, Default)]
pub struct CountingGpu {
    pub created: RefCell<Vec<String>>,
    pub writes: RefCell<usize>,
}

impl CountingGpu {
    pub fn creates(&self) -> usize {
        self.created.borrow().len()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl GpuBuffers for CountingGpu {
    type Buffer = usize;

    fn create_buffer(&self, label: &str, _usage: wgpu::BufferUsages, _contents: &[u8]) -> usize {
        let mut created = self.created.borrow_mut();
        created.push(label.to_string());
        created.len() - 1
    }

    fn write_buffer(&self, _buffer: &usize, _contents: &[u8]) {
        *self.writes.borrow_mut() += 1;
    }
}
