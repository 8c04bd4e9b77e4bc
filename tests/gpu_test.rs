#![cfg(feature = "integration-tests")]

use std::sync::Arc;

use cgmath::Vector3;
use scene_ngin::{
    context::GpuHandle,
    data_structures::{components::View, entity::EntityRegistry},
    render::{RenderError, Swapchain},
    resources::{SceneContext, SceneData},
    shader::{BindingKind, GpuResource, ShaderDescriptor, ShaderError, Tag},
};

use crate::common::test_utils::{textured_glb, triangle_glb};

mod common;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const SHADER: &str = r#"{
    "name": "flat",
    "vertex": { "entry": "vs_main", "code": "
        @tag(perspective_projection_matrix) @group(0) @binding(0) var<uniform> prj_m: mat4x4f;
        @tag(view_matrix) @group(0) @binding(1) var<uniform> vw_m: mat4x4f;
        @tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;
        struct a2v {
            @location(0) @attribute=POSITION pos: vec3<f32>,
        };
        @vertex fn vs_main(i: a2v) -> @builtin(position) vec4f {
            return prj_m * vw_m * mdl_m * vec4f(i.pos, 1.0);
        }
    " },
    "fragment": { "entry": "fs_main", "code": "
        @fragment fn fs_main() -> @location(0) vec4f {
            return vec4f(1.0, 0.5, 0.0, 1.0);
        }
    " },
    "bind_groups": { "VIEW_INDEX": 0, "OBJECT_INDEX": 1 },
    "requires": ["local_to_world_matrix"]
}"#;

// Both stages declare the object group entries they read.
const TEXTURED_SHADER: &str = r#"{
    "name": "textured",
    "vertex": { "entry": "vs_main", "code": "
        @tag(perspective_projection_matrix) @group(0) @binding(0) var<uniform> prj_m: mat4x4f;
        @tag(view_matrix) @group(0) @binding(1) var<uniform> vw_m: mat4x4f;
        @tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;
        struct a2v {
            @location(0) @attribute=POSITION pos: vec3<f32>,
        };
        @vertex fn vs_main(i: a2v) -> @builtin(position) vec4f {
            return prj_m * vw_m * mdl_m * vec4f(i.pos, 1.0);
        }
    " },
    "fragment": { "entry": "fs_main", "code": "
        @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;
        @tag(albedo_texture) @group(1) @binding(1) var t_albedo: texture_2d<f32>;
        @tag(albedo_sampler) @group(1) @binding(2) var s_albedo: sampler;
        @fragment fn fs_main(@builtin(position) frag: vec4f) -> @location(0) vec4f {
            return textureSample(t_albedo, s_albedo, frag.xy / 64.0) * mdl_m[3].w;
        }
    " },
    "bind_groups": { "VIEW_INDEX": 0, "OBJECT_INDEX": 1 },
    "requires": ["local_to_world_matrix", "albedo_texture", "albedo_sampler"]
}"#;

fn headless() -> Option<(wgpu::Device, wgpu::Queue)> {
    futures::executor::block_on(async {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    })
}

#[test]
fn triangle_is_drawn_into_the_swapchain() {
    let Some((device, queue)) = headless() else {
        eprintln!("No adapter available, skipping.");
        return;
    };
    let gpu = GpuHandle::new(&device, &queue);

    let shader = Arc::new(ShaderDescriptor::compile(&device, SHADER).unwrap());
    assert_eq!(shader.query_tag(Tag::LocalToWorld).len(), 1);
    assert!(shader.layout(0).is_some() && shader.layout(1).is_some());

    let scene = SceneData::from_glb(&triangle_glb()).unwrap();
    let mut resources = futures::executor::block_on(SceneContext::load(&scene)).unwrap();
    assert_eq!(resources.store_all(&device, &queue), 1);

    let mut entities = EntityRegistry::new();
    let mut nodes = Vec::new();
    scene
        .traverse(None, |node, mesh| nodes.push((node.matrix, mesh)))
        .unwrap();
    for (matrix, mesh) in nodes {
        let Some(mesh) = mesh.and_then(|m| resources.mesh_uid(m)) else {
            continue;
        };
        let uid = entities.spawn();
        let instance = entities
            .attach_renderable(gpu, uid, mesh, shader.clone(), FORMAT)
            .unwrap();
        instance.bake(&device).unwrap();
        if let Some(transform) = entities.get_mut(uid).and_then(|e| e.transform_mut()) {
            transform.set_matrix(matrix);
        }
    }
    assert_eq!(entities.len(), 1);

    let mut view = View::default();
    view.set_aspect(1.0);
    view.set_camera(cgmath::Matrix4::from_translation(Vector3::new(0.0, 0.0, 1.0)));
    view.bind(&gpu);
    let view_group = view.bind_group(&device, &shader).unwrap();
    entities.update(gpu);

    let swapchain = Swapchain::new(&device, FORMAT, [64, 64]);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("test_encoder"),
    });
    let drawn = swapchain
        .clear(&mut encoder, wgpu::Color::BLACK, |pass| {
            entities.draw(pass, &resources.meshes, &view_group)
        })
        .unwrap();
    queue.submit(std::iter::once(encoder.finish()));
    assert_eq!(drawn, 1);
}

#[test]
fn shared_bindings_are_visible_to_both_stages() {
    let Some((device, _queue)) = headless() else {
        eprintln!("No adapter available, skipping.");
        return;
    };
    let shader = ShaderDescriptor::compile(&device, TEXTURED_SHADER).unwrap();
    let object = shader.group(1).unwrap();
    assert_eq!(object.entries.len(), 3);
    assert_eq!(
        object.entry("mdl_m").map(|e| e.visibility),
        Some(wgpu::ShaderStages::VERTEX_FRAGMENT)
    );
    assert_eq!(
        object.entry("t_albedo").map(|e| e.visibility),
        Some(wgpu::ShaderStages::FRAGMENT)
    );
}

#[test]
fn compile_errors_are_returned() {
    let Some((device, _queue)) = headless() else {
        eprintln!("No adapter available, skipping.");
        return;
    };
    let limit = device.limits().max_bind_groups;
    let too_far = SHADER.replace("@group(1)", &format!("@group({limit})"));
    assert!(matches!(
        ShaderDescriptor::compile(&device, &too_far),
        Err(ShaderError::TooManyGroups { index, .. }) if index == limit
    ));

    let broken = SHADER.replace("return vec4f(1.0, 0.5, 0.0, 1.0);", "return undefined_colour;");
    assert!(matches!(
        ShaderDescriptor::compile(&device, &broken),
        Err(ShaderError::Rejected { shader, .. }) if shader == "flat"
    ));
}

#[test]
fn textured_instance_draws_only_while_baked() {
    let Some((device, queue)) = headless() else {
        eprintln!("No adapter available, skipping.");
        return;
    };
    let gpu = GpuHandle::new(&device, &queue);
    let shader = Arc::new(ShaderDescriptor::compile(&device, TEXTURED_SHADER).unwrap());

    let scene = SceneData::from_glb(&textured_glb()).unwrap();
    let mut resources = futures::executor::block_on(SceneContext::load(&scene)).unwrap();
    assert!(resources.texture_view(0).is_err());
    // the image and the mesh
    assert_eq!(resources.store_all(&device, &queue), 2);
    assert_eq!(resources.store_all(&device, &queue), 0);
    assert!(resources.texture_view(0).is_ok());
    assert!(resources.sampler(0).is_ok());

    let mesh = resources.mesh_uid(0).unwrap();
    let albedo = resources.mesh(0).and_then(|m| m.albedo).unwrap();
    let mut entities = EntityRegistry::new();
    let uid = entities.spawn();
    entities
        .attach_renderable(gpu, uid, mesh, shader.clone(), FORMAT)
        .unwrap();

    let mut view = View::default();
    view.set_aspect(1.0);
    view.bind(&gpu);
    let view_group = view.bind_group(&device, &shader).unwrap();
    let swapchain = Swapchain::new(&device, FORMAT, [64, 64]);
    let draw = |entities: &EntityRegistry| {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("test_encoder"),
        });
        let drawn = swapchain.clear(&mut encoder, wgpu::Color::BLACK, |pass| {
            entities.draw(pass, &resources.meshes, &view_group)
        });
        queue.submit(std::iter::once(encoder.finish()));
        drawn
    };

    assert!(matches!(
        draw(&entities),
        Err(RenderError::NotBaked { mesh: m }) if m == mesh
    ));

    let instance = entities.instance_mut(uid).unwrap();
    let sampler = resources.sampler(albedo).unwrap().clone();
    assert!(matches!(
        instance.set(Tag::AlbedoTexture, GpuResource::Sampler(sampler)),
        Err(RenderError::Shader(ShaderError::ResourceMismatch {
            expected: BindingKind::Texture,
            found: BindingKind::Sampler,
            ..
        }))
    ));
    instance.set_albedo(&resources, albedo).unwrap();
    instance.bake(&device).unwrap();
    assert!(instance.is_baked());
    entities.update(gpu);
    assert_eq!(draw(&entities).unwrap(), 1);

    let instance = entities.instance_mut(uid).unwrap();
    instance.set_albedo(&resources, albedo).unwrap();
    assert!(!instance.is_baked());
    assert!(matches!(
        draw(&entities),
        Err(RenderError::NotBaked { .. })
    ));
}
