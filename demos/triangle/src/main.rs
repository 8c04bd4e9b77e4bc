use std::{sync::Arc, time::Duration};

use scene_ngin::{
    Context, EngineConfig, Loads, Sketch, WindowEvent,
    cgmath::{Quaternion, Rad, Rotation3},
    data_structures::{components::View, entity::EntityRegistry, uid::Uid},
    flow,
    render::RenderError,
    resources::{SceneContext, SceneData, io},
    shader::ShaderDescriptor,
    wgpu,
};

#[derive(Default)]
struct Triangle {
    shader_text: Option<String>,
    scene: Option<(SceneData, SceneContext)>,
    entities: EntityRegistry,
    spinning: Vec<Uid>,
    view: View,
    view_group: Option<wgpu::BindGroup>,
    angle: f32,
}

impl Sketch for Triangle {
    fn on_load(&mut self, _ctx: &mut Context, loads: &mut Loads<Self>) -> anyhow::Result<()> {
        loads.spawn(io::load_string("flat.shader.json"), |sketch: &mut Self, _, text| {
            sketch.shader_text = Some(text);
            Ok(())
        });
        loads.spawn(io::load_scene("triangle.glb"), |sketch: &mut Self, _, scene| {
            sketch.scene = Some(scene);
            Ok(())
        });
        Ok(())
    }

    fn on_start(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        let text = self
            .shader_text
            .take()
            .ok_or_else(|| anyhow::anyhow!("shader did not load"))?;
        let shader = Arc::new(ShaderDescriptor::compile(&ctx.device, &text)?);
        let (scene, resources) = self
            .scene
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("scene did not load"))?;
        resources.store_all(&ctx.device, &ctx.queue);

        let mut nodes = Vec::new();
        scene.traverse(None, |node, mesh| nodes.push((node.matrix, mesh)))?;
        for (matrix, mesh) in nodes {
            let Some(mesh) = mesh.and_then(|m| resources.mesh_uid(m)) else {
                continue;
            };
            let uid = self.entities.spawn();
            let instance =
                self.entities
                    .attach_renderable(ctx.gpu(), uid, mesh, shader.clone(), ctx.format())?;
            instance.bake(&ctx.device)?;
            if let Some(transform) = self.entities.get_mut(uid).and_then(|e| e.transform_mut()) {
                transform.set_shift(matrix.w.truncate());
            }
            self.spinning.push(uid);
        }

        self.view.set_aspect(ctx.aspect());
        self.view.bind(&ctx.gpu());
        self.view_group = Some(self.view.bind_group(&ctx.device, &shader)?);
        Ok(())
    }

    fn on_pulse(&mut self, ctx: &mut Context, dt: Duration) {
        self.angle += dt.as_secs_f32();
        for uid in &self.spinning {
            if let Some(transform) = self.entities.get_mut(*uid).and_then(|e| e.transform_mut()) {
                transform.set_twist(Quaternion::from_angle_y(Rad(self.angle)));
            }
        }
        self.entities.update(ctx.gpu());
    }

    fn on_render(&self, _ctx: &Context, pass: &mut wgpu::RenderPass<'_>) -> Result<(), RenderError> {
        let (Some((_, resources)), Some(view_group)) = (&self.scene, &self.view_group) else {
            return Ok(());
        };
        self.entities.draw(pass, &resources.meshes, view_group)?;
        Ok(())
    }

    fn on_window_event(&mut self, ctx: &mut Context, event: &WindowEvent) {
        if let WindowEvent::Resized(_) = event {
            self.view.set_aspect(ctx.aspect());
            self.view.bind(&ctx.gpu());
        }
    }
}

fn main() -> anyhow::Result<()> {
    flow::run(
        Triangle::default(),
        EngineConfig {
            title: "triangle".to_string(),
            ..EngineConfig::default()
        },
    )
}
