//! Render context: per-frame uniforms and draw-list dispatch
//!
//! The context snapshots camera state once per frame, orders the visible
//! list into a [`RenderQueue`] and issues draws through a [`GpuBackend`].
//! Opaque geometry is drawn front-to-back, transparent geometry
//! back-to-front, and each material is bound once per run of consecutive
//! entries sharing it.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec2, Vec3};
use crate::render::backend::{GpuBackend, RenderResult, ShaderValue};
use crate::render::camera::Camera;
use crate::render::material::{MaterialId, MaterialLibrary, RenderMode};
use crate::scene::scene_graph::{Scene, VisibleRenderer};

/// Name of the uniform block holding [`GlobalUniforms`]
pub const GLOBAL_UNIFORM_BLOCK: &str = "GlobalUniforms";

/// Frame-global values shared by every program, laid out for std140
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    /// Seconds since start
    pub time: f32,
    /// Frame counter
    pub frame: u32,
    /// Viewport size in pixels
    pub viewport: [f32; 2],
}

impl GlobalUniforms {
    /// Snapshot for one frame
    pub fn new(time: f32, frame: u32, width: u32, height: u32) -> Self {
        Self {
            time,
            frame,
            viewport: [width as f32, height as f32],
        }
    }
}

/// Camera matrices captured at the start of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct CameraUniforms {
    /// World-to-view
    pub view: Mat4,
    /// View-to-clip
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Eye position
    pub position: Vec3,
    /// Near and far clip distances
    pub near_far: Vec2,
}

impl CameraUniforms {
    /// Capture the camera's current matrices
    pub fn from_camera(camera: &mut Camera) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            view_projection: camera.view_projection_matrix(),
            position: camera.position(),
            near_far: Vec2::new(camera.near(), camera.far()),
        }
    }
}

/// A run of consecutive draw-list entries sharing one material
#[derive(Debug, Clone)]
pub struct RenderBatch {
    /// Material used by all entries
    pub material: MaterialId,
    /// Entries in draw order
    pub entries: Vec<VisibleRenderer>,
}

/// Draw list split into opaque and transparent passes
#[derive(Debug, Default)]
pub struct RenderQueue {
    /// Opaque and cutout runs, front-to-back
    opaque_batches: Vec<RenderBatch>,
    /// Translucent and additive runs, back-to-front
    transparent_batches: Vec<RenderBatch>,
}

impl RenderQueue {
    /// Order a visible list by pass and distance
    pub fn from_visible(visible: &[VisibleRenderer], materials: &MaterialLibrary) -> Self {
        let mode_of = |entry: &VisibleRenderer| {
            materials
                .get(entry.material.unwrap_or(MaterialId::DEFAULT))
                .map_or(RenderMode::Opaque, |material| material.mode)
        };

        let (mut transparent, mut opaque): (Vec<&VisibleRenderer>, Vec<&VisibleRenderer>) =
            visible.iter().partition(|entry| mode_of(entry).is_transparent());

        // Front-to-back for early depth rejection
        opaque.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
        // Back-to-front for correct blending
        transparent.sort_by(|a, b| b.distance_sq.total_cmp(&a.distance_sq));

        Self {
            opaque_batches: Self::batch_runs(&opaque),
            transparent_batches: Self::batch_runs(&transparent),
        }
    }

    /// Group consecutive entries with the same material, preserving order
    fn batch_runs(entries: &[&VisibleRenderer]) -> Vec<RenderBatch> {
        let mut batches: Vec<RenderBatch> = Vec::new();
        for entry in entries {
            let material = entry.material.unwrap_or(MaterialId::DEFAULT);
            match batches.last_mut() {
                Some(batch) if batch.material == material => batch.entries.push((*entry).clone()),
                _ => batches.push(RenderBatch {
                    material,
                    entries: vec![(*entry).clone()],
                }),
            }
        }
        batches
    }

    /// Opaque runs
    pub fn opaque_batches(&self) -> &[RenderBatch] {
        &self.opaque_batches
    }

    /// Transparent runs
    pub fn transparent_batches(&self) -> &[RenderBatch] {
        &self.transparent_batches
    }

    /// Every run, opaque first
    pub fn batches(&self) -> impl Iterator<Item = &RenderBatch> {
        self.opaque_batches.iter().chain(self.transparent_batches.iter())
    }

    /// Total number of entries
    pub fn total_object_count(&self) -> usize {
        self.batches().map(|batch| batch.entries.len()).sum()
    }
}

/// Counters of one [`RenderContext::render_visible`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Mesh draws issued
    pub draw_calls: usize,
    /// Material binds issued
    pub material_binds: usize,
    /// Entries skipped because their material or renderable was unusable
    pub skipped: usize,
}

/// Per-frame rendering state shared by every draw
#[derive(Debug, Default)]
pub struct RenderContext {
    camera: Option<CameraUniforms>,
    globals: GlobalUniforms,
}

impl RenderContext {
    /// Create an idle context
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture camera and global uniforms for the frame
    pub fn begin_frame(&mut self, camera: &mut Camera, globals: GlobalUniforms) {
        self.camera = Some(CameraUniforms::from_camera(camera));
        self.globals = globals;
    }

    /// Drop the frame snapshot
    pub fn end_frame(&mut self) {
        self.camera = None;
    }

    /// Camera snapshot of the current frame
    pub fn camera_uniforms(&self) -> Option<&CameraUniforms> {
        self.camera.as_ref()
    }

    /// Global uniforms of the current frame
    pub fn globals(&self) -> &GlobalUniforms {
        &self.globals
    }

    /// Upload the global block as raw bytes
    pub fn upload_globals(&self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        backend.upload_uniform_block(GLOBAL_UNIFORM_BLOCK, bytemuck::bytes_of(&self.globals))
    }

    /// Set camera and global uniforms on the program in use
    pub fn apply_camera(&self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        if let Some(camera) = &self.camera {
            backend.set_parameter("u_view", ShaderValue::Mat4(camera.view))?;
            backend.set_parameter("u_projection", ShaderValue::Mat4(camera.projection))?;
            backend.set_parameter("u_viewProjection", ShaderValue::Mat4(camera.view_projection))?;
            backend.set_parameter("u_cameraPos", ShaderValue::Vec3(camera.position))?;
            backend.set_parameter("u_nearFar", ShaderValue::Vec2(camera.near_far))?;
        }
        backend.set_parameter("u_time", ShaderValue::Float(self.globals.time))?;
        backend.set_parameter("u_frame", ShaderValue::Int(i32::try_from(self.globals.frame).unwrap_or(i32::MAX)))?;
        backend.set_parameter("u_viewport", ShaderValue::Vec2(self.globals.viewport.into()))?;
        Ok(())
    }

    /// Draw a visible list.
    ///
    /// Entries whose material is not compiled are skipped with a warning;
    /// backend failures on a draw abort the pass.
    pub fn render_visible(
        &self,
        backend: &mut dyn GpuBackend,
        scene: &Scene,
        materials: &MaterialLibrary,
        visible: &[VisibleRenderer],
    ) -> RenderResult<DrawStats> {
        let queue = RenderQueue::from_visible(visible, materials);
        let mut stats = DrawStats::default();

        for batch in queue.batches() {
            let Some(material) = materials.get(batch.material).filter(|m| m.is_ready(&*backend)) else {
                log::warn!("Skipping {} draws with unusable material {:?}", batch.entries.len(), batch.material);
                stats.skipped += batch.entries.len();
                continue;
            };
            material.bind(backend)?;
            self.apply_camera(backend)?;
            stats.material_binds += 1;

            for entry in &batch.entries {
                let Some(renderable) = scene.node(entry.node).and_then(|node| node.renderable()) else {
                    stats.skipped += 1;
                    continue;
                };
                backend.set_parameter("u_model", ShaderValue::Mat4(entry.world_matrix))?;
                renderable.draw(backend, entry.mesh)?;
                stats.draw_calls += 1;
            }
        }

        log::trace!(
            "Rendered {} draws with {} material binds ({} skipped)",
            stats.draw_calls,
            stats.material_binds,
            stats.skipped
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{MeshHandle, ProgramHandle};
    use crate::render::material::Material;
    use crate::render::software::{BackendCommand, SoftwareBackend};
    use crate::scene::bounds::AABB;
    use crate::scene::node::{MeshRenderer, NodeId};

    fn entry(node: NodeId, material: Option<MaterialId>, distance_sq: f32) -> VisibleRenderer {
        VisibleRenderer {
            node,
            world_matrix: Mat4::identity(),
            mesh: MeshHandle(1),
            lod_level: None,
            material,
            distance_sq,
        }
    }

    #[test]
    fn test_global_uniforms_are_pod() {
        let globals = GlobalUniforms::new(1.5, 7, 640, 480);
        let bytes = bytemuck::bytes_of(&globals);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytemuck::pod_read_unaligned::<GlobalUniforms>(bytes), globals);
    }

    #[test]
    fn test_queue_orders_by_pass_and_distance() {
        let mut materials = MaterialLibrary::new();
        let glass = materials.add(Material::flat("glass", [1.0; 4], RenderMode::Translucent));
        let mut scene = Scene::new();
        let nodes: Vec<_> = (0..4).map(|i| scene.create_node(format!("n{i}"))).collect();

        let visible = vec![
            entry(nodes[0], None, 50.0),
            entry(nodes[1], Some(glass), 10.0),
            entry(nodes[2], None, 5.0),
            entry(nodes[3], Some(glass), 90.0),
        ];
        let queue = RenderQueue::from_visible(&visible, &materials);

        let opaque: Vec<_> = queue.opaque_batches()[0].entries.iter().map(|e| e.node).collect();
        assert_eq!(opaque, vec![nodes[2], nodes[0]]);
        let transparent: Vec<_> = queue.transparent_batches()[0].entries.iter().map(|e| e.node).collect();
        assert_eq!(transparent, vec![nodes[3], nodes[1]]);
        assert_eq!(queue.total_object_count(), 4);
    }

    #[test]
    fn test_material_bound_once_per_run() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut materials = MaterialLibrary::new();
        let red = materials.add(Material::flat("red", [1.0, 0.0, 0.0, 1.0], RenderMode::Opaque));
        materials.compile_all(&mut backend).unwrap();

        let mut scene = Scene::new();
        let mesh = backend.register_mesh([1.0; 4]);
        let mut visible = Vec::new();
        for (index, (material, distance)) in [(Some(red), 1.0), (Some(red), 2.0), (None, 3.0)].into_iter().enumerate() {
            let node = scene.create_node(format!("n{index}"));
            let payload = MeshRenderer::new(mesh, material, AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(1.0)));
            scene.set_renderable(node, Box::new(payload)).unwrap();
            let mut item = entry(node, material, distance);
            item.mesh = mesh;
            visible.push(item);
        }

        let mut camera = Camera::new();
        let mut context = RenderContext::new();
        context.begin_frame(&mut camera, GlobalUniforms::new(0.0, 1, 4, 4));
        let stats = context.render_visible(&mut backend, &scene, &materials, &visible).unwrap();

        assert_eq!(stats, DrawStats { draw_calls: 3, material_binds: 2, skipped: 0 });
        let uses: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|command| match command {
                BackendCommand::UseProgram(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(uses, vec!["red", "default"]);
    }

    #[test]
    fn test_apply_camera_sets_named_uniforms() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut materials = MaterialLibrary::new();
        materials.compile_all(&mut backend).unwrap();
        let material = materials.get(MaterialId::DEFAULT).unwrap();
        material.bind(&mut backend).unwrap();

        let mut camera = Camera::new();
        camera.look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros());
        let mut context = RenderContext::new();
        context.begin_frame(&mut camera, GlobalUniforms::new(2.0, 3, 4, 4));
        context.apply_camera(&mut backend).unwrap();
        context.upload_globals(&mut backend).unwrap();

        let program: ProgramHandle = material.program().unwrap();
        assert_eq!(
            backend.program_parameter(program, "u_cameraPos"),
            Some(&ShaderValue::Vec3(Vec3::new(0.0, 2.0, 5.0)))
        );
        assert_eq!(backend.program_parameter(program, "u_frame"), Some(&ShaderValue::Int(3)));
        assert!(backend.program_parameter(program, "u_viewProjection").is_some());
        assert_eq!(backend.uniform_block(GLOBAL_UNIFORM_BLOCK).map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_uncompiled_material_is_skipped() {
        let mut backend = SoftwareBackend::new(4, 4);
        let materials = MaterialLibrary::new();
        let mut scene = Scene::new();
        let node = scene.create_node("n");

        let context = RenderContext::new();
        let stats = context
            .render_visible(&mut backend, &scene, &materials, &[entry(node, None, 1.0)])
            .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.draw_calls, 0);
    }
}
