//! Scene nodes and renderable payloads

use slotmap::new_key_type;

use crate::render::backend::{GpuBackend, MeshHandle, RenderResult};
use crate::render::material::MaterialId;
use crate::scene::bounds::AABB;
use crate::scene::lod::LodGroup;
use crate::scene::transform::Transform;

new_key_type! {
    /// Stable handle of a node inside a [`crate::scene::Scene`]
    pub struct NodeId;
}

/// Anything a scene node can draw.
///
/// The traversal only needs bounds and a visibility verdict; drawing is
/// handed the mesh picked by level-of-detail selection.
pub trait Renderable: std::fmt::Debug {
    /// Bounds in the node's local space
    fn local_bounds(&self) -> AABB;

    /// Whether the underlying resources are usable
    fn is_valid(&self) -> bool {
        true
    }

    /// Whether the payload wants to be drawn this frame
    fn should_render(&self) -> bool {
        self.is_valid()
    }

    /// Base mesh used when no level of detail applies
    fn mesh(&self) -> MeshHandle;

    /// Material the payload is drawn with
    fn material(&self) -> Option<MaterialId>;

    /// Level-of-detail group, if the payload has one
    fn lod_group(&self) -> Option<&LodGroup> {
        None
    }

    /// Mutable level-of-detail group (selection with hysteresis is stateful)
    fn lod_group_mut(&mut self) -> Option<&mut LodGroup> {
        None
    }

    /// Issue the draw call for `mesh`. The model matrix is already set.
    fn draw(&self, backend: &mut dyn GpuBackend, mesh: MeshHandle) -> RenderResult<()> {
        backend.draw_mesh(mesh)
    }
}

/// Mesh plus material reference, the standard renderable payload
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    /// Base mesh
    pub mesh: MeshHandle,
    /// Material used for every level
    pub material: Option<MaterialId>,
    /// Local-space bounds of the base mesh
    pub bounds: AABB,
    /// Optional detail levels
    pub lod: Option<LodGroup>,
    /// Per-renderer visibility switch
    pub visible: bool,
}

impl MeshRenderer {
    /// Create a visible renderer without LOD
    pub fn new(mesh: MeshHandle, material: Option<MaterialId>, bounds: AABB) -> Self {
        Self {
            mesh,
            material,
            bounds,
            lod: None,
            visible: true,
        }
    }

    /// Attach a level-of-detail group
    pub fn with_lod(mut self, lod: LodGroup) -> Self {
        self.lod = Some(lod);
        self
    }
}

impl Renderable for MeshRenderer {
    fn local_bounds(&self) -> AABB {
        self.bounds
    }

    fn is_valid(&self) -> bool {
        self.bounds.is_valid()
    }

    fn should_render(&self) -> bool {
        self.visible && self.is_valid()
    }

    fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    fn material(&self) -> Option<MaterialId> {
        self.material
    }

    fn lod_group(&self) -> Option<&LodGroup> {
        self.lod.as_ref()
    }

    fn lod_group_mut(&mut self) -> Option<&mut LodGroup> {
        self.lod.as_mut()
    }
}

/// One node of the scene hierarchy
///
/// The parent link and child list are arena handles owned by the
/// [`crate::scene::Scene`]; a node owns its subtree.
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) name: String,
    pub(crate) transform: Transform,
    pub(crate) renderable: Option<Box<dyn Renderable>>,
    pub(crate) world_bounds: AABB,
    pub(crate) bounds_dirty: bool,
    pub(crate) enabled: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) tag: i32,
}

impl SceneNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            renderable: None,
            world_bounds: AABB::empty(),
            bounds_dirty: true,
            enabled: true,
            parent: None,
            children: Vec::new(),
            tag: 0,
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Attached renderable
    pub fn renderable(&self) -> Option<&dyn Renderable> {
        self.renderable.as_deref()
    }

    /// Own enabled flag (ancestors are not considered)
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Parent handle; `None` only for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child handles in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Integer classification tag
    pub fn tag(&self) -> i32 {
        self.tag
    }

    /// Set the classification tag
    pub fn set_tag(&mut self, tag: i32) {
        self.tag = tag;
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
