//! Scene graph arena and visibility traversal
//!
//! Nodes live in a slot map and refer to each other by [`NodeId`]. The
//! scene owns a root node that is never removed or reparented; every other
//! node is a descendant of it.
//!
//! ## Cache invalidation
//!
//! - Changing a node's transform or parent marks the world matrix of the
//!   node and every descendant dirty, and marks bounds dirty on the same
//!   subtree plus every ancestor.
//! - A node's world bounds are the union of its own renderable bounds
//!   (all eight corners transformed by the world matrix) and the world
//!   bounds of its enabled children, so a parent's box always encloses
//!   its subtree.

use std::f32::consts::FRAC_PI_2;

use slotmap::SlotMap;
use thiserror::Error;

use crate::core::config::CullingConfig;
use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::render::backend::MeshHandle;
use crate::render::camera::Camera;
use crate::render::material::MaterialId;
use crate::scene::bounds::AABB;
use crate::scene::frustum::Frustum;
use crate::scene::node::{NodeId, Renderable, SceneNode};
use crate::scene::transform::Transform;

/// Structural errors of the scene hierarchy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Reparenting would make a node its own ancestor
    #[error("Cannot parent {child:?} under {parent:?}: it would create a cycle")]
    HierarchyCycle {
        /// Node being reparented
        child: NodeId,
        /// Requested parent
        parent: NodeId,
    },

    /// Handle does not refer to a live node
    #[error("No scene node {0:?}")]
    NoSuchNode(NodeId),

    /// The root node cannot be removed or reparented
    #[error("The scene root cannot be removed or reparented")]
    RootImmutable,
}

/// Result alias for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Counters of the last visibility traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullingStats {
    /// Active nodes reached by the traversal
    pub visited: usize,
    /// Nodes that passed the frustum test
    pub visible: usize,
    /// Nodes rejected by the frustum test (their subtrees are skipped)
    pub culled: usize,
    /// Renderables dropped by level-of-detail selection
    pub lod_culled: usize,
}

/// One entry of the draw list produced by [`Scene::collect_visible_renderers`]
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRenderer {
    /// Node carrying the renderable
    pub node: NodeId,
    /// Node's world matrix at traversal time
    pub world_matrix: Mat4,
    /// Mesh to draw, after level-of-detail selection
    pub mesh: MeshHandle,
    /// Selected level, `None` when the renderable has no LOD group
    pub lod_level: Option<usize>,
    /// Material of the renderable
    pub material: Option<MaterialId>,
    /// Squared distance from the eye to the renderable's bounds centre
    pub distance_sq: f32,
}

/// Camera-derived inputs of a traversal
#[derive(Debug, Clone)]
pub struct CullView {
    /// Frustum to test against; `None` disables frustum culling
    pub frustum: Option<Frustum>,
    /// Eye position for distance computation
    pub eye: Vec3,
    /// Vertical field of view used by coverage-based LOD
    pub fov_y: f32,
}

impl CullView {
    /// Snapshot the camera's frustum, eye and field of view
    pub fn from_camera(camera: &mut Camera) -> Self {
        Self {
            frustum: Some(camera.frustum().clone()),
            eye: camera.position(),
            fov_y: camera.vertical_fov().unwrap_or(FRAC_PI_2),
        }
    }
}

/// Hierarchical scene of transform nodes
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    culling: CullingConfig,
    stats: CullingStats,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene containing only the root node
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("root"));
        Self {
            nodes,
            root,
            culling: CullingConfig::default(),
            stats: CullingStats::default(),
        }
    }

    /// Create a scene with explicit culling switches
    pub fn with_culling(culling: CullingConfig) -> Self {
        let mut scene = Self::new();
        scene.culling = culling;
        scene
    }

    /// Root handle
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Culling switches
    pub fn culling(&self) -> &CullingConfig {
        &self.culling
    }

    /// Replace the culling switches
    pub fn set_culling(&mut self, culling: CullingConfig) {
        self.culling = culling;
    }

    /// Counters of the last traversal
    pub fn stats(&self) -> CullingStats {
        self.stats
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Whether a handle refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Borrow a node mutably (name and tag only; transforms go through the scene)
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Create a node under the root
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let root = self.root;
        self.insert_child(root, SceneNode::new(name))
    }

    /// Create a node under an existing parent
    pub fn create_child(&mut self, parent: NodeId, name: impl Into<String>) -> SceneResult<NodeId> {
        self.require(parent)?;
        Ok(self.insert_child(parent, SceneNode::new(name)))
    }

    fn insert_child(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
        }
        self.invalidate_subtree(id);
        self.invalidate_bounds(parent);
        id
    }

    /// Remove a node and its whole subtree
    pub fn remove_node(&mut self, id: NodeId) -> SceneResult<()> {
        if id == self.root {
            return Err(SceneError::RootImmutable);
        }
        let parent = self.require(id)?.parent;

        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|&child| child != id);
            }
            self.invalidate_bounds(parent);
        }

        let doomed = self.subtree(id);
        for node in &doomed {
            self.nodes.remove(*node);
        }
        log::trace!("Removed scene node {:?} ({} nodes)", id, doomed.len());
        Ok(())
    }

    /// Move `child` under `parent` (`None` means the root).
    ///
    /// Fails without changing anything if `parent` is `child` or one of its
    /// descendants.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> SceneResult<()> {
        if child == self.root {
            return Err(SceneError::RootImmutable);
        }
        let parent = parent.unwrap_or(self.root);
        let old_parent = self.require(child)?.parent;
        self.require(parent)?;

        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::HierarchyCycle { child, parent });
        }
        if old_parent == Some(parent) {
            return Ok(());
        }

        if let Some(old) = old_parent {
            if let Some(old_node) = self.nodes.get_mut(old) {
                old_node.children.retain(|&existing| existing != child);
            }
            self.invalidate_bounds(old);
        }
        if let Some(new_parent) = self.nodes.get_mut(parent) {
            new_parent.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }

        self.invalidate_subtree(child);
        self.invalidate_bounds(parent);
        log::trace!("Reparented scene node {:?} under {:?}", child, parent);
        Ok(())
    }

    /// Whether `ancestor` is `node` or lies on its parent chain
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Set local position
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> SceneResult<()> {
        self.modify_transform(id, |transform| transform.set_position(position))
    }

    /// Set local rotation
    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> SceneResult<()> {
        self.modify_transform(id, |transform| transform.set_rotation(rotation))
    }

    /// Set local scale
    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> SceneResult<()> {
        self.modify_transform(id, |transform| transform.set_scale(scale))
    }

    /// Mutate a node's local transform and invalidate everything depending on it
    pub fn modify_transform(&mut self, id: NodeId, edit: impl FnOnce(&mut Transform)) -> SceneResult<()> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NoSuchNode(id))?;
        edit(&mut node.transform);
        node.transform.mark_local_dirty();
        self.invalidate_subtree(id);
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            self.invalidate_bounds(parent);
        }
        Ok(())
    }

    /// Attach or replace a node's renderable
    pub fn set_renderable(&mut self, id: NodeId, renderable: Box<dyn Renderable>) -> SceneResult<()> {
        self.require_mut(id)?.renderable = Some(renderable);
        self.invalidate_bounds(id);
        Ok(())
    }

    /// Detach a node's renderable
    pub fn take_renderable(&mut self, id: NodeId) -> SceneResult<Option<Box<dyn Renderable>>> {
        let renderable = self.require_mut(id)?.renderable.take();
        self.invalidate_bounds(id);
        Ok(renderable)
    }

    /// Mutable access to a node's renderable. Bounds are invalidated since
    /// the payload may change its local bounds.
    pub fn renderable_mut(&mut self, id: NodeId) -> Option<&mut (dyn Renderable + 'static)> {
        self.invalidate_bounds(id);
        self.nodes.get_mut(id)?.renderable.as_deref_mut()
    }

    /// Enable or disable a node; a disabled node hides its whole subtree
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> SceneResult<()> {
        let node = self.require_mut(id)?;
        if node.enabled == enabled {
            return Ok(());
        }
        node.enabled = enabled;
        let parent = node.parent;
        if let Some(parent) = parent {
            self.invalidate_bounds(parent);
        }
        Ok(())
    }

    /// Own flag AND every ancestor's flag
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        let mut seen_any = false;
        while let Some(node_id) = current {
            match self.nodes.get(node_id) {
                Some(node) if node.enabled => {
                    seen_any = true;
                    current = node.parent;
                }
                _ => return false,
            }
        }
        seen_any
    }

    /// World matrix of a node, resolving dirty ancestors on the way
    pub fn world_matrix(&mut self, id: NodeId) -> SceneResult<Mat4> {
        self.require(id)?;
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            chain.push(node_id);
            current = self.nodes.get(node_id).and_then(|n| n.parent);
        }

        let mut parent_world: Option<Mat4> = None;
        for node_id in chain.into_iter().rev() {
            if let Some(node) = self.nodes.get_mut(node_id) {
                parent_world = Some(node.transform.resolve_world(parent_world.as_ref()));
            }
        }
        Ok(parent_world.unwrap_or_else(Mat4::identity))
    }

    /// Resolve every dirty world matrix, parents before children
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeId, Option<Mat4>)> = vec![(self.root, None)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let world = node.transform.resolve_world(parent_world.as_ref());
            stack.extend(node.children.iter().map(|&child| (child, Some(world))));
        }
    }

    /// World-space bounds of a node and its enabled subtree
    pub fn world_bounds(&mut self, id: NodeId) -> SceneResult<AABB> {
        self.require(id)?;
        self.update_world_matrices();
        Ok(self.refresh_bounds(id))
    }

    /// Mark a node's bounds and every ancestor's bounds stale
    pub fn invalidate_bounds(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get_mut(node_id) {
                Some(node) => {
                    node.bounds_dirty = true;
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    /// Recompute dirty bounds bottom-up. World matrices must be resolved.
    fn refresh_bounds(&mut self, id: NodeId) -> AABB {
        let (dirty, children) = match self.nodes.get(id) {
            Some(node) => (node.bounds_dirty, node.children.clone()),
            None => return AABB::empty(),
        };
        if !dirty {
            return self.nodes.get(id).map_or_else(AABB::empty, |node| node.world_bounds);
        }

        let mut bounds = AABB::empty();
        for child in children {
            let child_bounds = self.refresh_bounds(child);
            if self.nodes.get(child).is_some_and(|node| node.enabled) {
                bounds.expand_to_include_aabb(&child_bounds);
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            if let Some(renderable) = node.renderable.as_deref() {
                let local = renderable.local_bounds();
                bounds.expand_to_include_aabb(&local.transformed(node.transform.cached_world_matrix()));
            }
            node.world_bounds = bounds;
            node.bounds_dirty = false;
        }
        bounds
    }

    fn invalidate_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.transform.mark_world_dirty();
                node.bounds_dirty = true;
                stack.extend_from_slice(&node.children);
            }
        }
    }

    /// The node and all of its descendants in pre-order
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.get(node_id) {
                result.push(node_id);
                stack.extend(node.children.iter().rev());
            }
        }
        result
    }

    /// All descendants of a node in pre-order (the node itself excluded)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = self.subtree(id);
        if !nodes.is_empty() {
            nodes.remove(0);
        }
        nodes
    }

    /// Visit a subtree depth-first in pre-order
    pub fn visit_depth_first(&self, id: NodeId, mut visitor: impl FnMut(NodeId, &SceneNode)) {
        for node_id in self.subtree(id) {
            if let Some(node) = self.nodes.get(node_id) {
                visitor(node_id, node);
            }
        }
    }

    /// First node with the given name in pre-order
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .find(|&id| self.nodes.get(id).is_some_and(|node| node.name == name))
    }

    /// Every node carrying the tag, in pre-order
    pub fn find_by_tag(&self, tag: i32) -> Vec<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .filter(|&id| self.nodes.get(id).is_some_and(|node| node.tag == tag))
            .collect()
    }

    /// Build the draw list for a camera
    pub fn collect_visible_renderers(&mut self, camera: &mut Camera) -> Vec<VisibleRenderer> {
        let view = CullView::from_camera(camera);
        self.collect_visible(&view)
    }

    /// Build the draw list for an explicit view.
    ///
    /// Pre-order traversal from the root that skips disabled subtrees and
    /// subtrees whose bounds fail the frustum test. Renderables that pass
    /// get their LOD level selected; a `None` selection drops the
    /// renderable but its children are still visited.
    pub fn collect_visible(&mut self, view: &CullView) -> Vec<VisibleRenderer> {
        self.stats = CullingStats::default();
        self.update_world_matrices();
        let root = self.root;
        self.refresh_bounds(root);

        let frustum = view.frustum.as_ref().filter(|_| self.culling.frustum_culling);
        let use_lod = self.culling.lod;
        let mut stats = CullingStats::default();
        let mut visible = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if !node.enabled {
                continue;
            }
            stats.visited += 1;

            if let Some(frustum) = frustum {
                if node.world_bounds.is_valid() && !frustum.intersects_aabb(&node.world_bounds) {
                    stats.culled += 1;
                    continue;
                }
            }
            stats.visible += 1;

            let world_matrix = *node.transform.cached_world_matrix();
            if let Some(renderable) = node.renderable.as_deref_mut().filter(|r| r.should_render()) {
                let own_bounds = renderable.local_bounds().transformed(&world_matrix);
                let distance_sq = (own_bounds.center() - view.eye).norm_squared();
                let base_mesh = renderable.mesh();
                let material = renderable.material();

                let selection = match renderable.lod_group_mut().filter(|_| use_lod) {
                    Some(lod) => {
                        let radius = own_bounds.half_extents().norm();
                        let selection_distance = lod.selection_distance_sq(distance_sq, radius, view.fov_y);
                        lod.update(selection_distance)
                            .map(|level| (Some(level), lod.mesh_at(level).unwrap_or(base_mesh)))
                    }
                    None => Some((None, base_mesh)),
                };

                match selection {
                    Some((lod_level, mesh)) => visible.push(VisibleRenderer {
                        node: id,
                        world_matrix,
                        mesh,
                        lod_level,
                        material,
                        distance_sq,
                    }),
                    None => stats.lod_culled += 1,
                }
            }

            stack.extend(node.children.iter().rev());
        }

        log::debug!(
            "Scene traversal: {} visited, {} visible, {} culled, {} LOD-culled, {} draws",
            stats.visited,
            stats.visible,
            stats.culled,
            stats.lod_culled,
            visible.len()
        );
        self.stats = stats;
        visible
    }

    fn require(&self, id: NodeId) -> SceneResult<&SceneNode> {
        self.nodes.get(id).ok_or(SceneError::NoSuchNode(id))
    }

    fn require_mut(&mut self, id: NodeId) -> SceneResult<&mut SceneNode> {
        self.nodes.get_mut(id).ok_or(SceneError::NoSuchNode(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use crate::scene::lod::LodGroup;
    use crate::scene::node::MeshRenderer;
    use approx::assert_relative_eq;

    fn unit_box() -> AABB {
        AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(0.5))
    }

    fn renderer(mesh: u64) -> Box<MeshRenderer> {
        Box::new(MeshRenderer::new(MeshHandle(mesh), None, unit_box()))
    }

    /// Camera at the origin looking down -Z with a 90 degree vertical FOV
    fn origin_camera() -> Camera {
        let mut camera = Camera::new();
        camera.set_perspective(90.0, 1.0, 0.1, 500.0);
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        camera
    }

    #[test]
    fn test_child_world_position_composes() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        let child = scene.create_child(parent, "child").unwrap();
        scene.set_position(parent, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        scene.set_position(child, Vec3::new(5.0, 0.0, 0.0)).unwrap();

        let world = scene.world_matrix(child).unwrap();
        assert_relative_eq!(world.translation_part(), Vec3::new(15.0, 0.0, 0.0));

        let parent_world = scene.world_matrix(parent).unwrap();
        let child_local = scene.nodes[child].transform.clone().local_matrix();
        assert_relative_eq!(world, parent_world * child_local);
    }

    #[test]
    fn test_moving_parent_updates_descendants() {
        let mut scene = Scene::new();
        let base = scene.create_node("base");
        let arm = scene.create_child(base, "arm").unwrap();
        let tip = scene.create_child(arm, "tip").unwrap();
        scene.set_position(tip, Vec3::new(0.0, 1.0, 0.0)).unwrap();

        assert_relative_eq!(scene.world_matrix(tip).unwrap().translation_part(), Vec3::new(0.0, 1.0, 0.0));

        // Only the base is touched
        scene.set_position(base, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        assert!(scene.nodes[tip].transform.is_world_dirty());
        assert_relative_eq!(scene.world_matrix(tip).unwrap().translation_part(), Vec3::new(3.0, 1.0, 0.0));
    }

    #[test]
    fn test_child_created_under_resolved_parent() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        scene.set_position(parent, Vec3::new(0.0, 0.0, -20.0)).unwrap();
        scene.world_matrix(parent).unwrap();

        let child = scene.create_child(parent, "child").unwrap();
        assert_relative_eq!(scene.world_matrix(child).unwrap().translation_part(), Vec3::new(0.0, 0.0, -20.0));
    }

    #[test]
    fn test_untouched_child_follows_moved_parent() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        scene.world_matrix(parent).unwrap();
        let child = scene.create_child(parent, "child").unwrap();
        scene.update_world_matrices();

        scene.set_position(parent, Vec3::new(4.0, 0.0, 0.0)).unwrap();
        scene.update_world_matrices();
        assert_relative_eq!(scene.world_matrix(child).unwrap().translation_part(), Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_child_added_after_culling_pass_stays_visible() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        scene.set_position(parent, Vec3::new(0.0, 0.0, -20.0)).unwrap();
        let mut camera = origin_camera();
        assert!(scene.collect_visible_renderers(&mut camera).is_empty());

        let child = scene.create_child(parent, "child").unwrap();
        scene.set_renderable(child, renderer(1)).unwrap();
        camera.look_at(Vec3::new(0.0, 0.0, -15.0), Vec3::new(0.0, 0.0, -20.0));

        let visible = scene.collect_visible_renderers(&mut camera);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].node, child);
        assert_eq!(scene.stats().culled, 0);
    }

    #[test]
    fn test_turret_barrel_follows_rotating_base() {
        let mut scene = Scene::new();
        let base = scene.create_node("turret_base");
        let barrel = scene.create_child(base, "barrel").unwrap();
        scene.set_position(barrel, Vec3::new(0.0, 0.0, -2.0)).unwrap();
        scene.world_matrix(barrel).unwrap();

        scene
            .set_rotation(base, Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2))
            .unwrap();
        let world = scene.world_matrix(barrel).unwrap();
        assert_relative_eq!(world.translation_part(), Vec3::new(-2.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let mut scene = Scene::new();
        let a = scene.create_node("a");
        let b = scene.create_child(a, "b").unwrap();

        assert_eq!(
            scene.set_parent(a, Some(b)),
            Err(SceneError::HierarchyCycle { child: a, parent: b })
        );
        assert_eq!(scene.set_parent(a, Some(a)), Err(SceneError::HierarchyCycle { child: a, parent: a }));
        assert_eq!(scene.node(a).unwrap().parent(), Some(scene.root()));
        assert_eq!(scene.node(b).unwrap().parent(), Some(a));
        assert_eq!(scene.node(a).unwrap().children(), &[b]);
        assert_eq!(scene.set_parent(scene.root(), Some(a)), Err(SceneError::RootImmutable));
    }

    #[test]
    fn test_reparent_moves_world_position() {
        let mut scene = Scene::new();
        let left = scene.create_node("left");
        let right = scene.create_node("right");
        let item = scene.create_child(left, "item").unwrap();
        scene.set_position(left, Vec3::new(-5.0, 0.0, 0.0)).unwrap();
        scene.set_position(right, Vec3::new(5.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(scene.world_matrix(item).unwrap().translation_part(), Vec3::new(-5.0, 0.0, 0.0));
        scene.set_parent(item, Some(right)).unwrap();
        assert!(scene.node(left).unwrap().children().is_empty());
        assert_relative_eq!(scene.world_matrix(item).unwrap().translation_part(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_remove_node_is_recursive() {
        let mut scene = Scene::new();
        let a = scene.create_node("a");
        let b = scene.create_child(a, "b").unwrap();
        let c = scene.create_child(b, "c").unwrap();
        let other = scene.create_node("other");

        scene.remove_node(a).unwrap();
        assert!(!scene.contains(a) && !scene.contains(b) && !scene.contains(c));
        assert!(scene.contains(other));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.remove_node(scene.root()), Err(SceneError::RootImmutable));
        assert_eq!(scene.remove_node(a), Err(SceneError::NoSuchNode(a)));
    }

    #[test]
    fn test_active_in_hierarchy_follows_ancestors() {
        let mut scene = Scene::new();
        let a = scene.create_node("a");
        let b = scene.create_child(a, "b").unwrap();
        assert!(scene.is_active_in_hierarchy(b));

        scene.set_enabled(a, false).unwrap();
        assert!(scene.node(b).unwrap().is_enabled());
        assert!(!scene.is_active_in_hierarchy(b));
    }

    #[test]
    fn test_parent_bounds_enclose_children() {
        let mut scene = Scene::new();
        let group = scene.create_node("group");
        let near = scene.create_child(group, "near").unwrap();
        let far = scene.create_child(group, "far").unwrap();
        scene.set_renderable(near, renderer(1)).unwrap();
        scene.set_renderable(far, renderer(2)).unwrap();
        scene.set_position(far, Vec3::new(10.0, 0.0, 0.0)).unwrap();

        let bounds = scene.world_bounds(group).unwrap();
        assert_relative_eq!(bounds.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_relative_eq!(bounds.max, Vec3::new(10.5, 0.5, 0.5));

        // Child bounds changes propagate upward
        scene.set_position(far, Vec3::new(0.0, 20.0, 0.0)).unwrap();
        let bounds = scene.world_bounds(group).unwrap();
        assert_relative_eq!(bounds.max, Vec3::new(0.5, 20.5, 0.5));

        // Disabled children do not contribute
        scene.set_enabled(far, false).unwrap();
        let bounds = scene.world_bounds(group).unwrap();
        assert_relative_eq!(bounds.max, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_culled_subtree_is_not_visited() {
        let mut scene = Scene::new();
        let front = scene.create_node("front");
        scene.set_renderable(front, renderer(1)).unwrap();
        scene.set_position(front, Vec3::new(0.0, 0.0, -5.0)).unwrap();

        let behind = scene.create_node("behind");
        scene.set_position(behind, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        for index in 0..3 {
            let child = scene.create_child(behind, format!("behind_{index}")).unwrap();
            scene.set_renderable(child, renderer(10 + index)).unwrap();
        }

        let mut camera = origin_camera();
        let visible = scene.collect_visible_renderers(&mut camera);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].node, front);
        assert_relative_eq!(visible[0].distance_sq, 25.0, epsilon = 1e-4);

        let stats = scene.stats();
        // root, front, behind (culled before its children)
        assert_eq!(stats.visited, 3);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.visible, 2);
    }

    #[test]
    fn test_disabled_subtree_is_skipped() {
        let mut scene = Scene::new();
        let group = scene.create_node("group");
        let child = scene.create_child(group, "child").unwrap();
        scene.set_renderable(child, renderer(1)).unwrap();
        scene.set_position(group, Vec3::new(0.0, 0.0, -5.0)).unwrap();

        let mut camera = origin_camera();
        assert_eq!(scene.collect_visible_renderers(&mut camera).len(), 1);

        scene.set_enabled(group, false).unwrap();
        assert!(scene.collect_visible_renderers(&mut camera).is_empty());
    }

    #[test]
    fn test_frustum_culling_switch() {
        let mut scene = Scene::with_culling(CullingConfig {
            frustum_culling: false,
            lod: true,
        });
        let behind = scene.create_node("behind");
        scene.set_renderable(behind, renderer(1)).unwrap();
        scene.set_position(behind, Vec3::new(0.0, 0.0, 5.0)).unwrap();

        let mut camera = origin_camera();
        assert_eq!(scene.collect_visible_renderers(&mut camera).len(), 1);
        assert_eq!(scene.stats().culled, 0);
    }

    #[test]
    fn test_lod_selection_during_traversal() {
        let lod = LodGroup::new()
            .with_level(MeshHandle(100), 0.0, 10.0)
            .with_level(MeshHandle(101), 10.0, 50.0)
            .with_cull_distance(50.0);

        let mut scene = Scene::new();
        let near = scene.create_node("near");
        let far = scene.create_node("far");
        let gone = scene.create_node("gone");
        for (node, z) in [(near, -5.0), (far, -20.0), (gone, -80.0)] {
            let payload = MeshRenderer::new(MeshHandle(1), None, unit_box()).with_lod(lod.clone());
            scene.set_renderable(node, Box::new(payload)).unwrap();
            scene.set_position(node, Vec3::new(0.0, 0.0, z)).unwrap();
        }

        let mut camera = origin_camera();
        let visible = scene.collect_visible_renderers(&mut camera);
        let picked: Vec<_> = visible.iter().map(|entry| (entry.node, entry.mesh, entry.lod_level)).collect();

        assert_eq!(picked, vec![(near, MeshHandle(100), Some(0)), (far, MeshHandle(101), Some(1))]);
        assert_eq!(scene.stats().lod_culled, 1);
    }

    #[test]
    fn test_find_by_name_and_tag() {
        let mut scene = Scene::new();
        let a = scene.create_node("alpha");
        let b = scene.create_child(a, "beta").unwrap();
        scene.node_mut(a).unwrap().set_tag(7);
        scene.node_mut(b).unwrap().set_tag(7);

        assert_eq!(scene.find_by_name("beta"), Some(b));
        assert_eq!(scene.find_by_name("gamma"), None);
        assert_eq!(scene.find_by_tag(7), vec![a, b]);
        assert_eq!(scene.descendants(a), vec![b]);

        let mut names = Vec::new();
        scene.visit_depth_first(scene.root(), |_, node| names.push(node.name().to_string()));
        assert_eq!(names, vec!["root", "alpha", "beta"]);
    }
}
