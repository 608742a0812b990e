//! Transform component and the system that resolves entity world matrices
//!
//! Entities form a hierarchy; a `TransformComponent`'s world matrix is its
//! local matrix composed onto the world matrix of the nearest ancestor that
//! also carries one. `TransformSystem` runs first each frame so every later
//! system reads current world matrices.

use std::collections::HashMap;

use crate::foundation::math::{Mat4, Quat, Vec3};
use crate::scene::transform::Transform;

use super::component::Component;
use super::entity::EntityId;
use super::error::SystemResult;
use super::system::GameSystem;
use super::world::World;

/// Priority of [`TransformSystem`]: ahead of everything but `i32::MIN`
pub const TRANSFORM_SYSTEM_PRIORITY: i32 = i32::MIN + 1;

/// ECS Transform component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformComponent {
    transform: Transform,
}

impl Component for TransformComponent {
    /// A matrix resolved under another parent (or none) is stale here
    fn on_attach(&mut self, _entity: EntityId) {
        self.transform.mark_world_dirty();
    }
}

impl TransformComponent {
    /// Wrap a transform
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }

    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self::new(Transform::from_position(position))
    }

    /// Builder pattern: Set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.set_rotation(rotation);
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.set_scale(scale);
        self
    }

    /// Underlying transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable transform; setters mark the local matrix dirty
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// World matrix as of the last [`TransformSystem`] run
    pub fn world_matrix(&self) -> &Mat4 {
        self.transform.cached_world_matrix()
    }

    /// World-space position as of the last [`TransformSystem`] run
    pub fn world_position(&self) -> Vec3 {
        self.transform.world_position()
    }
}

/// Resolves world matrices down the entity hierarchy
#[derive(Debug, Default)]
pub struct TransformSystem {
    resolved_last_frame: usize,
}

impl TransformSystem {
    /// Create the system
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of world matrices recomputed by the last run
    pub fn resolved_last_frame(&self) -> usize {
        self.resolved_last_frame
    }

    /// Resolve every transform in the world; returns how many were recomputed
    pub fn resolve(world: &mut World) -> usize {
        // (entity, world matrix to hand to children, whether it changed)
        let mut resolved: HashMap<EntityId, (Option<Mat4>, bool)> = HashMap::new();
        let mut recomputed = 0;

        let mut order = Vec::new();
        for root in world.root_entities() {
            order.extend(world.descendants(root));
        }

        for id in order {
            let parent = world.entity(id).and_then(|entity| entity.parent());
            let (parent_world, parent_changed) = parent
                .and_then(|parent| resolved.get(&parent).copied())
                .unwrap_or((None, false));

            let inherited = match world.get_component_mut::<TransformComponent>(id) {
                Some(component) => {
                    let transform = component.transform_mut();
                    if parent_changed {
                        transform.mark_world_dirty();
                    }
                    let changed = transform.is_world_dirty();
                    let matrix = transform.resolve_world(parent_world.as_ref());
                    if changed {
                        recomputed += 1;
                    }
                    (Some(matrix), changed || parent_changed)
                }
                // Entities without a transform pass their ancestor's through
                None => (parent_world, parent_changed),
            };
            resolved.insert(id, inherited);
        }
        recomputed
    }
}

impl GameSystem for TransformSystem {
    fn name(&self) -> &str {
        "transform"
    }

    fn priority(&self) -> i32 {
        TRANSFORM_SYSTEM_PRIORITY
    }

    fn update(&mut self, world: &mut World, _delta_time: f32) -> SystemResult {
        self.resolved_last_frame = Self::resolve(world);
        log::trace!("Resolved {} entity transforms", self.resolved_last_frame);
        Ok(())
    }
}
