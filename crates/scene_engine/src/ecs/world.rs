//! ECS World implementation
//!
//! The world owns every entity and system. Entity creation and destruction
//! requested while systems are running is queued and applied after the
//! system pass, so each system sees the same entity set for the whole
//! frame. Queues are also flushed right before the pass.

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use super::component::Component;
use super::entity::{ComponentSlot, Entity, EntityId};
use super::error::{EcsError, EcsResult};
use super::query::ComponentQuery;
use super::system::GameSystem;
use super::transform::TransformComponent;

struct SystemEntry {
    system: Box<dyn GameSystem>,
    enabled: bool,
    priority: i32,
    order: u64,
}

/// System registry change requested during a system pass
enum SystemOp {
    Remove(String),
    SetEnabled(String, bool),
    SetPriority(String, i32),
}

/// ECS World containing all entities and systems
pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    pending_add: BTreeMap<EntityId, Entity>,
    pending_remove: Vec<EntityId>,
    systems: Vec<SystemEntry>,
    /// Names of the systems moved out for the running pass
    running_systems: Vec<String>,
    pending_system_ops: Vec<SystemOp>,
    systems_sorted: bool,
    next_system_order: u64,
    updating: bool,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            pending_add: BTreeMap::new(),
            pending_remove: Vec::new(),
            systems: Vec::new(),
            running_systems: Vec::new(),
            pending_system_ops: Vec::new(),
            systems_sorted: true,
            next_system_order: 0,
            updating: false,
        }
    }

    /// Whether a system pass is running
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    // --- Entities ---

    /// Create a new entity.
    ///
    /// During a system pass the entity is queued: it can be configured
    /// right away but is not returned by queries until the pass ends.
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        let entity = Entity::new(name.into());
        let id = entity.id();
        if self.updating {
            log::trace!("Queued creation of {} '{}'", id, entity.name());
            self.pending_add.insert(id, entity);
        } else {
            self.entities.insert(id, entity);
        }
        id
    }

    /// Destroy an entity, its components and all of its descendants.
    ///
    /// Deferred until the end of the pass when called from a system.
    pub fn destroy_entity(&mut self, id: EntityId) -> EcsResult<()> {
        if !self.contains(id) {
            return Err(EcsError::NoSuchEntity(id));
        }
        if self.updating {
            if !self.pending_remove.contains(&id) {
                self.pending_remove.push(id);
            }
            return Ok(());
        }
        self.destroy_now(id);
        Ok(())
    }

    /// Whether the entity exists, queued creations included
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id) || self.pending_add.contains_key(&id)
    }

    /// Entity by id, queued creations included
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).or_else(|| self.pending_add.get(&id))
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id).or_else(|| self.pending_add.get_mut(&id))
    }

    /// Live entities in creation order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of entities waiting for the end of the system pass
    pub fn pending_count(&self) -> usize {
        self.pending_add.len()
    }

    /// Live entities without a parent
    pub fn root_entities(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.parent().is_none())
            .map(Entity::id)
            .collect()
    }

    /// First live entity with the given name
    pub fn find_entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities.values().find(|entity| entity.name() == name).map(Entity::id)
    }

    /// Attach `child` to `parent`, or detach it with `None`.
    ///
    /// Rejects cycles. World matrices of every `TransformComponent` in the
    /// moved subtree are invalidated.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> EcsResult<()> {
        if !self.contains(child) {
            return Err(EcsError::NoSuchEntity(child));
        }
        if let Some(parent) = parent {
            if parent == child {
                return Err(EcsError::SelfParent(child));
            }
            if !self.contains(parent) {
                return Err(EcsError::NoSuchEntity(parent));
            }
            if self.is_ancestor_or_self(child, parent) {
                return Err(EcsError::HierarchyCycle { child, parent });
            }
        }

        let old_parent = self.entity(child).and_then(Entity::parent);
        if old_parent == parent {
            return Ok(());
        }

        let before = self.activity_snapshot(child);
        if let Some(old) = old_parent.and_then(|old| self.entity_mut(old)) {
            old.children.retain(|&id| id != child);
        }
        if let Some(entity) = self.entity_mut(child) {
            entity.parent = parent;
        }
        if let Some(new) = parent.and_then(|parent| self.entity_mut(parent)) {
            new.children.push(child);
        }
        log::trace!("Reparented {} from {:?} to {:?}", child, old_parent, parent);

        self.mark_transforms_dirty(child);
        self.notify_activity_changes(before);
        Ok(())
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: EntityId, node: EntityId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.entity(id).and_then(Entity::parent);
        }
        false
    }

    /// Entity and all descendants, pre-order
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entity) = self.entity(current) {
                result.push(current);
                stack.extend(entity.children().iter().rev().copied());
            }
        }
        result
    }

    /// Set an entity's own enabled flag
    pub fn set_entity_enabled(&mut self, id: EntityId, enabled: bool) -> EcsResult<()> {
        let before = self.activity_snapshot(id);
        let entity = self.entity_mut(id).ok_or(EcsError::NoSuchEntity(id))?;
        if entity.enabled == enabled {
            return Ok(());
        }
        entity.enabled = enabled;
        self.notify_activity_changes(before);
        Ok(())
    }

    /// Whether the entity and all of its ancestors are enabled
    pub fn is_active_in_hierarchy(&self, id: EntityId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.entity(id) {
                Some(entity) if entity.is_enabled() => current = entity.parent(),
                _ => return false,
            }
        }
        true
    }

    // --- Components ---

    /// Attach a component. An entity holds at most one component per type.
    pub fn add_component<T: Component>(&mut self, id: EntityId, component: T) -> EcsResult<()> {
        let active = self.is_active_in_hierarchy(id);
        let entity = self.entity_mut(id).ok_or(EcsError::NoSuchEntity(id))?;
        if entity.has_component::<T>() {
            return Err(EcsError::DuplicateComponent {
                entity: id,
                component: type_name::<T>(),
            });
        }

        let mut component: Box<dyn Component> = Box::new(component);
        component.on_attach(id);
        if active {
            component.on_enable();
        }
        entity.components.insert(
            TypeId::of::<T>(),
            ComponentSlot {
                component,
                enabled: true,
                type_name: type_name::<T>(),
            },
        );
        Ok(())
    }

    /// Detach a component and hand it back
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EcsResult<T> {
        let active = self.is_active_in_hierarchy(id);
        let entity = self.entity_mut(id).ok_or(EcsError::NoSuchEntity(id))?;
        let missing = || EcsError::MissingComponent {
            entity: id,
            component: type_name::<T>(),
        };
        let mut slot = entity.components.remove(&TypeId::of::<T>()).ok_or_else(missing)?;

        if active && slot.enabled {
            slot.component.on_disable();
        }
        slot.component.on_detach(id);
        slot.component.into_any().downcast::<T>().map(|component| *component).map_err(|_| missing())
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.entity(id)?.component::<T>()
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entity_mut(id)?.component_mut::<T>()
    }

    /// Whether the entity holds a component of type `T`
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(Entity::has_component::<T>)
    }

    /// Set a component's own enabled flag
    pub fn set_component_enabled<T: Component>(&mut self, id: EntityId, enabled: bool) -> EcsResult<()> {
        let active = self.is_active_in_hierarchy(id);
        let entity = self.entity_mut(id).ok_or(EcsError::NoSuchEntity(id))?;
        let slot = entity
            .components
            .get_mut(&TypeId::of::<T>())
            .ok_or(EcsError::MissingComponent {
                entity: id,
                component: type_name::<T>(),
            })?;

        if slot.enabled != enabled {
            slot.enabled = enabled;
            if active {
                if enabled {
                    slot.component.on_enable();
                } else {
                    slot.component.on_disable();
                }
            }
        }
        Ok(())
    }

    /// Whether the component is enabled and its entity active in the hierarchy
    pub fn is_component_active<T: Component>(&self, id: EntityId) -> bool {
        let enabled = self
            .entity(id)
            .and_then(|entity| entity.components.get(&TypeId::of::<T>()))
            .is_some_and(|slot| slot.enabled);
        enabled && self.is_active_in_hierarchy(id)
    }

    /// Active live entities holding every listed component type
    pub fn entities_with(&self, component_types: &[TypeId]) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| component_types.iter().all(|&type_id| entity.has_component_type(type_id)))
            .map(Entity::id)
            .filter(|&id| self.is_active_in_hierarchy(id))
            .collect()
    }

    /// Active live entities matching a component tuple, with the components borrowed
    pub fn query<Q: ComponentQuery>(&self) -> Vec<(EntityId, Q::Item<'_>)> {
        self.entities
            .values()
            .filter(|entity| self.is_active_in_hierarchy(entity.id()))
            .filter_map(|entity| Q::fetch(entity).map(|item| (entity.id(), item)))
            .collect()
    }

    // --- Systems ---

    /// Register a system
    pub fn add_system(&mut self, mut system: Box<dyn GameSystem>) {
        if self.system_names().contains(&system.name()) {
            log::warn!("A system named '{}' is already registered", system.name());
        }
        system.on_added(self);
        log::debug!("Added system '{}' (priority {})", system.name(), system.priority());
        self.systems.push(SystemEntry {
            priority: system.priority(),
            enabled: true,
            order: self.next_system_order,
            system,
        });
        self.next_system_order += 1;
        self.systems_sorted = false;
    }

    /// Unregister a system by name.
    ///
    /// During a system pass the removal is applied after the pass and
    /// `None` is returned.
    pub fn remove_system(&mut self, name: &str) -> Option<Box<dyn GameSystem>> {
        if self.updating {
            self.pending_system_ops.push(SystemOp::Remove(name.to_string()));
            return None;
        }
        let index = self.systems.iter().position(|entry| entry.system.name() == name)?;
        let mut system = self.systems.remove(index).system;
        system.on_removed(self);
        log::debug!("Removed system '{}'", name);
        Some(system)
    }

    /// Enable or disable a system. Returns whether it was found, or `true`
    /// when queued during a system pass.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if self.updating {
            self.pending_system_ops.push(SystemOp::SetEnabled(name.to_string(), enabled));
            return true;
        }
        match self.systems.iter_mut().find(|entry| entry.system.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Change a system's priority; the order is rebuilt before the next pass
    pub fn set_system_priority(&mut self, name: &str, priority: i32) -> bool {
        if self.updating {
            self.pending_system_ops.push(SystemOp::SetPriority(name.to_string(), priority));
            return true;
        }
        match self.systems.iter_mut().find(|entry| entry.system.name() == name) {
            Some(entry) => {
                entry.priority = priority;
                self.systems_sorted = false;
                true
            }
            None => false,
        }
    }

    /// System names in execution order.
    ///
    /// During a pass this lists the running systems first, then any added
    /// by them.
    pub fn system_names(&self) -> Vec<&str> {
        let mut entries: Vec<&SystemEntry> = self.systems.iter().collect();
        entries.sort_by_key(|entry| (entry.priority, entry.order));
        self.running_systems
            .iter()
            .map(String::as_str)
            .chain(entries.into_iter().map(|entry| entry.system.name()))
            .collect()
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        self.running_systems.len() + self.systems.len()
    }

    /// Update the world (run systems).
    ///
    /// Errors and panics from a system are logged; the remaining systems
    /// still run.
    pub fn update(&mut self, delta_time: f32) {
        if !self.systems_sorted {
            self.systems.sort_by_key(|entry| (entry.priority, entry.order));
            self.systems_sorted = true;
        }
        self.flush_pending();

        self.updating = true;
        let mut systems = mem::take(&mut self.systems);
        self.running_systems = systems.iter().map(|entry| entry.system.name().to_string()).collect();
        for entry in systems.iter_mut().filter(|entry| entry.enabled) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.system.update(self, delta_time)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => log::error!("System '{}' failed: {}", entry.system.name(), error),
                Err(payload) => log::error!(
                    "System '{}' panicked: {}",
                    entry.system.name(),
                    panic_message(payload.as_ref())
                ),
            }
        }
        self.updating = false;
        self.running_systems.clear();

        let added = mem::replace(&mut self.systems, systems);
        if !added.is_empty() {
            self.systems.extend(added);
            self.systems_sorted = false;
        }
        self.apply_system_ops();
        self.flush_pending();
    }

    fn apply_system_ops(&mut self) {
        for op in mem::take(&mut self.pending_system_ops) {
            match op {
                SystemOp::Remove(name) => {
                    self.remove_system(&name);
                }
                SystemOp::SetEnabled(name, enabled) => {
                    self.set_system_enabled(&name, enabled);
                }
                SystemOp::SetPriority(name, priority) => {
                    self.set_system_priority(&name, priority);
                }
            }
        }
    }

    fn flush_pending(&mut self) {
        if !self.pending_add.is_empty() {
            let added = mem::take(&mut self.pending_add);
            log::trace!("Flushing {} queued entities", added.len());
            self.entities.extend(added);
        }
        for id in mem::take(&mut self.pending_remove) {
            if self.contains(id) {
                self.destroy_now(id);
            }
        }
    }

    fn destroy_now(&mut self, id: EntityId) {
        let subtree = self.activity_snapshot(id);
        if let Some(parent) = self.entity(id).and_then(Entity::parent) {
            if let Some(parent) = self.entity_mut(parent) {
                parent.children.retain(|&child| child != id);
            }
        }

        for (current, was_active) in subtree {
            let removed = self.entities.remove(&current).or_else(|| self.pending_add.remove(&current));
            let Some(mut entity) = removed else { continue };
            for mut slot in mem::take(&mut entity.components).into_values() {
                if was_active && slot.enabled {
                    slot.component.on_disable();
                }
                slot.component.on_detach(current);
            }
            log::trace!("Destroyed {} '{}'", current, entity.name());
        }
    }

    fn activity_snapshot(&self, id: EntityId) -> Vec<(EntityId, bool)> {
        self.descendants(id)
            .into_iter()
            .map(|entity| (entity, self.is_active_in_hierarchy(entity)))
            .collect()
    }

    fn notify_activity_changes(&mut self, before: Vec<(EntityId, bool)>) {
        for (id, was_active) in before {
            let active = self.is_active_in_hierarchy(id);
            if active == was_active {
                continue;
            }
            if let Some(entity) = self.entity_mut(id) {
                for slot in entity.components.values_mut().filter(|slot| slot.enabled) {
                    if active {
                        slot.component.on_enable();
                    } else {
                        slot.component.on_disable();
                    }
                }
            }
        }
    }

    fn mark_transforms_dirty(&mut self, id: EntityId) {
        for entity in self.descendants(id) {
            if let Some(transform) = self.get_component_mut::<TransformComponent>(entity) {
                transform.transform_mut().mark_world_dirty();
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("pending_add", &self.pending_add.len())
            .field("pending_remove", &self.pending_remove.len())
            .field("systems", &self.system_names())
            .field("updating", &self.updating)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
