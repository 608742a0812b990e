//! Entity implementation

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use super::component::Component;

static NEXT_ENTITY_ID: AtomicU32 = AtomicU32::new(1);

/// Entity identifier, unique across every world in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Allocate the next id
    pub(super) fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity #{}", self.0)
    }
}

#[derive(Debug)]
pub(super) struct ComponentSlot {
    pub(super) component: Box<dyn Component>,
    pub(super) enabled: bool,
    pub(super) type_name: &'static str,
}

/// Named node of the entity hierarchy holding at most one component per type
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: String,
    pub(super) enabled: bool,
    pub(super) parent: Option<EntityId>,
    pub(super) children: Vec<EntityId>,
    pub(super) components: HashMap<TypeId, ComponentSlot>,
}

impl Entity {
    pub(super) fn new(name: String) -> Self {
        Self {
            id: EntityId::next(),
            name,
            enabled: true,
            parent: None,
            children: Vec::new(),
            components: HashMap::new(),
        }
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own enabled flag, ignoring ancestors
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Parent entity
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities in attachment order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Component of type `T`
    pub fn component<T: Component>(&self) -> Option<&T> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|slot| (*slot.component).as_any().downcast_ref::<T>())
    }

    pub(super) fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(&TypeId::of::<T>())
            .and_then(|slot| (*slot.component).as_any_mut().downcast_mut::<T>())
    }

    /// Whether a component of type `T` is attached
    pub fn has_component<T: Component>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Whether a component with the given type id is attached
    pub fn has_component_type(&self, type_id: TypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Type names of the attached components, sorted
    pub fn component_type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.components.values().map(|slot| slot.type_name).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let first = Entity::new("a".to_string());
        let second = Entity::new("b".to_string());
        assert!(second.id() > first.id());
        assert_eq!(format!("{}", first.id()), format!("entity #{}", first.id().raw()));
    }
}
