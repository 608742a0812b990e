//! Component trait

use std::any::Any;
use std::fmt::Debug;

use super::entity::EntityId;

/// Access to a value as [`Any`], implemented for every `'static` type
pub trait AsAny: Any {
    /// Shared downcast handle
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast handle
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Owned downcast handle
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Data attached to an entity.
///
/// The hooks are called by the [`World`](super::World): `on_attach` and
/// `on_detach` when the component is added or removed, `on_enable` and
/// `on_disable` when its effective activity changes (its own flag, or the
/// entity's active-in-hierarchy state).
pub trait Component: AsAny + Debug + Send + Sync {
    /// Component was added to `entity`
    fn on_attach(&mut self, _entity: EntityId) {}

    /// Component is being removed from `entity`
    fn on_detach(&mut self, _entity: EntityId) {}

    /// Component became active
    fn on_enable(&mut self) {}

    /// Component became inactive
    fn on_disable(&mut self) {}
}
