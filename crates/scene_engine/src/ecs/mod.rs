//! Entity-Component-System implementation
//!
//! Entities form a hierarchy and hold at most one component per type.
//! Systems run once per [`World::update`] in priority order; entity
//! creation and destruction requested by a running system take effect
//! after the pass.

pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod system;
pub mod transform;
pub mod world;

pub use component::{AsAny, Component};
pub use entity::{Entity, EntityId};
pub use error::{EcsError, EcsResult, SystemError, SystemResult};
pub use query::ComponentQuery;
pub use system::GameSystem;
pub use transform::{TransformComponent, TransformSystem, TRANSFORM_SYSTEM_PRIORITY};
pub use world::World;
