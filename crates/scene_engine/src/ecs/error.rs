//! ECS error types

use thiserror::Error;

use super::entity::EntityId;

/// Structural errors of the entity hierarchy and component sets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Reparenting would make an entity its own ancestor
    #[error("Making {parent} the parent of {child} would create a cycle")]
    HierarchyCycle {
        /// Entity being reparented
        child: EntityId,
        /// Requested parent
        parent: EntityId,
    },

    /// Entity already has a component of this type
    #[error("{entity} already has a {component} component")]
    DuplicateComponent {
        /// Target entity
        entity: EntityId,
        /// Component type name
        component: &'static str,
    },

    /// Entity does not exist (or was destroyed)
    #[error("No such entity: {0}")]
    NoSuchEntity(EntityId),

    /// Entity has no component of this type
    #[error("{entity} has no {component} component")]
    MissingComponent {
        /// Target entity
        entity: EntityId,
        /// Component type name
        component: &'static str,
    },

    /// Entity was asked to become its own parent
    #[error("{0} cannot be its own parent")]
    SelfParent(EntityId),
}

/// ECS result type
pub type EcsResult<T> = Result<T, EcsError>;

/// Failure reported by a [`GameSystem`](super::GameSystem) update
#[derive(Error, Debug)]
pub enum SystemError {
    /// System-specific failure
    #[error("{0}")]
    Failed(String),

    /// World operation failed inside the system
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// System result type
pub type SystemResult<T = ()> = Result<T, SystemError>;
