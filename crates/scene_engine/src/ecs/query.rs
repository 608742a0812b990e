//! Query system for component access

use std::any::TypeId;

use super::component::Component;
use super::entity::Entity;

/// Tuple of component types fetched together by [`World::query`](super::World::query)
pub trait ComponentQuery {
    /// Borrowed components of one entity
    type Item<'w>;

    /// Type ids an entity must hold to match
    fn type_ids() -> Vec<TypeId>;

    /// Borrow the components from `entity` if it holds all of them
    fn fetch(entity: &Entity) -> Option<Self::Item<'_>>;
}

macro_rules! impl_component_query {
    ($($component:ident),+) => {
        impl<$($component: Component),+> ComponentQuery for ($($component,)+) {
            type Item<'w> = ($(&'w $component,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$component>()),+]
            }

            fn fetch(entity: &Entity) -> Option<Self::Item<'_>> {
                Some(($(entity.component::<$component>()?,)+))
            }
        }
    };
}

impl_component_query!(A);
impl_component_query!(A, B);
impl_component_query!(A, B, C);
impl_component_query!(A, B, C, D);
