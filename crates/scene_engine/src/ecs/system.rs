//! System trait

use super::error::SystemResult;
use super::world::World;

/// Per-frame logic run by the [`World`].
///
/// Systems run in ascending [`priority`](Self::priority); systems with
/// equal priority run in the order they were added. An error or panic
/// from one system is logged and the remaining systems still run.
pub trait GameSystem {
    /// Unique name used to address the system
    fn name(&self) -> &str;

    /// Execution priority, lower runs first
    fn priority(&self) -> i32 {
        0
    }

    /// Called once when the system is added to a world
    fn on_added(&mut self, _world: &mut World) {}

    /// Called once when the system is removed from a world
    fn on_removed(&mut self, _world: &mut World) {}

    /// Run the system for one frame
    fn update(&mut self, world: &mut World, delta_time: f32) -> SystemResult;
}
