//! Turret components and the systems that aim and fire it

use scene_engine::ecs::{Component, EntityId, GameSystem, SystemError, SystemResult, TransformComponent, World};
use scene_engine::foundation::math::{Quat, Vec3};
use scene_engine::scene::NodeId;

// Turret configuration
pub const TURRET_RECOIL_DISTANCE: f32 = 0.3; // How far barrel moves back
pub const TURRET_RECOIL_SPEED: f32 = 5.0; // Speed of recoil snap-back
pub const TURRET_RETURN_SPEED: f32 = 2.0; // Speed barrel returns forward
pub const TURRET_ROTATION_SPEED: f32 = 1.0; // Radians per second turret rotation
pub const FIRE_INTERVAL: f32 = 2.0; // Seconds between shots
pub const MUZZLE_FLASH_TIME: f32 = 0.1;

/// Barrel mount point relative to the base
pub fn barrel_mount() -> Vec3 {
    Vec3::new(0.0, 0.5, -1.2)
}

/// Scene node mirroring an entity's transform
#[derive(Debug, Clone, Copy)]
pub struct SceneLink {
    pub node: NodeId,
}

impl Component for SceneLink {}

/// Yaw-only aiming state of a turret base
#[derive(Debug, Clone)]
pub struct TurretAim {
    pub target: Vec3,
    pub yaw: f32,
}

impl Component for TurretAim {}

/// Recoil and fire timing of a barrel
#[derive(Debug, Clone, Default)]
pub struct BarrelRecoil {
    pub offset: f32,
    pub recoiling: bool,
    pub fire_timer: f32,
    pub flash_timer: f32,
    pub shots: u32,
}

impl BarrelRecoil {
    pub fn is_flashing(&self) -> bool {
        self.flash_timer > 0.0
    }
}

impl Component for BarrelRecoil {}

/// Shortest signed angle from `from` to `to`
fn angle_delta(from: f32, to: f32) -> f32 {
    let delta = (to - from).rem_euclid(std::f32::consts::TAU);
    if delta > std::f32::consts::PI {
        delta - std::f32::consts::TAU
    } else {
        delta
    }
}

/// Turns every turret base toward its target at a fixed rate
#[derive(Debug, Default)]
pub struct TurretAimSystem;

impl GameSystem for TurretAimSystem {
    fn name(&self) -> &str {
        "turret_aim"
    }

    fn update(&mut self, world: &mut World, delta_time: f32) -> SystemResult {
        let turrets: Vec<(EntityId, TurretAim)> = world
            .query::<(TurretAim,)>()
            .into_iter()
            .map(|(id, (aim,))| (id, aim.clone()))
            .collect();

        for (id, mut aim) in turrets {
            let transform = world
                .get_component_mut::<TransformComponent>(id)
                .ok_or_else(|| SystemError::Failed(format!("turret {id} has no transform")))?;

            // Barrel points down local -Z
            let to_target = aim.target - transform.world_position();
            let desired = (-to_target.x).atan2(-to_target.z);
            let step = TURRET_ROTATION_SPEED * delta_time;
            aim.yaw += angle_delta(aim.yaw, desired).clamp(-step, step);
            transform
                .transform_mut()
                .set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), aim.yaw));

            if let Some(state) = world.get_component_mut::<TurretAim>(id) {
                *state = aim;
            }
        }
        Ok(())
    }
}

/// Fires barrels on a timer and animates their recoil
#[derive(Debug, Default)]
pub struct RecoilSystem;

impl GameSystem for RecoilSystem {
    fn name(&self) -> &str {
        "recoil"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn update(&mut self, world: &mut World, delta_time: f32) -> SystemResult {
        let barrels: Vec<EntityId> = world
            .query::<(BarrelRecoil, TransformComponent)>()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        for id in barrels {
            let Some(recoil) = world.get_component_mut::<BarrelRecoil>(id) else {
                continue;
            };

            recoil.fire_timer += delta_time;
            recoil.flash_timer = (recoil.flash_timer - delta_time).max(0.0);
            if recoil.fire_timer >= FIRE_INTERVAL {
                recoil.fire_timer -= FIRE_INTERVAL;
                recoil.recoiling = true;
                recoil.flash_timer = MUZZLE_FLASH_TIME;
                recoil.shots += 1;
                log::info!("Turret fired! Recoil: {}", TURRET_RECOIL_DISTANCE);
            }

            if recoil.recoiling {
                recoil.offset = (recoil.offset + TURRET_RECOIL_SPEED * delta_time).min(TURRET_RECOIL_DISTANCE);
                if recoil.offset >= TURRET_RECOIL_DISTANCE {
                    recoil.recoiling = false;
                }
            } else {
                recoil.offset = (recoil.offset - TURRET_RETURN_SPEED * delta_time).max(0.0);
            }
            let offset = recoil.offset;

            if let Some(transform) = world.get_component_mut::<TransformComponent>(id) {
                transform
                    .transform_mut()
                    .set_position(barrel_mount() + Vec3::new(0.0, 0.0, offset));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scene_engine::ecs::TransformSystem;

    #[test]
    fn test_angle_delta_wraps() {
        assert_relative_eq!(angle_delta(3.0, -3.0), std::f32::consts::TAU - 6.0, epsilon = 1e-5);
        assert_relative_eq!(angle_delta(0.0, 1.0), 1.0);
    }

    #[test]
    fn test_turret_turns_toward_target() {
        let mut world = World::new();
        world.add_system(Box::new(TransformSystem::new()));
        world.add_system(Box::new(TurretAimSystem));
        let base = world.create_entity("base");
        world.add_component(base, TransformComponent::identity()).unwrap();
        world
            .add_component(base, TurretAim { target: Vec3::new(-10.0, 0.0, 0.0), yaw: 0.0 })
            .unwrap();

        for _ in 0..4 {
            world.update(1.0);
        }
        // Target sits at a quarter turn; rate is one radian per second
        assert_relative_eq!(
            world.get_component::<TurretAim>(base).unwrap().yaw,
            std::f32::consts::FRAC_PI_2,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_barrel_fires_and_recovers() {
        let mut world = World::new();
        world.add_system(Box::new(RecoilSystem));
        let barrel = world.create_entity("barrel");
        world.add_component(barrel, TransformComponent::from_position(barrel_mount())).unwrap();
        world.add_component(barrel, BarrelRecoil::default()).unwrap();

        world.update(FIRE_INTERVAL);
        let recoil = world.get_component::<BarrelRecoil>(barrel).unwrap();
        assert_eq!(recoil.shots, 1);
        assert!(recoil.is_flashing());

        for _ in 0..15 {
            world.update(0.1);
        }
        let recoil = world.get_component::<BarrelRecoil>(barrel).unwrap();
        assert_relative_eq!(recoil.offset, 0.0);
        assert!(!recoil.is_flashing());
        let position = world.get_component::<TransformComponent>(barrel).unwrap().transform().position();
        assert_relative_eq!(position, barrel_mount());
    }
}
