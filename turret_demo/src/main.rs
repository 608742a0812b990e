//! Headless turret demo
//!
//! A turret on a platform tracks an orbiting target and fires on a timer
//! while an asteroid field drifts past. Turret logic runs as ECS systems;
//! the scene graph mirrors the turret entities and handles culling and
//! LOD. Frames are rendered by the software backend with bloom on the
//! muzzle flash.
//!
//! Usage: `turret_demo [frames] [config.toml|config.ron]`

mod turret;

use rand::{Rng, SeedableRng};
use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::scene::SceneError;

use turret::{barrel_mount, BarrelRecoil, RecoilSystem, SceneLink, TurretAim, TurretAimSystem};

const DEFAULT_FRAMES: u32 = 600;
const FRAME_TIME: f32 = 1.0 / 60.0;
const SURFACE_WIDTH: u32 = 320;
const SURFACE_HEIGHT: u32 = 180;

const ASTEROID_COUNT: usize = 48;
const TARGET_ORBIT_RADIUS: f32 = 12.0;
const TARGET_ORBIT_SPEED: f32 = 0.4;

struct Turret {
    base: EntityId,
    barrel: EntityId,
    flash_node: NodeId,
}

struct Asteroid {
    node: NodeId,
    velocity: Vec3,
}

pub struct TurretDemoApp {
    engine: Engine,
    backend: SoftwareBackend,
    turret: Turret,
    asteroids: Vec<Asteroid>,
    orbit_angle: f32,
    last_frame_commands: usize,
}

impl TurretDemoApp {
    pub fn new(config: EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Creating turret demo application...");
        let mut backend = SoftwareBackend::new(SURFACE_WIDTH, SURFACE_HEIGHT);
        let mut engine = Engine::new(config)?;

        let hull = engine
            .materials_mut()
            .add(Material::flat("turret_hull", [0.35, 0.38, 0.42, 1.0], RenderMode::Opaque));
        let rock = engine
            .materials_mut()
            .add(Material::flat("asteroid", [0.45, 0.4, 0.35, 1.0], RenderMode::Opaque));
        let flash = engine
            .materials_mut()
            .add(Material::flat("muzzle_flash", [6.0, 4.5, 2.0, 1.0], RenderMode::Additive));
        engine.initialize(&mut backend)?;

        engine.camera_mut().look_at(Vec3::new(0.0, 6.0, 14.0), Vec3::new(0.0, 0.0, -10.0));
        engine.world_mut().add_system(Box::new(TransformSystem::new()));
        engine.world_mut().add_system(Box::new(TurretAimSystem));
        engine.world_mut().add_system(Box::new(RecoilSystem));

        let turret = Self::spawn_turret(&mut engine, &mut backend, hull, flash)?;
        let asteroids = Self::spawn_asteroids(&mut engine, &mut backend, rock)?;

        Ok(Self {
            engine,
            backend,
            turret,
            asteroids,
            orbit_angle: 0.0,
            last_frame_commands: 0,
        })
    }

    fn spawn_turret(
        engine: &mut Engine,
        backend: &mut SoftwareBackend,
        hull: MaterialId,
        flash: MaterialId,
    ) -> Result<Turret, Box<dyn std::error::Error>> {
        let base_mesh = backend.register_mesh_in_rect([1.0; 4], [0.42, 0.6, 0.58, 0.75]);
        let barrel_mesh = backend.register_mesh_in_rect([1.0; 4], [0.48, 0.5, 0.52, 0.6]);
        let flash_mesh = backend.register_mesh_in_rect([1.0; 4], [0.47, 0.45, 0.53, 0.5]);

        let scene = engine.scene_mut();
        let base_node = scene.create_node("turret_base");
        let barrel_node = scene.create_child(base_node, "turret_barrel")?;
        let flash_node = scene.create_child(barrel_node, "muzzle_flash")?;
        scene.set_renderable(
            base_node,
            Box::new(MeshRenderer::new(
                base_mesh,
                Some(hull),
                AABB::from_center_half_extents(Vec3::zeros(), Vec3::new(1.0, 0.5, 1.0)),
            )),
        )?;
        scene.set_renderable(
            barrel_node,
            Box::new(MeshRenderer::new(
                barrel_mesh,
                Some(hull),
                AABB::from_center_half_extents(Vec3::new(0.0, 0.0, -0.6), Vec3::new(0.15, 0.15, 0.6)),
            )),
        )?;
        scene.set_position(flash_node, Vec3::new(0.0, 0.0, -1.3))?;
        scene.set_renderable(
            flash_node,
            Box::new(MeshRenderer::new(
                flash_mesh,
                Some(flash),
                AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(0.25)),
            )),
        )?;
        scene.set_enabled(flash_node, false)?;

        let world = engine.world_mut();
        let base = world.create_entity("turret_base");
        let barrel = world.create_entity("turret_barrel");
        world.set_parent(barrel, Some(base))?;
        world.add_component(base, TransformComponent::from_position(Vec3::new(0.0, 0.0, -4.0)))?;
        world.add_component(base, SceneLink { node: base_node })?;
        world.add_component(
            base,
            TurretAim {
                target: Vec3::new(0.0, 0.0, -4.0 - TARGET_ORBIT_RADIUS),
                yaw: 0.0,
            },
        )?;
        world.add_component(barrel, TransformComponent::from_position(barrel_mount()))?;
        world.add_component(barrel, SceneLink { node: barrel_node })?;
        world.add_component(barrel, BarrelRecoil::default())?;

        log::info!("Spawned turret with base and barrel");
        Ok(Turret { base, barrel, flash_node })
    }

    fn spawn_asteroids(
        engine: &mut Engine,
        backend: &mut SoftwareBackend,
        material: MaterialId,
    ) -> Result<Vec<Asteroid>, SceneError> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7075_7272);
        let field = engine.scene_mut().create_node("asteroid_field");
        let mut asteroids = Vec::with_capacity(ASTEROID_COUNT);

        for index in 0..ASTEROID_COUNT {
            let x0 = rng.gen_range(0.0..0.95);
            let y0 = rng.gen_range(0.0..0.4);
            let size = rng.gen_range(0.01..0.05);
            let rect = [x0, y0, x0 + size, y0 + size];
            let high = backend.register_mesh_in_rect([1.0; 4], rect);
            let medium = backend.register_mesh_in_rect([0.9, 0.9, 0.9, 1.0], rect);
            let low = backend.register_mesh_in_rect([0.8, 0.8, 0.8, 1.0], rect);
            let lod = LodGroup::new()
                .with_level(high, 0.0, 25.0)
                .with_level(medium, 25.0, 60.0)
                .with_level(low, 60.0, 140.0)
                .with_cull_distance(160.0);

            let scene = engine.scene_mut();
            let node = scene.create_child(field, format!("asteroid_{index}"))?;
            let position = Vec3::new(
                rng.gen_range(-60.0..60.0),
                rng.gen_range(-10.0..20.0),
                rng.gen_range(-150.0..10.0),
            );
            scene.set_position(node, position)?;
            scene.set_rotation(
                node,
                Quat::from_euler_angles(rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0), 0.0),
            )?;
            let radius = rng.gen_range(0.5..2.5);
            scene.set_renderable(
                node,
                Box::new(
                    MeshRenderer::new(
                        high,
                        Some(material),
                        AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(radius)),
                    )
                    .with_lod(lod),
                ),
            )?;

            asteroids.push(Asteroid {
                node,
                velocity: Vec3::new(rng.gen_range(-1.0..1.0), 0.0, rng.gen_range(0.5..3.0)),
            });
        }

        log::info!("Spawned {} asteroids with 3 LOD levels", asteroids.len());
        Ok(asteroids)
    }

    pub fn run(&mut self, frames: u32) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Starting turret demo for {} frames", frames);

        for _ in 0..frames {
            self.update_scene()?;
            let stats = self
                .engine
                .run_frame(&mut self.backend, FRAME_TIME, SURFACE_WIDTH, SURFACE_HEIGHT)?;
            // The software backend logs every call; keep one frame's worth
            self.last_frame_commands = self.backend.take_commands().len();

            if stats.frame % 60 == 0 {
                log::info!(
                    "Frame {}: {} visible, {} culled, {} LOD-culled, {} draws, {} binds, {} backend calls, bloom {}",
                    stats.frame,
                    stats.culling.visible,
                    stats.culling.culled,
                    stats.culling.lod_culled,
                    stats.draws.draw_calls,
                    stats.draws.material_binds,
                    self.last_frame_commands,
                    if stats.bloom_applied { "on" } else { "off" }
                );
            }
        }

        let shots = self
            .engine
            .world()
            .get_component::<BarrelRecoil>(self.turret.barrel)
            .map_or(0, |recoil| recoil.shots);
        let yaw = self
            .engine
            .world()
            .get_component::<TurretAim>(self.turret.base)
            .map_or(0.0, |aim| aim.yaw);
        log::info!(
            "Turret demo completed: {} frames, {} shots, final yaw {:.2} rad, {:.1} fps simulated",
            self.engine.clock().frame_count(),
            shots,
            yaw,
            self.engine.clock().average_fps()
        );
        Ok(())
    }

    /// Move the target and asteroids, then mirror turret entities into the scene.
    ///
    /// Systems run inside `run_frame`, so the scene shows the turret as the
    /// previous frame's systems left it.
    fn update_scene(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.orbit_angle += TARGET_ORBIT_SPEED * FRAME_TIME;
        let target = Vec3::new(
            self.orbit_angle.sin() * TARGET_ORBIT_RADIUS,
            0.0,
            -4.0 - self.orbit_angle.cos() * TARGET_ORBIT_RADIUS,
        );
        if let Some(aim) = self.engine.world_mut().get_component_mut::<TurretAim>(self.turret.base) {
            aim.target = target;
        }

        for asteroid in &self.asteroids {
            let velocity = asteroid.velocity * FRAME_TIME;
            self.engine
                .scene_mut()
                .modify_transform(asteroid.node, |transform| transform.translate(velocity))?;
        }

        let links: Vec<(NodeId, Transform)> = self
            .engine
            .world()
            .query::<(SceneLink, TransformComponent)>()
            .into_iter()
            .map(|(_, (link, component))| (link.node, component.transform().clone()))
            .collect();
        for (node, transform) in links {
            self.engine
                .scene_mut()
                .modify_transform(node, |mirrored| mirrored.copy_from(&transform))?;
        }

        let flashing = self
            .engine
            .world()
            .get_component::<BarrelRecoil>(self.turret.barrel)
            .is_some_and(BarrelRecoil::is_flashing);
        self.engine.scene_mut().set_enabled(self.turret.flash_node, flashing)?;
        Ok(())
    }
}

impl Drop for TurretDemoApp {
    fn drop(&mut self) {
        self.engine.shutdown(&mut self.backend);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let frames = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(DEFAULT_FRAMES);
    let config = match args.next() {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };

    logging::init_with_filter(config.log_level_filter());

    log::info!("Starting Turret Demo");

    let mut app = TurretDemoApp::new(config)?;
    let result = app.run(frames);

    match result {
        Ok(()) => {
            log::info!("Turret demo completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Turret demo failed: {:?}", e);
            Err(e)
        }
    }
}
