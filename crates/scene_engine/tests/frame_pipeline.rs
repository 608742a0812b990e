//! End-to-end frames through the public engine API on the software backend

use std::f32::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use scene_engine::prelude::*;
use scene_engine::render::{BackendCommand, MeshHandle};

/// Spins every entity carrying a transform around +Y at a fixed rate
#[derive(Debug)]
struct Spinner {
    radians_per_second: f32,
}

impl GameSystem for Spinner {
    fn name(&self) -> &str {
        "spinner"
    }

    fn update(&mut self, world: &mut World, delta_time: f32) -> SystemResult {
        let angle = self.radians_per_second * delta_time;
        for id in world.entities_with(&[std::any::TypeId::of::<TransformComponent>()]) {
            if let Some(component) = world.get_component_mut::<TransformComponent>(id) {
                component
                    .transform_mut()
                    .rotate(Quat::from_axis_angle(&Vec3::y_axis(), angle));
            }
        }
        Ok(())
    }
}

fn unit_bounds() -> AABB {
    AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(0.5))
}

fn drawn_meshes(backend: &SoftwareBackend) -> Vec<MeshHandle> {
    backend
        .commands()
        .iter()
        .filter_map(|command| match command {
            BackendCommand::DrawMesh { mesh, .. } => Some(*mesh),
            _ => None,
        })
        .collect()
}

fn engine_looking_down_negative_z(backend: &mut SoftwareBackend) -> Engine {
    scene_engine::foundation::logging::init_for_tests();
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.initialize(backend).unwrap();
    engine.camera_mut().look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
    engine
}

#[test]
fn bright_object_glows_past_its_edges() {
    let mut backend = SoftwareBackend::new(16, 16);
    let mut engine = engine_looking_down_negative_z(&mut backend);

    let mesh = backend.register_mesh_in_rect([4.0, 4.0, 4.0, 1.0], [0.375, 0.375, 0.625, 0.625]);
    let node = engine.scene_mut().create_node("lamp");
    engine.scene_mut().set_position(node, Vec3::new(0.0, 0.0, -5.0)).unwrap();
    engine
        .scene_mut()
        .set_renderable(node, Box::new(MeshRenderer::new(mesh, None, unit_bounds())))
        .unwrap();

    let stats = engine.run_frame(&mut backend, 1.0 / 60.0, 16, 16).unwrap();
    assert!(stats.bloom_applied);
    assert_eq!(stats.draws.draw_calls, 1);

    let frame = backend.default_framebuffer();
    assert!(frame.pixel(8, 8)[0] >= 4.0);
    assert!(frame.pixel(4, 8)[0] > 0.0);
    // Far corner stays at the clear colour
    assert_relative_eq!(frame.pixel(0, 0)[0], 0.0, epsilon = 1e-3);
}

#[test]
fn objects_behind_the_camera_are_culled() {
    let mut backend = SoftwareBackend::new(8, 8);
    let mut engine = engine_looking_down_negative_z(&mut backend);
    let front_mesh = backend.register_mesh([0.1, 0.1, 0.1, 1.0]);
    let back_mesh = backend.register_mesh([0.1, 0.1, 0.1, 1.0]);

    let scene = engine.scene_mut();
    let front = scene.create_node("front");
    scene.set_position(front, Vec3::new(0.0, 0.0, -10.0)).unwrap();
    scene
        .set_renderable(front, Box::new(MeshRenderer::new(front_mesh, None, unit_bounds())))
        .unwrap();
    let back = scene.create_node("back");
    scene.set_position(back, Vec3::new(0.0, 0.0, 10.0)).unwrap();
    scene
        .set_renderable(back, Box::new(MeshRenderer::new(back_mesh, None, unit_bounds())))
        .unwrap();

    backend.take_commands();
    let stats = engine.run_frame(&mut backend, 1.0 / 60.0, 8, 8).unwrap();

    assert_eq!(stats.visible_renderers, 1);
    assert_eq!(stats.culling.culled, 1);
    assert_eq!(drawn_meshes(&backend), vec![front_mesh]);
}

#[test]
fn lod_switches_with_camera_distance() {
    let mut backend = SoftwareBackend::new(8, 8);
    let mut engine = engine_looking_down_negative_z(&mut backend);
    let high = backend.register_mesh([0.1, 0.1, 0.1, 1.0]);
    let low = backend.register_mesh([0.1, 0.1, 0.1, 1.0]);

    let lod = LodGroup::new().with_level(high, 0.0, 20.0).with_level(low, 20.0, 100.0);
    let scene = engine.scene_mut();
    let rock = scene.create_node("rock");
    scene.set_position(rock, Vec3::new(0.0, 0.0, -10.0)).unwrap();
    scene
        .set_renderable(rock, Box::new(MeshRenderer::new(high, None, unit_bounds()).with_lod(lod)))
        .unwrap();

    backend.take_commands();
    engine.run_frame(&mut backend, 1.0 / 60.0, 8, 8).unwrap();
    assert_eq!(drawn_meshes(&backend), vec![high]);

    engine.scene_mut().set_position(rock, Vec3::new(0.0, 0.0, -50.0)).unwrap();
    backend.take_commands();
    engine.run_frame(&mut backend, 1.0 / 60.0, 8, 8).unwrap();
    assert_eq!(drawn_meshes(&backend), vec![low]);

    // Beyond the last level nothing is drawn
    engine.scene_mut().set_position(rock, Vec3::new(0.0, 0.0, -150.0)).unwrap();
    backend.take_commands();
    let stats = engine.run_frame(&mut backend, 1.0 / 60.0, 8, 8).unwrap();
    assert!(drawn_meshes(&backend).is_empty());
    assert_eq!(stats.culling.lod_culled, 1);
}

#[test]
fn systems_run_inside_the_frame() {
    let mut backend = SoftwareBackend::new(4, 4);
    let mut engine = engine_looking_down_negative_z(&mut backend);

    let world = engine.world_mut();
    world.add_system(Box::new(TransformSystem::new()));
    world.add_system(Box::new(Spinner {
        radians_per_second: FRAC_PI_2,
    }));
    let turret = world.create_entity("turret");
    let barrel = world.create_entity("barrel");
    world.set_parent(barrel, Some(turret)).unwrap();
    world.add_component(turret, TransformComponent::identity()).unwrap();
    world
        .add_component(barrel, TransformComponent::from_position(Vec3::new(0.0, 0.0, -1.0)))
        .unwrap();

    // Spinner runs after the transform pass, so the turn shows up a frame later
    engine.run_frame(&mut backend, 1.0, 4, 4).unwrap();
    engine.run_frame(&mut backend, 0.0, 4, 4).unwrap();

    let position = engine
        .world()
        .get_component::<TransformComponent>(barrel)
        .unwrap()
        .world_position();
    // Turret and barrel both turned a quarter: the barrel's own turn does not move it
    assert_relative_eq!(position, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-4);
    assert_eq!(engine.last_stats().frame, 2);
}

#[test]
fn engine_loads_toml_configuration() {
    let path = std::env::temp_dir().join(format!("scene_engine_frame_{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        log_level = "warn"

        [camera]
        fov_degrees = 60.0

        [bloom]
        enabled = false
        "#,
    )
    .unwrap();

    let engine = Engine::from_config_file(&path);
    let _ = std::fs::remove_file(&path);
    let engine = engine.unwrap();

    assert!(!engine.post().settings().enabled);
    assert_relative_eq!(engine.config().camera.fov_degrees, 60.0);
    assert_relative_eq!(engine.camera().vertical_fov().unwrap(), 60f32.to_radians(), epsilon = 1e-6);
}
