//! Scene file -> geometry -> particles -> runner, end to end.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use orchestrator::{build_simulation, create_simulation, geometry, RunnerState, SceneConfig};

const FLOOR_STL: &str = "solid floor
facet normal 0 1 0
  outer loop
    vertex -2 0 -2
    vertex -2 0 2
    vertex 2 0 2
  endloop
endfacet
facet normal 0 1 0
  outer loop
    vertex -2 0 -2
    vertex 2 0 2
    vertex 2 0 -2
  endloop
endfacet
endsolid floor
";

/// Fresh scratch directory for one test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sph-orchestrator-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn stl_floor_is_loaded() {
    let dir = scratch_dir("stl");
    let path = dir.join("floor.stl");
    fs::write(&path, FLOOR_STL).unwrap();

    let tris = geometry::load_stl(&path, 0.5, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    assert_eq!(tris.len(), 2);
    for t in &tris {
        assert!((t.normals[0] - Vec3::Y).length() < 1.0e-6);
        assert!(t.vertices.iter().all(|v| (v.y - 1.0).abs() < 1.0e-6 && v.x.abs() <= 1.0));
    }
}

#[test]
fn scene_with_stl_floor_keeps_fluid_above_it() {
    let dir = scratch_dir("floor-scene");
    fs::write(dir.join("floor.stl"), FLOOR_STL).unwrap();
    fs::write(
        dir.join("scene.json"),
        r#"{
            "name": "drop onto floor",
            "particle_spacing": 0.1,
            "parameters": { "time_step": 0.004 },
            "fluid": [ { "min": [-0.2, 0.2, -0.2], "max": [0.2, 0.4, 0.2], "spacing": 0.1 } ],
            "colliders": [ { "type": "Stl", "path": "floor.stl" } ]
        }"#,
    )
    .unwrap();

    let config = SceneConfig::load(dir.join("scene.json")).unwrap();
    let mut sim = build_simulation(&config, &dir).unwrap();
    assert_eq!(sim.particles().len(), 32);
    assert_eq!(sim.bvh().triangles().len(), 2);

    for _ in 0..150 {
        sim.step();
    }
    assert!(sim.particles().positions().iter().all(|p| p.y > 0.0));
    assert_eq!(sim.output().generation(), 150);
}

#[test]
fn container_scene_runs_to_completion() {
    let dir = scratch_dir("container");
    let scene = dir.join("tank.json");
    fs::write(
        &scene,
        r#"{
            "name": "tank",
            "particle_spacing": 0.1,
            "fluid": [ { "min": [0.15, 0.15, 0.15], "max": [0.55, 0.55, 0.55], "spacing": 0.1 } ],
            "initial_velocity": [1.0, 0.0, 0.0],
            "colliders": [ { "type": "Container", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } ],
            "max_steps": 40
        }"#,
    )
    .unwrap();

    let runner = create_simulation(&scene).unwrap();
    let positions = runner.positions();
    runner.start();

    let deadline = Instant::now() + Duration::from_secs(30);
    while runner.state() != RunnerState::Finished {
        assert!(Instant::now() < deadline, "runner did not finish: {:?}", runner.state());
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(runner.step_count(), 40);

    let frame = positions.positions();
    assert_eq!(frame.len(), 64);
    for p in frame {
        assert!(p.cmpgt(Vec3::ZERO).all() && p.cmplt(Vec3::ONE).all(), "escaped: {p}");
    }
    runner.join().unwrap();
}

#[test]
fn missing_stl_fails_setup() {
    let dir = scratch_dir("missing");
    let scene = dir.join("scene.json");
    fs::write(
        &scene,
        r#"{
            "name": "broken",
            "fluid": [ { "min": [0.0, 0.0, 0.0], "max": [0.1, 0.1, 0.1], "spacing": 0.1 } ],
            "colliders": [ { "type": "Stl", "path": "nowhere.stl" } ]
        }"#,
    )
    .unwrap();
    let err = create_simulation(&scene).err().expect("setup should fail");
    assert!(format!("{err:#}").contains("nowhere.stl"), "{err:#}");
}
